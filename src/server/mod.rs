//! HTTP transport adapter built on `may_minihttp`.
//!
//! The dispatch pipeline is transport-independent; this module owns the
//! glue: parsing the raw request into a buffered [`crate::state::HttpRequest`],
//! matching the mount route, and writing the finished response back.

mod http_server;
mod request;
mod response;
mod route;
mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, HeaderVec, MAX_INLINE_HEADERS};
pub use response::{status_reason, write_plain_error, write_response};
pub use route::RoutePattern;
pub use service::SlimApiService;
