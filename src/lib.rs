//! # slimapi
//!
//! **slimapi** is a WebAPI dispatch framework for Rust: plain functions are
//! registered by name and exposed over HTTP through the SlimAPI wire
//! protocol, with the SlimAuth HMAC signing extension layered on top. The
//! transport runs on the `may` coroutine runtime via `may_minihttp`.
//!
//! ## Overview
//!
//! Every request flows through a fixed pipeline of pluggable stages:
//! resolve the client host, resolve the operation name and request format,
//! decode the arguments, invoke the operation, build the response envelope,
//! serialize the wire body, and emit one structured log record. Expected
//! failures travel as values on the per-request state; two recovery
//! boundaries fold unexpected panics into the same error shape so a broken
//! operation still answers with a well-formed envelope.
//!
//! ## Architecture
//!
//! - **[`handler`]** - the stage interfaces and the pipeline that runs them
//! - **[`state`]** - the per-request record threaded through the stages
//! - **[`method`]** / **[`registry`]** - typed operation descriptors and the
//!   concurrent name registry
//! - **[`slimapi`]** - the wire protocol: format negotiation, the
//!   case-insensitive parameter model, the envelope writer, a blocking
//!   client invoker
//! - **[`slimauth`]** - canonical-request HMAC-SHA256 signing and the
//!   verifier gate
//! - **[`server`]** - the `may_minihttp` adapter and server wrapper
//! - **[`querystring`]** / **[`conv`]** - the legacy query model and the
//!   lenient argument conversion
//!
//! ## Example
//!
//! ```no_run
//! use slimapi::registry::{ApiMethodRegister, BasicApiMethodRegister};
//! use slimapi::method::ApiMethod;
//! use slimapi::server::{HttpServer, SlimApiService};
//! use serde::Deserialize;
//! use std::sync::Arc;
//!
//! #[derive(Deserialize)]
//! struct PlusArgs { a: i64, b: i64 }
//!
//! let registry = BasicApiMethodRegister::new();
//! registry.register(ApiMethod::new("Plus", "demo", |v: PlusArgs| v.a + v.b));
//!
//! let handler = Arc::new(slimapi::slimapi::new_slim_api_handler("demo", registry));
//! let service = SlimApiService::new("/api", handler);
//! let server = HttpServer(service).start("127.0.0.1:8080").unwrap();
//! server.join().unwrap();
//! // GET /api?~method=plus&a=1&b=2  ->  {"Code":0,"Message":"","Data":3}
//! ```

pub mod conv;
pub mod error;
pub mod handler;
pub mod host;
pub mod logsetup;
pub mod method;
pub mod querystring;
pub mod registry;
pub mod response;
pub mod runtime_config;
pub mod server;
pub mod slimapi;
pub mod slimauth;
pub mod state;

pub use error::ApiError;
pub use handler::ApiHandler;
pub use method::ApiMethod;
pub use registry::{ApiMethodRegister, ApiProvider, BasicApiMethodRegister};
pub use response::ApiResponse;
pub use state::{ApiState, HttpRequest};

/// `Content-Type: application/json`.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// `Content-Type: application/octet-stream`.
pub const CONTENT_TYPE_BINARY: &str = "application/octet-stream";
/// `Content-Type: text/javascript`, used for JSONP responses.
pub const CONTENT_TYPE_JAVASCRIPT: &str = "text/javascript";
/// `Content-Type: text/plain`.
pub const CONTENT_TYPE_PLAIN_TEXT: &str = "text/plain";
/// `Content-Type: application/x-www-form-urlencoded`.
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
/// `Content-Type: multipart/form-data`.
pub const CONTENT_TYPE_MULTIPART_FORM: &str = "multipart/form-data";
