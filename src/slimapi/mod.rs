//! The SlimAPI wire protocol: format negotiation, argument decoding and the
//! envelope writer.
//!
//! A SlimAPI call names its operation through one of three URL conventions
//! (tried in this order, first non-empty value per field wins):
//!
//! 1. explicit meta parameters `?~method=M&~format=F&~callback=C`;
//! 2. a single unnamed query token `M[.F][(C)]`;
//! 3. router-supplied route parameters with the same three names.
//!
//! The request format (`get` / `post` / `json`) selects where arguments come
//! from; the `plain` token and the JSONP callback only affect the response
//! content type. Responses always travel as the
//! `{"Code":…,"Message":…,"Data":…}` envelope with HTTP status 200.

mod decoder;
mod invoker;
mod logger;
mod multipart;
mod resolver;
mod time;
mod writer;

pub use decoder::SlimApiDecoder;
pub use invoker::SlimApiInvoker;
pub use logger::{new_slim_api_logger, BodyLogSetup, FilesLogSetup};
pub use multipart::{parse_multipart, FilePart, MultipartError, Part};
pub use resolver::SlimApiNameResolver;
pub use time::Time;
pub use writer::SlimApiResponseWriter;

use crate::handler::{ApiHandler, BasicApiMethodCaller, BasicApiResponseBuilder};
use crate::host::BasicApiUserHostResolver;
use crate::registry::ApiMethodRegister;

/// Meta parameter carrying the operation name.
pub const META_PARAM_METHOD: &str = "~method";
/// Meta parameter carrying the request format.
pub const META_PARAM_FORMAT: &str = "~format";
/// Meta parameter carrying the JSONP callback name.
pub const META_PARAM_CALLBACK: &str = "~callback";

pub(crate) const FORMAT_GET: &str = "get";
pub(crate) const FORMAT_POST: &str = "post";
pub(crate) const FORMAT_JSON: &str = "json";
pub(crate) const FORMAT_PLAIN: &str = "plain";

/// Where the arguments of a request are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFormat {
    /// URL query parameters only.
    Get,
    /// Query parameters overlaid with a form (or multipart) body.
    Post,
    /// Query parameters overlaid with a JSON body.
    Json,
}

/// Assemble the standard SlimAPI pipeline around the given registry.
#[must_use]
pub fn new_slim_api_handler(
    name: impl Into<String>,
    registry: impl ApiMethodRegister + 'static,
) -> ApiHandler {
    ApiHandler::builder(name)
        .registry(registry)
        .name_resolver(SlimApiNameResolver)
        .user_host_resolver(BasicApiUserHostResolver)
        .decoder(SlimApiDecoder)
        .method_caller(BasicApiMethodCaller)
        .response_builder(BasicApiResponseBuilder)
        .response_writer(SlimApiResponseWriter)
        .logger(new_slim_api_logger())
        .build()
}
