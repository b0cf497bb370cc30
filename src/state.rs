//! Per-request state threaded through the dispatch pipeline.
//!
//! Every inbound request gets one [`ApiState`]. Stages read what they need
//! from it and write their result back; fields populate progressively and
//! are never retracted. The state is exclusively owned by the pipeline
//! invocation that created it and is discarded once the response has been
//! flushed and logged.

use std::collections::HashMap;

use http::Method;
use serde_json::Value;
use tracing::Level;

use crate::error::ApiError;
use crate::method::{ApiMethodRef, PreparedCall};
use crate::querystring::{parse_query_string, QueryString};
use crate::response::ApiResponse;
use crate::slimapi::{FilePart, RequestFormat};
use crate::slimauth::Authorization;

/// A buffered, transport-independent HTTP request.
///
/// The server adapter builds one of these from the raw transport request;
/// tests build them directly. The body is buffered up front so stages that
/// consume it (signature verification) leave it re-readable for stages that
/// run later (argument decoding).
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Request path without the query string; `/` when empty.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub raw_query: String,
    /// Header names lower-cased at parse time.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Transport-level peer address, `ip:port` or `[ip]:port`.
    pub remote_addr: String,
    /// Parameters supplied by the router that matched this request.
    pub route_params: HashMap<String, String>,
}

impl HttpRequest {
    /// Start building a request for the given method and URI. The URI may
    /// carry a query string (`/api?~method=x`).
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, raw_query) = match uri.split_once('?') {
            Some((p, q)) => (p, q),
            None => (uri, ""),
        };
        let path = if path.is_empty() { "/" } else { path };
        HttpRequest {
            method,
            path: path.to_string(),
            raw_query: raw_query.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            remote_addr: String::new(),
            route_params: HashMap::new(),
        }
    }

    /// Set a header. Names are stored lower-cased.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self
    }

    #[must_use]
    pub fn route_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.route_params.insert(name.to_string(), value.into());
        self
    }

    /// Get a header by name (case-insensitive).
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `Content-Type` value with any `; charset=…` suffix removed.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
            .map(|v| v.split(';').next().unwrap_or("").trim())
    }

    /// Get a route parameter by name; empty string when absent.
    #[must_use]
    pub fn route_param_or_empty(&self, name: &str) -> &str {
        self.route_params.get(name).map_or("", String::as_str)
    }

    /// The request URI (path plus query) for log records.
    #[must_use]
    pub fn request_uri(&self) -> String {
        if self.raw_query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.raw_query)
        }
    }
}

/// The response being assembled, independent of the transport.
#[derive(Debug, Clone, Default)]
pub struct HttpResponseParts {
    /// HTTP status; the SlimAPI protocol always answers 200 and reports
    /// errors through the envelope code.
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// The per-request record mutated by every pipeline stage in sequence.
pub struct ApiState {
    /// The buffered inbound request.
    pub request: HttpRequest,
    /// The query string parsed with the legacy rules. The wire protocol was
    /// specified against these semantics, so query access goes through this
    /// field rather than re-parsing `request.raw_query`.
    pub query: QueryString,

    /// Resolved client host.
    pub user_host: String,
    /// Resolved operation name.
    pub name: String,
    /// The registered operation matching `name`.
    pub method: Option<ApiMethodRef>,
    /// The decoded, ready-to-run invocation produced by the decoder stage.
    pub prepared: Option<PreparedCall>,

    /// The operation's result value, if any.
    pub data: Option<Value>,
    /// The error produced anywhere in the pipeline; `None` means success.
    pub error: Option<ApiError>,

    /// Log level override; when unset the logger picks a default.
    pub log_level: Option<Level>,
    /// Append-only key/value buffer emitted as one log record at the end.
    pub log_fields: Vec<(String, String)>,

    /// The abstract response envelope.
    pub response: Option<ApiResponse<Value>>,
    /// The serialized wire body.
    pub response_body: Option<Vec<u8>>,
    /// The response `Content-Type`.
    pub response_content_type: String,

    // Typed protocol extension slots. These carry data between stages that
    // the fixed fields above do not cover.
    /// The resolved request format.
    pub format: Option<RequestFormat>,
    /// JSONP callback name, when the caller requested one.
    pub callback: Option<String>,
    /// A description of the consumed request body, kept for the log record.
    pub buffered_body: Option<String>,
    /// Uploaded files by (lower-cased) field name; last occurrence wins.
    pub files: HashMap<String, FilePart>,
    /// The parsed `Authorization` data, cached by the verifier gate.
    pub authorization: Option<Authorization>,
}

impl ApiState {
    /// Create the state for one inbound request.
    #[must_use]
    pub fn new(request: HttpRequest) -> Self {
        let query = parse_query_string(&request.raw_query);
        ApiState {
            request,
            query,
            user_host: String::new(),
            name: String::new(),
            method: None,
            prepared: None,
            data: None,
            error: None,
            log_level: None,
            log_fields: Vec::new(),
            response: None,
            response_body: None,
            response_content_type: String::new(),
            format: None,
            callback: None,
            buffered_body: None,
            files: HashMap::new(),
            authorization: None,
        }
    }

    /// Append one key/value pair to the log buffer.
    pub fn log(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.log_fields.push((key.into(), value.into()));
    }

    /// Get an uploaded file by field name (case-insensitive).
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files.get(&name.to_lowercase())
    }
}
