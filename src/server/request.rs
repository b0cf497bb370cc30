//! Extraction of a buffered [`HttpRequest`] from a raw `may_minihttp`
//! request.

use std::collections::HashMap;
use std::io::Read;

use http::Method;
use may_minihttp::Request;
use smallvec::SmallVec;
use tracing::debug;

use crate::state::HttpRequest;

/// Maximum inline headers before heap allocation. Most requests carry
/// fewer, so the hot path stays on the stack.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage used while parsing.
pub type HeaderVec = SmallVec<[(String, String); MAX_INLINE_HEADERS]>;

/// Parse a raw request into the buffered form the pipeline works on.
///
/// Header names are lower-cased; the body is read up front (capped at
/// `max_body_size`) so later stages can re-read it freely.
pub fn parse_request(req: Request, remote_addr: String, max_body_size: usize) -> HttpRequest {
    let method = req
        .method()
        .parse::<Method>()
        .unwrap_or(Method::GET);
    let raw_path = req.path().to_string();

    let mut header_vec = HeaderVec::new();
    for h in req.headers() {
        header_vec.push((
            h.name.to_ascii_lowercase(),
            String::from_utf8_lossy(h.value).to_string(),
        ));
    }
    let header_count = header_vec.len();
    let headers: HashMap<String, String> = header_vec.into_iter().collect();

    let mut body = Vec::new();
    let read = req
        .body()
        .take(max_body_size as u64)
        .read_to_end(&mut body)
        .unwrap_or(0);

    debug!(
        method = %method,
        path = %raw_path,
        header_count = header_count,
        body_size_bytes = read,
        "HTTP request parsed"
    );

    let mut parsed = HttpRequest::new(method, &raw_path);
    parsed.headers = headers;
    parsed.body = body;
    parsed.remote_addr = remote_addr;
    parsed
}
