//! Writing the finished response back onto the transport.

use may_minihttp::Response;

use crate::state::HttpResponseParts;

/// The reason phrase paired with a status code.
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// Copy the response parts onto the raw transport response.
pub fn write_response(res: &mut Response, parts: HttpResponseParts) {
    res.status_code(parts.status as usize, status_reason(parts.status));
    if !parts.content_type.is_empty() {
        // may_minihttp takes 'static header lines; the content type is
        // per-request data, so the line has to be leaked.
        let header = format!("Content-Type: {}", parts.content_type).into_boxed_str();
        res.header(Box::leak(header));
    }
    res.body_vec(parts.body);
}

/// Write a plain error outside the protocol envelope (unmatched route,
/// unsupported HTTP method).
pub fn write_plain_error(res: &mut Response, status: u16, message: &str) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: text/plain");
    res.body_vec(message.as_bytes().to_vec());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(405), "Method Not Allowed");
    }
}
