//! Serialization of the response envelope onto the wire.

use crate::error::ApiError;
use crate::handler::ApiResponseWriter;
use crate::state::ApiState;

/// The SlimAPI response writer.
///
/// Serializes the envelope as JSON (Rust strings are UTF-8, which is what
/// the protocol requires) and wraps it as `callback(json)` when a JSONP
/// callback was resolved. The content type was already fixed by the name
/// resolver; this stage only produces the body.
pub struct SlimApiResponseWriter;

impl ApiResponseWriter for SlimApiResponseWriter {
    fn write_response(&self, state: &mut ApiState) {
        let Some(response) = &state.response else {
            std::panic::panic_any(ApiError::internal("response not built before writing"));
        };

        let json_body = match serde_json::to_vec(response) {
            Ok(v) => v,
            Err(e) => std::panic::panic_any(ApiError::internal_caused(e, "json encoding error")),
        };

        let body = match &state.callback {
            Some(callback) => {
                let mut buf = Vec::with_capacity(callback.len() + json_body.len() + 2);
                buf.extend_from_slice(callback.as_bytes());
                buf.push(b'(');
                buf.extend_from_slice(&json_body);
                buf.push(b')');
                buf
            }
            None => json_body,
        };

        state.response_body = Some(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ApiResponse;
    use crate::state::HttpRequest;
    use http::Method;
    use serde_json::json;

    #[test]
    fn test_plain_json_body() {
        let mut state = ApiState::new(HttpRequest::new(Method::GET, "/"));
        state.response = Some(ApiResponse::success(json!(3)));
        SlimApiResponseWriter.write_response(&mut state);

        assert_eq!(
            state.response_body.unwrap(),
            br#"{"Code":0,"Message":"","Data":3}"#
        );
    }

    #[test]
    fn test_jsonp_wrapping() {
        let mut state = ApiState::new(HttpRequest::new(Method::GET, "/"));
        state.callback = Some("cb".to_string());
        state.response = Some(ApiResponse::success(json!(1)));
        SlimApiResponseWriter.write_response(&mut state);

        assert_eq!(
            state.response_body.unwrap(),
            br#"cb({"Code":0,"Message":"","Data":1})"#
        );
    }
}
