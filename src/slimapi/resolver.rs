//! Resolution of the operation name, request format and response content
//! type from the URL conventions.

use crate::error::ApiError;
use crate::handler::ApiNameResolver;
use crate::state::ApiState;

use super::{
    RequestFormat, FORMAT_GET, FORMAT_JSON, FORMAT_PLAIN, FORMAT_POST, META_PARAM_CALLBACK,
    META_PARAM_FORMAT, META_PARAM_METHOD,
};

/// The SlimAPI name/format resolver.
///
/// Besides the operation name this stage fixes the response content type:
/// SlimAPI lets the caller pick it (`plain`, JSONP), so it is decided while
/// the request is being read, not when the response is written.
pub struct SlimApiNameResolver;

impl ApiNameResolver for SlimApiNameResolver {
    fn fill_method(&self, state: &mut ApiState) {
        let query = &state.query;

        // Convention 1: explicit meta parameters.
        let mut method = query.get(META_PARAM_METHOD).unwrap_or("").to_string();
        let mut format = query.get(META_PARAM_FORMAT).unwrap_or("").to_string();
        let mut callback = query.get(META_PARAM_CALLBACK).unwrap_or("").to_string();

        // Convention 2: a single unnamed token METHOD[.FORMAT][(CALLBACK)].
        if !query.nameless.is_empty() {
            parse_mixed_meta_params(
                &query.nameless.clone(),
                &mut method,
                &mut format,
                &mut callback,
            );
        }

        // Convention 3: route parameters.
        if method.is_empty() {
            method = state.request.route_param_or_empty(META_PARAM_METHOD).to_string();
        }
        if format.is_empty() {
            format = state.request.route_param_or_empty(META_PARAM_FORMAT).to_string();
        }
        if callback.is_empty() {
            callback = state
                .request
                .route_param_or_empty(META_PARAM_CALLBACK)
                .to_string();
        }

        // The format needs validation; a bad one aborts the whole request,
        // so it is settled first.
        let mut request_format: Option<RequestFormat> = None;

        if format.is_empty() {
            // No explicit format: infer from the Content-Type header.
            match state.request.content_type() {
                Some(crate::CONTENT_TYPE_JSON) => request_format = Some(RequestFormat::Json),
                Some(crate::CONTENT_TYPE_FORM) => request_format = Some(RequestFormat::Post),
                _ => {}
            }
        } else {
            // The format value may combine a request format with the
            // response-only token `plain`, comma-separated (e.g. "json,plain").
            for part in format.split(',') {
                match part {
                    FORMAT_PLAIN => {
                        state.response_content_type = crate::CONTENT_TYPE_PLAIN_TEXT.to_string();
                    }
                    FORMAT_GET => request_format = Some(RequestFormat::Get),
                    FORMAT_JSON => request_format = Some(RequestFormat::Json),
                    FORMAT_POST => request_format = Some(RequestFormat::Post),
                    _ => {
                        state.error = Some(ApiError::bad_request("bad format"));
                        return;
                    }
                }
            }
        }

        state.name = method;
        if !callback.is_empty() {
            state.callback = Some(callback.clone());
        }

        // Default to GET semantics when nothing named a format.
        state.format = Some(request_format.unwrap_or(RequestFormat::Get));

        if !callback.is_empty() {
            // JSONP forces a Javascript content type.
            state.response_content_type = crate::CONTENT_TYPE_JAVASCRIPT.to_string();
        } else if state.response_content_type.is_empty() {
            state.response_content_type = crate::CONTENT_TYPE_JSON.to_string();
        }
    }
}

/// Parse `METHOD[.FORMAT][(CALLBACK)]`. Both suffixes are optional but the
/// order is fixed; without a format the shape is `METHOD(CALLBACK)`.
///
/// Each output is only written when it does not already hold a non-empty
/// value, preserving the precedence of convention 1.
fn parse_mixed_meta_params(
    input: &str,
    method: &mut String,
    format: &mut String,
    callback: &mut String,
) {
    #[derive(PartialEq)]
    enum Follow {
        Nothing,
        Format,
        Callback,
    }

    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut pos = 0;
    let mut follow = Follow::Nothing;

    // Find what follows the METHOD part.
    loop {
        match bytes[pos] {
            b'.' => {
                follow = Follow::Format;
                break;
            }
            b'(' => {
                follow = Follow::Callback;
                break;
            }
            _ => {
                pos += 1;
                if pos == len {
                    break;
                }
            }
        }
    }

    if method.is_empty() {
        *method = input[..pos].to_string();
    }

    if follow == Follow::Format {
        pos += 1; // Move past '.'.

        let start = pos;
        while pos < len {
            if bytes[pos] == b'(' {
                follow = Follow::Callback;
                break;
            }
            pos += 1;
        }

        if format.is_empty() {
            *format = input[start..pos].to_string();
        }
    }

    if follow == Follow::Callback {
        pos += 1; // Move past '('.

        let start = pos;
        loop {
            if pos == len {
                // No closing parenthesis; the callback is discarded.
                return;
            }
            if bytes[pos] == b')' {
                break;
            }
            pos += 1;
        }

        if callback.is_empty() {
            *callback = input[start..pos].to_string();
        }
    }
}
