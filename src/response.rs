//! The wire envelope returned for every call regardless of outcome.

use serde::{Deserialize, Serialize};

/// Wire error code for an invalid request.
pub const ERROR_CODE_BAD_REQUEST: i32 = 400;
/// Wire error code for an internal error.
pub const ERROR_CODE_INTERNAL_ERROR: i32 = 500;

/// The response envelope: `{"Code":…,"Message":…,"Data":…}`.
///
/// `code` 0 means success; any other value is an error and `message`
/// describes it. The envelope is a pure value, independent of transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// A successful envelope wrapping `data`.
    pub fn success(data: T) -> Self {
        ApiResponse {
            code: 0,
            message: String::new(),
            data,
        }
    }
}

impl ApiResponse<serde_json::Value> {
    /// The generic envelope for an invalid request.
    #[must_use]
    pub fn bad_request() -> Self {
        ApiResponse {
            code: ERROR_CODE_BAD_REQUEST,
            message: "bad request".to_string(),
            data: serde_json::Value::Null,
        }
    }

    /// The generic envelope for an internal error.
    #[must_use]
    pub fn internal_error() -> Self {
        ApiResponse {
            code: ERROR_CODE_INTERNAL_ERROR,
            message: "internal error".to_string(),
            data: serde_json::Value::Null,
        }
    }
}
