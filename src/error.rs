//! Error taxonomy for the dispatch pipeline.
//!
//! Four classes of failure flow through a request:
//!
//! - [`ApiError::Biz`] - raised intentionally by an operation; its code and
//!   message are returned to the caller verbatim.
//! - [`ApiError::BadRequest`] - caller-caused (malformed body, unknown
//!   operation, bad signature); surfaces as envelope code 400 with a
//!   caller-safe message.
//! - [`ApiError::Internal`] - the pipeline reached an inconsistent state;
//!   indicates a coding problem, not request data.
//! - [`ApiError::Unexpected`] - a recovered panic or other abrupt failure
//!   inside an operation or stage.
//!
//! The last two both surface as envelope code 500 "internal error"; the
//! original detail stays in the log record only.

use std::error::Error as StdError;
use std::fmt::Write as _;

use tracing::Level;

/// Boxed cause attached to an error, rendered into the log description.
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// The error type threaded through [`crate::state::ApiState`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A business-rule error carrying its own wire code and message.
    #[error("({code}) {message}")]
    Biz {
        code: i32,
        message: String,
        source: Option<Cause>,
    },

    /// An invalid request. The message may be shown to the caller, so it
    /// must not leak internals; put specifics on the cause instead.
    #[error("{message}")]
    BadRequest {
        message: String,
        source: Option<Cause>,
    },

    /// The pipeline itself misbehaved (missing state, impossible branch).
    #[error("{message}")]
    Internal {
        message: String,
        source: Option<Cause>,
    },

    /// A recovered panic or other abrupt failure.
    #[error("{message}")]
    Unexpected {
        message: String,
        source: Option<Cause>,
    },
}

impl ApiError {
    /// A business error passed through to the caller verbatim.
    pub fn biz(code: i32, message: impl Into<String>) -> Self {
        ApiError::Biz {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            source: None,
        }
    }

    pub fn bad_request_caused(cause: impl Into<Cause>, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_caused(cause: impl Into<Cause>, message: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        ApiError::Unexpected {
            message: message.into(),
            source: None,
        }
    }

    /// Fold a panic payload into an error, keeping [`ApiError`] payloads
    /// intact. `context` names the operation or stage that panicked.
    #[must_use]
    pub fn from_panic(context: &str, payload: Box<dyn std::any::Any + Send>) -> Self {
        let payload = match payload.downcast::<ApiError>() {
            Ok(e) => return *e,
            Err(p) => p,
        };
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        ApiError::Unexpected {
            message: if context.is_empty() {
                message
            } else {
                format!("{context}: {message}")
            },
            source: None,
        }
    }

    fn source_ref(&self) -> Option<&Cause> {
        match self {
            ApiError::Biz { source, .. }
            | ApiError::BadRequest { source, .. }
            | ApiError::Internal { source, .. }
            | ApiError::Unexpected { source, .. } => source.as_ref(),
        }
    }

    /// The short class name used in log records.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            ApiError::Biz { .. } => "BizError",
            ApiError::BadRequest { .. } => "BadRequestError",
            ApiError::Internal { .. } => "ApiError",
            ApiError::Unexpected { .. } => "UnexpectedError",
        }
    }

    /// The log level, class name and full cause-chain description for this
    /// error, for the one log record every request emits.
    #[must_use]
    pub fn describe(&self) -> (Level, &'static str, String) {
        let level = match self {
            ApiError::Biz { .. } => Level::WARN,
            // Internal errors mean the code cannot run correctly; callers
            // log them with a `fatal` marker since tracing has no level
            // above ERROR.
            _ => Level::ERROR,
        };

        let mut description = self.to_string();
        let mut cause = self.source_ref().map(|c| -> &dyn StdError { &**c });
        while let Some(err) = cause {
            let _ = write!(description, ":: {err}");
            cause = err.source();
        }

        (level, self.type_name(), description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_levels() {
        let (level, name, _) = ApiError::biz(1001, "insufficient funds").describe();
        assert_eq!(level, Level::WARN);
        assert_eq!(name, "BizError");

        let (level, name, _) = ApiError::bad_request("bad request").describe();
        assert_eq!(level, Level::ERROR);
        assert_eq!(name, "BadRequestError");

        let (level, name, _) = ApiError::internal("state not initialized").describe();
        assert_eq!(level, Level::ERROR);
        assert_eq!(name, "ApiError");
    }

    #[test]
    fn test_describe_joins_cause_chain() {
        let cause = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad byte");
        let err = ApiError::bad_request_caused(cause, "bad request");
        let (_, _, description) = err.describe();
        assert_eq!(description, "bad request:: bad byte");
    }

    #[test]
    fn test_from_panic_preserves_api_error() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(ApiError::biz(7, "x"));
        let err = ApiError::from_panic("op", payload);
        assert!(matches!(err, ApiError::Biz { code: 7, .. }));
    }

    #[test]
    fn test_from_panic_wraps_strings() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom".to_string());
        let err = ApiError::from_panic("plus", payload);
        assert!(matches!(err, ApiError::Unexpected { .. }));
        assert_eq!(err.to_string(), "plus: boom");
    }
}
