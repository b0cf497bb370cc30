//! Assembly of the one log record each request emits.
//!
//! A [`LogSetup`] appends key/value pairs to the state's log buffer; a
//! [`LogSetupPipeline`] runs a sequence of them and then emits a single
//! `tracing` event at the level the request earned (business errors log at
//! WARN, everything else that failed at ERROR, success at INFO). Filtering
//! and output formatting stay with the `tracing` subscriber.

use std::fmt::Write as _;

use tracing::Level;

use crate::handler::ApiLogger;
use crate::state::ApiState;

/// One step that contributes fields to the request's log record.
pub trait LogSetup: Send + Sync {
    fn setup(&self, state: &mut ApiState);
}

impl<F> LogSetup for F
where
    F: Fn(&mut ApiState) + Send + Sync,
{
    fn setup(&self, state: &mut ApiState) {
        self(state)
    }
}

/// Records the resolved client host under `IP`.
pub struct IpLogSetup;

impl LogSetup for IpLogSetup {
    fn setup(&self, state: &mut ApiState) {
        let host = state.user_host.clone();
        state.log("IP", host);
    }
}

/// Records the full request URI under `URL`.
pub struct UrlLogSetup;

impl LogSetup for UrlLogSetup {
    fn setup(&self, state: &mut ApiState) {
        let uri = state.request.request_uri();
        state.log("URL", uri);
    }
}

/// Records the error class and description, and raises the record's level
/// according to the error taxonomy.
pub struct ErrorLogSetup;

impl LogSetup for ErrorLogSetup {
    fn setup(&self, state: &mut ApiState) {
        let Some(error) = &state.error else {
            return;
        };
        let (level, type_name, description) = error.describe();
        let fatal = matches!(error, crate::error::ApiError::Internal { .. });

        state.log_level = Some(level);
        state.log("ErrorType", type_name);
        state.log("Error", description);
        if fatal {
            // tracing has no level above ERROR; mark pipeline-inconsistency
            // errors so alerting can tell them apart.
            state.log("Fatal", "true");
        }
    }
}

/// A sequence of [`LogSetup`]s emitting one event per request.
pub struct LogSetupPipeline {
    setups: Vec<Box<dyn LogSetup>>,
}

impl LogSetupPipeline {
    #[must_use]
    pub fn new() -> Self {
        LogSetupPipeline { setups: Vec::new() }
    }

    #[must_use]
    pub fn with(mut self, setup: impl LogSetup + 'static) -> Self {
        self.setups.push(Box::new(setup));
        self
    }
}

impl Default for LogSetupPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiLogger for LogSetupPipeline {
    fn log(&self, state: &mut ApiState) {
        for setup in &self.setups {
            setup.setup(state);
        }

        let mut message = String::new();
        for (key, value) in &state.log_fields {
            if !message.is_empty() {
                message.push(' ');
            }
            let _ = write!(message, "{key}={value:?}");
        }

        let level = state.log_level.unwrap_or(Level::INFO);
        if level == Level::ERROR {
            tracing::error!(target: "slimapi", method = %state.name, %message);
        } else if level == Level::WARN {
            tracing::warn!(target: "slimapi", method = %state.name, %message);
        } else {
            tracing::info!(target: "slimapi", method = %state.name, %message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::state::HttpRequest;
    use http::Method;

    #[test]
    fn test_error_setup_raises_level() {
        let mut state = ApiState::new(HttpRequest::new(Method::GET, "/"));
        state.error = Some(ApiError::biz(9, "slow down"));
        ErrorLogSetup.setup(&mut state);

        assert_eq!(state.log_level, Some(Level::WARN));
        assert!(state
            .log_fields
            .iter()
            .any(|(k, v)| k == "ErrorType" && v == "BizError"));
    }

    #[test]
    fn test_internal_error_is_marked_fatal() {
        let mut state = ApiState::new(HttpRequest::new(Method::GET, "/"));
        state.error = Some(ApiError::internal("broken"));
        ErrorLogSetup.setup(&mut state);
        assert!(state.log_fields.iter().any(|(k, _)| k == "Fatal"));
    }

    #[test]
    fn test_ip_and_url_setups() {
        let mut state = ApiState::new(HttpRequest::new(Method::GET, "/api?~method=x"));
        state.user_host = "1.2.3.4".to_string();
        IpLogSetup.setup(&mut state);
        UrlLogSetup.setup(&mut state);

        assert!(state
            .log_fields
            .iter()
            .any(|(k, v)| k == "IP" && v == "1.2.3.4"));
        assert!(state
            .log_fields
            .iter()
            .any(|(k, v)| k == "URL" && v == "/api?~method=x"));
    }
}
