//! The SlimAuth log pipeline.

use crate::logsetup::{ErrorLogSetup, IpLogSetup, LogSetup, LogSetupPipeline, UrlLogSetup};
use crate::state::ApiState;

/// Records the caller's access key and signing timestamp, when the request
/// carried authorization data.
pub struct AuthorizationLogSetup;

impl LogSetup for AuthorizationLogSetup {
    fn setup(&self, state: &mut ApiState) {
        let Some(auth) = &state.authorization else {
            return;
        };
        let key = auth.key.clone();
        let timestamp = auth.timestamp.to_string();
        state.log("AccessKey", key);
        state.log("Timestamp", timestamp);
    }
}

/// The standard log pipeline for SlimAuth: IP, URL, authorization, error.
#[must_use]
pub fn new_slim_auth_logger() -> LogSetupPipeline {
    LogSetupPipeline::new()
        .with(IpLogSetup)
        .with(UrlLogSetup)
        .with(AuthorizationLogSetup)
        .with(ErrorLogSetup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slimauth::Authorization;
    use crate::state::HttpRequest;
    use http::Method;

    #[test]
    fn test_authorization_fields_logged() {
        let mut state = ApiState::new(HttpRequest::new(Method::GET, "/"));
        state.authorization = Some(Authorization {
            key: "ak".into(),
            timestamp: 42,
            ..Authorization::default()
        });
        AuthorizationLogSetup.setup(&mut state);

        assert!(state
            .log_fields
            .iter()
            .any(|(k, v)| k == "AccessKey" && v == "ak"));
        assert!(state
            .log_fields
            .iter()
            .any(|(k, v)| k == "Timestamp" && v == "42"));
    }
}
