//! The signature verifier gate.
//!
//! Runs before the SlimAPI name resolver: a request whose signature does
//! not check out never reaches name resolution, argument decoding or the
//! operation. The request body is buffered on the state, so re-reading it
//! for the canonical string leaves it intact for the decoder.

use crate::error::ApiError;
use crate::handler::ApiNameResolver;
use crate::slimapi::SlimApiNameResolver;
use crate::state::ApiState;

use super::sign::{sign, SignFailure};
use super::timestamp::{default_time_checker, TimeChecker};
use super::{parse_authorization, SecretFinder, DEFAULT_SIGN_VERSION};

/// The SlimAuth name resolver: signature verification, then the SlimAPI
/// resolution rules unchanged.
pub struct SlimAuthNameResolver {
    finder: Box<dyn SecretFinder>,
    time_checker: TimeChecker,
    auth_scheme: String,
    inner: SlimApiNameResolver,
}

impl SlimAuthNameResolver {
    #[must_use]
    pub fn new(finder: impl SecretFinder + 'static) -> Self {
        SlimAuthNameResolver {
            finder: Box::new(finder),
            time_checker: default_time_checker(),
            auth_scheme: String::new(),
            inner: SlimApiNameResolver,
        }
    }

    /// Replace the clock-skew check (e.g. [`super::no_time_checker`]).
    #[must_use]
    pub fn time_checker(mut self, checker: TimeChecker) -> Self {
        self.time_checker = checker;
        self
    }

    /// Expect a custom `<scheme>` instead of [`super::DEFAULT_AUTH_SCHEME`].
    #[must_use]
    pub fn auth_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.auth_scheme = scheme.into();
        self
    }

    fn verify_signature(&self, state: &mut ApiState) -> Result<(), ApiError> {
        let auth = parse_authorization(&state.request, &self.auth_scheme)
            .map_err(|e| ApiError::bad_request_caused(e, "invalid Authorization"))?;

        // Cache before the checks, so the log record names the caller even
        // for a rejected request.
        state.authorization = Some(auth.clone());

        // There is only one algorithm version so far.
        if auth.version != DEFAULT_SIGN_VERSION {
            return Err(ApiError::bad_request("unsupported signature version"));
        }

        let secret = match self.finder.get_secret(&auth.key) {
            Some(s) if !s.is_empty() => s,
            _ => return Err(ApiError::bad_request("unknown key")),
        };

        if let Err(cause) = (self.time_checker)(auth.timestamp) {
            return Err(ApiError::bad_request_caused(
                simple_error(cause),
                "timestamp error",
            ));
        }

        let computed = sign(&state.request, &secret, auth.timestamp).map_err(|e| {
            let message = match &e {
                SignFailure::MissingContentType => "missing Content-Type",
                SignFailure::UnsupportedContentType(_) => "unsupported Content-Type",
                SignFailure::InvalidRequestBody(_) => "invalid request body",
            };
            ApiError::bad_request_caused(e, message)
        })?;

        if computed != auth.sign {
            return Err(ApiError::bad_request_caused(
                simple_error(format!(
                    "signature mismatch, want {computed}, got {}",
                    auth.sign
                )),
                "signature error",
            ));
        }

        Ok(())
    }
}

fn simple_error(message: String) -> Box<dyn std::error::Error + Send + Sync> {
    message.into()
}

impl ApiNameResolver for SlimAuthNameResolver {
    fn fill_method(&self, state: &mut ApiState) {
        if let Err(e) = self.verify_signature(state) {
            state.error = Some(e);
            return;
        }
        self.inner.fill_method(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slimauth::{build_authorization_header, no_time_checker, Authorization};
    use crate::state::HttpRequest;
    use http::Method;

    fn finder(key: &'static str, secret: &'static str) -> impl SecretFinder {
        move |k: &str| {
            if k == key {
                Some(secret.to_string())
            } else {
                None
            }
        }
    }

    fn signed_request(secret: &str, timestamp: i64) -> HttpRequest {
        let req = HttpRequest::new(Method::GET, "/api?~method=plus&a=1&b=2");
        let signature = sign(&req, secret, timestamp).unwrap();
        req.header(
            "Authorization",
            build_authorization_header(&Authorization {
                key: "ak".into(),
                sign: signature,
                timestamp,
                version: 1,
                ..Authorization::default()
            }),
        )
    }

    fn verify(req: HttpRequest, resolver: &SlimAuthNameResolver) -> ApiState {
        let mut state = ApiState::new(req);
        resolver.fill_method(&mut state);
        state
    }

    #[test]
    fn test_valid_signature_resolves_name() {
        let resolver =
            SlimAuthNameResolver::new(finder("ak", "sk")).time_checker(no_time_checker());
        let state = verify(signed_request("sk", 1661843240), &resolver);
        assert!(state.error.is_none(), "{:?}", state.error);
        assert_eq!(state.name, "plus");
        assert_eq!(state.authorization.as_ref().unwrap().key, "ak");
    }

    #[test]
    fn test_wrong_secret_fails_with_signature_error() {
        let resolver =
            SlimAuthNameResolver::new(finder("ak", "sk")).time_checker(no_time_checker());
        let state = verify(signed_request("other-secret", 1661843240), &resolver);
        assert_eq!(state.error.unwrap().to_string(), "signature error");
        assert!(state.name.is_empty());
    }

    #[test]
    fn test_unknown_key() {
        let resolver =
            SlimAuthNameResolver::new(finder("someone-else", "sk")).time_checker(no_time_checker());
        let state = verify(signed_request("sk", 1661843240), &resolver);
        assert_eq!(state.error.unwrap().to_string(), "unknown key");
    }

    #[test]
    fn test_unsupported_version() {
        let resolver =
            SlimAuthNameResolver::new(finder("ak", "sk")).time_checker(no_time_checker());
        let req = HttpRequest::new(Method::GET, "/api?~method=plus")
            .header("Authorization", "SLIM-AUTH Key=ak, Sign=s, Timestamp=1, Version=2");
        let state = verify(req, &resolver);
        assert_eq!(
            state.error.unwrap().to_string(),
            "unsupported signature version"
        );
    }

    #[test]
    fn test_expired_timestamp() {
        let resolver = SlimAuthNameResolver::new(finder("ak", "sk"));
        let state = verify(signed_request("sk", 1_000_000), &resolver);
        assert_eq!(state.error.unwrap().to_string(), "timestamp error");
    }

    #[test]
    fn test_missing_authorization() {
        let resolver = SlimAuthNameResolver::new(finder("ak", "sk"));
        let state = verify(HttpRequest::new(Method::GET, "/api?~method=plus"), &resolver);
        assert_eq!(state.error.unwrap().to_string(), "invalid Authorization");
    }

    #[test]
    fn test_post_without_content_type() {
        let resolver =
            SlimAuthNameResolver::new(finder("ak", "sk")).time_checker(no_time_checker());
        let req = HttpRequest::new(Method::POST, "/api?~method=plus")
            .body("a=1")
            .header("Authorization", "SLIM-AUTH Key=ak, Sign=s, Timestamp=1");
        let state = verify(req, &resolver);
        assert_eq!(state.error.unwrap().to_string(), "missing Content-Type");
    }

    #[test]
    fn test_post_with_unsupported_content_type() {
        let resolver =
            SlimAuthNameResolver::new(finder("ak", "sk")).time_checker(no_time_checker());
        let req = HttpRequest::new(Method::POST, "/api?~method=plus")
            .header("Content-Type", "text/xml")
            .body("<a/>")
            .header("Authorization", "SLIM-AUTH Key=ak, Sign=s, Timestamp=1");
        let state = verify(req, &resolver);
        assert_eq!(state.error.unwrap().to_string(), "unsupported Content-Type");
    }
}
