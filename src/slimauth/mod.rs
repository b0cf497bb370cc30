//! SlimAuth: the HMAC signing extension layered on the SlimAPI protocol.
//!
//! Callers identify themselves with an access key and sign each request
//! with the paired secret:
//!
//! ```text
//! Authorization: SLIM-AUTH Key=my-key, Sign=<hex>, Timestamp=1661843240, Version=1
//! ```
//!
//! The server rebuilds the canonical string from the request and compares
//! HMAC-SHA256 digests before the operation name is even resolved. All
//! verification failures answer HTTP 200 with envelope code 400 and a
//! distinct message; clients treat any nonzero `Code` as failure.

mod invoker;
mod logger;
mod resolver;
mod sign;
mod timestamp;

pub use invoker::{SlimAuthInvoker, SlimAuthInvokerOptions};
pub use logger::{new_slim_auth_logger, AuthorizationLogSetup};
pub use resolver::SlimAuthNameResolver;
pub use sign::{append_sign, canonical_string, hmac_sha256, sign, SignFailure};
pub use timestamp::{default_time_checker, max_deviation_time_checker, no_time_checker, TimeChecker};

use crate::handler::{ApiHandler, BasicApiMethodCaller, BasicApiResponseBuilder};
use crate::host::BasicApiUserHostResolver;
use crate::registry::ApiMethodRegister;
use crate::slimapi::{SlimApiDecoder, SlimApiResponseWriter};
use crate::state::HttpRequest;

/// The default signature algorithm version, assumed when the header omits
/// the `Version` field.
pub const DEFAULT_SIGN_VERSION: i32 = 1;

/// The default `<scheme>` part of the `Authorization` header.
pub const DEFAULT_AUTH_SCHEME: &str = "SLIM-AUTH";

/// The query parameter that may carry the authorization data when setting
/// headers is impractical. The header wins when both are present.
pub const AUTH_QUERY_PARAM: &str = "~auth";

/// The contents of a SlimAuth `Authorization` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorization {
    /// The `<scheme>` part in front of the key/value pairs.
    pub scheme: String,
    /// The caller's access key.
    pub key: String,
    /// The hex HMAC-SHA256 signature.
    pub sign: String,
    /// UNIX timestamp (seconds) at signing time.
    pub timestamp: i64,
    /// Algorithm version; [`DEFAULT_SIGN_VERSION`] when omitted.
    pub version: i32,
}

/// Render the `Authorization` header value.
///
/// A zero `version` omits the `Version` field; an empty `scheme` falls back
/// to [`DEFAULT_AUTH_SCHEME`].
#[must_use]
pub fn build_authorization_header(auth: &Authorization) -> String {
    let scheme = if auth.scheme.is_empty() {
        DEFAULT_AUTH_SCHEME
    } else {
        &auth.scheme
    };

    let mut header = format!(
        "{scheme} Key={}, Sign={}, Timestamp={}",
        auth.key, auth.sign, auth.timestamp
    );
    if auth.version != 0 {
        header.push_str(&format!(", Version={}", auth.version));
    }
    header
}

/// Failure to extract an [`Authorization`] from a request.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct AuthParseError(String);

/// Parse the authorization data from the `Authorization` header, falling
/// back to the [`AUTH_QUERY_PARAM`] query parameter.
///
/// Key/value pairs are comma-separated and order-independent; whitespace
/// around pairs is ignored. `expected_scheme` defaults to
/// [`DEFAULT_AUTH_SCHEME`] when empty.
pub fn parse_authorization(
    request: &HttpRequest,
    expected_scheme: &str,
) -> Result<Authorization, AuthParseError> {
    let from_query;
    let header = match request.get_header("authorization") {
        Some(h) => h,
        None => {
            from_query = crate::querystring::parse_query_string(&request.raw_query)
                .get(AUTH_QUERY_PARAM)
                .map(str::to_string);
            match &from_query {
                Some(v) => v.as_str(),
                None => return Err(AuthParseError("missing the Authorization header".into())),
            }
        }
    };

    parse_authorization_value(header, expected_scheme)
}

fn parse_authorization_value(
    header: &str,
    expected_scheme: &str,
) -> Result<Authorization, AuthParseError> {
    let Some(idx) = header.find(' ') else {
        return Err(AuthParseError("Authorization scheme error".into()));
    };
    if idx == 0 {
        return Err(AuthParseError("Authorization scheme error".into()));
    }

    let scheme = &header[..idx];
    let expected = if expected_scheme.is_empty() {
        DEFAULT_AUTH_SCHEME
    } else {
        expected_scheme
    };
    if scheme != expected {
        return Err(AuthParseError("Authorization scheme error".into()));
    }

    let mut auth = Authorization {
        scheme: scheme.to_string(),
        ..Authorization::default()
    };

    let mut has_version = false;
    for part in header[idx + 1..].split(',') {
        let part = part.trim();
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };

        match key {
            "Key" => auth.key = value.to_string(),
            "Sign" => auth.sign = value.to_string(),
            "Version" => {
                auth.version = value.parse().map_err(|e| {
                    AuthParseError(format!("Authorization version error: {e}"))
                })?;
                has_version = true;
            }
            "Timestamp" => {
                auth.timestamp = value.parse().map_err(|e| {
                    AuthParseError(format!("Authorization timestamp error: {e}"))
                })?;
            }
            _ => {}
        }
    }

    if !has_version {
        auth.version = DEFAULT_SIGN_VERSION;
    }

    Ok(auth)
}

/// Yields the secret bound to an access key; `None` when the key is
/// unknown. Implementations must be safe for concurrent use.
pub trait SecretFinder: Send + Sync {
    fn get_secret(&self, access_key: &str) -> Option<String>;
}

impl<F> SecretFinder for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn get_secret(&self, access_key: &str) -> Option<String> {
        self(access_key)
    }
}

/// Assemble the SlimAuth pipeline: the SlimAPI stages with the signature
/// verifier gate in front of the name resolver and the authorization-aware
/// logger.
#[must_use]
pub fn new_slim_auth_handler(
    name: impl Into<String>,
    registry: impl ApiMethodRegister + 'static,
    finder: impl SecretFinder + 'static,
) -> ApiHandler {
    ApiHandler::builder(name)
        .registry(registry)
        .name_resolver(SlimAuthNameResolver::new(finder))
        .user_host_resolver(BasicApiUserHostResolver)
        .decoder(SlimApiDecoder)
        .method_caller(BasicApiMethodCaller)
        .response_builder(BasicApiResponseBuilder)
        .response_writer(SlimApiResponseWriter)
        .logger(new_slim_auth_logger())
        .build()
}
