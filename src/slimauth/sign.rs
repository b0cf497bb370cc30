//! The canonical request string and its HMAC-SHA256 signature.
//!
//! The canonical string is newline-joined with no trailing blank line:
//!
//! ```text
//! TIMESTAMP
//! METHOD
//! PATH              ("/" when the request has no path)
//! QUERY_CANON
//! BODY_CANON        (omitted entirely, newline included, for GET)
//! END
//! ```
//!
//! `QUERY_CANON` (and the form-encoded `BODY_CANON`) takes the raw
//! parameter names, stable-sorts them by byte value - not locale order, so
//! uppercase ASCII sorts before lowercase - and concatenates the *decoded*
//! values in that order with no separator. A parameter without a value
//! (`?a` or `?a=`) contributes its name instead. A JSON `BODY_CANON` is the
//! raw body bytes, unmodified, embedded newlines included.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::state::HttpRequest;

type HmacSha256 = Hmac<Sha256>;

/// Why a signature could not be computed. Each case maps to a distinct
/// caller-visible message on the verifying side.
#[derive(Debug, thiserror::Error)]
pub enum SignFailure {
    #[error("missing Content-Type")]
    MissingContentType,
    #[error("unsupported Content-Type: {0}")]
    UnsupportedContentType(String),
    #[error("invalid request body: {0}")]
    InvalidRequestBody(String),
}

/// Compute HMAC-SHA256 over `data`, keyed by the UTF-8 bytes of the
/// secret, as lowercase hex.
#[must_use]
pub fn hmac_sha256(secret: &[u8], data: &[u8]) -> String {
    #[allow(clippy::expect_used)]
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(data);
    to_lower_hex(&mac.finalize().into_bytes())
}

fn to_lower_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Sign a buffered request: builds the canonical string and keys it with
/// `secret`.
pub fn sign(request: &HttpRequest, secret: &str, timestamp: i64) -> Result<String, SignFailure> {
    let data = canonical_string(request, timestamp)?;
    Ok(hmac_sha256(secret.as_bytes(), data.as_bytes()))
}

/// Build the canonical string for a request.
pub fn canonical_string(request: &HttpRequest, timestamp: i64) -> Result<String, SignFailure> {
    let mut buf = String::new();

    // TIMESTAMP
    buf.push_str(&timestamp.to_string());
    buf.push('\n');

    // METHOD
    buf.push_str(request.method.as_str());
    buf.push('\n');

    // PATH
    if request.path.is_empty() {
        buf.push('/');
    } else {
        buf.push_str(&request.path);
    }
    buf.push('\n');

    // QUERY. The fallback authorization parameter is not part of the
    // signed data: it carries the signature itself.
    append_query_canon_filtered(&mut buf, &request.raw_query, Some(super::AUTH_QUERY_PARAM))?;
    buf.push('\n');

    // BODY - only methods that carry one.
    let method = request.method.as_str();
    if method == "POST" || method == "PUT" || method == "PATCH" {
        let Some(content_type) = request.content_type() else {
            return Err(SignFailure::MissingContentType);
        };

        match content_type {
            crate::CONTENT_TYPE_FORM => {
                let body = std::str::from_utf8(&request.body)
                    .map_err(|e| SignFailure::InvalidRequestBody(e.to_string()))?;
                validate_escapes(body)?;
                append_query_canon(&mut buf, body)?;
                buf.push('\n');
            }
            crate::CONTENT_TYPE_JSON => {
                let body = std::str::from_utf8(&request.body)
                    .map_err(|e| SignFailure::InvalidRequestBody(e.to_string()))?;
                buf.push_str(body);
                buf.push('\n');
            }
            other => return Err(SignFailure::UnsupportedContentType(other.to_string())),
        }
    }

    // END
    buf.push_str("END");
    Ok(buf)
}

/// Canonicalize one query-shaped string into `buf` (without the trailing
/// newline).
fn append_query_canon(buf: &mut String, raw: &str) -> Result<(), SignFailure> {
    append_query_canon_filtered(buf, raw, None)
}

fn append_query_canon_filtered(
    buf: &mut String,
    raw: &str,
    skip_name: Option<&str>,
) -> Result<(), SignFailure> {
    // Decoded (name, value) pairs in wire order. Byte-sorting the names with
    // a stable sort keeps the relative order of duplicates.
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .filter(|(k, _)| skip_name != Some(k.as_str()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, value) in &pairs {
        if value.is_empty() {
            buf.push_str(name);
        } else {
            buf.push_str(value);
        }
    }
    Ok(())
}

/// Reject malformed percent-escapes, which the lenient pair parser above
/// would otherwise pass through silently.
fn validate_escapes(body: &str) -> Result<(), SignFailure> {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len()
                || !bytes[i + 1].is_ascii_hexdigit()
                || !bytes[i + 2].is_ascii_hexdigit()
            {
                return Err(SignFailure::InvalidRequestBody(format!(
                    "invalid URL escape at offset {i}"
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Client-side signing: compute the signature for an outgoing request and
/// set its `Authorization` header.
pub fn append_sign(
    request: &mut reqwest::blocking::Request,
    access_key: &str,
    secret: &str,
    auth_scheme: &str,
    timestamp: i64,
) -> Result<String, SignFailure> {
    let url = request.url();
    let uri = match url.query() {
        Some(q) => format!("{}?{q}", url.path()),
        None => url.path().to_string(),
    };

    let mut buffered = HttpRequest::new(request.method().clone(), &uri);
    if let Some(ct) = request.headers().get(reqwest::header::CONTENT_TYPE) {
        buffered = buffered.header("content-type", ct.to_str().unwrap_or("").to_string());
    }
    if let Some(body) = request.body().and_then(reqwest::blocking::Body::as_bytes) {
        buffered = buffered.body(body.to_vec());
    }

    let signature = sign(&buffered, secret, timestamp)?;

    let header = super::build_authorization_header(&super::Authorization {
        scheme: auth_scheme.to_string(),
        key: access_key.to_string(),
        sign: signature.clone(),
        timestamp,
        version: super::DEFAULT_SIGN_VERSION,
    });
    if let Ok(value) = header.parse() {
        request
            .headers_mut()
            .insert(reqwest::header::AUTHORIZATION, value);
    }

    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_query_canon_byte_sorted_and_stable() {
        // Raw query from the protocol's reference vector. UTF-8 byte order
        // puts the uppercase X before the lowercase names, and duplicates
        // keep their wire order.
        let mut buf = String::new();
        append_query_canon(&mut buf, "a&c=3&b=2&z=4&X=%E4%B8%AD%E6%96%87&a=1&b=").unwrap();
        assert_eq!(buf, "中文a12b34");
    }

    #[test]
    fn test_canonical_string_get() {
        let req = HttpRequest::new(Method::GET, "/the/path?b=2&a=1");
        let canon = canonical_string(&req, 123).unwrap();
        assert_eq!(canon, "123\nGET\n/the/path\n12\nEND");
    }

    #[test]
    fn test_canonical_string_empty_query() {
        let req = HttpRequest::new(Method::GET, "/");
        let canon = canonical_string(&req, 5).unwrap();
        assert_eq!(canon, "5\nGET\n/\n\nEND");
    }

    #[test]
    fn test_canonical_string_form_body() {
        let req = HttpRequest::new(Method::POST, "/p?q=0")
            .header("Content-Type", crate::CONTENT_TYPE_FORM)
            .body("b=2&a=1");
        let canon = canonical_string(&req, 9).unwrap();
        assert_eq!(canon, "9\nPOST\n/p\n0\n12\nEND");
    }

    #[test]
    fn test_canonical_string_json_body_kept_verbatim() {
        let body = "{\n  \"a\": 1\n}";
        let req = HttpRequest::new(Method::POST, "/p")
            .header("Content-Type", crate::CONTENT_TYPE_JSON)
            .body(body);
        let canon = canonical_string(&req, 9).unwrap();
        assert_eq!(canon, format!("9\nPOST\n/p\n\n{body}\nEND"));
    }

    #[test]
    fn test_post_requires_content_type() {
        let req = HttpRequest::new(Method::POST, "/p").body("a=1");
        assert!(matches!(
            canonical_string(&req, 1),
            Err(SignFailure::MissingContentType)
        ));
    }

    #[test]
    fn test_unsupported_content_type() {
        let req = HttpRequest::new(Method::POST, "/p")
            .header("Content-Type", "text/xml")
            .body("<a/>");
        assert!(matches!(
            canonical_string(&req, 1),
            Err(SignFailure::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn test_invalid_form_escape() {
        let req = HttpRequest::new(Method::POST, "/p")
            .header("Content-Type", crate::CONTENT_TYPE_FORM)
            .body("a=%zz");
        assert!(matches!(
            canonical_string(&req, 1),
            Err(SignFailure::InvalidRequestBody(_))
        ));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let req = HttpRequest::new(Method::GET, "/p?a=1");
        let first = sign(&req, "secret", 1661843240).unwrap();
        let second = sign(&req, "secret", 1661843240).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn test_auth_query_parameter_is_excluded_from_canon() {
        let bare = HttpRequest::new(Method::GET, "/p?a=1&b=2");
        let with_auth = HttpRequest::new(Method::GET, "/p?a=1&b=2&~auth=SLIM-AUTH%20Key%3Dk");
        assert_eq!(
            canonical_string(&bare, 3).unwrap(),
            canonical_string(&with_auth, 3).unwrap()
        );
    }

    #[test]
    fn test_hmac_reference_vector() {
        // RFC 4231 test case 2.
        let out = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            out,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
