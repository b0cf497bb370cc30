//! A minimal `multipart/form-data` reader for the SlimAPI decoder.
//!
//! Parses a buffered body into text fields and [`FilePart`]s. Only what the
//! protocol needs is implemented: `name`/`filename` from the
//! `Content-Disposition` header, the part's `Content-Type`, and the raw
//! content bytes. Nested multipart and transfer encodings are out of scope.

use serde_json::Value;

/// Parse failure for a multipart body.
#[derive(Debug, thiserror::Error)]
#[error("multipart: {0}")]
pub struct MultipartError(String);

impl MultipartError {
    fn new(msg: impl Into<String>) -> Self {
        MultipartError(msg.into())
    }
}

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    /// Present only for file parts.
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// An uploaded file, exposed to operations through the request state.
///
/// A part whose `Content-Type` is `application/json` has its content parsed
/// eagerly; [`FilePart::json_value`] then yields the same value a JSON body
/// would, so such a part converts to the same target types.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub filename: String,
    pub content_type: String,
    content: Vec<u8>,
    json_value: Option<Value>,
}

impl FilePart {
    /// Wrap a parsed part. Fails when a JSON-typed part holds invalid JSON.
    pub fn new(part: &Part) -> Result<Self, MultipartError> {
        let content_type = part.content_type.clone().unwrap_or_default();
        let is_json = content_type == crate::CONTENT_TYPE_JSON;

        let json_value = if is_json {
            let v: Value = serde_json::from_slice(&part.data).map_err(|e| {
                MultipartError::new(format!(
                    "unmarshal JSON part '{}': {e}",
                    part.filename.as_deref().unwrap_or("")
                ))
            })?;
            Some(v)
        } else {
            None
        };

        Ok(FilePart {
            filename: part.filename.clone().unwrap_or_default(),
            content_type,
            content: part.data.clone(),
            json_value,
        })
    }

    /// The raw content bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.content
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Whether this part carried `Content-Type: application/json`.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.json_value.is_some()
    }

    /// The parsed JSON content of a JSON-typed part.
    #[must_use]
    pub fn json_value(&self) -> Option<&Value> {
        self.json_value.as_ref()
    }

    /// A JSON description of the part for parameter maps and log records:
    /// `{"$FileName":…,"ContentType":…,"Size":…}`, plus `"Data"` for a
    /// JSON-typed part. `$FileName` starts with `$` so it cannot collide
    /// with an ordinary parameter name.
    #[must_use]
    pub fn description(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("$FileName".to_string(), Value::String(self.filename.clone()));
        map.insert(
            "ContentType".to_string(),
            Value::String(self.content_type.clone()),
        );
        map.insert("Size".to_string(), Value::from(self.content.len()));
        if let Some(v) = &self.json_value {
            map.insert("Data".to_string(), v.clone());
        }
        Value::Object(map)
    }
}

/// Extract the `boundary` parameter from a `multipart/form-data` content
/// type value.
pub fn boundary_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        Some(value.trim().trim_matches('"'))
    })
}

/// Parse a buffered `multipart/form-data` body into its parts.
pub fn parse_multipart(content_type: &str, body: &[u8]) -> Result<Vec<Part>, MultipartError> {
    let boundary = boundary_from_content_type(content_type)
        .ok_or_else(|| MultipartError::new("missing boundary parameter"))?;

    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut rest = body;

    // Skip the preamble up to the first delimiter.
    let Some(idx) = find(rest, delimiter.as_bytes()) else {
        return Err(MultipartError::new("first boundary not found"));
    };
    rest = &rest[idx + delimiter.len()..];

    loop {
        // After a delimiter comes either "--" (closing) or CRLF + a part.
        if rest.starts_with(b"--") {
            return Ok(parts);
        }
        rest = strip_crlf(rest);

        let Some(header_end) = find(rest, b"\r\n\r\n") else {
            return Err(MultipartError::new("part headers not terminated"));
        };
        let header_block = &rest[..header_end];
        rest = &rest[header_end + 4..];

        let Some(data_end) = find(rest, delimiter.as_bytes()) else {
            return Err(MultipartError::new("closing boundary not found"));
        };
        // The CRLF right before the delimiter belongs to the framing.
        let data = strip_trailing_crlf(&rest[..data_end]);
        rest = &rest[data_end + delimiter.len()..];

        let part = parse_part(header_block, data)?;
        parts.push(part);
    }
}

fn parse_part(header_block: &[u8], data: &[u8]) -> Result<Part, MultipartError> {
    let headers = std::str::from_utf8(header_block)
        .map_err(|_| MultipartError::new("part headers are not valid UTF-8"))?;

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in headers.split("\r\n") {
        let Some((header, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        if header.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                let Some((key, raw)) = param.trim().split_once('=') else {
                    continue;
                };
                let unquoted = raw.trim().trim_matches('"').to_string();
                match key.trim() {
                    "name" => name = Some(unquoted),
                    "filename" => filename = Some(unquoted),
                    _ => {}
                }
            }
        } else if header.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_string());
        }
    }

    let name = name.ok_or_else(|| MultipartError::new("part without a field name"))?;
    Ok(Part {
        name,
        filename,
        content_type,
        data: data.to_vec(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn strip_crlf(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\r\n").unwrap_or(data)
}

fn strip_trailing_crlf(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n").unwrap_or(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "X-BOUNDARY";

    fn build_body(parts: &[(&str, Option<&str>, Option<&str>, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, content_type, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let mut disp = format!("Content-Disposition: form-data; name=\"{name}\"");
            if let Some(f) = filename {
                disp.push_str(&format!("; filename=\"{f}\""));
            }
            body.extend_from_slice(disp.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(ct) = content_type {
                body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(data.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    #[test]
    fn test_boundary_extraction() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=abc"),
            Some("abc")
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=\"a b\""),
            Some("a b")
        );
        assert_eq!(boundary_from_content_type("multipart/form-data"), None);
    }

    #[test]
    fn test_parse_text_and_file_parts() {
        let body = build_body(&[
            ("a", None, None, "1"),
            ("up", Some("x.bin"), Some("application/octet-stream"), "DATA"),
        ]);
        let parts = parse_multipart(&content_type(), &body).unwrap();
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].name, "a");
        assert!(parts[0].filename.is_none());
        assert_eq!(parts[0].data, b"1");

        assert_eq!(parts[1].name, "up");
        assert_eq!(parts[1].filename.as_deref(), Some("x.bin"));
        assert_eq!(parts[1].data, b"DATA");
    }

    #[test]
    fn test_json_file_part() {
        let body = build_body(&[(
            "doc",
            Some("doc.json"),
            Some("application/json"),
            r#"{"K": 5}"#,
        )]);
        let parts = parse_multipart(&content_type(), &body).unwrap();
        let file = FilePart::new(&parts[0]).unwrap();
        assert!(file.is_json());
        assert_eq!(file.json_value().unwrap()["K"], 5);

        let desc = file.description();
        assert_eq!(desc["$FileName"], "doc.json");
        assert_eq!(desc["Size"], 8);
        assert_eq!(desc["Data"]["K"], 5);
    }

    #[test]
    fn test_invalid_json_part_fails() {
        let body = build_body(&[("doc", Some("d.json"), Some("application/json"), "{oops")]);
        let parts = parse_multipart(&content_type(), &body).unwrap();
        assert!(FilePart::new(&parts[0]).is_err());
    }

    #[test]
    fn test_missing_boundary_fails() {
        let err = parse_multipart("multipart/form-data", b"x").unwrap_err();
        assert!(err.to_string().contains("boundary"));
    }

    #[test]
    fn test_binary_safe_content() {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"bin\"; filename=\"b\"\r\n\r\n");
        body.extend_from_slice(&[0u8, 1, 2, 255, 254]);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let parts = parse_multipart(&content_type(), &body).unwrap();
        assert_eq!(parts[0].data, vec![0u8, 1, 2, 255, 254]);
    }
}
