//! Building the parameter map and binding it to the operation's argument.
//!
//! All formats merge into one case-insensitive map:
//!
//! 1. URL query parameters are always read (names case-folded).
//! 2. A form body overlays them; values for a name present in both are
//!    joined with `,`, query first.
//! 3. A JSON body overlays them; JSON keys *replace* same-named query
//!    values instead of concatenating.
//!
//! Decoding never partially applies arguments: the map is built completely,
//! then converted into the declared argument in one step.

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::handler::ApiDecoder;
use crate::querystring::parse_query_string;
use crate::state::ApiState;

use super::multipart::{parse_multipart, FilePart};
use super::RequestFormat;

/// The SlimAPI argument decoder.
pub struct SlimApiDecoder;

impl ApiDecoder for SlimApiDecoder {
    fn decode(&self, state: &mut ApiState) {
        let params = match build_param_map(state) {
            Ok(params) => params,
            Err(e) => {
                state.error = Some(e);
                return;
            }
        };

        let Some(method) = state.method.as_ref().map(std::sync::Arc::clone) else {
            std::panic::panic_any(ApiError::internal("no method resolved before decoding"));
        };

        match method.bind(state, Some(Value::Object(params))) {
            Ok(prepared) => state.prepared = Some(prepared),
            Err(e) => state.error = Some(e),
        }
    }
}

fn build_param_map(state: &mut ApiState) -> Result<Map<String, Value>, ApiError> {
    let Some(format) = state.format else {
        std::panic::panic_any(ApiError::internal("missing request format"));
    };

    match format {
        RequestFormat::Get => Ok(query_in_lowercase(state)),
        RequestFormat::Post => {
            let is_multipart = state
                .request
                .content_type()
                .is_some_and(|ct| ct == crate::CONTENT_TYPE_MULTIPART_FORM);
            if is_multipart {
                read_multipart_form(state)
            } else {
                Ok(read_form(state))
            }
        }
        RequestFormat::Json => read_json_body(state),
    }
}

/// The query parameters as a map; names are already lower-cased by the
/// query-string parser.
fn query_in_lowercase(state: &ApiState) -> Map<String, Value> {
    state
        .query
        .named
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

fn concat_param(params: &mut Map<String, Value>, name: String, value: String) {
    match params.get_mut(&name) {
        Some(Value::String(old)) => {
            old.push(',');
            old.push_str(&value);
        }
        _ => {
            params.insert(name, Value::String(value));
        }
    }
}

/// A non-multipart POST body is read as a query string and merged over the
/// URL parameters with the `,`-concatenation rule.
fn read_form(state: &mut ApiState) -> Map<String, Value> {
    let body = String::from_utf8_lossy(&state.request.body).into_owned();

    let mut params = query_in_lowercase(state);
    let form = parse_query_string(&body);
    for (name, value) in form.named {
        concat_param(&mut params, name, value);
    }

    state.buffered_body = Some(body);
    params
}

fn read_multipart_form(state: &mut ApiState) -> Result<Map<String, Value>, ApiError> {
    let content_type = state
        .request
        .get_header("content-type")
        .unwrap_or_default()
        .to_string();

    let parts = parse_multipart(&content_type, &state.request.body)
        .map_err(|e| ApiError::bad_request_caused(e, "bad request"))?;

    let mut params = query_in_lowercase(state);
    let mut body_desc = String::new();

    for part in &parts {
        let name = part.name.to_lowercase();

        if part.filename.is_none() {
            // A text field; merge like a form parameter.
            let value = String::from_utf8_lossy(&part.data).into_owned();
            concat_param(&mut params, name.clone(), value.clone());

            if !body_desc.is_empty() {
                body_desc.push('&');
            }
            body_desc.push_str(&name);
            body_desc.push('=');
            body_desc.push_str(&urlencoding::encode(&value));
            continue;
        }

        // A file field; the last occurrence of a name wins.
        let file =
            FilePart::new(part).map_err(|e| ApiError::bad_request_caused(e, "bad request"))?;

        // A JSON part contributes its parsed value so it converts like a
        // JSON body would; other parts contribute their description.
        let param_value = match file.json_value() {
            Some(v) => v.clone(),
            None => file.description(),
        };
        params.insert(name.clone(), param_value);
        state.files.insert(name, file);
    }

    state.buffered_body = Some(body_desc);
    Ok(params)
}

/// A JSON body must be an object; its top-level keys replace same-named
/// query parameters. The JSON spelling of a key is kept: the lower-cased
/// entry is removed first, then the original key inserted.
fn read_json_body(state: &mut ApiState) -> Result<Map<String, Value>, ApiError> {
    let from_body: Map<String, Value> = serde_json::from_slice(&state.request.body)
        .map_err(|e| ApiError::bad_request_caused(e, "bad request"))?;

    state.buffered_body = Some(String::from_utf8_lossy(&state.request.body).into_owned());

    let mut params = query_in_lowercase(state);
    for (key, value) in from_body {
        params.remove(&key.to_lowercase());
        params.insert(key, value);
    }
    Ok(params)
}
