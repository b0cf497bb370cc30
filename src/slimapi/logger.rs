//! The SlimAPI log pipeline.

use crate::logsetup::{ErrorLogSetup, IpLogSetup, LogSetup, LogSetupPipeline, UrlLogSetup};
use crate::state::ApiState;

/// Records the consumed request body (and its length) when one was read.
pub struct BodyLogSetup;

impl LogSetup for BodyLogSetup {
    fn setup(&self, state: &mut ApiState) {
        let Some(body) = state.buffered_body.clone() else {
            return;
        };
        if body.is_empty() {
            return;
        }
        state.log("Length", body.len().to_string());
        state.log("Body", body);
    }
}

/// Records a summary line per uploaded file: name, size and content type.
pub struct FilesLogSetup;

impl LogSetup for FilesLogSetup {
    fn setup(&self, state: &mut ApiState) {
        if state.files.is_empty() {
            return;
        }

        let mut names: Vec<&String> = state.files.keys().collect();
        names.sort();

        let mut entries = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let file = &state.files[name.as_str()];
            entries.push((
                format!("File{index}"),
                format!(
                    "{} ({} bytes, {})",
                    file.filename,
                    file.size(),
                    file.content_type
                ),
            ));
        }
        for (key, value) in entries {
            state.log(key, value);
        }
    }
}

/// The standard log pipeline for SlimAPI: IP, URL, body, files, error.
#[must_use]
pub fn new_slim_api_logger() -> LogSetupPipeline {
    LogSetupPipeline::new()
        .with(IpLogSetup)
        .with(UrlLogSetup)
        .with(BodyLogSetup)
        .with(FilesLogSetup)
        .with(ErrorLogSetup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::HttpRequest;
    use http::Method;

    #[test]
    fn test_body_setup_skips_empty() {
        let mut state = ApiState::new(HttpRequest::new(Method::GET, "/"));
        BodyLogSetup.setup(&mut state);
        assert!(state.log_fields.is_empty());

        state.buffered_body = Some("a=1".to_string());
        BodyLogSetup.setup(&mut state);
        assert!(state.log_fields.iter().any(|(k, v)| k == "Length" && v == "3"));
        assert!(state.log_fields.iter().any(|(k, v)| k == "Body" && v == "a=1"));
    }
}
