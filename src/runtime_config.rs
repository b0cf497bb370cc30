//! Environment variable-based runtime configuration.
//!
//! Two knobs affect the transport layer:
//!
//! - `SLIMAPI_STACK_SIZE` — coroutine stack size in bytes, decimal or hex
//!   (`0x8000`). Default 0x4000 (16 KB). Total memory is
//!   `stack_size × concurrent coroutines`; raise it for handlers with deep
//!   call chains.
//! - `SLIMAPI_MAX_BODY_SIZE` — maximum accepted request body in bytes.
//!   Default 10 MiB. Bodies beyond the cap are truncated at parse time.

use std::env;

/// Default body cap: 10 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Runtime configuration loaded from environment variables.
///
/// Load this at startup using [`RuntimeConfig::from_env()`] and apply it
/// with [`RuntimeConfig::apply()`] before starting the server.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes (default: 16 KB / 0x4000)
    pub stack_size: usize,
    /// Maximum request body size in bytes (default: 10 MiB)
    pub max_body_size: usize,
}

fn parse_size(val: &str, default: usize) -> usize {
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).unwrap_or(default)
    } else {
        val.parse().unwrap_or(default)
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = env::var("SLIMAPI_STACK_SIZE")
            .map(|v| parse_size(&v, 0x4000))
            .unwrap_or(0x4000);
        let max_body_size = env::var("SLIMAPI_MAX_BODY_SIZE")
            .map(|v| parse_size(&v, DEFAULT_MAX_BODY_SIZE))
            .unwrap_or(DEFAULT_MAX_BODY_SIZE);
        RuntimeConfig {
            stack_size,
            max_body_size,
        }
    }

    /// Apply the coroutine settings to the `may` runtime.
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            stack_size: 0x4000,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_accepts_hex_and_decimal() {
        assert_eq!(parse_size("0x8000", 1), 0x8000);
        assert_eq!(parse_size("32768", 1), 32768);
        assert_eq!(parse_size("garbage", 7), 7);
    }
}
