//! A small path matcher for mounting a handler.
//!
//! Patterns are `/`-separated; a `{name}` segment captures the path
//! segment under that name, everything else must match literally. Captured
//! parameters become the request's route parameters, which is how the
//! `{~method}` style of operation addressing works:
//!
//! ```text
//! /api/{~method}        matches /api/plus   with ~method=plus
//! ```

use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    segments: Vec<Segment>,
}

impl RoutePattern {
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s.len() > 2 && s.starts_with('{') && s.ends_with('}') {
                    Segment::Param(s[1..s.len() - 1].to_string())
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();
        RoutePattern { segments }
    }

    /// Match a request path; on success, yields the captured parameters.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        let route = RoutePattern::new("/api");
        assert!(route.matches("/api").is_some());
        assert!(route.matches("/api/").is_some());
        assert!(route.matches("/other").is_none());
        assert!(route.matches("/api/deeper").is_none());
    }

    #[test]
    fn test_param_capture() {
        let route = RoutePattern::new("/api/{~method}");
        let params = route.matches("/api/plus").unwrap();
        assert_eq!(params.get("~method").map(String::as_str), Some("plus"));
        assert!(route.matches("/api").is_none());
    }

    #[test]
    fn test_multiple_params() {
        let route = RoutePattern::new("/api/{~method}/{~format}");
        let params = route.matches("/api/plus/json").unwrap();
        assert_eq!(params.get("~format").map(String::as_str), Some("json"));
    }

    #[test]
    fn test_root_pattern() {
        let route = RoutePattern::new("/");
        assert!(route.matches("/").is_some());
        assert!(route.matches("/x").is_none());
    }
}
