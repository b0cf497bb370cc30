//! Legacy query-string model used by the SlimAPI wire protocol.
//!
//! The protocol predates this implementation and was specified against the
//! classic ASP.NET `HttpRequest.QueryString` semantics, which differ from
//! what `url::form_urlencoded` produces: a token without `=` is a *nameless*
//! parameter (not a named parameter with an empty value), and repeated names
//! are joined with commas instead of kept as a list. [`parse_query_string`]
//! reproduces those rules.

use std::collections::HashMap;

/// A parsed query string with case-folded parameter names.
///
/// Names are stored lower-cased; lookups via [`QueryString::get`] fold the
/// probe name as well, so parameter matching is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryString {
    /// Every token that had no `=`, joined with `,` in order of appearance.
    /// `?a&b=1` yields `"a"`.
    pub nameless: String,
    /// Whether any nameless token was present. Distinguishes an empty
    /// nameless value from "no nameless token at all".
    pub has_nameless: bool,
    /// All named parameters. Repeated names are joined with `,` in
    /// first-seen order: `?a=1&a=2` yields `a=1,2`.
    pub named: HashMap<String, String>,
}

impl QueryString {
    /// Look up a named parameter, case-insensitively.
    ///
    /// Only named parameters are reachable here (the name may be the empty
    /// string); the nameless token is read from the `nameless` field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(&name.to_lowercase()).map(String::as_str)
    }

    fn append_named(&mut self, param: &str) {
        // Only the first two `=`-separated segments count; `a=1=2` keeps "1".
        let mut parts = param.split('=');
        let raw_name = parts.next().unwrap_or("");
        let raw_value = parts.next().unwrap_or("");

        let Some(name) = query_unescape(raw_name) else {
            return;
        };
        let Some(value) = query_unescape(raw_value) else {
            return;
        };

        let name = name.to_lowercase();
        match self.named.get_mut(&name) {
            Some(old) => {
                old.push(',');
                old.push_str(&value);
            }
            None => {
                self.named.insert(name, value);
            }
        }
    }

    fn append_nameless(&mut self, token: &str) {
        // A token that fails to decode is treated as absent.
        let Some(value) = query_unescape(token) else {
            return;
        };

        if self.has_nameless {
            self.nameless.push(',');
            self.nameless.push_str(&value);
        } else {
            self.nameless = value;
            self.has_nameless = true;
        }
    }
}

/// Percent-decode one query token, treating `+` as a space.
///
/// Returns `None` when the token does not decode to valid UTF-8, matching
/// the legacy behavior of dropping undecodable parameters.
fn query_unescape(token: &str) -> Option<String> {
    let spaced = token.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(v) => Some(v.into_owned()),
        Err(_) => None,
    }
}

/// Parse a query string into a [`QueryString`].
///
/// The input may start with `?` or not. A single `?` yields one empty
/// nameless token; a trailing `&` appends an extra empty nameless token.
#[must_use]
pub fn parse_query_string(query: &str) -> QueryString {
    let mut result = QueryString::default();

    if query.is_empty() {
        return result;
    }

    if query == "?" {
        result.has_nameless = true;
        return result;
    }

    let query = query.strip_prefix('?').unwrap_or(query);

    for param in query.split('&') {
        if param.contains('=') {
            result.append_named(param);
        } else {
            result.append_nameless(param);
        }
    }

    // `split` already yields a trailing empty token for "a&", which lands in
    // the nameless branch above, so no extra handling is needed here.
    result
}
