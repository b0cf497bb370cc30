//! The method registry: case-insensitive name → operation lookup.
//!
//! Registration happens once at startup (single-threaded by convention);
//! lookups run concurrently for the lifetime of the process, so the backing
//! store is a concurrent map.

use dashmap::DashMap;

use crate::method::{ApiMethod, ApiMethodRef};

/// Registry of WebAPI operations.
pub trait ApiMethodRegister: Send + Sync {
    /// Register an operation. Names are matched case-insensitively;
    /// registering a name twice replaces the earlier entry.
    ///
    /// # Panics
    ///
    /// Registering an operation with an empty name is a configuration error
    /// and panics; the process should not start with a broken registry.
    fn register(&self, method: ApiMethod);

    /// Look up an operation by name, case-insensitively.
    fn get_method(&self, name: &str) -> Option<ApiMethodRef>;
}

/// The standard registry backed by a concurrent map.
#[derive(Default)]
pub struct BasicApiMethodRegister {
    methods: DashMap<String, ApiMethodRef>,
}

impl BasicApiMethodRegister {
    #[must_use]
    pub fn new() -> Self {
        BasicApiMethodRegister {
            methods: DashMap::new(),
        }
    }
}

impl ApiMethodRegister for BasicApiMethodRegister {
    fn register(&self, method: ApiMethod) {
        assert!(
            !method.name.is_empty(),
            "cannot register an API method with an empty name"
        );
        let key = method.name.to_lowercase();
        self.methods.insert(key, ApiMethodRef::new(method));
    }

    fn get_method(&self, name: &str) -> Option<ApiMethodRef> {
        self.methods
            .get(&name.to_lowercase())
            .map(|entry| ApiMethodRef::clone(entry.value()))
    }
}

/// Apply the bulk-registration naming convention to a callable name.
///
/// The first `__` in the name is the delimiter:
///
/// - `Method__Name` registers as `Name`;
/// - `Method__` or `Method____` (nothing but underscores after the
///   delimiter) is not registered at all;
/// - a name without `__` registers verbatim.
///
/// When a valid name exists after the delimiter it is taken from the very
/// next character, underscores included: `Do____a_B` registers as `__a_B`.
#[must_use]
pub fn fix_name_or_ignore(method_name: &str) -> Option<&str> {
    const DELIMITER: &str = "__";

    let Some(idx) = method_name.find(DELIMITER) else {
        return Some(method_name);
    };

    let tail = &method_name[idx + DELIMITER.len()..];
    if tail.bytes().all(|b| b == b'_') {
        // Only underscores (or nothing) after the delimiter.
        return None;
    }
    Some(tail)
}

/// Builder that registers a group of operations under one provider label,
/// applying the naming convention to each callable name.
pub struct ApiProvider {
    name: String,
    methods: Vec<ApiMethod>,
}

impl ApiProvider {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        ApiProvider {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Add a callable under its (convention-processed) name. Callables the
    /// convention excludes are silently skipped.
    #[must_use]
    pub fn method<M, F>(mut self, callable_name: &str, f: F) -> Self
    where
        F: crate::method::ApiMethodFn<M>,
    {
        if let Some(fixed) = fix_name_or_ignore(callable_name) {
            self.methods.push(ApiMethod::new(fixed, &self.name, f));
        }
        self
    }

    /// Register every collected operation.
    pub fn register_into(self, registry: &dyn ApiMethodRegister) {
        for method in self.methods {
            registry.register(method);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct PlusArgs {
        a: i32,
        b: i32,
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = BasicApiMethodRegister::new();
        registry.register(ApiMethod::new("Plus", "demo", |a: PlusArgs| a.a + a.b));

        assert!(registry.get_method("plus").is_some());
        assert!(registry.get_method("PLUS").is_some());
        assert!(registry.get_method("minus").is_none());
        // The original spelling survives on the descriptor.
        assert_eq!(registry.get_method("plus").unwrap().name, "Plus");
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = BasicApiMethodRegister::new();
        registry.register(ApiMethod::new("Op", "first", || 1));
        registry.register(ApiMethod::new("op", "second", || 2));
        assert_eq!(registry.get_method("OP").unwrap().provider, "second");
    }

    #[test]
    #[should_panic(expected = "empty name")]
    fn test_empty_name_panics() {
        let registry = BasicApiMethodRegister::new();
        registry.register(ApiMethod::new("", "demo", || 1));
    }

    #[test]
    fn test_naming_convention() {
        assert_eq!(fix_name_or_ignore("Plus"), Some("Plus"));
        assert_eq!(fix_name_or_ignore("GetName__13"), Some("13"));
        assert_eq!(fix_name_or_ignore("Do____a_B"), Some("__a_B"));
        assert_eq!(fix_name_or_ignore("Do__"), None);
        assert_eq!(fix_name_or_ignore("Do___"), None);
        assert_eq!(fix_name_or_ignore("Do____"), None);
    }

    #[test]
    fn test_provider_applies_convention() {
        let registry = BasicApiMethodRegister::new();
        ApiProvider::new("Demo")
            .method("Plus__Add", |a: PlusArgs| a.a + a.b)
            .method("Hidden__", || 0)
            .register_into(&registry);

        let m = registry.get_method("add").unwrap();
        assert_eq!(m.provider, "Demo");
        assert!(registry.get_method("hidden").is_none());
        assert!(registry.get_method("hidden__").is_none());
    }
}
