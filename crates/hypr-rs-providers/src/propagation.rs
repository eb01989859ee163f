//! Propagation bindings: which provider may forward to which.
//!
//! A provider registered with propagation gets an extra rule capturing the
//! rest of the path. A [`PropagationBinding`] says that the rest may be handed
//! to another endpoint, optionally only below a sub-path and only for some
//! methods.

use std::collections::{BTreeSet, HashMap};

/// Permission for `source` to forward requests to `target`.
///
/// # Examples
///
/// ```
/// use hypr_rs_providers::propagation::PropagationBinding;
///
/// let binding = PropagationBinding::new("users", "posts", "/posts/")
///     .with_methods(&["get"]);
/// assert!(binding.covers("/posts/3"));
/// assert!(!binding.covers("/postscript"));
/// assert!(binding.allows("GET"));
/// assert!(!binding.allows("DELETE"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationBinding {
    source: String,
    target: String,
    sub_path: String,
    methods: Option<BTreeSet<String>>,
}

impl PropagationBinding {
    /// Creates a binding for every method. An empty `sub_path` accepts any
    /// forwarded path.
    pub fn new(source: impl Into<String>, target: impl Into<String>, sub_path: &str) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            sub_path: sub_path.trim_matches('/').to_string(),
            methods: None,
        }
    }

    /// Restricts the binding to some methods.
    #[must_use]
    pub fn with_methods(mut self, methods: &[&str]) -> Self {
        self.methods = Some(methods.iter().map(|m| m.to_ascii_uppercase()).collect());
        self
    }

    /// Returns the forwarding endpoint.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the endpoint requests are forwarded to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the sub-path without surrounding slashes.
    pub fn sub_path(&self) -> &str {
        &self.sub_path
    }

    /// Returns the allowed methods, `None` meaning any.
    pub const fn methods(&self) -> Option<&BTreeSet<String>> {
        self.methods.as_ref()
    }

    /// Returns `true` if the binding lets `method` through.
    pub fn allows(&self, method: &str) -> bool {
        self.methods
            .as_ref()
            .map_or(true, |m| m.iter().any(|x| x.eq_ignore_ascii_case(method)))
    }

    /// Returns `true` if the sub-path is a segment prefix of `next_path`.
    pub fn covers(&self, next_path: &str) -> bool {
        if self.sub_path.is_empty() {
            return true;
        }
        let next = next_path.trim_start_matches('/');
        next.strip_prefix(self.sub_path.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// Bindings grouped by source endpoint, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct PropagationTable {
    bindings: HashMap<String, Vec<PropagationBinding>>,
}

impl PropagationTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding.
    pub fn add(&mut self, binding: PropagationBinding) {
        self.bindings
            .entry(binding.source.clone())
            .or_default()
            .push(binding);
    }

    /// Returns the bindings declared for `source`.
    pub fn bindings_for(&self, source: &str) -> &[PropagationBinding] {
        self.bindings.get(source).map_or(&[], Vec::as_slice)
    }

    /// Iterates over every binding.
    pub fn iter(&self) -> impl Iterator<Item = &PropagationBinding> {
        self.bindings.values().flatten()
    }

    /// Finds the first binding from `source` to `target` covering `next_path`.
    pub fn find(&self, source: &str, target: &str, next_path: &str) -> Option<&PropagationBinding> {
        self.bindings_for(source)
            .iter()
            .find(|b| b.target == target && b.covers(next_path))
    }

    /// Returns `true` if no binding was declared.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
