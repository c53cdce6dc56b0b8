// crates/ontos-core/src/core/scope.rs
// ============================================================================
// Module: Ontos Scope Model
// Description: Scope sets, wildcard matching, and per-tool scope requirements.
// Purpose: Decide whether a caller's granted scopes cover a required scope.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A scope is an opaque string such as `projects:read`. Matching is pure and
//! byte-exact: a required scope is satisfied by the global wildcard `*`, by an
//! exact grant, or by a namespace wildcard `prefix:*` where `prefix` is the
//! text before the first `:` of the required scope. Nothing else matches; in
//! particular `projects:*` does not cover a bare `projects`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Scope that grants every permission.
pub const GLOBAL_SCOPE: &str = "*";

/// Separator between a scope namespace and its action.
const SCOPE_SEPARATOR: char = ':';

/// Suffix that turns a namespace into a namespace wildcard.
const NAMESPACE_WILDCARD_SUFFIX: &str = ":*";

// ============================================================================
// SECTION: Scope Sets
// ============================================================================

/// Ordered, de-duplicated set of granted scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Creates an empty scope set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Adds a scope, returning `true` when it was not already present.
    pub fn insert(&mut self, scope: impl Into<String>) -> bool {
        self.0.insert(scope.into())
    }

    /// Returns true when the exact scope string is granted.
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Returns true when no scopes are granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of granted scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates scopes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the scopes as an owned, sorted list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Returns true when `granted` covers `required`.
///
/// Rules are applied in order: the global wildcard, an exact match, then the
/// namespace wildcard derived from the text before the first `:`.
#[must_use]
pub fn satisfies(granted: &ScopeSet, required: &str) -> bool {
    if granted.contains(GLOBAL_SCOPE) || granted.contains(required) {
        return true;
    }
    match required.split_once(SCOPE_SEPARATOR) {
        Some((namespace, _)) => {
            let wildcard = format!("{namespace}{NAMESPACE_WILDCARD_SUFFIX}");
            granted.contains(&wildcard)
        }
        None => false,
    }
}

// ============================================================================
// SECTION: Required Scopes
// ============================================================================

/// Scope a tool demands before it may execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequiredScope {
    /// Only callers holding the global wildcard may execute.
    #[default]
    Wildcard,
    /// Any authenticated caller may execute.
    Open,
    /// Callers must satisfy the named scope.
    Scope(String),
}

impl RequiredScope {
    /// Builds a named scope requirement.
    #[must_use]
    pub fn named(scope: impl Into<String>) -> Self {
        Self::Scope(scope.into())
    }

    /// Returns true when the granted scopes meet this requirement.
    #[must_use]
    pub fn is_satisfied_by(&self, granted: &ScopeSet) -> bool {
        match self {
            Self::Open => true,
            Self::Wildcard => satisfies(granted, GLOBAL_SCOPE),
            Self::Scope(scope) => satisfies(granted, scope),
        }
    }

    /// Returns the label reported to callers when the requirement is unmet.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Wildcard => GLOBAL_SCOPE,
            Self::Scope(scope) => scope,
        }
    }
}

impl fmt::Display for RequiredScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
