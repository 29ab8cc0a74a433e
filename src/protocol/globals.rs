//! Injected globals sent with every script execution.

use serde::Serialize;
use serde_json::{Map, Value};

// ============================================================================
// InjectedGlobals
// ============================================================================

/// Insertion-ordered map from global name to its JSON-serialized value.
///
/// Values are stored as strings: the script host parses each one before
/// assigning it onto the global object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InjectedGlobals(Map<String, Value>);

impl InjectedGlobals {
    /// Creates an empty set of globals.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to the compact JSON text of `value`.
    ///
    /// Setting an existing name replaces its value in place.
    pub fn set(&mut self, name: impl Into<String>, value: &Value) {
        self.0.insert(name.into(), Value::String(value.to_string()));
    }

    /// Returns the serialized value for `name`.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Returns the number of globals.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no globals are set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

// ============================================================================
// Tests
// ============================================================================
