//! Ordered parameter sets.
//!
//! Values are always strings; each command parses richer types itself.
//! Keys are case-sensitive and unique. Every value remembers where it came
//! from so serialization can leave programmatic defaults out of script text.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Where a parameter value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Parsed from persisted script text.
    Persistent,
    /// Filled in programmatically as a default; not written back to script text.
    Default,
    /// Origin not tracked (set through the API).
    Unknown,
}

/// A single parameter value with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// String value as written.
    pub value: String,
    /// Where the value came from.
    pub provenance: Provenance,
}

/// Ordered mapping of parameter name to string value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    entries: IndexMap<String, Parameter>,
}

impl ParameterSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value with `Unknown` provenance, replacing any previous value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set_with_provenance(name, value, Provenance::Unknown);
    }

    /// Set a programmatic default.
    pub fn set_default(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set_with_provenance(name, value, Provenance::Default);
    }

    /// Set a value with an explicit provenance.
    pub fn set_with_provenance(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        provenance: Provenance,
    ) {
        self.entries.insert(
            name.into(),
            Parameter {
                value: value.into(),
                provenance,
            },
        );
    }

    /// Builder-style `set`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Value for a name, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|p| p.value.as_str())
    }

    /// Value for a name, treating empty strings as absent.
    #[must_use]
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }

    /// Value for a name or a fallback.
    #[must_use]
    pub fn get_or<'a>(&'a self, name: &str, fallback: &'a str) -> &'a str {
        self.get_non_empty(name).unwrap_or(fallback)
    }

    /// Full entry (value and provenance).
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.entries.get(name)
    }

    /// True if the name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove a name, preserving the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        self.entries.shift_remove(name)
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(name, parameter)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names not in `recognized`, in insertion order.
    #[must_use]
    pub fn unrecognized(&self, recognized: &[&str]) -> Vec<String> {
        self.entries
            .keys()
            .filter(|name| !recognized.contains(&name.as_str()))
            .cloned()
            .collect()
    }

    /// Same names mapped to the same values, ignoring order and provenance.
    #[must_use]
    pub fn same_values(&self, other: &ParameterSet) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(name, p)| other.get(name) == Some(p.value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut set = ParameterSet::new();
        for (k, v) in iter {
            set.set(k, v);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_sensitive_and_ordered() {
        let set: ParameterSet = [("TSID", "a"), ("tsid", "b"), ("Alias", "c")]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 3);
        assert_eq!(set.get("TSID"), Some("a"));
        assert_eq!(set.get("tsid"), Some("b"));
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["TSID", "tsid", "Alias"]);
    }

    #[test]
    fn set_replaces_in_place() {
        let mut set = ParameterSet::new().with("A", "1").with("B", "2");
        set.set("A", "3");
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(set.get("A"), Some("3"));
    }

    #[test]
    fn provenance_is_tracked() {
        let mut set = ParameterSet::new();
        set.set_default("Interval", "Day");
        set.set_with_provenance("NewTSID", "x", Provenance::Persistent);
        assert_eq!(
            set.parameter("Interval").map(|p| p.provenance),
            Some(Provenance::Default)
        );
        assert_eq!(
            set.parameter("NewTSID").map(|p| p.provenance),
            Some(Provenance::Persistent)
        );
    }

    #[test]
    fn unrecognized_names_are_reported_in_order() {
        let set = ParameterSet::new()
            .with("InputFile", "a")
            .with("Bogus", "1")
            .with("Other", "2");
        assert_eq!(set.unrecognized(&["InputFile"]), vec!["Bogus", "Other"]);
    }

    #[test]
    fn same_values_ignores_order_and_provenance() {
        let a = ParameterSet::new().with("A", "1").with("B", "2");
        let mut b = ParameterSet::new();
        b.set_with_provenance("B", "2", Provenance::Persistent);
        b.set_default("A", "1");
        assert!(a.same_values(&b));
        assert!(!a.same_values(&ParameterSet::new().with("A", "1")));
    }

    #[test]
    fn empty_values_fall_back() {
        let set = ParameterSet::new().with("Timeout", "  ");
        assert_eq!(set.get_non_empty("Timeout"), None);
        assert_eq!(set.get_or("Timeout", "60"), "60");
    }
}
