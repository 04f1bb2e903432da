//! Processor state.
//!
//! Everything commands exchange lives here: named results, names declared
//! during discovery, user properties, the global output window, and the
//! working directory. The orchestrator shares it as [`SharedState`] so
//! observers can take read snapshots while a run is in progress.

use crate::error::{ProcessorError, Result};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use lecommande::request::SelectorMatcher;
use lecommande::{RequestError, ResultHandle, ResultKind, SelectedResults};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Built-in property holding the working directory.
pub const WORKING_DIR: &str = "WorkingDir";
/// Built-in property holding the output window start.
pub const OUTPUT_START: &str = "OutputStart";
/// Built-in property holding the output window end.
pub const OUTPUT_END: &str = "OutputEnd";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// State shared between the orchestrator, its broker, and observers.
pub type SharedState = Arc<RwLock<ProcessorState>>;

/// Processor-owned data.
#[derive(Debug, Clone, Default)]
pub struct ProcessorState {
    results: IndexMap<String, ResultHandle>,
    discovered: IndexMap<String, ResultKind>,
    properties: IndexMap<String, String>,
    output_start: Option<NaiveDateTime>,
    output_end: Option<NaiveDateTime>,
    working_dir: PathBuf,
}

impl ProcessorState {
    /// Create an empty state rooted at `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Self::default()
        }
    }

    /// Wrap into a [`SharedState`].
    #[must_use]
    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    /// Bind a result; re-binding a name replaces the previous value in place.
    pub fn bind(&mut self, name: impl Into<String>, result: ResultHandle) {
        self.results.insert(name.into(), result);
    }

    /// Result bound under `name`.
    #[must_use]
    pub fn result(&self, name: &str) -> Option<ResultHandle> {
        self.results.get(name).cloned()
    }

    /// Remove a binding.
    pub fn remove(&mut self, name: &str) -> Option<ResultHandle> {
        self.results.shift_remove(name)
    }

    /// Bound names in binding order.
    pub fn result_names(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    /// Number of bound results.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Results matching a selector, in binding order.
    #[must_use]
    pub fn select(&self, matcher: &SelectorMatcher) -> SelectedResults {
        let matches: Vec<(String, ResultHandle)> = self
            .results
            .iter()
            .filter(|(name, result)| matcher.matches(name, result))
            .map(|(name, result)| (name.clone(), Arc::clone(result)))
            .collect();
        SelectedResults {
            count: matches.len(),
            matches,
        }
    }

    /// Declare a name ahead of execution.
    pub fn discover(&mut self, name: impl Into<String>, kind: ResultKind) {
        self.discovered.insert(name.into(), kind);
    }

    /// Forget every discovered name.
    pub fn clear_discovered(&mut self) {
        self.discovered.clear();
    }

    /// Names declared during discovery.
    #[must_use]
    pub fn discovered(&self) -> &IndexMap<String, ResultKind> {
        &self.discovered
    }

    /// Is the name bound or declared?
    #[must_use]
    pub fn is_known_name(&self, name: &str) -> bool {
        self.results.contains_key(name) || self.discovered.contains_key(name)
    }

    /// Property value, including the built-in read-only properties.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<String> {
        match name {
            WORKING_DIR => Some(self.working_dir.display().to_string()),
            OUTPUT_START => self.output_start.map(|d| d.format(DATE_FORMAT).to_string()),
            OUTPUT_END => self.output_end.map(|d| d.format(DATE_FORMAT).to_string()),
            _ => self.properties.get(name).cloned(),
        }
    }

    /// Set a property. `WorkingDir` changes the working directory;
    /// the output window properties are read-only.
    pub fn set_property(&mut self, name: &str, value: &str) -> std::result::Result<(), RequestError> {
        match name {
            WORKING_DIR => {
                self.working_dir = self.resolve_path(value);
                Ok(())
            }
            OUTPUT_START | OUTPUT_END => Err(RequestError::invalid(
                "SetProperty",
                format!("{name} is read-only; use SetOutputPeriod"),
            )),
            "" => Err(RequestError::invalid("SetProperty", "property name is empty")),
            _ => {
                self.properties.insert(name.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    /// User-defined properties in insertion order.
    #[must_use]
    pub fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }

    /// Replace `${Name}` with property values. Unknown names stay verbatim
    /// and are returned in order of appearance.
    #[must_use]
    pub fn expand(&self, text: &str) -> (String, Vec<String>) {
        let mut out = String::with_capacity(text.len());
        let mut unresolved = Vec::new();
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return (out, unresolved);
            };
            let name = &after[..end];
            match self.property(name) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push_str(&rest[start..start + 2 + end + 1]);
                    unresolved.push(name.to_string());
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        (out, unresolved)
    }

    /// Working directory.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Resolve a path against the working directory.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path.trim());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    /// Global output window.
    #[must_use]
    pub fn output_period(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        (self.output_start, self.output_end)
    }

    /// Change the output window; `None` leaves a bound unchanged.
    pub fn set_output_period(&mut self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) {
        if start.is_some() {
            self.output_start = start;
        }
        if end.is_some() {
            self.output_end = end;
        }
    }

    /// Serializable view of the current state.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            results: self
                .results
                .iter()
                .map(|(name, result)| ResultSummary {
                    name: name.clone(),
                    kind: result.kind(),
                    identifier: result.identifier().to_string(),
                })
                .collect(),
            discovered: self.discovered.clone(),
            properties: self.properties.clone(),
            output_start: self.output_start,
            output_end: self.output_end,
            working_dir: self.working_dir.clone(),
        }
    }
}

/// One bound result in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    /// Bound name.
    pub name: String,
    /// Result kind.
    pub kind: ResultKind,
    /// Identifier carried by the result.
    pub identifier: String,
}

/// Read-only, serializable view of [`ProcessorState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Bound results in binding order.
    pub results: Vec<ResultSummary>,
    /// Names declared during discovery.
    pub discovered: IndexMap<String, ResultKind>,
    /// User properties.
    pub properties: IndexMap<String, String>,
    /// Output window start.
    pub output_start: Option<NaiveDateTime>,
    /// Output window end.
    pub output_end: Option<NaiveDateTime>,
    /// Working directory.
    pub working_dir: PathBuf,
}

impl StateSnapshot {
    /// Persist the snapshot as pretty JSON, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let io = |source| ProcessorError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?).map_err(io)?;
        Ok(())
    }

    /// Load a snapshot written by [`save_to_path`](Self::save_to_path).
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| ProcessorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
