//! Typed request/response envelopes.
//!
//! Commands never see processor internals. They send a [`Request`] through
//! a [`RequestBroker`] and get a [`Response`] back. Built-in request kinds
//! are enum variants with typed payloads; [`Request::Generic`] carries
//! open-ended extension requests as string maps.

use crate::error::RequestError;
use crate::result::{NamedResult, ResultHandle, ResultKind};
use chrono::NaiveDateTime;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Which results a command wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSelector {
    /// Wildcard pattern (`*` matches any run of characters), case-insensitive.
    pub pattern: String,
    /// Restrict to one kind.
    pub kind: Option<ResultKind>,
}

impl ResultSelector {
    /// Select everything matching `pattern`.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            kind: None,
        }
    }

    /// Select every result.
    #[must_use]
    pub fn all() -> Self {
        Self::new("*")
    }

    /// Restrict to one kind.
    #[must_use]
    pub fn of_kind(mut self, kind: ResultKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Compile the wildcard pattern.
    pub fn compile(&self) -> Result<SelectorMatcher, RequestError> {
        let escaped = regex::escape(self.pattern.trim()).replace(r"\*", ".*");
        let regex = RegexBuilder::new(&format!("^{escaped}$"))
            .case_insensitive(true)
            .build()
            .map_err(|e| RequestError::invalid("SelectResults", e.to_string()))?;
        Ok(SelectorMatcher {
            regex,
            kind: self.kind,
        })
    }
}

/// Compiled form of a [`ResultSelector`].
#[derive(Debug, Clone)]
pub struct SelectorMatcher {
    regex: Regex,
    kind: Option<ResultKind>,
}

impl SelectorMatcher {
    /// True if the bound name or the result identifier matches.
    #[must_use]
    pub fn matches(&self, name: &str, result: &NamedResult) -> bool {
        if self.kind.is_some_and(|k| k != result.kind()) {
            return false;
        }
        self.regex.is_match(name) || self.regex.is_match(result.identifier())
    }
}

/// Results matched by a selector, in binding order.
#[derive(Debug, Clone, Default)]
pub struct SelectedResults {
    /// `(bound name, handle)` pairs.
    pub matches: Vec<(String, ResultHandle)>,
    /// Number of matches.
    pub count: usize,
}

/// A request sent by a command to the engine.
#[derive(Debug, Clone)]
pub enum Request {
    /// Resolve a date/time expression (possibly relative) to a timestamp.
    ResolveDateTime {
        /// Expression such as `2024-01-01`, `OutputStart`, `CurrentToDay - 7Day`.
        expression: String,
    },
    /// Look up one result by exact bound name.
    GetResult {
        /// Bound name.
        name: String,
    },
    /// Find all results matching a selector.
    SelectResults {
        /// The selector.
        selector: ResultSelector,
    },
    /// Bind a result under a name (last writer wins).
    SetResult {
        /// Name to bind.
        name: String,
        /// The result.
        result: NamedResult,
    },
    /// Remove a binding.
    RemoveResult {
        /// Bound name.
        name: String,
    },
    /// Remove several bindings in one step.
    RemoveResults {
        /// Bound names.
        names: Vec<String>,
    },
    /// Read a processor property.
    GetProperty {
        /// Property name.
        name: String,
    },
    /// Set a processor property.
    SetProperty {
        /// Property name.
        name: String,
        /// New value.
        value: String,
    },
    /// Replace `${Name}` references with property values.
    ExpandProperties {
        /// Text to expand.
        text: String,
    },
    /// Resolve a possibly relative path against the working directory.
    ResolvePath {
        /// Path as written in the script.
        path: String,
    },
    /// Change the global output window; `None` leaves a bound unchanged.
    SetOutputPeriod {
        /// New start.
        start: Option<NaiveDateTime>,
        /// New end.
        end: Option<NaiveDateTime>,
    },
    /// Is a name bound, or declared by an earlier command during discovery?
    IsKnownName {
        /// Name to check.
        name: String,
    },
    /// Open-ended request dispatched to a registered handler by name.
    Generic {
        /// Request name.
        name: String,
        /// Request parameters.
        parameters: BTreeMap<String, String>,
    },
}

impl Request {
    /// Stable request name used for dispatch and diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ResolveDateTime { .. } => "ResolveDateTime",
            Self::GetResult { .. } => "GetResult",
            Self::SelectResults { .. } => "SelectResults",
            Self::SetResult { .. } => "SetResult",
            Self::RemoveResult { .. } => "RemoveResult",
            Self::RemoveResults { .. } => "RemoveResults",
            Self::GetProperty { .. } => "GetProperty",
            Self::SetProperty { .. } => "SetProperty",
            Self::ExpandProperties { .. } => "ExpandProperties",
            Self::ResolvePath { .. } => "ResolvePath",
            Self::SetOutputPeriod { .. } => "SetOutputPeriod",
            Self::IsKnownName { .. } => "IsKnownName",
            Self::Generic { name, .. } => name,
        }
    }
}

/// Answer to a [`Request`].
#[derive(Debug, Clone)]
pub enum Response {
    /// Resolved timestamp; `None` means "use the default" (`*` or empty).
    DateTime(Option<NaiveDateTime>),
    /// Result lookup; `None` is the explicit not-found answer.
    Result(Option<ResultHandle>),
    /// Selector matches.
    Results(SelectedResults),
    /// Removed handle, if the name was bound.
    Removed(Option<ResultHandle>),
    /// Names that were bound and are now removed, in request order.
    RemovedAll(Vec<String>),
    /// Property lookup; `None` when not set.
    Property(Option<String>),
    /// Expanded text plus property names that could not be resolved.
    Expanded {
        /// Text after expansion.
        text: String,
        /// Names left verbatim.
        unresolved: Vec<String>,
    },
    /// Absolute path.
    Path(PathBuf),
    /// Yes/no answer.
    Flag(bool),
    /// Acknowledgement with no payload.
    Done,
    /// Open-ended response properties.
    Properties(BTreeMap<String, String>),
}

/// Channel through which commands query and update processor-owned data.
pub trait RequestBroker {
    /// Dispatch a request by name and return its response.
    fn request(&mut self, request: Request) -> Result<Response, RequestError>;
}

fn unexpected(request: &str) -> RequestError {
    RequestError::UnexpectedResponse {
        request: request.to_string(),
    }
}

/// Typed helpers over [`RequestBroker::request`].
pub trait RequestBrokerExt: RequestBroker {
    /// Resolve a date/time expression; `Ok(None)` for `*` or empty.
    fn resolve_date_time(&mut self, expression: &str) -> Result<Option<NaiveDateTime>, RequestError> {
        match self.request(Request::ResolveDateTime {
            expression: expression.to_string(),
        })? {
            Response::DateTime(value) => Ok(value),
            _ => Err(unexpected("ResolveDateTime")),
        }
    }

    /// Look up a result by bound name.
    fn get_result(&mut self, name: &str) -> Result<Option<ResultHandle>, RequestError> {
        match self.request(Request::GetResult {
            name: name.to_string(),
        })? {
            Response::Result(handle) => Ok(handle),
            _ => Err(unexpected("GetResult")),
        }
    }

    /// Select results.
    fn select_results(&mut self, selector: ResultSelector) -> Result<SelectedResults, RequestError> {
        match self.request(Request::SelectResults { selector })? {
            Response::Results(results) => Ok(results),
            _ => Err(unexpected("SelectResults")),
        }
    }

    /// Bind a result.
    fn set_result(&mut self, name: &str, result: NamedResult) -> Result<(), RequestError> {
        match self.request(Request::SetResult {
            name: name.to_string(),
            result,
        })? {
            Response::Done => Ok(()),
            _ => Err(unexpected("SetResult")),
        }
    }

    /// Remove a binding.
    fn remove_result(&mut self, name: &str) -> Result<Option<ResultHandle>, RequestError> {
        match self.request(Request::RemoveResult {
            name: name.to_string(),
        })? {
            Response::Removed(handle) => Ok(handle),
            _ => Err(unexpected("RemoveResult")),
        }
    }

    /// Remove several bindings together; returns the names that were bound.
    fn remove_results(&mut self, names: Vec<String>) -> Result<Vec<String>, RequestError> {
        match self.request(Request::RemoveResults { names })? {
            Response::RemovedAll(removed) => Ok(removed),
            _ => Err(unexpected("RemoveResults")),
        }
    }

    /// Read a property.
    fn get_property(&mut self, name: &str) -> Result<Option<String>, RequestError> {
        match self.request(Request::GetProperty {
            name: name.to_string(),
        })? {
            Response::Property(value) => Ok(value),
            _ => Err(unexpected("GetProperty")),
        }
    }

    /// Set a property.
    fn set_property(&mut self, name: &str, value: &str) -> Result<(), RequestError> {
        match self.request(Request::SetProperty {
            name: name.to_string(),
            value: value.to_string(),
        })? {
            Response::Done => Ok(()),
            _ => Err(unexpected("SetProperty")),
        }
    }

    /// Expand `${Name}` references; returns the text and unresolved names.
    fn expand_properties(&mut self, text: &str) -> Result<(String, Vec<String>), RequestError> {
        match self.request(Request::ExpandProperties {
            text: text.to_string(),
        })? {
            Response::Expanded { text, unresolved } => Ok((text, unresolved)),
            _ => Err(unexpected("ExpandProperties")),
        }
    }

    /// Resolve a path against the working directory.
    fn resolve_path(&mut self, path: &str) -> Result<PathBuf, RequestError> {
        match self.request(Request::ResolvePath {
            path: path.to_string(),
        })? {
            Response::Path(path) => Ok(path),
            _ => Err(unexpected("ResolvePath")),
        }
    }

    /// Change the global output window.
    fn set_output_period(
        &mut self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<(), RequestError> {
        match self.request(Request::SetOutputPeriod { start, end })? {
            Response::Done => Ok(()),
            _ => Err(unexpected("SetOutputPeriod")),
        }
    }

    /// Is the name bound or discovered?
    fn is_known_name(&mut self, name: &str) -> Result<bool, RequestError> {
        match self.request(Request::IsKnownName {
            name: name.to_string(),
        })? {
            Response::Flag(known) => Ok(known),
            _ => Err(unexpected("IsKnownName")),
        }
    }

    /// Send a generic request and require a property in the response.
    fn generic_property(
        &mut self,
        name: &str,
        parameters: BTreeMap<String, String>,
        property: &str,
    ) -> Result<String, RequestError> {
        match self.request(Request::Generic {
            name: name.to_string(),
            parameters,
        })? {
            Response::Properties(mut props) => {
                props
                    .remove(property)
                    .ok_or_else(|| RequestError::MissingResponse {
                        request: name.to_string(),
                        property: property.to_string(),
                    })
            }
            _ => Err(unexpected(name)),
        }
    }
}

impl<B: RequestBroker + ?Sized> RequestBrokerExt for B {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{Table, TimeSeries};

    fn series(id: &str) -> NamedResult {
        NamedResult::TimeSeries(TimeSeries::new(id))
    }

    #[test]
    fn wildcard_matches_name_or_identifier() {
        let matcher = ResultSelector::new("flow*").compile().expect("compile");
        assert!(matcher.matches("FlowIn", &series("x")));
        assert!(matcher.matches("alias", &series("Flow.USGS.Day")));
        assert!(!matcher.matches("Stage", &series("Stage.USGS.Day")));
    }

    #[test]
    fn kind_filter_excludes_other_kinds() {
        let matcher = ResultSelector::all()
            .of_kind(ResultKind::TimeSeries)
            .compile()
            .expect("compile");
        let table = NamedResult::Table(Table {
            identifier: "T".into(),
            columns: Vec::new(),
            rows: Vec::new(),
        });
        assert!(!matcher.matches("T", &table));
        assert!(matcher.matches("S", &series("S")));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let matcher = ResultSelector::new("a.b").compile().expect("compile");
        assert!(matcher.matches("a.b", &series("z")));
        assert!(!matcher.matches("axb", &series("z")));
    }

    struct NotFoundBroker;

    impl RequestBroker for NotFoundBroker {
        fn request(&mut self, request: Request) -> Result<Response, RequestError> {
            match request {
                Request::GetResult { .. } => Ok(Response::Result(None)),
                Request::Generic { name, .. } if name == "Known" => {
                    Ok(Response::Properties(BTreeMap::new()))
                }
                other => Err(RequestError::UnknownRequest {
                    name: other.name().to_string(),
                }),
            }
        }
    }

    #[test]
    fn typed_helpers_surface_not_found_and_errors() {
        let mut broker = NotFoundBroker;
        assert!(broker.get_result("Missing").expect("lookup").is_none());

        let err = broker
            .generic_property("Known", BTreeMap::new(), "Value")
            .expect_err("missing property");
        assert!(matches!(err, RequestError::MissingResponse { .. }));

        let err = broker.get_property("X").expect_err("unknown");
        assert!(matches!(err, RequestError::UnknownRequest { .. }));
    }
}
