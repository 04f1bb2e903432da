//! Request broker over the shared processor state.
//!
//! Built-in requests are answered directly from [`ProcessorState`];
//! [`Request::Generic`] requests go to a [`RequestHandler`] registered under
//! the exact request name. A request nobody handles is an
//! [`RequestError::UnknownRequest`], never a panic.

use crate::state::{ProcessorState, SharedState, OUTPUT_END, OUTPUT_START};
use chrono::NaiveDateTime;
use lecommande::{
    DateMarker, DateResolveError, DateTimeExpression, Request, RequestBroker, RequestError,
    Response,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

/// Handler for one generic request name.
pub trait RequestHandler: Send + Sync {
    /// Answer the request.
    fn handle(
        &self,
        parameters: &BTreeMap<String, String>,
        state: &mut ProcessorState,
    ) -> Result<Response, RequestError>;
}

impl<F> RequestHandler for F
where
    F: Fn(&BTreeMap<String, String>, &mut ProcessorState) -> Result<Response, RequestError>
        + Send
        + Sync,
{
    fn handle(
        &self,
        parameters: &BTreeMap<String, String>,
        state: &mut ProcessorState,
    ) -> Result<Response, RequestError> {
        self(parameters, state)
    }
}

/// Generic handlers keyed by request name.
pub type HandlerTable = HashMap<String, Arc<dyn RequestHandler>>;

/// Source of "now" for `CurrentTo*` markers.
pub type Clock = fn() -> NaiveDateTime;

/// Local wall-clock time.
#[must_use]
pub fn system_clock() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// [`RequestBroker`] backed by [`SharedState`].
#[derive(Clone)]
pub struct ProcessorBroker {
    state: SharedState,
    handlers: Arc<HandlerTable>,
    clock: Clock,
}

impl ProcessorBroker {
    /// Create a broker with no generic handlers.
    #[must_use]
    pub fn new(state: SharedState) -> Self {
        Self::with_handlers(state, Arc::new(HandlerTable::new()), system_clock)
    }

    /// Create a broker with a handler table and clock.
    #[must_use]
    pub fn with_handlers(state: SharedState, handlers: Arc<HandlerTable>, clock: Clock) -> Self {
        Self {
            state,
            handlers,
            clock,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ProcessorState>, RequestError> {
        self.state
            .read()
            .map_err(|e| RequestError::StateUnavailable(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ProcessorState>, RequestError> {
        self.state
            .write()
            .map_err(|e| RequestError::StateUnavailable(e.to_string()))
    }

    fn resolve_expression(&self, expression: &str) -> Result<Response, RequestError> {
        let state = self.read()?;
        let (expanded, unresolved) = state.expand(expression);
        if let Some(name) = unresolved.first() {
            return Err(RequestError::MissingResponse {
                request: "ResolveDateTime".to_string(),
                property: name.clone(),
            });
        }

        let Some(parsed) = DateTimeExpression::parse(&expanded)
            .map_err(|message| RequestError::invalid("ResolveDateTime", message))?
        else {
            return Ok(Response::DateTime(None));
        };

        let (start, end) = state.output_period();
        parsed
            .resolve((self.clock)(), |marker| match marker {
                DateMarker::OutputStart => start,
                DateMarker::OutputEnd => end,
                _ => None,
            })
            .map(|value| Response::DateTime(Some(value)))
            .map_err(|err| match err {
                DateResolveError::Unset(marker) => RequestError::MissingResponse {
                    request: "ResolveDateTime".to_string(),
                    property: match marker {
                        DateMarker::OutputEnd => OUTPUT_END.to_string(),
                        _ => OUTPUT_START.to_string(),
                    },
                },
                DateResolveError::OutOfRange => RequestError::invalid(
                    "ResolveDateTime",
                    format!("\"{expanded}\": {err}"),
                ),
            })
    }
}

impl RequestBroker for ProcessorBroker {
    fn request(&mut self, request: Request) -> Result<Response, RequestError> {
        trace!(request = request.name(), "Handling request");
        match request {
            Request::ResolveDateTime { expression } => self.resolve_expression(&expression),
            Request::GetResult { name } => Ok(Response::Result(self.read()?.result(&name))),
            Request::SelectResults { selector } => {
                let matcher = selector.compile()?;
                Ok(Response::Results(self.read()?.select(&matcher)))
            }
            Request::SetResult { name, result } => {
                if name.trim().is_empty() {
                    return Err(RequestError::invalid("SetResult", "result name is empty"));
                }
                self.write()?.bind(name, Arc::new(result));
                Ok(Response::Done)
            }
            Request::RemoveResult { name } => Ok(Response::Removed(self.write()?.remove(&name))),
            Request::RemoveResults { names } => {
                let mut state = self.write()?;
                let removed = names
                    .into_iter()
                    .filter(|name| state.remove(name).is_some())
                    .collect();
                Ok(Response::RemovedAll(removed))
            }
            Request::GetProperty { name } => Ok(Response::Property(self.read()?.property(&name))),
            Request::SetProperty { name, value } => {
                self.write()?.set_property(&name, &value)?;
                Ok(Response::Done)
            }
            Request::ExpandProperties { text } => {
                let (text, unresolved) = self.read()?.expand(&text);
                Ok(Response::Expanded { text, unresolved })
            }
            Request::ResolvePath { path } => {
                let state = self.read()?;
                let (expanded, _) = state.expand(&path);
                Ok(Response::Path(state.resolve_path(&expanded)))
            }
            Request::SetOutputPeriod { start, end } => {
                let mut state = self.write()?;
                let (current_start, current_end) = state.output_period();
                if let (Some(s), Some(e)) = (start.or(current_start), end.or(current_end)) {
                    if s > e {
                        return Err(RequestError::invalid(
                            "SetOutputPeriod",
                            format!("start {s} is after end {e}"),
                        ));
                    }
                }
                state.set_output_period(start, end);
                Ok(Response::Done)
            }
            Request::IsKnownName { name } => Ok(Response::Flag(self.read()?.is_known_name(&name))),
            Request::Generic { name, parameters } => {
                let handler = self
                    .handlers
                    .get(&name)
                    .cloned()
                    .ok_or(RequestError::UnknownRequest { name })?;
                handler.handle(&parameters, &mut *self.write()?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lecommande::{NamedResult, RequestBrokerExt, ResultSelector, TimeSeries};
    use rstest::rstest;

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10)
            .and_then(|d| d.and_hms_opt(13, 45, 20))
            .unwrap_or_default()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .expect("valid date")
    }

    fn broker() -> ProcessorBroker {
        let mut handlers = HandlerTable::new();
        let echo: Arc<dyn RequestHandler> = Arc::new(
            |params: &BTreeMap<String, String>,
             _: &mut ProcessorState|
             -> Result<Response, RequestError> { Ok(Response::Properties(params.clone())) },
        );
        handlers.insert("Echo".to_string(), echo);
        ProcessorBroker::with_handlers(
            ProcessorState::new("/data").into_shared(),
            Arc::new(handlers),
            fixed_clock,
        )
    }

    #[rstest]
    #[case("2024-01-02 03", Some(at(2024, 1, 2, 3)))]
    #[case("CurrentToHour - 1 Hour", Some(at(2024, 6, 10, 12)))]
    #[case("CurrentToDay + 1Week", Some(at(2024, 6, 17, 0)))]
    #[case("*", None)]
    #[case("", None)]
    fn resolves_date_expressions(#[case] text: &str, #[case] expected: Option<NaiveDateTime>) {
        let mut broker = broker();
        assert_eq!(broker.resolve_date_time(text).expect("resolve"), expected);
    }

    #[test]
    fn output_markers_need_a_window() {
        let mut broker = broker();
        let err = broker.resolve_date_time("OutputStart").expect_err("unset");
        assert!(matches!(err, RequestError::MissingResponse { ref property, .. } if property == "OutputStart"));

        broker
            .set_output_period(Some(at(2020, 1, 1, 0)), Some(at(2020, 12, 31, 0)))
            .expect("set window");
        assert_eq!(
            broker.resolve_date_time("OutputEnd - 1 Day").expect("resolve"),
            Some(at(2020, 12, 30, 0))
        );
    }

    #[rstest]
    #[case("CurrentToDay + 99999999 Week")]
    #[case("OutputStart - 99999999 Week")]
    fn offsets_past_the_calendar_are_invalid_requests(#[case] text: &str) {
        let mut broker = broker();
        broker
            .set_output_period(Some(at(2020, 1, 1, 0)), None)
            .expect("set window");
        let err = broker.resolve_date_time(text).expect_err("out of range");
        assert!(matches!(err, RequestError::InvalidRequest { ref message, .. } if message.contains("out of range")));
    }

    #[rstest]
    #[case(Some(at(2021, 1, 1, 0)), None)]
    #[case(None, Some(at(2019, 12, 31, 0)))]
    fn one_sided_period_cannot_invert_the_window(
        #[case] start: Option<NaiveDateTime>,
        #[case] end: Option<NaiveDateTime>,
    ) {
        let mut broker = broker();
        let window = (Some(at(2020, 1, 1, 0)), Some(at(2020, 12, 31, 0)));
        broker
            .set_output_period(window.0, window.1)
            .expect("set window");

        let err = broker.set_output_period(start, end).expect_err("inverted");
        assert!(matches!(err, RequestError::InvalidRequest { .. }));
        assert_eq!(broker.state.read().expect("lock").output_period(), window);
    }

    #[test]
    fn unparseable_date_is_invalid_request() {
        let mut broker = broker();
        let err = broker.resolve_date_time("next tuesday").expect_err("bad");
        assert!(matches!(err, RequestError::InvalidRequest { .. }));
    }

    #[test]
    fn properties_expand_inside_dates_and_paths() {
        let mut broker = broker();
        broker.set_property("Year", "2021").expect("set");
        assert_eq!(
            broker.resolve_date_time("${Year}-03").expect("resolve"),
            Some(at(2021, 3, 1, 0))
        );
        assert_eq!(
            broker.resolve_path("out/${Year}.dv").expect("path"),
            std::path::PathBuf::from("/data/out/2021.dv")
        );
    }

    #[test]
    fn batch_removal_reports_names_that_were_bound() {
        let mut broker = broker();
        for name in ["A", "B"] {
            broker
                .set_result(name, NamedResult::TimeSeries(TimeSeries::new(name)))
                .expect("set");
        }

        let removed = broker
            .remove_results(vec!["A".to_string(), "Missing".to_string(), "B".to_string()])
            .expect("remove");

        assert_eq!(removed, vec!["A", "B"]);
        assert_eq!(broker.state.read().expect("lock").result_count(), 0);
    }

    #[test]
    fn results_round_trip_through_requests() {
        let mut broker = broker();
        assert!(broker.get_result("Flow").expect("get").is_none());
        assert!(!broker.is_known_name("Flow").expect("known"));

        broker
            .set_result("Flow", NamedResult::TimeSeries(TimeSeries::new("Flow.Day")))
            .expect("set");
        assert!(broker.is_known_name("Flow").expect("known"));
        assert_eq!(
            broker.select_results(ResultSelector::new("*.day")).expect("select").count,
            1
        );
        assert!(broker.remove_result("Flow").expect("remove").is_some());
        assert!(broker.get_result("Flow").expect("get").is_none());
    }

    #[test]
    fn generic_requests_dispatch_by_name() {
        let mut broker = broker();
        let mut params = BTreeMap::new();
        params.insert("Value".to_string(), "42".to_string());
        assert_eq!(
            broker
                .generic_property("Echo", params.clone(), "Value")
                .expect("echo"),
            "42"
        );

        let err = broker
            .generic_property("Nobody", params, "Value")
            .expect_err("unregistered");
        assert!(matches!(err, RequestError::UnknownRequest { ref name } if name == "Nobody"));
    }

    #[test]
    fn inverted_output_period_is_rejected() {
        let mut broker = broker();
        let err = broker
            .set_output_period(Some(at(2021, 1, 1, 0)), Some(at(2020, 1, 1, 0)))
            .expect_err("inverted");
        assert!(matches!(err, RequestError::InvalidRequest { .. }));
    }
}
