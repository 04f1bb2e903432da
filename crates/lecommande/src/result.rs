//! Named results held in processor state.
//!
//! The engine treats these as opaque handles; only commands look inside.
//! Results are shared as [`ResultHandle`] (`Arc`) so observers can hold a
//! copy while the run loop replaces the binding.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Shared handle to a named result.
pub type ResultHandle = Arc<NamedResult>;

/// Kind of a named result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultKind {
    /// A time series.
    TimeSeries,
    /// A table.
    Table,
    /// An ensemble of time series.
    Ensemble,
}

impl ResultKind {
    /// Parse a kind name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "timeseries" | "ts" => Some(Self::TimeSeries),
            "table" => Some(Self::Table),
            "ensemble" => Some(Self::Ensemble),
            _ => None,
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeSeries => write!(f, "TimeSeries"),
            Self::Table => write!(f, "Table"),
            Self::Ensemble => write!(f, "Ensemble"),
        }
    }
}

/// Regular spacing between time-series values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInterval {
    /// One minute.
    Minute,
    /// One hour.
    Hour,
    /// One day.
    Day,
}

impl TimeInterval {
    /// Duration of one step.
    #[must_use]
    pub fn step(self) -> Duration {
        match self {
            Self::Minute => Duration::minutes(1),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
        }
    }

    /// Name used in script text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "Minute",
            Self::Hour => "Hour",
            Self::Day => "Day",
        }
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minute" | "min" => Ok(Self::Minute),
            "hour" | "hr" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            other => Err(format!("unsupported interval: {other}")),
        }
    }
}

/// One value in a time series; `None` is a missing value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Timestamp of the value.
    pub date: NaiveDateTime,
    /// The value, if present.
    pub value: Option<f64>,
}

/// A time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Time series identifier (for example `Gauge.USGS.Streamflow.Day`).
    pub identifier: String,
    /// Free-form description.
    pub description: String,
    /// Data units.
    pub units: String,
    /// Spacing of the values, if regular.
    pub interval: Option<TimeInterval>,
    /// Values sorted by date.
    pub points: Vec<DataPoint>,
}

impl TimeSeries {
    /// Create an empty series.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            description: String::new(),
            units: String::new(),
            interval: None,
            points: Vec::new(),
        }
    }

    /// First and last date, if any values exist.
    #[must_use]
    pub fn period(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }

    /// Values within `[start, end]`; open bounds are unlimited.
    pub fn points_in(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> impl Iterator<Item = &DataPoint> {
        self.points.iter().filter(move |p| {
            start.map_or(true, |s| p.date >= s) && end.map_or(true, |e| p.date <= e)
        })
    }

    /// Number of non-missing values.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_some()).count()
    }
}

/// A simple table of string cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table identifier.
    pub identifier: String,
    /// Column names.
    pub columns: Vec<String>,
    /// Rows, each with one cell per column.
    pub rows: Vec<Vec<String>>,
}

/// A group of time series referenced by their bound names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ensemble {
    /// Ensemble identifier.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Bound names of the member time series.
    pub members: Vec<String>,
}

/// Opaque domain object registered in processor state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NamedResult {
    /// A time series.
    TimeSeries(TimeSeries),
    /// A table.
    Table(Table),
    /// An ensemble.
    Ensemble(Ensemble),
}

impl NamedResult {
    /// Kind of this result.
    #[must_use]
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::TimeSeries(_) => ResultKind::TimeSeries,
            Self::Table(_) => ResultKind::Table,
            Self::Ensemble(_) => ResultKind::Ensemble,
        }
    }

    /// Identifier carried by the result itself.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::TimeSeries(ts) => &ts.identifier,
            Self::Table(table) => &table.identifier,
            Self::Ensemble(ensemble) => &ensemble.identifier,
        }
    }

    /// The time series inside, if this is one.
    #[must_use]
    pub fn as_time_series(&self) -> Option<&TimeSeries> {
        match self {
            Self::TimeSeries(ts) => Some(ts),
            _ => None,
        }
    }
}
