//! File conversion contracts.
//!
//! Readers and writers never touch processor state: a command resolves
//! paths and windows through the broker, calls the codec, then binds what
//! came back.
//!
//! The reference [`DateValueCodec`] reads and writes a small text format:
//!
//! ```text
//! # TSID: Gauge.USGS.Streamflow.Day
//! # Units: CFS
//! # Interval: Day
//! 2024-01-01,12.5
//! 2024-01-02,
//! ```
//!
//! An empty value is a missing value. Several series in one file are
//! separated by a blank line.

use chrono::NaiveDateTime;
use lecommande::datetime::parse_literal;
use lecommande::{DataPoint, NamedResult, TimeInterval, TimeSeries};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by readers and writers.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// File could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// File content is malformed.
    #[error("{path}:{line}: {message}")]
    Parse {
        /// File involved.
        path: PathBuf,
        /// 1-based line.
        line: usize,
        /// What is wrong.
        message: String,
    },

    /// Requested series is not in the file.
    #[error("{path} does not contain {identifier}")]
    NotFound {
        /// File involved.
        path: PathBuf,
        /// Requested identifier.
        identifier: String,
    },

    /// Format name not supported.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Inclusive time window; open bounds are unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Period {
    /// First date kept.
    pub start: Option<NaiveDateTime>,
    /// Last date kept.
    pub end: Option<NaiveDateTime>,
}

impl Period {
    /// Create a period.
    #[must_use]
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    /// Is `date` inside?
    #[must_use]
    pub fn contains(&self, date: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Reads one named result from a file.
pub trait ResultReader {
    /// Read the series `identifier` (or the first one) clipped to `period`.
    fn read(
        &self,
        path: &Path,
        identifier: Option<&str>,
        period: Period,
    ) -> Result<NamedResult, ConversionError>;
}

/// Writes time series to a file.
pub trait ResultWriter {
    /// Write every series, keeping only values inside `period`.
    fn write(&self, path: &Path, series: &[&TimeSeries], period: Period) -> Result<(), ConversionError>;
}

/// Date/value text codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateValueCodec;

impl DateValueCodec {
    /// Format name used in `Format=` parameters.
    pub const FORMAT: &'static str = "DateValue";

    /// Codec for a `Format=` value; empty means the default.
    pub fn for_format(format: Option<&str>) -> Result<Self, ConversionError> {
        match format.map(str::trim) {
            None | Some("") => Ok(Self),
            Some(name) if name.eq_ignore_ascii_case(Self::FORMAT) => Ok(Self),
            Some(other) => Err(ConversionError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Parse every series in `text`.
    pub fn parse(path: &Path, text: &str) -> Result<Vec<TimeSeries>, ConversionError> {
        let mut all = Vec::new();
        let mut current: Option<TimeSeries> = None;
        let parse_error = |line: usize, message: String| ConversionError::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };

        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                all.extend(current.take());
                continue;
            }

            let series = current.get_or_insert_with(|| TimeSeries::new(""));
            if let Some(header) = trimmed.strip_prefix('#') {
                let Some((key, value)) = header.split_once(':') else {
                    continue;
                };
                let value = value.trim();
                match key.trim().to_ascii_lowercase().as_str() {
                    "tsid" => series.identifier = value.to_string(),
                    "description" => series.description = value.to_string(),
                    "units" => series.units = value.to_string(),
                    "interval" => {
                        series.interval = Some(value.parse().map_err(|e| parse_error(line, e))?);
                    }
                    _ => {}
                }
                continue;
            }

            let (date, value) = trimmed
                .split_once(',')
                .ok_or_else(|| parse_error(line, format!("expected date,value: {trimmed}")))?;
            let date = parse_literal(date.trim()).map_err(|e| parse_error(line, e))?;
            let value = match value.trim() {
                "" => None,
                v => Some(
                    v.parse::<f64>()
                        .map_err(|_| parse_error(line, format!("invalid value: {v}")))?,
                ),
            };
            series.points.push(DataPoint { date, value });
        }
        all.extend(current);

        for series in &mut all {
            series.points.sort_by_key(|p| p.date);
        }
        Ok(all)
    }

    /// Render series as text.
    #[must_use]
    pub fn render(series: &[&TimeSeries], period: Period) -> String {
        let mut out = String::new();
        for (i, ts) in series.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "# TSID: {}", ts.identifier);
            if !ts.description.is_empty() {
                let _ = writeln!(out, "# Description: {}", ts.description);
            }
            if !ts.units.is_empty() {
                let _ = writeln!(out, "# Units: {}", ts.units);
            }
            if let Some(interval) = ts.interval {
                let _ = writeln!(out, "# Interval: {interval}");
            }
            let date_format = match ts.interval {
                Some(TimeInterval::Day) => "%Y-%m-%d",
                Some(TimeInterval::Hour) => "%Y-%m-%d %H",
                Some(TimeInterval::Minute) => "%Y-%m-%d %H:%M",
                None => "%Y-%m-%d %H:%M:%S",
            };
            for point in ts.points.iter().filter(|p| period.contains(p.date)) {
                let _ = match point.value {
                    Some(value) => writeln!(out, "{},{value}", point.date.format(date_format)),
                    None => writeln!(out, "{},", point.date.format(date_format)),
                };
            }
        }
        out
    }
}

impl ResultReader for DateValueCodec {
    fn read(
        &self,
        path: &Path,
        identifier: Option<&str>,
        period: Period,
    ) -> Result<NamedResult, ConversionError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConversionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut all = Self::parse(path, &text)?;

        let index = match identifier {
            Some(id) => all
                .iter()
                .position(|ts| ts.identifier.eq_ignore_ascii_case(id))
                .ok_or_else(|| ConversionError::NotFound {
                    path: path.to_path_buf(),
                    identifier: id.to_string(),
                })?,
            None if all.is_empty() => {
                return Err(ConversionError::Parse {
                    path: path.to_path_buf(),
                    line: 0,
                    message: "file contains no time series".to_string(),
                })
            }
            None => 0,
        };

        let mut series = all.swap_remove(index);
        series.points.retain(|p| period.contains(p.date));
        Ok(NamedResult::TimeSeries(series))
    }
}

impl ResultWriter for DateValueCodec {
    fn write(&self, path: &Path, series: &[&TimeSeries], period: Period) -> Result<(), ConversionError> {
        let io = |source| ConversionError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        std::fs::write(path, Self::render(series, period)).map_err(io)
    }
}
