//! Date/time expressions used in command parameters.
//!
//! An expression is a literal date (`2024`, `2024-03`, `2024-03-05 06:30`),
//! or a marker (`OutputStart`, `CurrentToDay`, ...), optionally followed by
//! an offset such as `- 7 Day`. `*` and the empty string mean "use the
//! default" and parse to `None`.
//!
//! Parsing is static; markers are resolved by the processor, which knows
//! the output window and the clock.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::fmt;
use thiserror::Error;

static LITERAL: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(\d{4})(?:-(\d{1,2})(?:-(\d{1,2})(?:[ T](\d{1,2})(?::(\d{1,2})(?::(\d{1,2}))?)?)?)?)?$")
        .ok()
});

static OFFSET: Lazy<Option<Regex>> = Lazy::new(|| {
    RegexBuilder::new(r"^(.*?)\s*([+-])\s*(\d+)\s*(minute|hour|day|week)s?$")
        .case_insensitive(true)
        .build()
        .ok()
});

/// Named reference point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateMarker {
    /// Start of the global output window.
    OutputStart,
    /// End of the global output window.
    OutputEnd,
    /// Now, truncated to the day.
    CurrentToDay,
    /// Now, truncated to the hour.
    CurrentToHour,
    /// Now, truncated to the minute.
    CurrentToMinute,
    /// Now, truncated to the second.
    CurrentToSecond,
}

impl DateMarker {
    /// Parse a marker name, case-insensitively.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "outputstart" => Some(Self::OutputStart),
            "outputend" => Some(Self::OutputEnd),
            "currenttoday" => Some(Self::CurrentToDay),
            "currenttohour" => Some(Self::CurrentToHour),
            "currenttominute" => Some(Self::CurrentToMinute),
            "currenttosecond" => Some(Self::CurrentToSecond),
            _ => None,
        }
    }

    /// Apply a `CurrentTo*` truncation to `now`; `None` for window markers.
    #[must_use]
    pub fn truncate(self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = now.date();
        match self {
            Self::OutputStart | Self::OutputEnd => None,
            Self::CurrentToDay => date.and_hms_opt(0, 0, 0),
            Self::CurrentToHour => date.and_hms_opt(now.hour(), 0, 0),
            Self::CurrentToMinute => date.and_hms_opt(now.hour(), now.minute(), 0),
            Self::CurrentToSecond => date.and_hms_opt(now.hour(), now.minute(), now.second()),
        }
    }
}

impl fmt::Display for DateMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OutputStart => "OutputStart",
            Self::OutputEnd => "OutputEnd",
            Self::CurrentToDay => "CurrentToDay",
            Self::CurrentToHour => "CurrentToHour",
            Self::CurrentToMinute => "CurrentToMinute",
            Self::CurrentToSecond => "CurrentToSecond",
        };
        f.write_str(name)
    }
}

/// Why an expression could not be turned into a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DateResolveError {
    /// A window marker was used while that bound is unset.
    #[error("{0} is not set")]
    Unset(DateMarker),
    /// The offset moves the date outside the representable range.
    #[error("date/time is out of range after applying the offset")]
    OutOfRange,
}

/// Base of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBase {
    /// Fixed timestamp.
    Literal(NaiveDateTime),
    /// Marker resolved at run time.
    Marker(DateMarker),
}

/// Parsed date/time expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeExpression {
    /// Reference point.
    pub base: DateBase,
    /// Offset added to the base.
    pub offset: Duration,
}

impl DateTimeExpression {
    /// Parse an expression; `Ok(None)` for `*` or empty.
    pub fn parse(text: &str) -> Result<Option<Self>, String> {
        let text = text.trim();
        if text.is_empty() || text == "*" {
            return Ok(None);
        }

        let (base_text, offset) = match OFFSET.as_ref().and_then(|re| re.captures(text)) {
            Some(caps) => {
                let amount: i64 = caps[3]
                    .parse()
                    .map_err(|_| format!("offset out of range in \"{text}\""))?;
                let amount = if &caps[2] == "-" { -amount } else { amount };
                let offset = match caps[4].to_ascii_lowercase().as_str() {
                    "minute" => Duration::try_minutes(amount),
                    "hour" => Duration::try_hours(amount),
                    "day" => Duration::try_days(amount),
                    _ => Duration::try_weeks(amount),
                }
                .ok_or_else(|| format!("offset out of range in \"{text}\""))?;
                (caps.get(1).map_or("", |m| m.as_str()).trim(), offset)
            }
            None => (text, Duration::zero()),
        };

        let base = if let Some(marker) = DateMarker::parse(base_text) {
            DateBase::Marker(marker)
        } else {
            let literal = parse_literal(base_text)?;
            if literal.checked_add_signed(offset).is_none() {
                return Err(format!("date/time out of range: \"{text}\""));
            }
            DateBase::Literal(literal)
        };
        Ok(Some(Self { base, offset }))
    }

    /// Resolve using `now` for `CurrentTo*` markers and `window` for
    /// `OutputStart`/`OutputEnd`.
    pub fn resolve(
        &self,
        now: NaiveDateTime,
        window: impl Fn(DateMarker) -> Option<NaiveDateTime>,
    ) -> Result<NaiveDateTime, DateResolveError> {
        let base = match self.base {
            DateBase::Literal(value) => value,
            DateBase::Marker(marker) => marker
                .truncate(now)
                .or_else(|| window(marker))
                .ok_or(DateResolveError::Unset(marker))?,
        };
        base.checked_add_signed(self.offset).ok_or(DateResolveError::OutOfRange)
    }
}

/// Parse a literal date with any supported precision.
pub fn parse_literal(text: &str) -> Result<NaiveDateTime, String> {
    let caps = LITERAL
        .as_ref()
        .and_then(|re| re.captures(text))
        .ok_or_else(|| format!("unrecognized date/time \"{text}\""))?;
    let part = |i: usize, default: u32| -> u32 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(default)
    };
    let year: i32 = caps[1]
        .parse()
        .map_err(|_| format!("invalid year in \"{text}\""))?;
    NaiveDate::from_ymd_opt(year, part(2, 1), part(3, 1))
        .and_then(|d| d.and_hms_opt(part(4, 0), part(5, 0), part(6, 0)))
        .ok_or_else(|| format!("date/time out of range: \"{text}\""))
}
