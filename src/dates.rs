//! Date values of the query language.
//!
//! Everything is UTC. Relative keywords resolve against the `now` passed in
//! by the caller, normally the clock at translation time.

use std::ops::Bound;

use chrono::{
    DateTime, Datelike, Days, NaiveDate, NaiveDateTime, TimeZone, Utc,
};

use crate::query::CompareOp;

const DATE_FORMATS: &[&str] =
    &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%m/%d/%Y"];

/// A resolved date value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateValue {
    /// A calendar day without a time of day, held as its first instant.
    Day(DateTime<Utc>),
    /// An exact instant.
    Instant(DateTime<Utc>),
}

impl DateValue {
    /// The first instant the value denotes.
    pub fn at(self) -> DateTime<Utc> {
        match self {
            DateValue::Day(t) | DateValue::Instant(t) => t,
        }
    }
}

/// Resolve a date value such as `2024-01-31`, `2024-01-31T10:00:00Z` or
/// `this-week` to an instant.
pub fn resolve(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    resolve_value(value, now).map(DateValue::at)
}

/// Like [`resolve`], but keeps whether the value named a whole day.
///
/// `today`, `yesterday` and plain dates are days; `this-week`,
/// `this-month` and timestamps are instants.
pub fn resolve_value(value: &str, now: DateTime<Utc>) -> Option<DateValue> {
    let value = value.trim();
    let today = start_of_day(now.date_naive());
    match value.to_lowercase().as_str() {
        "today" => return Some(DateValue::Day(today)),
        "yesterday" => {
            return today.checked_sub_days(Days::new(1)).map(DateValue::Day);
        }
        "this-week" => {
            let since_monday = now.weekday().num_days_from_monday();
            return today
                .checked_sub_days(Days::new(since_monday.into()))
                .map(DateValue::Instant);
        }
        "this-month" => {
            return now
                .date_naive()
                .with_day(1)
                .map(|d| DateValue::Instant(start_of_day(d)));
        }
        _ => {}
    }

    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(DateValue::Instant(t.with_timezone(&Utc)));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
    {
        return Some(DateValue::Instant(Utc.from_utc_datetime(&t)));
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .map(|d| DateValue::Day(start_of_day(d)))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// A span of instants with independent lower and upper bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Bound<DateTime<Utc>>,
    pub end: Bound<DateTime<Utc>>,
}

impl DateWindow {
    /// Window selected by `field:<op>value` once the value is resolved.
    ///
    /// `>`/`<` exclude `at`, `>=`/`<=` include it. Equality covers the
    /// whole calendar day of `at`, half-open.
    pub fn for_op(op: CompareOp, at: DateTime<Utc>) -> Option<Self> {
        use Bound::{Excluded, Included, Unbounded};

        let (start, end) = match op {
            CompareOp::Gt => (Excluded(at), Unbounded),
            CompareOp::Gte => (Included(at), Unbounded),
            CompareOp::Lt => (Unbounded, Excluded(at)),
            CompareOp::Lte => (Unbounded, Included(at)),
            CompareOp::Equals => {
                let day = start_of_day(at.date_naive());
                let next = day.checked_add_days(Days::new(1))?;
                (Included(day), Excluded(next))
            }
            CompareOp::Prefix | CompareOp::Suffix => return None,
        };
        Some(Self { start, end })
    }

    /// Window selected by `field:<op>value` for a resolved value.
    ///
    /// A day is compared as a whole: `>` starts the next day and `<=`
    /// runs through the end of the day. Instants use [`DateWindow::for_op`].
    pub fn for_value(op: CompareOp, value: DateValue) -> Option<Self> {
        use Bound::{Excluded, Included, Unbounded};

        let day = match value {
            DateValue::Instant(at) => return Self::for_op(op, at),
            DateValue::Day(day) => day,
        };
        let next = day.checked_add_days(Days::new(1))?;
        let (start, end) = match op {
            CompareOp::Gt => (Included(next), Unbounded),
            CompareOp::Gte => (Included(day), Unbounded),
            CompareOp::Lt => (Unbounded, Excluded(day)),
            CompareOp::Lte => (Unbounded, Excluded(next)),
            CompareOp::Equals => (Included(day), Excluded(next)),
            CompareOp::Prefix | CompareOp::Suffix => return None,
        };
        Some(Self { start, end })
    }

    /// From `start` through the end of the calendar day holding `end`.
    pub fn through_day(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<Self> {
        let last_day = Self::for_op(CompareOp::Equals, end)?;
        Some(Self {
            start: Bound::Included(start),
            end: last_day.end,
        })
    }

    /// Inclusive window from optional bounds; `None` leaves a side open.
    pub fn from_options(
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            start: after.map_or(Bound::Unbounded, Bound::Included),
            end: before.map_or(Bound::Unbounded, Bound::Included),
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        let above = match self.start {
            Bound::Included(s) => t >= s,
            Bound::Excluded(s) => t > s,
            Bound::Unbounded => true,
        };
        let below = match self.end {
            Bound::Included(e) => t <= e,
            Bound::Excluded(e) => t < e,
            Bound::Unbounded => true,
        };
        above && below
    }
}
