use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Inclusive calendar-day window. Time of day never matters.
///
/// A window whose start is after its end is allowed and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Number of calendar days covered, zero for an inverted window.
    #[must_use]
    pub fn days(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).num_days() + 1
        }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Whether an ISO datetime string falls on a day inside the window.
    /// Unparseable values are never inside.
    #[must_use]
    pub fn contains_datetime(&self, value: &str) -> bool {
        datetime_calendar_date(value).is_some_and(|d| self.contains(d))
    }
}

/// Parse a request date: `YYYY-MM-DD`, or an ISO datetime truncated to its
/// calendar day.
#[must_use]
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| datetime_calendar_date(value))
}

/// UTC calendar day of an ISO datetime as published in channel pages.
pub(crate) fn datetime_calendar_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|dt| dt.date())
        .ok()
}
