use serde::Deserialize;
use thiserror::Error;
use url::Url;

use super::period::{parse_calendar_date, DateRange};

const CHANNEL_HOSTS: &[&str] = &["t.me", "telegram.me"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("channelUrl, startDate and endDate are required")]
    MissingFields,
    #[error("invalid {field}: expected YYYY-MM-DD, got '{value}'")]
    InvalidDate { field: &'static str, value: String },
    #[error("could not derive a channel name from '{0}'")]
    InvalidChannel(String),
    #[error("date range covers {days} days, the limit is {max}")]
    RangeTooLong { days: i64, max: i64 },
}

/// Body of `POST /api/reports` as sent by the frontend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub channel_url: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// A validated report request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub channel_url: String,
    pub username: String,
    pub range: DateRange,
}

impl CreateReportRequest {
    /// Check required fields and parse dates.
    ///
    /// An inverted range is accepted and simply matches no posts.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing the first problem found.
    pub fn validate(&self, max_range_days: i64) -> Result<ReportRequest, ValidationError> {
        let (Some(channel_url), Some(start), Some(end)) = (
            non_blank(self.channel_url.as_deref()),
            non_blank(self.start_date.as_deref()),
            non_blank(self.end_date.as_deref()),
        ) else {
            return Err(ValidationError::MissingFields);
        };

        let start_date = parse_calendar_date(start).ok_or_else(|| ValidationError::InvalidDate {
            field: "startDate",
            value: start.to_string(),
        })?;
        let end_date = parse_calendar_date(end).ok_or_else(|| ValidationError::InvalidDate {
            field: "endDate",
            value: end.to_string(),
        })?;

        let range = DateRange::new(start_date, end_date);
        if range.days() > max_range_days {
            return Err(ValidationError::RangeTooLong {
                days: range.days(),
                max: max_range_days,
            });
        }

        let username = channel_username(channel_url)
            .ok_or_else(|| ValidationError::InvalidChannel(channel_url.to_string()))?;

        Ok(ReportRequest {
            channel_url: channel_url.to_string(),
            username,
            range,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Derive the channel handle from a `t.me` link or an `@handle`.
///
/// Accepts `https://t.me/name`, `t.me/s/name`, `@name` and bare `name`.
#[must_use]
pub fn channel_username(input: &str) -> Option<String> {
    let input = input.trim();

    let path = if input.contains("://") {
        let url = Url::parse(input).ok()?;
        if !url.host_str().is_some_and(is_channel_host) {
            return None;
        }
        url.path().to_string()
    } else {
        let without_host = input
            .strip_prefix("t.me/")
            .or_else(|| input.strip_prefix("telegram.me/"))
            .unwrap_or(input);
        without_host
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string()
    };

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let mut first = segments.next()?;
    if first == "s" {
        first = segments.next()?;
    }

    let name = first.trim_start_matches('@');
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    Some(name.to_string())
}

/// Hosts that serve channel pages.
fn is_channel_host(host: &str) -> bool {
    let host = host.strip_prefix("www.").unwrap_or(host);
    CHANNEL_HOSTS.iter().any(|h| host.eq_ignore_ascii_case(h))
}
