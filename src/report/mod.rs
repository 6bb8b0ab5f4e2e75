//! Report data model.
//!
//! A report is the persisted result of one scrape request: post metadata for
//! the requested date window, one screenshot entry per in-period post and a
//! few aggregate counters. Field names follow the JSON the frontend reads.

mod period;
mod request;
mod summary;
mod text;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub use period::{parse_calendar_date, DateRange};
pub use request::{channel_username, CreateReportRequest, ReportRequest, ValidationError};
pub use summary::{group_by_date, Stats};
pub use text::clean_text;

/// Numeric report identifier, derived from the creation timestamp in
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(u64);

impl ReportId {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Id for a report created at `at`.
    #[must_use]
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(u64::try_from(at.timestamp_millis()).unwrap_or_default())
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The next candidate id, used when two requests land in the same
    /// millisecond.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReportId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Lifecycle of a report as persisted in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Accepted, background work not started yet.
    Pending,
    /// Browser session running.
    Processing,
    /// Scrape finished and the full body is stored.
    Done,
    /// Scrape aborted; `error` holds the reason.
    Failed,
}

impl ReportStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// One post extracted from the channel listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Numeric suffix of the page's `data-post` attribute.
    pub id: String,
    /// ISO datetime exactly as published in the page.
    pub date: String,
    /// Human-readable time shown next to the post.
    pub display: String,
    pub text: String,
    pub clean_text: String,
    pub char_count: usize,
    pub views: String,
    pub forwards: String,
    pub replies: String,
}

impl Post {
    /// UTC calendar day the post was published on, if the date parses.
    #[must_use]
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        period::datetime_calendar_date(&self.date)
    }
}

/// Whether a screenshot entry holds an image or a failure note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotKind {
    Post,
    Error,
}

/// Screenshot attempt for one in-period post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ScreenshotKind,
    /// Path relative to the uploads directory.
    pub file_path: String,
    pub file_size: u64,
    pub date: String,
    pub text: String,
    pub views: String,
    pub forwards: String,
    pub replies: String,
}

/// Output of the channel scraper that feeds a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapedChannel {
    /// Number of posts that were loaded on the listing page.
    pub total_posts: usize,
    /// Posts inside the requested window, in page order.
    pub in_period: Vec<Post>,
}

/// Persisted report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub channel_url: String,
    pub channel_username: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_posts: usize,
    pub posts_in_period: usize,
    pub posts_details: BTreeMap<String, Vec<Post>>,
    pub screenshots: Vec<Screenshot>,
    pub stats: Stats,
}

impl Report {
    /// A freshly accepted report with no results yet.
    #[must_use]
    pub fn pending(id: ReportId, request: &ReportRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: ReportStatus::Pending,
            error: None,
            channel_url: request.channel_url.clone(),
            channel_username: request.username.clone(),
            start_date: request.range.start(),
            end_date: request.range.end(),
            created_at,
            completed_at: None,
            total_posts: 0,
            posts_in_period: 0,
            posts_details: BTreeMap::new(),
            screenshots: Vec::new(),
            stats: Stats::default(),
        }
    }

    #[must_use]
    pub fn processing(mut self) -> Self {
        self.status = ReportStatus::Processing;
        self
    }

    /// Fill in scrape results and mark the report done.
    #[must_use]
    pub fn complete(
        mut self,
        scraped: ScrapedChannel,
        screenshots: Vec<Screenshot>,
        at: DateTime<Utc>,
    ) -> Self {
        self.status = ReportStatus::Done;
        self.error = None;
        self.total_posts = scraped.total_posts;
        self.posts_in_period = scraped.in_period.len();
        self.stats = Stats::from_posts(&scraped.in_period);
        self.posts_details = group_by_date(scraped.in_period);
        self.screenshots = screenshots;
        self.completed_at = Some(at);
        self
    }

    /// Mark the report failed. Results are cleared so a failed report always
    /// carries zero posts.
    #[must_use]
    pub fn fail(mut self, error: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.status = ReportStatus::Failed;
        self.error = Some(error.into());
        self.total_posts = 0;
        self.posts_in_period = 0;
        self.posts_details.clear();
        self.screenshots.clear();
        self.stats = Stats::default();
        self.completed_at = Some(at);
        self
    }

    #[must_use]
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, date: &str, clean: &str) -> Post {
        Post {
            id: id.to_string(),
            date: date.to_string(),
            display: "10:00".to_string(),
            text: clean.to_string(),
            clean_text: clean.to_string(),
            char_count: clean.chars().count(),
            views: "1.2K".to_string(),
            forwards: "0".to_string(),
            replies: "0".to_string(),
        }
    }

    fn request() -> ReportRequest {
        CreateReportRequest {
            channel_url: Some("https://t.me/example".to_string()),
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-01-02".to_string()),
        }
        .validate(366)
        .unwrap()
    }

    #[test]
    fn test_report_id_from_timestamp() {
        let at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(ReportId::from_timestamp(at).get(), 1_704_067_200_000);
        assert_eq!("42".parse::<ReportId>().unwrap(), ReportId::new(42));
        assert!("abc".parse::<ReportId>().is_err());
    }

    #[test]
    fn test_pending_report_serializes_status() {
        let report = Report::pending(ReportId::new(7), &request(), Utc::now());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["id"], 7);
        assert_eq!(json["start_date"], "2024-01-01");
        assert_eq!(json["channel_username"], "example");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_complete_groups_posts_and_counts() {
        let scraped = ScrapedChannel {
            total_posts: 10,
            in_period: vec![
                post("1", "2024-01-01T08:00:00+00:00", "hello"),
                post("2", "2024-01-02T09:00:00+00:00", "world!"),
                post("3", "2024-01-02T23:59:00+00:00", ""),
            ],
        };
        let report = Report::pending(ReportId::new(1), &request(), Utc::now())
            .processing()
            .complete(scraped, Vec::new(), Utc::now());

        assert_eq!(report.status, ReportStatus::Done);
        assert_eq!(report.total_posts, 10);
        assert_eq!(report.posts_in_period, 3);
        assert_eq!(report.posts_details["2024-01-01"].len(), 1);
        assert_eq!(report.posts_details["2024-01-02"].len(), 2);
        assert_eq!(report.stats.total_chars, 11);
        assert_eq!(report.stats.posts_with_text, 3);
        assert_eq!(report.stats.avg_chars, 4);
    }

    #[test]
    fn test_fail_clears_results() {
        let scraped = ScrapedChannel {
            total_posts: 1,
            in_period: vec![post("1", "2024-01-01T08:00:00+00:00", "x")],
        };
        let report = Report::pending(ReportId::new(1), &request(), Utc::now())
            .complete(scraped, Vec::new(), Utc::now())
            .fail("browser crashed", Utc::now());

        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("browser crashed"));
        assert_eq!(report.posts_in_period, 0);
        assert!(report.posts_details.is_empty());
        assert!(report.status.is_terminal());
    }

    #[test]
    fn test_screenshot_kind_serializes_as_type() {
        let shot = Screenshot {
            id: "5".to_string(),
            kind: ScreenshotKind::Error,
            file_path: "screenshots/error_post_example_5_1.txt".to_string(),
            file_size: 12,
            date: "2024-01-01T08:00:00+00:00".to_string(),
            text: "Screenshot failed: timeout".to_string(),
            views: "0".to_string(),
            forwards: "0".to_string(),
            replies: "0".to_string(),
        };
        let json = serde_json::to_value(&shot).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["file_size"], 12);
    }

    #[test]
    fn test_post_uses_camel_case_fields() {
        let json = serde_json::to_value(post("9", "2024-01-01T00:00:00Z", "abc")).unwrap();
        assert_eq!(json["cleanText"], "abc");
        assert_eq!(json["charCount"], 3);
    }
}
