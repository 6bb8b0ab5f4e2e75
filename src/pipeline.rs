//! Background report processing.
//!
//! A pending report is driven through scrape and capture on its own browser
//! session and persisted as `done` or `failed`. Errors never escape the
//! pipeline; they end up in the report.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::browser::{PageDriver, PageFactory};
use crate::capture::{CaptureSettings, ScreenshotCapturer};
use crate::channel::{ChannelScraper, ScrapeSettings};
use crate::report::{Report, ScrapedChannel, Screenshot};
use crate::store::ReportStore;

pub struct ReportPipeline {
    store: ReportStore,
    pages: Arc<dyn PageFactory>,
    scrape: ScrapeSettings,
    capture: CaptureSettings,
}

impl ReportPipeline {
    #[must_use]
    pub fn new(
        store: ReportStore,
        pages: Arc<dyn PageFactory>,
        scrape: ScrapeSettings,
        capture: CaptureSettings,
    ) -> Self {
        Self {
            store,
            pages,
            scrape,
            capture,
        }
    }

    #[must_use]
    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    /// Process a pending report and persist the outcome.
    ///
    /// Returns the final report as written. Storage failures are logged; the
    /// returned value still reflects what was attempted.
    #[instrument(skip_all, fields(report_id = %report.id, channel = %report.channel_username))]
    pub async fn run(&self, report: Report) -> Report {
        let report = report.processing();
        if let Err(e) = self.store.save(&report).await {
            error!(error = %e, "Failed to mark report as processing");
        }

        let started = Instant::now();
        let finished = match self.execute(&report).await {
            Ok((scraped, screenshots)) => {
                info!(
                    total_posts = scraped.total_posts,
                    in_period = scraped.in_period.len(),
                    screenshots = screenshots.len(),
                    elapsed_secs = started.elapsed().as_secs(),
                    "Report completed"
                );
                report.complete(scraped, screenshots, Utc::now())
            }
            Err(e) => {
                error!(
                    error = %format!("{e:#}"),
                    elapsed_secs = started.elapsed().as_secs(),
                    "Report failed"
                );
                report.fail(format!("{e:#}"), Utc::now())
            }
        };

        if let Err(e) = self.store.save(&finished).await {
            error!(error = %e, "Failed to save finished report");
        }
        finished
    }

    /// Run a report in the background.
    ///
    /// The run happens on its own task. If that task panics, the report is
    /// saved as `failed` so its id still resolves to a final state.
    pub fn spawn(self: Arc<Self>, report: Report) -> JoinHandle<Report> {
        tokio::spawn(async move {
            let fallback = report.clone();
            let pipeline = Arc::clone(&self);
            match tokio::spawn(async move { pipeline.run(report).await }).await {
                Ok(finished) => finished,
                Err(e) => {
                    error!(report_id = %fallback.id, error = %e, "Report task aborted");
                    let failed = fallback.fail(format!("report task aborted: {e}"), Utc::now());
                    if let Err(e) = self.store.save(&failed).await {
                        error!(report_id = %failed.id, error = %e, "Failed to save aborted report");
                    }
                    failed
                }
            }
        })
    }

    async fn execute(&self, report: &Report) -> Result<(ScrapedChannel, Vec<Screenshot>)> {
        let page = self
            .pages
            .open_page()
            .await
            .context("failed to start browser session")?;

        let result = self.scrape_and_capture(page.as_ref(), report).await;
        page.close().await;
        result
    }

    async fn scrape_and_capture(
        &self,
        page: &dyn PageDriver,
        report: &Report,
    ) -> Result<(ScrapedChannel, Vec<Screenshot>)> {
        let username = report.channel_username.as_str();
        let scraped = ChannelScraper::new(page, &self.scrape)
            .scrape(username, &report.range())
            .await
            .with_context(|| format!("failed to scrape channel {username}"))?;

        let dir = self.store.screenshots_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let screenshots = ScreenshotCapturer::new(page, &self.capture, &dir)
            .capture_all(username, &scraped.in_period)
            .await;

        Ok((scraped, screenshots))
    }
}
