//! Channel scraper.
//!
//! Drives a page through the channel's public preview: load the landing page
//! (with retries), get past the preview gate, open the `/s/` listing and
//! scroll upward until the requested window is loaded or loading stops.
//! Posts are then read from the page HTML.

pub mod extract;
mod scripts;

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::browser::{evaluate, pause, BrowserError, LoadState, PageDriver};
use crate::constants::{channel_listing_url, channel_url};
use crate::report::{DateRange, ScrapedChannel};

pub use extract::{parse_posts, permalink_details, post_dates, PostDetails};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("could not load {url} after {attempts} attempts: {source}")]
    Unreachable {
        url: String,
        attempts: u32,
        #[source]
        source: BrowserError,
    },
    #[error("expected channel '{expected}', browser is at '{actual}'")]
    WrongPage { expected: String, actual: String },
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Timeouts, delays and limits of the scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeSettings {
    pub nav_timeout: Duration,
    pub nav_retries: u32,
    pub nav_retry_delay: Duration,
    /// Timeout of the last-chance navigation with the looser load condition.
    pub fallback_timeout: Duration,
    /// Pause after the landing page loaded.
    pub settle_delay: Duration,
    /// Pause after clicking through the preview gate.
    pub gate_delay: Duration,
    pub gate_retry_delay: Duration,
    pub listing_timeout: Duration,
    /// How many times to wait for the listing to show more than
    /// `min_listing_posts`.
    pub listing_checks: u32,
    pub listing_delay: Duration,
    pub min_listing_posts: usize,
    pub warmup_scrolls: u32,
    pub warmup_delay: Duration,
    pub max_scrolls: u32,
    pub scroll_delay: Duration,
    /// Consecutive iterations without new posts before giving up.
    pub stall_limit: u32,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(120),
            nav_retries: 3,
            nav_retry_delay: Duration::from_secs(5),
            fallback_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(5),
            gate_delay: Duration::from_secs(3),
            gate_retry_delay: Duration::from_secs(2),
            listing_timeout: Duration::from_secs(60),
            listing_checks: 5,
            listing_delay: Duration::from_secs(3),
            min_listing_posts: 20,
            warmup_scrolls: 15,
            warmup_delay: Duration::from_secs(2),
            max_scrolls: 200,
            scroll_delay: Duration::from_secs(4),
            stall_limit: 3,
        }
    }
}

impl ScrapeSettings {
    /// Same limits with every pause set to zero.
    #[must_use]
    pub fn without_delays(self) -> Self {
        Self {
            nav_retry_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            gate_delay: Duration::ZERO,
            gate_retry_delay: Duration::ZERO,
            listing_delay: Duration::ZERO,
            warmup_delay: Duration::ZERO,
            scroll_delay: Duration::ZERO,
            ..self
        }
    }
}

/// Why the scroll loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// A loaded post falls inside the window.
    ReachedRange { iterations: u32 },
    /// The post count stopped growing.
    Stalled { iterations: u32 },
    /// Iteration budget used up.
    Exhausted { iterations: u32 },
}

/// Scrapes one channel through a [`PageDriver`].
pub struct ChannelScraper<'a> {
    page: &'a dyn PageDriver,
    settings: &'a ScrapeSettings,
}

impl<'a> ChannelScraper<'a> {
    #[must_use]
    pub fn new(page: &'a dyn PageDriver, settings: &'a ScrapeSettings) -> Self {
        Self { page, settings }
    }

    /// Load the channel and return every loaded post plus those in `range`.
    ///
    /// # Errors
    ///
    /// Fails if the channel page cannot be loaded or the browser ends up on
    /// an unrelated page. Gate handling and listing problems are logged and
    /// tolerated.
    pub async fn scrape(
        &self,
        username: &str,
        range: &DateRange,
    ) -> Result<ScrapedChannel, ScrapeError> {
        info!(channel = %username, start = %range.start(), end = %range.end(), "Scraping channel");

        self.open_channel(username).await?;
        self.verify_location(username).await?;
        pause(self.settings.settle_delay).await;

        self.pass_preview_gate().await;
        self.open_listing(username).await;
        self.warm_up().await;

        let outcome = self.scroll_to_range(range).await;
        info!(channel = %username, ?outcome, "Scrolling finished");

        self.collect(range).await
    }

    async fn open_channel(&self, username: &str) -> Result<(), ScrapeError> {
        let url = channel_url(username);
        let retries = self.settings.nav_retries;

        for attempt in 1..=retries {
            info!(attempt, max_attempts = retries, url = %url, "Loading channel page");
            match self
                .page
                .navigate(&url, LoadState::Load, self.settings.nav_timeout)
                .await
            {
                Ok(()) => {
                    info!(url = %url, "Channel page loaded");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Channel page load failed");
                    if attempt < retries {
                        pause(self.settings.nav_retry_delay).await;
                    }
                }
            }
        }

        warn!(url = %url, "Retrying channel page with a looser load condition");
        self.page
            .navigate(&url, LoadState::DomReady, self.settings.fallback_timeout)
            .await
            .map_err(|source| ScrapeError::Unreachable {
                url: url.clone(),
                attempts: retries + 1,
                source,
            })?;
        info!(url = %url, "Channel page loaded with fallback condition");
        Ok(())
    }

    async fn verify_location(&self, username: &str) -> Result<(), ScrapeError> {
        let title = self.page.title().await?.unwrap_or_default();
        let current = self.page.current_url().await?.unwrap_or_default();
        debug!(title = %title, url = %current, "Landing page");

        if current.to_lowercase().contains(&username.to_lowercase()) {
            Ok(())
        } else {
            Err(ScrapeError::WrongPage {
                expected: username.to_string(),
                actual: current,
            })
        }
    }

    async fn pass_preview_gate(&self) {
        if self.click(scripts::PREVIEW_GATE).await {
            info!("Clicked through preview gate");
            pause(self.settings.gate_delay).await;
        } else {
            debug!("No preview gate found");
        }

        let initial = self.post_count().await;
        debug!(posts = initial, "Posts after preview gate");
        if initial == 0 {
            pause(self.settings.gate_retry_delay).await;
            if self.click(scripts::PREVIEW_GATE_LOOSE).await {
                info!("Clicked through preview gate on second pass");
                pause(self.settings.gate_delay).await;
            }
        }
    }

    async fn open_listing(&self, username: &str) {
        let url = channel_listing_url(username);
        if let Err(e) = self
            .page
            .navigate(&url, LoadState::Load, self.settings.listing_timeout)
            .await
        {
            warn!(url = %url, error = %e, "Failed to open channel listing, continuing on current page");
            return;
        }

        let checks = self.settings.listing_checks;
        let mut count = 0;
        for attempt in 1..=checks {
            pause(self.settings.listing_delay).await;
            count = self.post_count().await;
            debug!(attempt, posts = count, "Listing post count");
            if count > self.settings.min_listing_posts {
                break;
            }
            if attempt < checks {
                self.run(scripts::SCROLL_TO_TOP).await;
                pause(self.settings.gate_retry_delay).await;
            }
        }

        if count <= self.settings.min_listing_posts {
            warn!(posts = count, "Listing shows few posts, relying on scrolling");
        } else {
            info!(posts = count, "Listing loaded");
        }
    }

    async fn warm_up(&self) {
        for pass in 0..self.settings.warmup_scrolls {
            self.run(scripts::WARM_UP_SCROLL).await;
            pause(self.settings.warmup_delay).await;
            if pass % 3 == 0 {
                let posts = self.post_count().await;
                debug!(pass = pass + 1, posts, "Warm-up scroll");
            }
        }
    }

    /// Scroll toward older posts until the window is reached, loading stalls
    /// or the iteration budget runs out.
    pub async fn scroll_to_range(&self, range: &DateRange) -> ScrollOutcome {
        let mut last_count = self.post_count().await;
        let mut stalled = 0;
        debug!(posts = last_count, "Starting scroll loop");

        for iteration in 1..=self.settings.max_scrolls {
            self.run(scripts::SCROLL_STEP).await;
            pause(self.settings.scroll_delay).await;

            if iteration % check_interval(iteration) == 0 && self.window_reached(range).await {
                return ScrollOutcome::ReachedRange { iterations: iteration };
            }

            let count = self.post_count().await;
            if count == last_count {
                stalled += 1;
                debug!(iteration, stalled, "No new posts loaded");
                if stalled >= self.settings.stall_limit {
                    return ScrollOutcome::Stalled { iterations: iteration };
                }
            } else {
                stalled = 0;
                debug!(iteration, loaded = count.saturating_sub(last_count), "New posts loaded");
            }
            last_count = count;
        }

        ScrollOutcome::Exhausted {
            iterations: self.settings.max_scrolls,
        }
    }

    async fn window_reached(&self, range: &DateRange) -> bool {
        let html = match self.page.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Failed to read page while checking dates");
                return false;
            }
        };
        let dates = post_dates(&html);
        debug!(
            posts = dates.len(),
            earliest = ?dates.iter().min(),
            latest = ?dates.iter().max(),
            "Checked loaded dates"
        );
        dates.iter().any(|d| range.contains(*d))
    }

    async fn collect(&self, range: &DateRange) -> Result<ScrapedChannel, ScrapeError> {
        let html = self.page.content().await?;
        let posts = parse_posts(&html);
        let total_posts = posts.len();
        let in_period: Vec<_> = posts
            .into_iter()
            .filter(|p| range.contains_datetime(&p.date))
            .collect();

        info!(total = total_posts, in_period = in_period.len(), "Extracted posts");
        Ok(ScrapedChannel {
            total_posts,
            in_period,
        })
    }

    async fn post_count(&self) -> usize {
        evaluate::<usize>(self.page, scripts::COUNT_POSTS)
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "Failed to count posts");
                0
            })
    }

    async fn click(&self, script: &str) -> bool {
        evaluate::<bool>(self.page, script).await.unwrap_or(false)
    }

    async fn run(&self, script: &str) {
        if let Err(e) = self.page.evaluate_json(script).await {
            debug!(error = %e, "Scroll script failed");
        }
    }
}

/// Dates are checked every 5 iterations early on, every 10 afterwards.
const fn check_interval(iteration: u32) -> u32 {
    if iteration <= 20 {
        5
    } else {
        10
    }
}
