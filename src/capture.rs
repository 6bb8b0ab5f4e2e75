//! Per-post screenshot capture.
//!
//! Each in-period post is opened at its permalink and the post element is
//! captured with some padding. A failing post produces an error note and an
//! `error` entry; the rest of the batch carries on.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::browser::{evaluate, js_string, pause, Clip, LoadState, PageDriver};
use crate::channel::permalink_details;
use crate::constants::{post_url, CLIP_SELECTORS, POST_FALLBACK_SELECTORS, POST_SELECTOR};
use crate::report::{Post, Screenshot, ScreenshotKind};
use crate::store::SCREENSHOTS_DIR;

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub nav_timeout: Duration,
    /// Fixed wait after the permalink loaded.
    pub settle_delay: Duration,
    pub primary_wait: Duration,
    pub fallback_wait: Duration,
    /// Pixels added around the post element.
    pub padding: f64,
    pub pause_between: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(5),
            primary_wait: Duration::from_secs(10),
            fallback_wait: Duration::from_secs(5),
            padding: 20.0,
            pause_between: Duration::from_secs(1),
        }
    }
}

impl CaptureSettings {
    /// Same settings with every pause and element wait set to zero.
    #[must_use]
    pub fn without_delays(self) -> Self {
        Self {
            settle_delay: Duration::ZERO,
            primary_wait: Duration::ZERO,
            fallback_wait: Duration::ZERO,
            pause_between: Duration::ZERO,
            ..self
        }
    }
}

pub struct ScreenshotCapturer<'a> {
    page: &'a dyn PageDriver,
    settings: &'a CaptureSettings,
    dir: &'a Path,
}

impl<'a> ScreenshotCapturer<'a> {
    /// `dir` is the screenshots directory inside the store root.
    #[must_use]
    pub fn new(page: &'a dyn PageDriver, settings: &'a CaptureSettings, dir: &'a Path) -> Self {
        Self {
            page,
            settings,
            dir,
        }
    }

    /// Capture every post. Always returns exactly one entry per post.
    pub async fn capture_all(&self, username: &str, posts: &[Post]) -> Vec<Screenshot> {
        if posts.is_empty() {
            info!("No posts to capture");
            return Vec::new();
        }

        info!(count = posts.len(), "Capturing post screenshots");
        let mut screenshots = Vec::with_capacity(posts.len());

        for (index, post) in posts.iter().enumerate() {
            debug!(post_id = %post.id, n = index + 1, total = posts.len(), "Capturing post");

            let screenshot = match self.capture_one(username, post).await {
                Ok(s) => {
                    info!(post_id = %post.id, size = s.file_size, "Screenshot saved");
                    s
                }
                Err(e) => {
                    warn!(post_id = %post.id, error = %format!("{e:#}"), "Screenshot failed");
                    self.record_failure(username, post, &e).await
                }
            };
            screenshots.push(screenshot);

            if index + 1 < posts.len() {
                pause(self.settings.pause_between).await;
            }
        }

        let failed = screenshots
            .iter()
            .filter(|s| s.kind == ScreenshotKind::Error)
            .count();
        info!(total = screenshots.len(), failed, "Screenshot batch finished");
        screenshots
    }

    async fn capture_one(&self, username: &str, post: &Post) -> Result<Screenshot> {
        let url = post_url(username, &post.id);
        self.page
            .navigate(&url, LoadState::Load, self.settings.nav_timeout)
            .await
            .with_context(|| format!("failed to open {url}"))?;
        pause(self.settings.settle_delay).await;

        if let (Ok(title), Ok(current)) = (self.page.title().await, self.page.current_url().await) {
            debug!(title = ?title, url = ?current, "Permalink page");
        }

        self.wait_for_post().await?;

        let clip = self.locate_clip().await;
        if clip.is_none() {
            debug!(post_id = %post.id, "No post element with a size, capturing viewport");
        }
        let png = self
            .page
            .screenshot(clip)
            .await
            .context("failed to capture screenshot")?;

        let file_name = format!(
            "post_{username}_{}_{}.png",
            post.id,
            Utc::now().timestamp_millis()
        );
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, &png)
            .await
            .with_context(|| format!("failed to write screenshot to {}", path.display()))?;

        let (text, views, forwards, replies) = match self.page.content().await {
            Ok(html) => {
                let details = permalink_details(&html);
                (details.text, details.views, details.forwards, details.replies)
            }
            Err(e) => {
                debug!(error = %e, "Permalink content unavailable, using listing values");
                (
                    post.text.clone(),
                    post.views.clone(),
                    post.forwards.clone(),
                    post.replies.clone(),
                )
            }
        };

        Ok(Screenshot {
            id: post.id.clone(),
            kind: ScreenshotKind::Post,
            file_path: format!("{SCREENSHOTS_DIR}/{file_name}"),
            file_size: png.len() as u64,
            date: post.date.clone(),
            text,
            views,
            forwards,
            replies,
        })
    }

    async fn wait_for_post(&self) -> Result<()> {
        if self
            .page
            .wait_for_selector(POST_SELECTOR, self.settings.primary_wait)
            .await
            .is_ok()
        {
            return Ok(());
        }

        for selector in POST_FALLBACK_SELECTORS {
            if self
                .page
                .wait_for_selector(selector, self.settings.fallback_wait)
                .await
                .is_ok()
            {
                debug!(selector, "Post element found with fallback selector");
                return Ok(());
            }
        }

        anyhow::bail!("post element not found on page")
    }

    async fn locate_clip(&self) -> Option<Clip> {
        match evaluate::<Option<Clip>>(self.page, &clip_script()).await {
            Ok(clip) => clip
                .filter(Clip::has_area)
                .map(|c| c.padded(self.settings.padding)),
            Err(e) => {
                debug!(error = %e, "Failed to locate post element");
                None
            }
        }
    }

    async fn record_failure(&self, username: &str, post: &Post, err: &anyhow::Error) -> Screenshot {
        let file_name = format!(
            "error_post_{username}_{}_{}.txt",
            post.id,
            Utc::now().timestamp_millis()
        );
        let path = self.dir.join(&file_name);
        let body = format!("Error: {err:#}\n\nDetails:\n{err:?}\n");

        let file_size = match tokio::fs::write(&path, body.as_bytes()).await {
            Ok(()) => body.len() as u64,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to write error note");
                0
            }
        };

        Screenshot {
            id: post.id.clone(),
            kind: ScreenshotKind::Error,
            file_path: format!("{SCREENSHOTS_DIR}/{file_name}"),
            file_size,
            date: post.date.clone(),
            text: format!("Screenshot failed: {err:#}"),
            views: "0".to_string(),
            forwards: "0".to_string(),
            replies: "0".to_string(),
        }
    }
}

/// Document-space bounding box of the first sized post element, or `null`.
fn clip_script() -> String {
    let selectors: Vec<String> = CLIP_SELECTORS.iter().map(|s| js_string(s)).collect();
    format!(
        r"(() => {{
    for (const selector of [{}]) {{
        const el = document.querySelector(selector);
        if (!el) continue;
        const rect = el.getBoundingClientRect();
        if (rect.width > 0 && rect.height > 0) {{
            return {{ x: rect.x + window.scrollX, y: rect.y + window.scrollY, width: rect.width, height: rect.height }};
        }}
    }}
    return null;
}})()",
        selectors.join(", ")
    )
}
