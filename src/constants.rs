//! Shared constants used across the application.

/// User agent string used for the headless browser.
///
/// A regular desktop Chrome user agent; the channel preview serves a reduced
/// page to obvious automation.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Public base URL of channel pages and post permalinks.
pub const TELEGRAM_BASE_URL: &str = "https://t.me";

/// Hosts whose network traffic is logged while scraping.
pub const TELEGRAM_HOSTS: &[&str] = &["t.me", "api.telegram.org"];

/// One rendered post in channel and permalink pages.
pub const POST_SELECTOR: &str = ".tgme_widget_message";

/// Fallbacks tried when a permalink page shows no post element.
pub const POST_FALLBACK_SELECTORS: &[&str] = &[
    ".tgme_widget_message_wrap",
    ".tgme_widget_message_text",
    ".tgme_page_widget",
    "body",
];

/// Elements whose bounding box is used for post screenshots, in order.
pub const CLIP_SELECTORS: &[&str] = &[
    ".tgme_widget_message",
    ".tgme_widget_message_wrap",
    ".tgme_page_widget",
    ".tgme_widget_message_text",
];

/// Places the post text can live in, in order.
pub const TEXT_SELECTORS: &[&str] = &[
    ".tgme_widget_message_text",
    ".tgme_widget_message_text_wrap",
    ".tgme_widget_message_text_wrap .js-message_text",
    ".tgme_widget_message .js-message_text",
];

/// Listing page URL for a channel (`/s/<name>`), which loads older posts
/// on scroll.
#[must_use]
pub fn channel_listing_url(username: &str) -> String {
    format!("{TELEGRAM_BASE_URL}/s/{username}")
}

/// Landing page URL for a channel.
#[must_use]
pub fn channel_url(username: &str) -> String {
    format!("{TELEGRAM_BASE_URL}/{username}")
}

/// Permalink of a single post.
#[must_use]
pub fn post_url(username: &str, post_id: &str) -> String {
    format!("{TELEGRAM_BASE_URL}/{username}/{post_id}")
}

/// Whether a URL belongs to one of [`TELEGRAM_HOSTS`].
#[must_use]
pub fn is_telegram_url(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .is_some_and(|host| {
            TELEGRAM_HOSTS
                .iter()
                .any(|h| host == *h || host.ends_with(&format!(".{h}")))
        })
}
