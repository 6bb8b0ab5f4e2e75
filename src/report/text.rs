use once_cell::sync::Lazy;
use regex::Regex;

/// Emoji blocks removed from post text: emoticons, pictographs, transport,
/// regional indicators, misc symbols and dingbats.
static EMOJI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}\x{1F1E0}-\x{1F1FF}\x{2600}-\x{26FF}\x{2700}-\x{27BF}]",
    )
    .expect("valid regex")
});

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip emoji and links from post text and collapse whitespace.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let without_emoji = EMOJI_RE.replace_all(text, "");
    let without_urls = URL_RE.replace_all(&without_emoji, "");
    WHITESPACE_RE
        .replace_all(&without_urls, " ")
        .trim()
        .to_string()
}
