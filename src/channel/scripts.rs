//! In-page scripts for the channel preview.
//!
//! Everything here depends on undocumented markup and is best-effort.

/// Number of rendered posts.
pub const COUNT_POSTS: &str = r#"document.querySelectorAll(".tgme_widget_message").length"#;

/// Jump to the top of the listing, which makes the page fetch older posts.
pub const SCROLL_TO_TOP: &str = r"(() => {
    window.scrollTo(0, 0);
    window.scrollBy(0, -2000);
    return true;
})()";

/// Aggressive upward scroll used during warm-up.
pub const WARM_UP_SCROLL: &str = r"(() => {
    window.scrollTo(0, 0);
    window.scrollBy(0, -3000);
    setTimeout(() => window.scrollBy(0, -2000), 100);
    return true;
})()";

/// Upward scroll for each iteration of the main loop.
pub const SCROLL_STEP: &str = r"(() => {
    window.scrollBy(0, -2000);
    window.scrollTo(0, 0);
    setTimeout(() => window.scrollBy(0, -1000), 500);
    return true;
})()";

/// Click whatever looks like the "Preview channel" button. Returns whether
/// something was clicked.
pub const PREVIEW_GATE: &str = r#"(() => {
    const visible = (el) => el && el.offsetParent !== null;
    const selectors = [
        'button[data-action="preview"]',
        ".tgme_action_button",
        'a[href*="preview"]',
        ".tgme_widget_message_wrap button",
        'button[class*="preview"]',
        'button[class*="action"]',
    ];
    for (const selector of selectors) {
        try {
            const button = document.querySelector(selector);
            if (visible(button)) {
                button.click();
                return true;
            }
        } catch (e) {}
    }
    for (const el of document.querySelectorAll("button, a")) {
        const text = (el.textContent || "").toLowerCase();
        if ((text.includes("preview") || text.includes("просмотр") || text.includes("канал")) && visible(el)) {
            el.click();
            return true;
        }
    }
    return false;
})()"#;

/// Second, looser pass over buttons and links when no posts showed up.
pub const PREVIEW_GATE_LOOSE: &str = r#"(() => {
    for (const el of document.querySelectorAll('button, a, [role="button"]')) {
        const text = (el.textContent || "").toLowerCase();
        const className = String(el.className || "").toLowerCase();
        const href = el.href || "";
        const candidate =
            text.includes("preview") ||
            text.includes("просмотр") ||
            text.includes("канал") ||
            text.includes("view") ||
            className.includes("preview") ||
            className.includes("action") ||
            href.includes("preview");
        if (candidate && el.offsetParent !== null) {
            el.click();
            return true;
        }
    }
    return false;
})()"#;
