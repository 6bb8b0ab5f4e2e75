//! Server-rendered shell of the single-page frontend.
//!
//! The page only carries markup; `static/app.js` fills it in from the JSON
//! API.

use maud::{html, Markup, PreEscaped, DOCTYPE};

const SITE_NAME: &str = "Telegram Post Reporter";

/// Runs in `<head>` so the stored theme applies before the body paints.
const THEME_INIT_SCRIPT: &str = r#"(function() {
    var theme = localStorage.getItem('theme');
    if (theme) {
        document.documentElement.setAttribute('data-theme', theme);
    } else if (window.matchMedia('(prefers-color-scheme: dark)').matches) {
        document.documentElement.setAttribute('data-theme', 'dark');
    }
})();"#;

/// Base page layout.
#[derive(Debug, Clone, Copy)]
pub struct BaseLayout<'a> {
    title: &'a str,
}

impl<'a> BaseLayout<'a> {
    #[must_use]
    pub fn new(title: &'a str) -> Self {
        Self { title }
    }

    /// Render the complete HTML page with `content` inside `<main>`.
    #[must_use]
    pub fn render(self, content: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" data-theme="light" {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    meta name="color-scheme" content="light dark";
                    title { (self.title) " - " (SITE_NAME) }
                    link rel="stylesheet" href="/static/style.css";
                    script { (PreEscaped(THEME_INIT_SCRIPT)) }
                }
                body {
                    header class="container" {
                        nav {
                            a href="/" { strong class="site-logo" { (SITE_NAME) } }
                            button
                                id="theme-toggle"
                                class="theme-toggle"
                                type="button"
                                title="Toggle dark mode"
                                aria-label="Toggle dark mode" { "🌓" }
                        }
                    }
                    main class="container" {
                        (content)
                    }
                    footer class="container" {
                        small { "Screenshots are taken from the public t.me preview of each channel." }
                    }
                    script src="/static/app.js" {}
                }
            }
        }
    }
}

/// The report form, the list of submitted reports and the report viewer.
#[must_use]
pub fn render_index() -> Markup {
    let content = html! {
        section id="request" class="card" {
            h1 { "Channel report" }
            p class="muted" {
                "Collect every post a public channel published in a date range, "
                "with a screenshot of each one."
            }
            form id="report-form" novalidate {
                label for="channel-url" { "Channel" }
                input
                    id="channel-url"
                    name="channelUrl"
                    type="text"
                    placeholder="https://t.me/channel or @channel"
                    autocomplete="off"
                    required;
                div class="grid" {
                    div {
                        label for="start-date" { "From" }
                        input id="start-date" name="startDate" type="date" required;
                    }
                    div {
                        label for="end-date" { "To" }
                        input id="end-date" name="endDate" type="date" required;
                    }
                }
                button id="submit-button" type="submit" { "Create report" }
            }
            div id="form-error" class="alert alert-error" role="alert" hidden {}
        }

        section id="reports" class="card" {
            h2 { "My reports" }
            p id="reports-empty" class="muted" { "No reports yet. Create one above." }
            ul id="report-list" class="report-list" {}
            p class="muted" {
                "Scrolling through a channel and taking screenshots can take several minutes. "
                "Reports refresh on their own until they finish."
            }
        }

        section id="report" hidden {
            div class="report-header" {
                h2 id="report-title" {}
                p id="report-period" class="muted" {}
                button id="close-report" type="button" class="secondary" { "Close" }
            }
            div id="report-error" class="alert alert-error" hidden {}
            dl id="report-summary" class="summary" {}
            div id="report-posts" {}
        }

        template id="post-template" {
            article class="post" {
                header class="post-header" {
                    span class="post-time" {}
                    span class="post-counters muted" {}
                }
                div class="post-text" {}
                div class="post-actions" {
                    button type="button" class="copy-button secondary" { "Copy text" }
                    a class="download-link" download { "Download" }
                }
                div class="post-media" {}
            }
        }
    };

    BaseLayout::new("Create report").render(content)
}
