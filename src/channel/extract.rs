//! Post extraction from channel preview markup.
//!
//! Operates on serialized page HTML so the selectors can be checked against
//! saved pages.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::constants::{POST_SELECTOR, TEXT_SELECTORS};
use crate::report::{clean_text, Post};

static POST: Lazy<Selector> = Lazy::new(|| selector(POST_SELECTOR));
static DATE: Lazy<Selector> = Lazy::new(|| selector(".tgme_widget_message_date time"));
static VIEWS: Lazy<Selector> = Lazy::new(|| selector(".tgme_widget_message_views"));
static FORWARDS: Lazy<Selector> = Lazy::new(|| selector(".tgme_widget_message_forwards"));
static REPLIES: Lazy<Selector> = Lazy::new(|| selector(".tgme_widget_message_replies"));
static TEXT: Lazy<Vec<Selector>> =
    Lazy::new(|| TEXT_SELECTORS.iter().map(|s| selector(s)).collect());

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

/// Engagement counters and text read from a single post element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDetails {
    pub text: String,
    pub views: String,
    pub forwards: String,
    pub replies: String,
}

/// Extract every post that carries both an id and a datetime.
#[must_use]
pub fn parse_posts(html: &str) -> Vec<Post> {
    let document = Html::parse_document(html);
    document.select(&POST).filter_map(post_from_element).collect()
}

/// Calendar days of all loaded posts, used to decide whether scrolling has
/// reached the requested window.
#[must_use]
pub fn post_dates(html: &str) -> Vec<NaiveDate> {
    parse_posts(html)
        .iter()
        .filter_map(Post::calendar_date)
        .collect()
}

/// Text and counters of the first post on a permalink page.
#[must_use]
pub fn permalink_details(html: &str) -> PostDetails {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let text = TEXT
        .iter()
        .filter_map(|sel| first_text(root, sel))
        .find(|t| !t.is_empty())
        .unwrap_or_default();

    let scope = document.select(&POST).next().unwrap_or(root);
    PostDetails {
        text,
        views: counter(scope, &VIEWS),
        forwards: counter(scope, &FORWARDS),
        replies: counter(scope, &REPLIES),
    }
}

fn post_from_element(element: ElementRef<'_>) -> Option<Post> {
    let full_id = element.value().attr("data-post")?;
    let id = full_id.rsplit('/').next().filter(|s| !s.is_empty())?;

    let time = element.select(&DATE).next()?;
    let date = time.value().attr("datetime")?.trim();
    if date.is_empty() {
        return None;
    }

    let text = element
        .select(&TEXT[0])
        .next()
        .map(element_text)
        .unwrap_or_default();
    let clean = clean_text(&text);

    Some(Post {
        id: id.to_string(),
        date: date.to_string(),
        display: element_text(time),
        char_count: clean.chars().count(),
        text,
        clean_text: clean,
        views: counter(element, &VIEWS),
        forwards: counter(element, &FORWARDS),
        replies: counter(element, &REPLIES),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope.select(sel).next().map(element_text)
}

fn counter(scope: ElementRef<'_>, sel: &Selector) -> String {
    first_text(scope, sel)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "0".to_string())
}
