use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Post;

/// Character statistics over in-period posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_chars: usize,
    pub avg_chars: usize,
    pub posts_with_text: usize,
}

impl Stats {
    #[must_use]
    pub fn from_posts(posts: &[Post]) -> Self {
        let total_chars: usize = posts.iter().map(|p| p.char_count).sum();
        let count = posts.len();
        let avg_chars = if count == 0 {
            0
        } else {
            (total_chars as f64 / count as f64).round() as usize
        };
        Self {
            total_chars,
            avg_chars,
            posts_with_text: count,
        }
    }
}

/// Group posts by UTC calendar day (`YYYY-MM-DD`), keeping page order inside
/// each day. Posts with an unparseable date are dropped.
#[must_use]
pub fn group_by_date(posts: Vec<Post>) -> BTreeMap<String, Vec<Post>> {
    let mut grouped: BTreeMap<String, Vec<Post>> = BTreeMap::new();
    for post in posts {
        if let Some(day) = post.calendar_date() {
            grouped
                .entry(day.format("%Y-%m-%d").to_string())
                .or_default()
                .push(post);
        }
    }
    grouped
}
