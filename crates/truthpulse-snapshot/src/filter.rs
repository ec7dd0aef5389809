//! Record filters applied between stamping and writing.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::debug;
use truthpulse_core::Article;

use crate::calendar::ist_day_boundaries;

/// Keep the first article per `link`, dropping articles without one. Order is preserved.
pub fn dedupe_by_link(items: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|article| match article.key() {
            Some(link) => seen.insert(link.to_string()),
            None => {
                debug!(title = ?article.title, "dropping article without link");
                false
            }
        })
        .collect()
}

/// Keep articles whose `publishedAt` falls inside the IST day of `date`, inclusive.
pub fn filter_to_ist_day(items: Vec<Article>, date: NaiveDate) -> Vec<Article> {
    let bounds = ist_day_boundaries(date);
    items
        .into_iter()
        .filter(|article| match article.published_instant() {
            Some(ts) => bounds.contains(ts),
            None => {
                debug!(link = ?article.link, raw = ?article.published_at, "dropping article with unparseable publishedAt");
                false
            }
        })
        .collect()
}

/// Exact tag match (case-insensitive), or title/snippet mentioning the theme with
/// hyphens read as spaces.
pub fn matches_theme(article: &Article, theme: &str) -> bool {
    let theme = theme.to_lowercase();
    if article
        .theme
        .as_deref()
        .is_some_and(|tag| tag.to_lowercase() == theme)
    {
        return true;
    }
    article.search_text().contains(&theme.replace('-', " "))
}

pub fn filter_by_theme(items: &[Article], theme: &str) -> Vec<Article> {
    items
        .iter()
        .filter(|article| matches_theme(article, theme))
        .cloned()
        .collect()
}
