//! Day rotation and synthetic publish-time stamping.

use std::sync::Mutex;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;
use truthpulse_core::{format_timestamp, Article, PulseCard};

use crate::calendar::ist_to_utc;

/// First IST hour handed out by the stamper.
pub const FIRST_STAMP_HOUR: u32 = 6;
/// Width of the stamped window in hours (06:00 to 22:00 IST).
pub const STAMP_HOUR_SPAN: usize = 16;

/// Supplies the minute component of stamped publish times.
pub trait MinuteSource: Send + Sync {
    fn next_minute(&self) -> u32;
}

/// Uniform minute in `0..60` from the thread-local RNG.
#[derive(Debug, Default)]
pub struct RandomMinutes;

impl MinuteSource for RandomMinutes {
    fn next_minute(&self) -> u32 {
        rand::rng().random_range(0..60)
    }
}

/// Reproducible minutes for a given seed.
#[derive(Debug)]
pub struct SeededMinutes {
    rng: Mutex<StdRng>,
}

impl SeededMinutes {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl MinuteSource for SeededMinutes {
    fn next_minute(&self) -> u32 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.random_range(0..60)
    }
}

/// Always the same minute.
#[derive(Debug, Clone, Copy)]
pub struct FixedMinute(pub u32);

impl MinuteSource for FixedMinute {
    fn next_minute(&self) -> u32 {
        self.0
    }
}

/// `day_index mod len`, normalized into `[0, len)` for negative indices.
pub fn rotation_offset(day_index: i64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    day_index.rem_euclid(len as i64) as usize
}

/// Circular left shift by [`rotation_offset`].
pub fn rotate<T: Clone>(pool: &[T], day_index: i64) -> Vec<T> {
    let offset = rotation_offset(day_index, pool.len());
    pool[offset..]
        .iter()
        .chain(pool[..offset].iter())
        .cloned()
        .collect()
}

/// IST hour for position `index` of `total`, spread over the stamp window.
pub fn stamp_hour(index: usize, total: usize) -> u32 {
    if total == 0 {
        return FIRST_STAMP_HOUR;
    }
    FIRST_STAMP_HOUR + (index * STAMP_HOUR_SPAN / total) as u32
}

/// Rotate the pool for `day_index` and re-stamp every `publishedAt` onto `date`.
///
/// Output length always equals input length. A minute the source hands out that
/// does not form a valid time leaves the article without `publishedAt`.
pub fn prepare_articles(
    pool: &[Article],
    date: NaiveDate,
    day_index: i64,
    minutes: &dyn MinuteSource,
) -> Vec<Article> {
    let total = pool.len();
    rotate(pool, day_index)
        .into_iter()
        .enumerate()
        .map(|(i, mut article)| {
            let hour = stamp_hour(i, total);
            let minute = minutes.next_minute();
            let stamp = match date.and_hms_opt(hour, minute, 0) {
                Some(local) => Some(format_timestamp(ist_to_utc(local))),
                None => {
                    warn!(%date, hour, minute, link = ?article.link, "could not build publish stamp");
                    None
                }
            };
            article.set_published_at(stamp);
            article
        })
        .collect()
}

/// Rotate pulse cards like articles and label each with `date`.
pub fn prepare_pulse_cards(cards: &[PulseCard], date: NaiveDate, day_index: i64) -> Vec<PulseCard> {
    let label = date.format("%Y-%m-%d").to_string();
    rotate(cards, day_index)
        .into_iter()
        .map(|mut card| {
            card.date_label = Some(label.clone());
            card
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{ist_date_at, parse_ist_date};
    use truthpulse_core::BaseRecord;

    fn pool(n: usize) -> Vec<Article> {
        (0..n)
            .map(|i| Article {
                title: Some(format!("story {i}")),
                link: Some(format!("https://news.example.com/{i}")),
                published_at: Some("2020-01-01T00:00:00.000Z".into()),
                ..Default::default()
            })
            .collect()
    }

    fn links(items: &[Article]) -> Vec<String> {
        items.iter().filter_map(|a| a.link.clone()).collect()
    }

    fn day(s: &str) -> NaiveDate {
        parse_ist_date(s).expect("date")
    }

    #[test]
    fn rotation_wraps_and_normalizes_negative_indices() {
        assert_eq!(rotation_offset(0, 3), 0);
        assert_eq!(rotation_offset(3, 3), 0);
        assert_eq!(rotation_offset(4, 3), 1);
        assert_eq!(rotation_offset(-1, 3), 2);
        assert_eq!(rotation_offset(-4, 3), 2);
        assert_eq!(rotation_offset(7, 0), 0);
        assert_eq!(rotate(&[1, 2, 3, 4], 1), vec![2, 3, 4, 1]);
        assert_eq!(rotate(&[1, 2, 3, 4], -1), vec![4, 1, 2, 3]);
    }

    #[test]
    fn full_cycle_restores_original_order() {
        let pool = pool(3);
        let first = prepare_articles(&pool, day("2025-11-14"), 0, &FixedMinute(0));
        let cycled = prepare_articles(&pool, day("2025-11-17"), 3, &FixedMinute(0));
        assert_eq!(links(&first), links(&pool));
        assert_eq!(links(&cycled), links(&pool));
    }

    #[test]
    fn different_offsets_change_leading_article() {
        let pool = pool(5);
        let a = prepare_articles(&pool, day("2026-02-14"), 1, &RandomMinutes);
        let b = prepare_articles(&pool, day("2026-02-15"), 2, &RandomMinutes);
        assert_ne!(a[0].link, b[0].link);
        assert_eq!(a.len(), pool.len());
        assert_eq!(b.len(), pool.len());
    }

    #[test]
    fn hours_spread_across_business_window() {
        assert_eq!(stamp_hour(0, 1), 6);
        assert_eq!(stamp_hour(0, 16), 6);
        assert_eq!(stamp_hour(15, 16), 21);
        assert_eq!(stamp_hour(1, 3), 11);
        assert_eq!(stamp_hour(2, 3), 16);

        let date = day("2026-02-14");
        let stamped = prepare_articles(&pool(3), date, 0, &FixedMinute(7));
        let stamps: Vec<_> = stamped
            .iter()
            .map(|a| a.published_at.clone().expect("stamped"))
            .collect();
        assert_eq!(
            stamps,
            vec![
                "2026-02-14T00:37:00.000Z",
                "2026-02-14T05:37:00.000Z",
                "2026-02-14T10:37:00.000Z",
            ]
        );
    }

    #[test]
    fn single_article_pool_is_stable_and_stamped_at_six() {
        let pool = pool(1);
        for idx in [-3, 0, 1, 42] {
            let out = prepare_articles(&pool, day("2026-01-01"), idx, &SeededMinutes::new(9));
            assert_eq!(links(&out), links(&pool));
            let ts = out[0].published_instant().expect("stamp");
            let local = ts.naive_utc() + chrono::Duration::minutes(330);
            assert_eq!(chrono::Timelike::hour(&local), 6);
        }
    }

    #[test]
    fn random_stamps_stay_on_target_ist_day() {
        let date = day("2026-03-01");
        let out = prepare_articles(&pool(40), date, 17, &RandomMinutes);
        for article in &out {
            let ts = article.published_instant().expect("stamp");
            assert_eq!(ist_date_at(ts), date);
        }
    }

    #[test]
    fn seeded_minutes_are_reproducible() {
        let a = SeededMinutes::new(2026);
        let b = SeededMinutes::new(2026);
        let xs: Vec<u32> = (0..32).map(|_| a.next_minute()).collect();
        let ys: Vec<u32> = (0..32).map(|_| b.next_minute()).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|m| *m < 60));
    }

    #[test]
    fn invalid_minute_leaves_article_unstamped() {
        let out = prepare_articles(&pool(2), day("2026-02-14"), 0, &FixedMinute(60));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|a| a.published_at.is_none()));
    }

    #[test]
    fn stamping_replaces_null_published_at() {
        let base = Article::from_base_value(serde_json::json!({
            "link": "https://x/1",
            "publishedAt": null,
            "snippet": null
        }))
        .expect("decode");
        let out = prepare_articles(&[base], day("2026-02-14"), 0, &FixedMinute(0));
        let value = serde_json::to_value(&out[0]).expect("serialize");
        assert_eq!(value["publishedAt"], "2026-02-14T00:30:00.000Z");
        assert_eq!(value["snippet"], serde_json::Value::Null);
        assert!(!out[0].extra.contains_key("publishedAt"));
    }

    #[test]
    fn empty_pool_yields_nothing() {
        assert!(prepare_articles(&[], day("2026-02-14"), 5, &RandomMinutes).is_empty());
        assert!(prepare_pulse_cards(&[], day("2026-02-14"), 5).is_empty());
    }

    #[test]
    fn pulse_cards_rotate_and_take_date_label() {
        let cards: Vec<PulseCard> = (0..3)
            .map(|i| {
                let mut card = PulseCard::default();
                card.extra
                    .insert("title".into(), serde_json::Value::from(format!("card {i}")));
                card.date_label = Some("2025-01-01".into());
                card
            })
            .collect();
        let out = prepare_pulse_cards(&cards, day("2026-02-14"), 92);
        assert_eq!(out[0].extra["title"], "card 2");
        assert!(out
            .iter()
            .all(|c| c.date_label.as_deref() == Some("2026-02-14")));
    }
}
