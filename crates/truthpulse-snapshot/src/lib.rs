//! Daily snapshot generation: rotation, stamping, filtering, writing, backfill.

pub mod calendar;
pub mod filter;
pub mod stamp;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use tracing::{info, instrument, warn};
use truthpulse_core::{
    format_timestamp, Article, PulseCard, PulseSnapshotFile, SnapshotFile, SnapshotFilters,
    SnapshotKind,
};
use truthpulse_storage::{load_base_feed, load_required_base_feed, SnapshotStore};

use crate::calendar::{current_ist_date, day_index, parse_ist_date, DEFAULT_EPOCH_DATE};
use crate::filter::{dedupe_by_link, filter_by_theme, filter_to_ist_day};
use crate::stamp::{
    prepare_articles, prepare_pulse_cards, rotation_offset, MinuteSource, RandomMinutes,
};

pub const CRATE_NAME: &str = "truthpulse-snapshot";

pub const BASE_SOURCES_FILE: &str = "live-sources-all.json";
pub const BASE_PULSE_FILE: &str = "ai-safety-pulse.json";

/// Theme tags the dashboard's signal panels select on.
pub const DEFAULT_THEMES: &[&str] = &[
    "violence",
    "child-abuse-nudity",
    "sexual-exploitation",
    "human-exploitation",
    "suicide-self-harm",
    "violent-speech",
    "tvec",
    "illegal-goods",
    "human-trafficking",
    "ncii",
    "dangerous-organizations",
    "harassment-bullying",
    "dangerous-misinformation",
    "spam-inauthentic",
    "malware",
    "cybersecurity",
    "fraud-impersonation",
];

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub data_dir: PathBuf,
    pub base_sources: Option<PathBuf>,
    pub base_pulse: Option<PathBuf>,
    pub epoch: NaiveDate,
    pub themes_file: Option<PathBuf>,
    pub max_articles: Option<usize>,
}

impl GeneratorConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            base_sources: None,
            base_pulse: None,
            epoch: DEFAULT_EPOCH_DATE,
            themes_file: None,
            max_articles: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `TRUTHPULSE_*` values supplied by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let epoch = match lookup("TRUTHPULSE_EPOCH") {
            Some(raw) => parse_ist_date(raw.trim()).context("parsing TRUTHPULSE_EPOCH")?,
            None => DEFAULT_EPOCH_DATE,
        };
        let max_articles =
            lookup("TRUTHPULSE_MAX_ARTICLES").and_then(|raw| match raw.trim().parse::<usize>() {
                Ok(max) => Some(max),
                Err(_) => {
                    warn!(value = %raw, "ignoring unparseable TRUTHPULSE_MAX_ARTICLES");
                    None
                }
            });
        Ok(Self {
            data_dir: lookup("TRUTHPULSE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./public/data")),
            base_sources: lookup("TRUTHPULSE_BASE_SOURCES").map(PathBuf::from),
            base_pulse: lookup("TRUTHPULSE_BASE_PULSE").map(PathBuf::from),
            epoch,
            themes_file: lookup("TRUTHPULSE_THEMES_FILE").map(PathBuf::from),
            max_articles,
        })
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn base_sources_path(&self) -> PathBuf {
        self.base_sources
            .clone()
            .unwrap_or_else(|| self.data_dir.join(BASE_SOURCES_FILE))
    }

    pub fn base_pulse_path(&self) -> PathBuf {
        self.base_pulse
            .clone()
            .unwrap_or_else(|| self.data_dir.join(BASE_PULSE_FILE))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ThemesFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    themes: Vec<String>,
}

/// Ordered, de-duplicated list of lowercase theme tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeRegistry {
    themes: Vec<String>,
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self::from_tags(DEFAULT_THEMES.iter().copied())
    }
}

/// Tags become file names, so only `[a-z0-9-]+` is accepted.
pub fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

impl ThemeRegistry {
    /// Invalid tags are skipped with a warning.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut themes: Vec<String> = Vec::new();
        for tag in tags {
            let tag = normalize_tag(tag.as_ref());
            if tag.is_empty() || themes.contains(&tag) {
                continue;
            }
            if !is_valid_tag(&tag) {
                warn!(tag = %tag, "skipping theme tag outside [a-z0-9-]");
                continue;
            }
            themes.push(tag);
        }
        Self { themes }
    }

    /// Unlike [`ThemeRegistry::from_tags`], an invalid tag in the file is an error.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let file: ThemesFile =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        if let Some(bad) = file
            .themes
            .iter()
            .map(|tag| normalize_tag(tag))
            .find(|tag| !tag.is_empty() && !is_valid_tag(tag))
        {
            anyhow::bail!("invalid theme tag {bad:?} in {}", path.display());
        }
        Ok(Self::from_tags(file.themes))
    }

    pub fn for_config(config: &GeneratorConfig) -> Result<Self> {
        match &config.themes_file {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn themes(&self) -> &[String] {
        &self.themes
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }
}

/// Read-only inputs shared by every generated date.
#[derive(Debug, Clone, Default)]
pub struct BasePools {
    pub articles: Vec<Article>,
    pub pulse_cards: Vec<PulseCard>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateSummary {
    pub date: NaiveDate,
    pub day_index: i64,
    pub rotation: usize,
    pub articles: usize,
    pub dropped_out_of_window: usize,
    pub theme_files: usize,
    pub pulse_cards: usize,
    pub files_written: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillSummary {
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
    pub dates: usize,
    pub files_written: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Today,
    Date(NaiveDate),
    Backfill,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunSummary {
    Single(DateSummary),
    Backfill(BackfillSummary),
}

pub struct SnapshotGenerator {
    config: GeneratorConfig,
    store: SnapshotStore,
    themes: ThemeRegistry,
    minutes: Box<dyn MinuteSource>,
}

impl SnapshotGenerator {
    pub fn new(config: GeneratorConfig, themes: ThemeRegistry) -> Self {
        let store = SnapshotStore::new(config.data_dir.clone());
        Self {
            config,
            store,
            themes,
            minutes: Box::<RandomMinutes>::default(),
        }
    }

    pub fn with_minute_source(mut self, minutes: Box<dyn MinuteSource>) -> Self {
        self.minutes = minutes;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn themes(&self) -> &ThemeRegistry {
        &self.themes
    }

    /// Files produced per date: stream, all, one per theme, pulse.
    pub fn files_per_date(&self) -> usize {
        2 + self.themes.len() + 1
    }

    /// Load both base pools. The article pool must be present and non-empty; the
    /// pulse pool must be present but may be empty.
    pub async fn load_pools(&self) -> Result<BasePools> {
        let sources_path = self.config.base_sources_path();
        let articles: Vec<Article> = load_required_base_feed(&sources_path).await?;
        info!(path = %sources_path.display(), articles = articles.len(), "base sources loaded");

        let pulse_path = self.config.base_pulse_path();
        let pulse_cards: Vec<PulseCard> = load_base_feed(&pulse_path).await?;
        info!(path = %pulse_path.display(), cards = pulse_cards.len(), "base AI pulse loaded");

        Ok(BasePools {
            articles,
            pulse_cards,
        })
    }

    /// Run the full pipeline for one IST date and overwrite that date's files.
    #[instrument(skip_all, fields(date = %date))]
    pub async fn generate_for_date(&self, pools: &BasePools, date: NaiveDate) -> Result<DateSummary> {
        let day_index = day_index(date, self.config.epoch);
        let rotation = rotation_offset(day_index, pools.articles.len());

        let prepared = prepare_articles(&pools.articles, date, day_index, self.minutes.as_ref());
        let deduped = dedupe_by_link(prepared);
        let stamped = deduped.len();
        let in_window = filter_to_ist_day(deduped, date);
        let dropped_out_of_window = stamped - in_window.len();
        if dropped_out_of_window > 0 {
            warn!(dropped_out_of_window, "stamped articles fell outside the IST day");
        }

        let generated_at = format_timestamp(Utc::now());

        let mut stream = in_window.clone();
        if let Some(max) = self.config.max_articles {
            stream.truncate(max);
        }
        let all_payload = SnapshotFile {
            generated_at: generated_at.clone(),
            filters: SnapshotFilters::all_sources(),
            data: stream,
        };
        self.store
            .write_snapshot(&SnapshotKind::Stream, date, &all_payload)
            .await?;
        self.store
            .write_snapshot(&SnapshotKind::All, date, &all_payload)
            .await?;

        for theme in self.themes.themes() {
            let payload = SnapshotFile {
                generated_at: generated_at.clone(),
                filters: SnapshotFilters::for_theme(theme.clone()),
                data: filter_by_theme(&in_window, theme),
            };
            self.store
                .write_snapshot(&SnapshotKind::Theme(theme.clone()), date, &payload)
                .await?;
        }

        let cards = prepare_pulse_cards(&pools.pulse_cards, date, day_index);
        let pulse_cards = cards.len();
        let pulse_payload = PulseSnapshotFile {
            generated_at,
            stats: Map::new(),
            data: cards,
        };
        self.store
            .write_snapshot(&SnapshotKind::Pulse, date, &pulse_payload)
            .await?;

        let summary = DateSummary {
            date,
            day_index,
            rotation,
            articles: all_payload.data.len(),
            dropped_out_of_window,
            theme_files: self.themes.len(),
            pulse_cards,
            files_written: self.files_per_date(),
        };
        info!(
            articles = summary.articles,
            rotation,
            theme_files = summary.theme_files,
            pulse_cards,
            "snapshot generated"
        );
        Ok(summary)
    }

    /// Generate every IST date from the epoch through `today`, inclusive.
    ///
    /// Stops at the first failing date; files already written stay in place.
    pub async fn backfill(&self, pools: &BasePools, today: NaiveDate) -> Result<BackfillSummary> {
        let mut summary = BackfillSummary {
            first: None,
            last: None,
            dates: 0,
            files_written: 0,
        };

        let mut current = self.config.epoch;
        while current <= today {
            let generated = self
                .generate_for_date(pools, current)
                .await
                .with_context(|| format!("generating snapshots for {current}"))?;
            summary.first.get_or_insert(current);
            summary.last = Some(current);
            summary.dates += 1;
            summary.files_written += generated.files_written;

            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }

        info!(
            dates = summary.dates,
            files_written = summary.files_written,
            "backfill complete"
        );
        Ok(summary)
    }

    pub async fn run(&self, mode: RunMode) -> Result<RunSummary> {
        let pools = self.load_pools().await?;
        match mode {
            RunMode::Today => Ok(RunSummary::Single(
                self.generate_for_date(&pools, current_ist_date()).await?,
            )),
            RunMode::Date(date) => Ok(RunSummary::Single(
                self.generate_for_date(&pools, date).await?,
            )),
            RunMode::Backfill => Ok(RunSummary::Backfill(
                self.backfill(&pools, current_ist_date()).await?,
            )),
        }
    }
}

/// Build a generator from `config` (theme registry included) and run `mode`.
pub async fn run_once(config: GeneratorConfig, mode: RunMode) -> Result<RunSummary> {
    let themes = ThemeRegistry::for_config(&config)?;
    let generator = SnapshotGenerator::new(config, themes);
    generator.run(mode).await
}
