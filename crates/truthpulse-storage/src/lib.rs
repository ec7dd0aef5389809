//! Snapshot directory storage: atomic JSON writes and base-file loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use truthpulse_core::{BaseFeed, BaseRecord, SnapshotKind};
use uuid::Uuid;

pub const CRATE_NAME: &str = "truthpulse-storage";

#[derive(Debug, Error)]
pub enum BaseDataError {
    #[error("base data not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("no records in base data: {}", .0.display())]
    Empty(PathBuf),
}

#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub file_name: String,
    pub absolute_path: PathBuf,
    pub byte_size: usize,
}

/// Directory holding the dated snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, kind: &SnapshotKind, date: NaiveDate) -> PathBuf {
        self.root.join(kind.file_name(date))
    }

    pub async fn write_snapshot<T: Serialize>(
        &self,
        kind: &SnapshotKind,
        date: NaiveDate,
        payload: &T,
    ) -> anyhow::Result<StoredSnapshot> {
        self.write_json(&kind.file_name(date), payload).await
    }

    /// Serialize `payload` as pretty JSON and replace `file_name` under the root.
    ///
    /// The bytes land in a temp file first and are renamed over the target, so a
    /// reader sees either the previous file or the new one, never a partial write.
    pub async fn write_json<T: Serialize>(
        &self,
        file_name: &str,
        payload: &T,
    ) -> anyhow::Result<StoredSnapshot> {
        let bytes = serde_json::to_vec_pretty(payload)
            .with_context(|| format!("serializing {file_name}"))?;
        let absolute_path = self.root.join(file_name);

        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating snapshot directory {}", self.root.display()))?;

        let temp_path = self
            .root
            .join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));

        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp snapshot file {}", temp_path.display()))?;
        file.write_all(&bytes)
            .await
            .with_context(|| format!("writing temp snapshot file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp snapshot file {}", temp_path.display()))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &absolute_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!(
                    "atomically renaming temp snapshot {} -> {}",
                    temp_path.display(),
                    absolute_path.display()
                )
            });
        }

        debug!(path = %absolute_path.display(), bytes = bytes.len(), "snapshot written");
        Ok(StoredSnapshot {
            file_name: file_name.to_string(),
            absolute_path,
            byte_size: bytes.len(),
        })
    }

    pub async fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> anyhow::Result<T> {
        read_json_file(self.root.join(file_name)).await
    }
}

async fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Load the `data` array of a base feed file.
///
/// A missing file is a [`BaseDataError::Missing`]. Entries that do not decode are
/// skipped with a warning. An empty result is returned as-is; callers decide whether
/// that is fatal.
pub async fn load_base_feed<T: BaseRecord>(path: impl AsRef<Path>) -> anyhow::Result<Vec<T>> {
    let path = path.as_ref();
    if !fs::try_exists(path)
        .await
        .with_context(|| format!("checking base data path {}", path.display()))?
    {
        return Err(BaseDataError::Missing(path.to_path_buf()).into());
    }
    let feed: BaseFeed<JsonValue> = read_json_file(path).await?;
    let records = feed
        .data
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match T::from_base_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(path = %path.display(), index, error = %err, "skipping undecodable base record");
                None
            }
        })
        .collect();
    Ok(records)
}

/// Like [`load_base_feed`] but an empty pool is a [`BaseDataError::Empty`].
pub async fn load_required_base_feed<T: BaseRecord>(
    path: impl AsRef<Path>,
) -> anyhow::Result<Vec<T>> {
    let path = path.as_ref();
    let data = load_base_feed(path).await?;
    if data.is_empty() {
        return Err(BaseDataError::Empty(path.to_path_buf()).into());
    }
    Ok(data)
}
