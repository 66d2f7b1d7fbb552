//! Persistent blur placeholder index.
//!
//! Maps a normalized image key to its blur data URL so pages can render a
//! placeholder for any known image without decoding it again. The whole index
//! lives in one pretty-printed JSON object and every mutation rewrites the
//! file. Index failures never surface as errors to callers: reads degrade to
//! "absent" and writes degrade to a logged no-op.

mod key;

pub use key::ImageKeyRules;

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Key -> blur data URL.
pub type BlurEntries = BTreeMap<String, String>;

/// File-backed blur placeholder index.
///
/// Writers inside one process are serialized; each write lands through a
/// temp file and a rename so readers never observe a half-written index.
#[derive(Debug)]
pub struct BlurIndex {
    path: PathBuf,
    rules: ImageKeyRules,
    write_lock: Mutex<()>,
}

impl BlurIndex {
    pub fn new(path: impl Into<PathBuf>, rules: ImageKeyRules) -> Self {
        Self {
            path: path.into(),
            rules,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.index_path(), ImageKeyRules::from_config(&config.index))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Normalized key for a URL.
    pub fn key_for(&self, url: &str) -> String {
        self.rules.image_key(url)
    }

    /// Look up the placeholder for a URL.
    pub async fn get(&self, url: &str) -> Option<String> {
        let key = self.key_for(url);
        match self.entries().await {
            Ok(mut entries) => entries.remove(&key),
            Err(e) => {
                tracing::warn!("Blur index read failed: {}", e);
                None
            }
        }
    }

    /// Store one placeholder. Returns whether the index was persisted.
    pub async fn set(&self, url: &str, data_url: &str) -> bool {
        self.set_many([(url.to_string(), data_url.to_string())])
            .await
    }

    /// Store several placeholders with a single rewrite.
    pub async fn set_many<I>(&self, pairs: I) -> bool
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(url, data_url)| (self.key_for(&url), data_url))
            .collect();
        if pairs.is_empty() {
            return true;
        }

        let count = pairs.len();
        let written = self
            .mutate("set", move |entries| {
                entries.extend(pairs);
                true
            })
            .await
            .is_some();
        if written {
            tracing::debug!("Indexed {} blur placeholder(s)", count);
        }
        written
    }

    /// Remove the placeholder for a URL. Returns whether an entry was removed.
    pub async fn remove(&self, url: &str) -> bool {
        let key = self.key_for(url);
        self.mutate("remove", move |entries| entries.remove(&key).is_some())
            .await
            .unwrap_or(false)
    }

    /// Empty the index. Returns whether the index was persisted.
    pub async fn clear(&self) -> bool {
        self.mutate("clear", |entries| {
            entries.clear();
            true
        })
        .await
        .is_some()
    }

    /// Number of stored placeholders. Unreadable index counts as empty.
    pub async fn len(&self) -> usize {
        self.entries().await.map(|e| e.len()).unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All entries. A missing file reads as an empty index.
    pub async fn entries(&self) -> PipelineResult<BlurEntries> {
        read_entries(&self.path).await
    }

    /// Read-modify-write under the writer lock. `apply` returns whether the
    /// file needs rewriting; `None` means the write failed.
    async fn mutate<F>(&self, op: &str, apply: F) -> Option<bool>
    where
        F: FnOnce(&mut BlurEntries) -> bool,
    {
        let _guard = self.write_lock.lock().await;

        let mut entries = match read_entries(&self.path).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Blur index unreadable, starting fresh: {}", e);
                BlurEntries::new()
            }
        };

        let changed = apply(&mut entries);
        if !changed {
            return Some(false);
        }

        match write_entries(&self.path, &entries).await {
            Ok(()) => Some(true),
            Err(e) => {
                tracing::warn!("Blur index {} failed: {}", op, e);
                None
            }
        }
    }
}

async fn read_entries(path: &Path) -> PipelineResult<BlurEntries> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BlurEntries::new()),
        Err(source) => {
            return Err(PipelineError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if content.trim().is_empty() {
        return Ok(BlurEntries::new());
    }

    serde_json::from_str(&content).map_err(|e| PipelineError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })
}

async fn write_entries(path: &Path, entries: &BlurEntries) -> PipelineResult<()> {
    let io_err = |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let json = serde_json::to_string_pretty(entries).map_err(|e| PipelineError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}
