//! Source file synchronisation.
//!
//! Picks the newest CSV in remote storage, mirrors it into the local
//! download directory and reports whether the analytics system has to be
//! rebuilt.

pub mod directory;

pub use directory::DirectoryBlobStore;

use crate::errors::{PromoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// A CSV object in remote storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Path relative to the store root, `/`-separated
    pub name: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

impl BlobEntry {
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Remote storage holding the source CSV exports
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// CSV objects under `prefix`, newest first
    async fn list_csv(&self, prefix: &str) -> Result<Vec<BlobEntry>>;

    /// Copy `name` into `local_dir`, returning the local path
    async fn download(&self, name: &str, local_dir: &Path) -> Result<PathBuf>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// CSV to load, if any exists remotely or locally
    pub file: Option<PathBuf>,
    /// True when a new file was downloaded
    pub rebuild: bool,
    /// True when the analytics system was built from `file` during this call
    pub loaded: bool,
}

impl SyncOutcome {
    fn unchanged(file: Option<PathBuf>) -> Self {
        Self {
            file,
            rebuild: false,
            loaded: false,
        }
    }
}

/// Local `*.csv` files in `dir`, sorted by name
pub fn local_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("*.csv");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| PromoError::Storage(format!("non UTF-8 path: {}", dir.display())))?;
    let paths = glob::glob(pattern).map_err(|e| PromoError::Storage(e.to_string()))?;

    let mut files: Vec<PathBuf> = paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect();
    files.sort();
    Ok(files)
}

/// Bring the download directory in line with the newest remote CSV.
///
/// An already-downloaded basename means nothing changed. A new one replaces
/// every local CSV. Without a store the first local CSV is used as is.
pub async fn sync_latest_file(
    store: Option<&dyn BlobStore>,
    prefix: &str,
    download_dir: &Path,
) -> Result<SyncOutcome> {
    tokio::fs::create_dir_all(download_dir).await?;

    let Some(store) = store else {
        let local = local_csv_files(download_dir)?.into_iter().next();
        match &local {
            Some(path) => log::info!("[SYNC] No remote store configured, using local {}", path.display()),
            None => log::warn!("[SYNC] No remote store configured and no local CSV in {}", download_dir.display()),
        }
        return Ok(SyncOutcome::unchanged(local));
    };

    let entries = store.list_csv(prefix).await?;
    let Some(latest) = entries.into_iter().next() else {
        log::warn!("[SYNC] No CSV found under prefix '{}'", prefix);
        return Ok(SyncOutcome::unchanged(None));
    };
    log::info!(
        "[SYNC] Latest remote file: {} ({} bytes, modified {})",
        latest.name,
        latest.size,
        latest.last_modified
    );

    let local_path = download_dir.join(latest.basename());
    if local_path.exists() {
        log::info!("[SYNC] {} already present, no rebuild needed", latest.basename());
        return Ok(SyncOutcome::unchanged(Some(local_path)));
    }

    for stale in local_csv_files(download_dir)? {
        log::info!("[SYNC] Removing stale file {}", stale.display());
        tokio::fs::remove_file(&stale).await?;
    }

    let downloaded = store.download(&latest.name, download_dir).await?;
    log::info!("[SYNC] Downloaded {}", downloaded.display());
    Ok(SyncOutcome {
        file: Some(downloaded),
        rebuild: true,
        loaded: false,
    })
}
