use super::{BlobEntry, BlobStore};
use crate::errors::{PromoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// A mounted directory (for example a synced storage container) acting as the remote
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scan(root: &Path, prefix: &str) -> Result<Vec<BlobEntry>> {
        if !root.is_dir() {
            return Err(PromoError::Storage(format!(
                "blob store directory {} does not exist",
                root.display()
            )));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(root).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let is_csv = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
            if !is_csv {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !name.starts_with(prefix) {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| PromoError::Storage(e.to_string()))?;
            let last_modified: DateTime<Utc> = metadata.modified()?.into();
            entries.push(BlobEntry {
                name,
                last_modified,
                size: metadata.len(),
            });
        }

        entries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }
}

#[async_trait]
impl BlobStore for DirectoryBlobStore {
    async fn list_csv(&self, prefix: &str) -> Result<Vec<BlobEntry>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || Self::scan(&root, &prefix)).await?
    }

    async fn download(&self, name: &str, local_dir: &Path) -> Result<PathBuf> {
        let relative = Path::new(name);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(PromoError::Storage(format!("invalid object name '{}'", name)));
        }
        let file_name = relative
            .file_name()
            .ok_or_else(|| PromoError::Storage(format!("invalid object name '{}'", name)))?;

        let source = self.root.join(relative);
        let target = local_dir.join(file_name);
        tokio::fs::create_dir_all(local_dir).await?;
        let bytes = tokio::fs::copy(&source, &target).await?;
        log::debug!("[SYNC] Copied {} bytes from {}", bytes, source.display());
        Ok(target)
    }
}
