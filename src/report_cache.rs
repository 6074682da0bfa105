//! Persistence of the most recent canonical report.
//!
//! One JSON file under a fixed name in the app data directory. A missing or
//! unreadable cache is treated as empty.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::pipeline::structuring::CanonicalReport;

pub const CACHE_FILE_NAME: &str = "last_report.json";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cannot determine application data directory (set PROJECTLENS_DATA_DIR)")]
    NoDataDir,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedReport {
    pub saved_at: DateTime<Utc>,
    pub file_name: String,
    pub report: CanonicalReport,
}

pub struct ReportCache {
    path: PathBuf,
}

impl ReportCache {
    /// Cache stored in `dir`.
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CACHE_FILE_NAME),
        }
    }

    /// Cache stored in the application data directory.
    pub fn open_default() -> Result<Self, CacheError> {
        let dir = config::app_data_dir().ok_or(CacheError::NoDataDir)?;
        Ok(Self::new(&dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the cached report. Written to a sibling temp file first so a
    /// crash never leaves a half-written cache.
    pub fn save(
        &self,
        file_name: &str,
        report: &CanonicalReport,
    ) -> Result<CachedReport, CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entry = CachedReport {
            saved_at: Utc::now(),
            file_name: file_name.to_string(),
            report: report.clone(),
        };
        let json = serde_json::to_vec_pretty(&entry)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Cached last report");
        Ok(entry)
    }

    /// Load the cached report, if any.
    pub fn load(&self) -> Option<CachedReport> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cannot read report cache");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring corrupt report cache"
                );
                None
            }
        }
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
