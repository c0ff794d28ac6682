use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use serde::Serialize;

/// Processing state of a candidate within one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CandidateStatus {
    #[default]
    Pending,
    Failed,
}

/// One input file under evaluation.
///
/// A candidate is owned by exactly one group at a time, so the worker holding
/// that group may fill in the fingerprint and hash fields without locking.
#[derive(Debug, Clone, Serialize)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub size: u64,
    #[serde(serialize_with = "crate::utils::serialize_modified")]
    pub modified: SystemTime,
    #[serde(skip)]
    pub quick_fingerprint: Option<Vec<u8>>,
    #[serde(skip)]
    pub full_hash: Option<String>,
    #[serde(skip)]
    pub status: CandidateStatus,
}

impl FileCandidate {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            quick_fingerprint: None,
            full_hash: None,
            status: CandidateStatus::Pending,
        }
    }

    /// Reads size and modification time of `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = path
            .metadata()
            .with_context(|| format!("Failed to read metadata for: '{}'", path.display()))?;
        if !metadata.is_file() {
            bail!("Not a regular file: '{}'", path.display());
        }
        let modified = metadata
            .modified()
            .with_context(|| format!("Failed to read modification time for: '{}'", path.display()))?;
        Ok(Self::new(path, metadata.len(), modified))
    }

    pub fn mark_failed(&mut self) {
        self.status = CandidateStatus::Failed;
    }

    pub fn is_pending(&self) -> bool {
        self.status == CandidateStatus::Pending
    }
}
