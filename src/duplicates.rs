use std::fmt;
use std::path::{Path, PathBuf};

use colored::Colorize;
use indicatif::{HumanBytes, HumanCount};
use log::{info, warn};
use serde::Serialize;

use crate::candidate::FileCandidate;
use crate::utils::format_modified;

/// Pipeline stage at which a file dropped out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Metadata,
    QuickHash,
    FullHash,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Metadata => "metadata",
            Stage::QuickHash => "quick hash",
            Stage::FullHash => "full hash",
        };
        f.write_str(name)
    }
}

/// A file that could not be processed, and why.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub stage: Stage,
    pub reason: String,
}

impl FailedFile {
    pub fn new(path: impl Into<PathBuf>, stage: Stage, error: &anyhow::Error) -> Self {
        Self {
            path: path.into(),
            stage,
            reason: format!("{error:#}"),
        }
    }
}

/// Same-size files that also share their sampled bytes.
#[derive(Debug, Clone)]
pub struct QuickHashGroup {
    pub size: u64,
    pub fingerprint: Vec<u8>,
    pub files: Vec<FileCandidate>,
}

/// Two or more files confirmed identical by full content hash.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateSet {
    pub hash: String,
    pub size: u64,
    pub files: Vec<FileCandidate>,
}

impl DuplicateSet {
    /// Space reclaimable by keeping a single copy.
    pub fn wasted_bytes(&self) -> u64 {
        self.size * (self.files.len() as u64).saturating_sub(1)
    }
}

/// Everything one run produced. Order of both lists is unspecified.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    pub duplicates: Vec<DuplicateSet>,
    pub failed: Vec<FailedFile>,
}

impl RunResult {
    pub fn failed_paths(&self) -> impl Iterator<Item = &Path> {
        self.failed.iter().map(|f| f.path.as_path())
    }

    /// Files that could be removed, one copy kept per set.
    pub fn duplicate_file_count(&self) -> usize {
        self.duplicates.iter().map(|set| set.files.len() - 1).sum()
    }

    pub fn wasted_bytes(&self) -> u64 {
        self.duplicates.iter().map(DuplicateSet::wasted_bytes).sum()
    }
}

pub fn print_results(result: &RunResult, base_path: &Path) {
    if !result.failed.is_empty() {
        warn!("{} files could not be processed:", HumanCount(result.failed.len() as u64));
        for failed in &result.failed {
            warn!("  [{}] {}", failed.stage, failed.reason);
        }
    }

    if result.duplicates.is_empty() {
        println!("{}", "No duplicate files found!".green());
        return;
    }

    info!(
        "Found {} duplicate files wasting {} of space",
        HumanCount(result.duplicate_file_count() as u64),
        HumanBytes(result.wasted_bytes())
    );

    // Largest savings first
    let mut sorted_sets: Vec<&DuplicateSet> = result.duplicates.iter().collect();
    sorted_sets.sort_by(|a, b| b.wasted_bytes().cmp(&a.wasted_bytes()));

    for set in sorted_sets {
        println!(
            "{}",
            format!("Duplicate group ({}, {} files):", HumanBytes(set.size), set.files.len()).yellow()
        );
        for file in &set.files {
            let relative_path = file.path.strip_prefix(base_path).unwrap_or(&file.path);
            println!(
                "  {}  {}",
                format_modified(file.modified).dimmed(),
                relative_path.display()
            );
        }
        println!();
    }
}
