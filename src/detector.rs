//! Staged duplicate detection.
//!
//! Files move through three filters, each cheaper than the next:
//! 1. exact size (metadata only)
//! 2. a few sampled bytes ([`quick_fingerprint`])
//! 3. the BLAKE3 hash of the whole file ([`full_hash`])
//!
//! A file only reaches the next stage while it still shares its group with at
//! least one other file. Stages 2 and 3 are spread over a fixed number of
//! workers by [`partition_occupied`]; every group is owned by exactly one
//! worker, and each worker hands its surviving groups and failures back when
//! its slice is done. A stage finishes completely before the next one starts.
//! The thread pool never exceeds the number of occupied slices or a small
//! multiple of the available cores.

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::cache::HashCache;
use crate::candidate::FileCandidate;
use crate::duplicates::{DuplicateSet, FailedFile, QuickHashGroup, RunResult, Stage};
use crate::fingerprint::{
    empty_hash, full_hash, normalize_buffer_size, normalize_quick_samples, quick_fingerprint,
};
use crate::group::{SizeGroup, bucket_by_size, group_by_key, group_by_size};
use crate::partition::{DEFAULT_WORKERS, normalize_workers, partition_occupied};

/// Hashing is I/O bound, so the pool may run several threads per core.
const POOL_THREADS_PER_CORE: usize = 4;

/// What one worker produced from its slice.
struct SliceOutcome<T> {
    groups: Vec<T>,
    failed: Vec<FailedFile>,
}

impl<T> SliceOutcome<T> {
    fn empty() -> Self {
        Self {
            groups: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn merge(mut self, mut other: Self) -> Self {
        self.groups.append(&mut other.groups);
        self.failed.append(&mut other.failed);
        self
    }
}

pub struct DuplicateDetector {
    workers: usize,
    quick_samples: usize,
    buffer_size: usize,
    cache: Option<Arc<HashCache>>,
    progress: Option<ProgressBar>,
}

impl DuplicateDetector {
    /// Creates a detector running on `workers` threads; zero or fewer means
    /// the default of 5.
    pub fn new(workers: isize) -> Self {
        Self {
            workers: normalize_workers(workers),
            quick_samples: normalize_quick_samples(0),
            buffer_size: normalize_buffer_size(0),
            cache: None,
            progress: None,
        }
    }

    /// Number of bytes sampled per file in the quick stage (0 means 3).
    pub fn with_quick_samples(mut self, samples: usize) -> Self {
        self.quick_samples = normalize_quick_samples(samples);
        self
    }

    /// Read buffer for full hashing; 3 bytes or fewer means 64 KiB.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = normalize_buffer_size(buffer_size);
        self
    }

    pub fn with_cache(mut self, cache: Arc<HashCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Stats `paths` and runs the full pipeline over them.
    pub fn find<I, P>(&self, paths: I) -> RunResult
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let (size_groups, failed) = bucket_by_size(paths);
        self.run(size_groups, failed)
    }

    /// Runs the pipeline over candidates that were already statted.
    pub fn find_candidates(&self, candidates: Vec<FileCandidate>) -> RunResult {
        self.run(group_by_size(candidates), Vec::new())
    }

    fn run(&self, size_groups: Vec<SizeGroup>, mut failed: Vec<FailedFile>) -> RunResult {
        let (quick_groups, quick_failed) = self.quick_hash_stage(size_groups);
        failed.extend(quick_failed);

        let (duplicates, full_failed) = self.full_hash_stage(quick_groups);
        failed.extend(full_failed);

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        info!(
            "Found {} duplicate groups, {} files failed",
            duplicates.len(),
            failed.len()
        );
        RunResult { duplicates, failed }
    }

    /// Stage 2: samples every file and splits each size group by sample.
    ///
    /// Returns the groups that still hold two or more files, plus the files
    /// that could not be read.
    pub fn quick_hash_stage(&self, size_groups: Vec<SizeGroup>) -> (Vec<QuickHashGroup>, Vec<FailedFile>) {
        let files: usize = size_groups.iter().map(SizeGroup::len).sum();
        info!("Sampling {} files in {} size groups", files, size_groups.len());
        self.start_stage("Sampling bytes...", files);

        let outcome = self.fan_out(size_groups, |slice| self.quick_hash_slice(slice));
        (outcome.groups, outcome.failed)
    }

    /// Stage 3: hashes every file and confirms each quick hash group.
    pub fn full_hash_stage(&self, quick_groups: Vec<QuickHashGroup>) -> (Vec<DuplicateSet>, Vec<FailedFile>) {
        let files: usize = quick_groups.iter().map(|g| g.files.len()).sum();
        info!("Hashing {} files in {} quick hash groups", files, quick_groups.len());
        self.start_stage("Hashing files...", files);

        let outcome = self.fan_out(quick_groups, |slice| self.full_hash_slice(slice));
        (outcome.groups, outcome.failed)
    }

    /// Partitions `groups` across the workers, runs `work` once per slice and
    /// joins all results before returning.
    fn fan_out<T, R, F>(&self, groups: Vec<T>, work: F) -> SliceOutcome<R>
    where
        T: Send,
        R: Send,
        F: Fn(Vec<T>) -> SliceOutcome<R> + Sync + Send,
    {
        let slices = partition_occupied(groups, self.workers);
        if slices.len() <= 1 {
            return slices
                .into_iter()
                .map(&work)
                .fold(SliceOutcome::empty(), SliceOutcome::merge);
        }

        let threads = slices.len().min(max_pool_threads());
        debug!("Running {} slices on {} threads", slices.len(), threads);
        match ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("dups-worker-{i}"))
            .build()
        {
            Ok(pool) => pool.install(|| {
                slices
                    .into_par_iter()
                    .map(&work)
                    .reduce(SliceOutcome::empty, SliceOutcome::merge)
            }),
            Err(e) => {
                warn!("Failed to start {} workers ({}), hashing on the current thread", threads, e);
                slices
                    .into_iter()
                    .map(&work)
                    .fold(SliceOutcome::empty(), SliceOutcome::merge)
            }
        }
    }

    fn start_stage(&self, message: &'static str, len: usize) {
        if let Some(pb) = &self.progress {
            pb.set_length(len as u64);
            pb.set_position(0);
            pb.set_message(message);
        }
    }

    fn tick(&self) {
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
    }

    /// Samples every file in the slice and regroups each size group by sample.
    fn quick_hash_slice(&self, slice: Vec<SizeGroup>) -> SliceOutcome<QuickHashGroup> {
        let mut outcome = SliceOutcome::empty();

        for mut group in slice {
            for file in &mut group.files {
                // Empty files are all identical; nothing to sample
                if file.size == 0 {
                    file.quick_fingerprint = Some(Vec::new());
                } else {
                    match quick_fingerprint(&file.path, self.quick_samples) {
                        Ok(sample) => file.quick_fingerprint = Some(sample),
                        Err(e) => {
                            warn!("Failed to sample '{}': {:#}", file.path.display(), e);
                            file.mark_failed();
                            outcome.failed.push(FailedFile::new(&file.path, Stage::QuickHash, &e));
                        }
                    }
                }
                self.tick();
            }

            let size = group.size;
            let survivors = group.files.into_iter().filter(FileCandidate::is_pending);
            for (fingerprint, files) in group_by_key(survivors, |f| f.quick_fingerprint.clone()) {
                outcome.groups.push(QuickHashGroup {
                    size,
                    fingerprint: fingerprint.unwrap_or_default(),
                    files,
                });
            }
        }

        debug!(
            "Quick hash slice done: {} groups, {} failures",
            outcome.groups.len(),
            outcome.failed.len()
        );
        outcome
    }

    /// Hashes every file in the slice and confirms groups by full hash.
    fn full_hash_slice(&self, slice: Vec<QuickHashGroup>) -> SliceOutcome<DuplicateSet> {
        let mut outcome = SliceOutcome::empty();

        for mut group in slice {
            for file in &mut group.files {
                match self.hash_file(file) {
                    Ok(hash) => file.full_hash = Some(hash),
                    Err(e) => {
                        warn!("Failed to hash '{}': {:#}", file.path.display(), e);
                        file.mark_failed();
                        outcome.failed.push(FailedFile::new(&file.path, Stage::FullHash, &e));
                    }
                }
                self.tick();
            }

            let size = group.size;
            let survivors = group.files.into_iter().filter(FileCandidate::is_pending);
            for (hash, files) in group_by_key(survivors, |f| f.full_hash.clone()) {
                outcome.groups.push(DuplicateSet {
                    hash: hash.unwrap_or_default(),
                    size,
                    files,
                });
            }
        }

        debug!(
            "Full hash slice done: {} duplicate groups, {} failures",
            outcome.groups.len(),
            outcome.failed.len()
        );
        outcome
    }

    fn hash_file(&self, file: &FileCandidate) -> anyhow::Result<String> {
        if file.size == 0 {
            return Ok(empty_hash());
        }
        let Some(cache) = &self.cache else {
            return full_hash(&file.path, self.buffer_size);
        };

        // Cache entries are checked against the file as it is now, so a
        // vanished or rewritten file is never answered from the cache
        let current = FileCandidate::from_path(&file.path)?;
        if let Some(hash) = cache.get_hash(&current) {
            debug!("Cache hit for '{}'", file.path.display());
            return Ok(hash);
        }
        let hash = full_hash(&file.path, self.buffer_size)?;
        cache.set_hash(&current, hash.clone());
        Ok(hash)
    }
}

/// Upper bound on pool threads, however many workers were requested.
fn max_pool_threads() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores * POOL_THREADS_PER_CORE).max(DEFAULT_WORKERS)
}

/// Finds duplicates among `files` using `workers` threads.
///
/// `workers <= 0` uses 5 workers, `quick_samples == 0` samples 3 bytes and
/// `buffer_size <= 3` reads in 64 KiB chunks. Per-file errors never abort the
/// run; they are reported in [`RunResult::failed`].
pub fn find_duplicates<I, P>(files: I, workers: isize, quick_samples: usize, buffer_size: usize) -> RunResult
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    DuplicateDetector::new(workers)
        .with_quick_samples(quick_samples)
        .with_buffer_size(buffer_size)
        .find(files)
}
