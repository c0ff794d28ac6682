use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, warn};

use crate::candidate::FileCandidate;
use crate::duplicates::{FailedFile, Stage};

/// Groups `items` by `key` and keeps only groups with two or more members.
///
/// Groups come back in key order and members keep their input order, so the
/// same input always yields the same grouping. Every pipeline stage (size,
/// sampled bytes, full hash) regroups through this function.
pub fn group_by_key<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Vec<(K, Vec<T>)>
where
    K: Ord,
    F: FnMut(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(key(&item)).or_default().push(item);
    }
    groups.into_iter().filter(|(_, members)| members.len() > 1).collect()
}

/// Files sharing one exact byte length.
#[derive(Debug, Clone)]
pub struct SizeGroup {
    pub size: u64,
    pub files: Vec<FileCandidate>,
}

impl SizeGroup {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Groups already statted candidates by size, dropping singleton sizes.
pub fn group_by_size(candidates: Vec<FileCandidate>) -> Vec<SizeGroup> {
    group_by_key(candidates, |c| c.size)
        .into_iter()
        .map(|(size, files)| SizeGroup { size, files })
        .collect()
}

/// Stats every path and groups the results by size.
///
/// Paths whose metadata cannot be read are returned as failures instead of
/// aborting the bucketing.
pub fn bucket_by_size<I, P>(paths: I) -> (Vec<SizeGroup>, Vec<FailedFile>)
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let mut candidates = Vec::new();
    let mut failed = Vec::new();

    for path in paths {
        let path = path.into();
        match FileCandidate::from_path(&path) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => {
                warn!("Skipping '{}': {:#}", path.display(), e);
                failed.push(FailedFile::new(path, Stage::Metadata, &e));
            }
        }
    }

    let total = candidates.len();
    let groups = group_by_size(candidates);
    debug!(
        "Size bucketing: {} files, {} groups with {} potential duplicates",
        total,
        groups.len(),
        groups.iter().map(SizeGroup::len).sum::<usize>()
    );
    (groups, failed)
}
