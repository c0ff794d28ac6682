use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use find_file_dups::{
    DuplicateDetector, FileCandidate, HashCache, RunResult, Stage, bucket_by_size, find_duplicates, full_hash,
    quick_fingerprint,
};
use tempfile::tempdir;

fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Duplicate sets as sorted path lists, ignoring run-to-run ordering.
fn memberships(result: &RunResult) -> BTreeSet<Vec<PathBuf>> {
    result
        .duplicates
        .iter()
        .map(|set| {
            let mut paths: Vec<PathBuf> = set.files.iter().map(|f| f.path.clone()).collect();
            paths.sort();
            paths
        })
        .collect()
}

#[test]
fn test_identical_files_form_one_set() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.txt", b"hello world");
    let b = write(dir.path(), "b.txt", b"hello world");
    let c = write(dir.path(), "c.txt", b"hello there");

    let result = find_duplicates(vec![a.clone(), b.clone(), c], 2, 3, 0);
    assert!(result.failed.is_empty());
    assert_eq!(memberships(&result), BTreeSet::from([vec![a, b]]));
    assert_eq!(result.duplicates[0].size, 11);
    assert_eq!(result.duplicates[0].hash, blake3::hash(b"hello world").to_hex().to_string());
}

#[test]
fn test_empty_input() {
    let result = find_duplicates(Vec::<PathBuf>::new(), 4, 3, 0);
    assert!(result.duplicates.is_empty());
    assert!(result.failed.is_empty());
}

#[test]
fn test_zero_length_files_form_one_set() {
    let dir = tempdir().unwrap();
    let paths: Vec<PathBuf> = ["a.txt", "b.txt", "c.txt"]
        .iter()
        .map(|name| write(dir.path(), name, b""))
        .collect();

    let result = find_duplicates(paths, 3, 3, 0);
    assert_eq!(result.duplicates.len(), 1);
    assert_eq!(result.duplicates[0].files.len(), 3);
    assert_eq!(result.duplicates[0].size, 0);
}

#[test]
fn test_unique_sizes_never_reported() {
    let dir = tempdir().unwrap();
    let paths = vec![
        write(dir.path(), "ten", &[7u8; 10]),
        write(dir.path(), "twenty", &[7u8; 20]),
        write(dir.path(), "thirty", &[7u8; 30]),
    ];
    let result = find_duplicates(paths, 2, 3, 0);
    assert!(result.duplicates.is_empty());
    assert!(result.failed.is_empty());
}

#[test]
fn test_same_pattern_different_size_never_grouped() {
    let dir = tempdir().unwrap();
    let paths = vec![
        write(dir.path(), "small", &[b'x'; 100]),
        write(dir.path(), "large", &[b'x'; 200]),
    ];
    assert!(find_duplicates(paths, 1, 3, 0).duplicates.is_empty());
}

#[test]
fn test_quick_hash_collision_resolved_by_full_hash() {
    let dir = tempdir().unwrap();
    // Same first, middle and last byte; differ elsewhere
    let a = write(dir.path(), "a", b"A---M---Z");
    let b = write(dir.path(), "b", b"A+++M+++Z");
    let c = write(dir.path(), "c", b"A---M---Z");
    assert_eq!(quick_fingerprint(&a, 3).unwrap(), quick_fingerprint(&b, 3).unwrap());

    let result = find_duplicates(vec![a.clone(), b, c.clone()], 2, 3, 0);
    assert_eq!(memberships(&result), BTreeSet::from([vec![a, c]]));
}

#[test]
fn test_sets_are_internally_consistent() {
    let dir = tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..24u8 {
        // Five distinct contents over three sizes
        let content = match i % 4 {
            0 => vec![1u8; 64],
            1 => vec![2u8; 64],
            2 => vec![1u8; 128],
            _ => (0..96).map(|n| n as u8 ^ ((i / 4) % 2)).collect(),
        };
        paths.push(write(dir.path(), &format!("f{i:02}"), &content));
    }

    let result = find_duplicates(paths, 3, 3, 0);
    assert_eq!(result.duplicates.len(), 5);
    for set in &result.duplicates {
        assert!(set.files.len() >= 2);
        let first = &set.files[0];
        let first_sample = quick_fingerprint(&first.path, 3).unwrap();
        let first_hash = full_hash(&first.path, 0).unwrap();
        for file in &set.files {
            assert_eq!(file.size, set.size);
            assert_eq!(quick_fingerprint(&file.path, 3).unwrap(), first_sample);
            assert_eq!(full_hash(&file.path, 0).unwrap(), first_hash);
        }
        assert_eq!(set.hash, first_hash);
    }
}

#[test]
fn test_repeated_runs_agree() {
    let dir = tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..12 {
        paths.push(write(dir.path(), &format!("f{i}"), format!("content {}", i % 3).as_bytes()));
    }

    let first = find_duplicates(paths.clone(), 4, 3, 0);
    let second = find_duplicates(paths, 4, 3, 0);
    assert_eq!(first.duplicates.len(), 3);
    assert_eq!(memberships(&first), memberships(&second));
}

#[test]
fn test_worker_count_defaulting() {
    let dir = tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..20 {
        paths.push(write(dir.path(), &format!("f{i}"), format!("{:04}", i % 7).as_bytes()));
    }

    let default = memberships(&find_duplicates(paths.clone(), 5, 3, 0));
    assert_eq!(memberships(&find_duplicates(paths.clone(), 0, 3, 0)), default);
    assert_eq!(memberships(&find_duplicates(paths.clone(), -4, 3, 0)), default);
    assert_eq!(memberships(&find_duplicates(paths, 1, 3, 0)), default);
    assert_eq!(DuplicateDetector::new(0).workers(), 5);
    assert_eq!(DuplicateDetector::new(-1).workers(), 5);
}

#[test]
fn test_tiny_buffer_falls_back_to_default() {
    let dir = tempdir().unwrap();
    let content = vec![42u8; 300_000];
    let a = write(dir.path(), "a", &content);
    let b = write(dir.path(), "b", &content);

    for buffer_size in [0, 1, 3, 4, 1024] {
        let result = find_duplicates(vec![a.clone(), b.clone()], 2, 3, buffer_size);
        assert_eq!(result.duplicates.len(), 1, "buffer size {buffer_size}");
    }
}

#[test]
fn test_missing_path_reported_at_metadata_stage() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"twin");
    let b = write(dir.path(), "b", b"twin");
    let missing = dir.path().join("missing");

    let result = find_duplicates(vec![a, b, missing.clone()], 2, 3, 0);
    assert_eq!(result.duplicates.len(), 1);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].path, missing);
    assert_eq!(result.failed[0].stage, Stage::Metadata);
}

#[test]
fn test_file_deleted_mid_run_is_isolated() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"identical bytes");
    let b = write(dir.path(), "b", b"identical bytes");
    let c = write(dir.path(), "c", b"identical bytes");

    // Stat first, then lose one file before any content is read
    let candidates: Vec<FileCandidate> = [&a, &b, &c]
        .into_iter()
        .map(|p| FileCandidate::from_path(p).unwrap())
        .collect();
    fs::remove_file(&c).unwrap();

    let result = DuplicateDetector::new(3).find_candidates(candidates);
    assert_eq!(memberships(&result), BTreeSet::from([vec![a, b]]));
    assert_eq!(result.failed_paths().collect::<Vec<_>>(), vec![c.as_path()]);
    assert_eq!(result.failed[0].stage, Stage::QuickHash);
}

#[test]
fn test_more_quick_samples_still_finds_duplicates() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"0123456789abcdef");
    let b = write(dir.path(), "b", b"0123456789abcdef");
    let c = write(dir.path(), "c", b"0123456X89abcdef");

    let result = find_duplicates(vec![a.clone(), b.clone(), c], 2, 16, 0);
    assert_eq!(memberships(&result), BTreeSet::from([vec![a, b]]));
}

#[test]
fn test_file_deleted_between_stages_fails_at_full_hash() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"identical bytes");
    let b = write(dir.path(), "b", b"identical bytes");
    let c = write(dir.path(), "c", b"identical bytes");

    let detector = DuplicateDetector::new(2);
    let (size_groups, failed) = bucket_by_size(vec![a.clone(), b.clone(), c.clone()]);
    assert!(failed.is_empty());
    let (quick_groups, failed) = detector.quick_hash_stage(size_groups);
    assert!(failed.is_empty());
    assert_eq!(quick_groups.len(), 1);
    assert_eq!(quick_groups[0].files.len(), 3);

    fs::remove_file(&c).unwrap();
    let (duplicates, failed) = detector.full_hash_stage(quick_groups);
    assert_eq!(duplicates.len(), 1);
    let mut members: Vec<PathBuf> = duplicates[0].files.iter().map(|f| f.path.clone()).collect();
    members.sort();
    assert_eq!(members, vec![a, b]);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].path, c);
    assert_eq!(failed[0].stage, Stage::FullHash);
}

#[test]
fn test_cache_does_not_hide_file_deleted_between_stages() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"twin");
    let b = write(dir.path(), "b", b"twin");
    let cache = Arc::new(HashCache::load(dir.path().join("cache.json.zst")));

    // First run fills the cache for both files
    let detector = DuplicateDetector::new(2).with_cache(Arc::clone(&cache));
    assert_eq!(detector.find(vec![a.clone(), b.clone()]).duplicates.len(), 1);
    assert_eq!(cache.len(), 2);

    let (size_groups, _) = bucket_by_size(vec![a, b.clone()]);
    let (quick_groups, _) = detector.quick_hash_stage(size_groups);
    fs::remove_file(&b).unwrap();
    let (duplicates, failed) = detector.full_hash_stage(quick_groups);
    assert!(duplicates.is_empty());
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].path, b);
    assert_eq!(failed[0].stage, Stage::FullHash);
}

#[test]
fn test_huge_worker_count_completes() {
    let dir = tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..9 {
        paths.push(write(dir.path(), &format!("f{i}"), &vec![b'x'; 8 + i % 3]));
    }

    let result = find_duplicates(paths, 1 << 40, 3, 0);
    assert_eq!(result.duplicates.len(), 3);
    assert!(result.duplicates.iter().all(|set| set.files.len() == 3));
}
