/// Worker count used when the caller asks for zero or fewer.
pub const DEFAULT_WORKERS: usize = 5;

pub fn normalize_workers(requested: isize) -> usize {
    if requested <= 0 { DEFAULT_WORKERS } else { requested as usize }
}

/// Splits `groups` into `workers` contiguous slices of `ceil(N / workers)`.
///
/// Always returns exactly `workers` slices; trailing slices are shorter or
/// empty when the groups run out. Concatenating the slices gives back the
/// input in its original order. A worker count of zero uses
/// [`DEFAULT_WORKERS`].
pub fn partition<T>(groups: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = if workers == 0 { DEFAULT_WORKERS } else { workers };
    let slice_len = groups.len().div_ceil(workers).max(1);

    let mut rest = groups.into_iter();
    (0..workers)
        .map(|_| rest.by_ref().take(slice_len).collect())
        .collect()
}

/// [`partition`] without the trailing empty slices.
///
/// Yields the same non-empty slices, in the same order, while allocating at
/// most one slice per group, so any worker count is safe to pass.
pub fn partition_occupied<T>(groups: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = if workers == 0 { DEFAULT_WORKERS } else { workers };
    let workers = workers.min(groups.len()).max(1);
    partition(groups, workers)
        .into_iter()
        .filter(|slice| !slice.is_empty())
        .collect()
}
