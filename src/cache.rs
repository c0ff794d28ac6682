use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use indicatif::{HumanBytes, HumanCount, ProgressBar};
use log::{debug, info, warn};
use zstd::stream::{Encoder, decode_all};

use crate::candidate::FileCandidate;

/// A thread-safe cache of full-content hashes.
///
/// Maps a file path to `(mtime, size, hash)`. An entry is only trusted while
/// the candidate's modification time and size still match it. The cache is
/// stored on disk as Zstandard-compressed JSON.
pub struct HashCache {
    /// Path to the cache file on disk.
    pub cache_file: PathBuf,
    cache: Arc<Mutex<HashMap<String, (u64, u64, String)>>>,
}

/// Paths that are not valid UTF-8 have no key and are never cached.
fn cache_key(path: &Path) -> Option<String> {
    path.to_str().map(str::to_owned)
}

fn mtime_secs(candidate: &FileCandidate) -> u64 {
    candidate
        .modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl HashCache {
    /// Cache file used when none is configured: `<package>-cache.json.zst` in
    /// the working directory.
    pub fn default_location() -> PathBuf {
        PathBuf::from(format!("{}-cache.json.zst", env!("CARGO_PKG_NAME")))
    }

    /// Loads the cache from `cache_file`, starting empty if the file is
    /// missing or unreadable.
    pub fn load(cache_file: impl Into<PathBuf>) -> Self {
        let cache_file = cache_file.into();
        let mut cache = HashMap::new();

        if let Ok(compressed) = fs::read(&cache_file) {
            info!(
                "Loading hash cache from: {} ({})",
                cache_file.display(),
                HumanBytes(compressed.len() as u64)
            );
            let spinner = ProgressBar::new_spinner();
            spinner.set_message("Loading hash cache...");
            spinner.enable_steady_tick(std::time::Duration::from_millis(100));

            match decode_all(&compressed[..]).map_err(anyhow::Error::from).and_then(|bytes| {
                serde_json::from_slice::<HashMap<String, (u64, u64, String)>>(&bytes)
                    .map_err(anyhow::Error::from)
            }) {
                Ok(parsed) => {
                    info!("Hash cache has {} entries", HumanCount(parsed.len() as u64));
                    cache = parsed;
                }
                Err(e) => warn!("Failed to read hash cache ({}), starting fresh", e),
            }
            spinner.finish_and_clear();
        } else {
            warn!("No hash cache file found, starting fresh");
        }

        Self {
            cache_file,
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    /// Returns the cached hash if the entry matches the candidate's mtime and size.
    pub fn get_hash(&self, candidate: &FileCandidate) -> Option<String> {
        let cache = self.cache.lock().ok()?;
        let (cached_mtime, cached_size, cached_hash) = cache.get(&cache_key(&candidate.path)?)?;
        (*cached_mtime == mtime_secs(candidate) && *cached_size == candidate.size)
            .then(|| cached_hash.clone())
    }

    pub fn set_hash(&self, candidate: &FileCandidate, hash: String) {
        let Some(key) = cache_key(&candidate.path) else {
            debug!("Not caching non UTF-8 path '{}'", candidate.path.display());
            return;
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, (mtime_secs(candidate), candidate.size, hash));
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the cache to disk, compressing with all available cores.
    pub fn save(&self) -> Result<()> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Saving hash cache...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));

        let content = {
            let cache = self
                .cache
                .lock()
                .map_err(|_| anyhow::anyhow!("Hash cache lock poisoned"))?;
            serde_json::to_vec(&*cache)?
        };
        let file = fs::File::create(&self.cache_file)
            .with_context(|| format!("Failed to create cache file: '{}'", self.cache_file.display()))?;
        let mut encoder = Encoder::new(file, 9)?;
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        if threads > 1 {
            if let Err(err) = encoder.multithread(threads as u32) {
                info!(
                    "Failed to enable multi-threaded compression ({}), using single thread",
                    err
                );
            }
        }
        encoder.write_all(&content)?;
        encoder.finish()?;
        spinner.finish_and_clear();

        let new_size = fs::metadata(&self.cache_file).map(|m| m.len()).unwrap_or(0);
        info!(
            "Saved hash cache to {} ({})",
            self.cache_file.display(),
            HumanBytes(new_size)
        );
        Ok(())
    }
}
