use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::cache::HashCache;
use crate::cli::Cli;
use crate::fingerprint::{DEFAULT_BUFFER_SIZE, DEFAULT_QUICK_SAMPLES};
use crate::partition::DEFAULT_WORKERS;

/// Run settings, layered as defaults < TOML file < command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Parallel workers; zero or negative means the default.
    pub workers: isize,
    /// Bytes sampled per file before full hashing.
    pub quick_samples: usize,
    /// Read buffer for full hashing, in bytes.
    pub buffer_size: usize,
    /// Skip files smaller than this many MB.
    pub min_size_mb: u64,
    pub use_cache: bool,
    pub cache_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS as isize,
            quick_samples: DEFAULT_QUICK_SAMPLES,
            buffer_size: DEFAULT_BUFFER_SIZE,
            min_size_mb: 0,
            use_cache: true,
            cache_file: None,
        }
    }
}

impl Config {
    /// Config file picked up from the working directory when none is given.
    pub fn default_location() -> PathBuf {
        PathBuf::from(format!("{}.toml", env!("CARGO_PKG_NAME")))
    }

    /// Loads `explicit` (which must exist), else the default location if
    /// present, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::default_location();
                if !path.is_file() {
                    debug!("No config file at '{}', using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };

        info!("Loading config from '{}'", path.display());
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: '{}'", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Failed to parse config file: '{}'", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Command-line flags win over anything loaded from file.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(workers) = cli.workers {
            self.workers = workers;
        }
        if let Some(samples) = cli.quick_samples {
            self.quick_samples = samples;
        }
        if let Some(buffer_size) = cli.buffer_size {
            self.buffer_size = buffer_size;
        }
        if let Some(min_size) = cli.min_size {
            self.min_size_mb = min_size;
        }
        if cli.no_cache {
            self.use_cache = false;
        }
        if let Some(cache_file) = &cli.cache_file {
            self.cache_file = Some(cache_file.clone());
        }
    }

    pub fn min_size_bytes(&self) -> u64 {
        self.min_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_file.clone().unwrap_or_else(HashCache::default_location)
    }
}
