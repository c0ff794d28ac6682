use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "find-file-dups")]
#[command(version, about = "Find duplicate files by size, sampled bytes and content hash")]
pub struct Cli {
    /// Directory to scan for duplicates
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Number of parallel workers (zero or negative: 5)
    #[arg(short, long, allow_negative_numbers = true)]
    pub workers: Option<isize>,

    /// Bytes sampled per file before full hashing (default: 3)
    #[arg(long)]
    pub quick_samples: Option<usize>,

    /// Read buffer for full hashing in bytes (default: 65536)
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Skip files smaller than specified size in MB (default: 0)
    #[arg(short, long)]
    pub min_size: Option<u64>,

    /// Config file (default: ./find-file-dups.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Hash cache file (default: ./find-file-dups-cache.json.zst)
    #[arg(long)]
    pub cache_file: Option<PathBuf>,

    /// Do not read or write the hash cache
    #[arg(long)]
    pub no_cache: bool,

    /// Print the result as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
