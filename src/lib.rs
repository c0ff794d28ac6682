pub mod cli;
pub mod cache;
pub mod candidate;
pub mod config;
pub mod detector;
pub mod duplicates;
pub mod fingerprint;
pub mod group;
pub mod partition;
pub mod scanner;
pub mod utils;

pub use cli::Cli;
pub use cache::HashCache;
pub use candidate::{CandidateStatus, FileCandidate};
pub use config::Config;
pub use detector::{DuplicateDetector, find_duplicates};
pub use duplicates::{DuplicateSet, FailedFile, QuickHashGroup, RunResult, Stage, print_results};
pub use fingerprint::{full_hash, quick_fingerprint};
pub use group::{SizeGroup, bucket_by_size, group_by_key};
pub use partition::partition;
pub use scanner::collect_files;
pub use utils::{format_human_elapsed, format_modified};
