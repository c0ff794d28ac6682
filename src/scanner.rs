use std::path::{Path, PathBuf};

use indicatif::{HumanBytes, HumanCount, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use walkdir::WalkDir;

/// Lists every regular file under `path` of at least `min_size` bytes.
///
/// Directory traversal lives outside the detector; this is the collaborator
/// that feeds it paths. Entries that cannot be read are logged and skipped.
pub fn collect_files(path: &Path, min_size: u64) -> Vec<PathBuf> {
    info!("Scanning {}", path.display());

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message("Scanning files and directories...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let mut files = Vec::new();
    let mut total_dirs = 0u64;
    let mut skipped_small = 0u64;
    let mut total_size = 0u64;

    for entry in WalkDir::new(path) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read directory entry: {}", e);
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            total_dirs += 1;
            continue;
        }
        if !file_type.is_file() {
            debug!("Skipping non-regular file: '{}'", entry.path().display());
            continue;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                // Still handed to the detector, which reports it as failed
                warn!("Failed to read metadata for '{}': {}", entry.path().display(), e);
                files.push(entry.into_path());
                continue;
            }
        };
        if size < min_size {
            skipped_small += 1;
            continue;
        }
        total_size += size;
        files.push(entry.into_path());

        if files.len() % 1000 == 0 {
            pb.set_message(format!("Scanning files... {} found", HumanCount(files.len() as u64)));
        }
    }
    pb.finish_and_clear();

    info!(
        "Found {} files in {} directories ({})",
        HumanCount(files.len() as u64),
        HumanCount(total_dirs),
        HumanBytes(total_size)
    );
    if skipped_small > 0 {
        info!("Skipped {} files below the minimum size", HumanCount(skipped_small));
    }
    files
}
