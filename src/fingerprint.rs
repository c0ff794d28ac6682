use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

/// Read buffer used for full hashing when the caller gives none.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Sampled bytes per file: first, middle and last.
pub const DEFAULT_QUICK_SAMPLES: usize = 3;

/// Upper bound on sampled bytes, keeping the quick stage O(1) per file.
pub const MAX_QUICK_SAMPLES: usize = 64;

/// Buffers of three bytes or fewer fall back to [`DEFAULT_BUFFER_SIZE`].
pub fn normalize_buffer_size(buffer_size: usize) -> usize {
    if buffer_size <= 3 { DEFAULT_BUFFER_SIZE } else { buffer_size }
}

pub fn normalize_quick_samples(samples: usize) -> usize {
    match samples {
        0 => DEFAULT_QUICK_SAMPLES,
        n => n.min(MAX_QUICK_SAMPLES),
    }
}

/// Offsets sampled for a file of `len` bytes.
///
/// The first and last byte are always included, the rest are spread evenly
/// (`k * len / (samples - 1)`), so three samples give offsets
/// `0, len / 2, len - 1`. Offsets that collide in short files appear once.
pub fn sample_offsets(len: u64, samples: usize) -> Vec<u64> {
    if len == 0 {
        return Vec::new();
    }
    let samples = normalize_quick_samples(samples) as u128;
    let mut offsets = vec![0];
    if samples >= 2 {
        for k in 1..samples - 1 {
            offsets.push((k * len as u128 / (samples - 1)) as u64);
        }
        offsets.push(len - 1);
    }
    offsets.dedup();
    offsets
}

/// Reads a handful of bytes at fixed offsets and returns them in offset order.
///
/// This is a cheap filter, not a hash: different files may share a sample,
/// but equal files always do.
pub fn quick_fingerprint(file_path: &Path, samples: usize) -> Result<Vec<u8>> {
    let mut file = File::open(file_path)
        .with_context(|| format!("Failed to open file: '{}'", file_path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("Failed to read metadata for: '{}'", file_path.display()))?
        .len();

    let offsets = sample_offsets(len, samples);
    let mut sample = Vec::with_capacity(offsets.len());
    let mut byte = [0u8; 1];
    for offset in offsets {
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(&mut byte))
            .with_context(|| format!("Failed to read byte {} of '{}'", offset, file_path.display()))?;
        sample.push(byte[0]);
    }
    Ok(sample)
}

/// Streams the whole file through BLAKE3 and returns the hex digest.
pub fn full_hash(file_path: &Path, buffer_size: usize) -> Result<String> {
    debug!("Calculating hash for: '{}'", file_path.display());

    let mut file = File::open(file_path)
        .with_context(|| format!("Failed to open file: '{}'", file_path.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; normalize_buffer_size(buffer_size)];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .with_context(|| format!("Failed to read file: '{}'", file_path.display()))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        total_bytes += bytes_read as u64;
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!("Hash calculated for '{}': {} ({} bytes)", file_path.display(), hash, total_bytes);
    Ok(hash)
}

/// Digest of zero bytes; every empty file hashes to this.
pub fn empty_hash() -> String {
    blake3::hash(&[]).to_hex().to_string()
}
