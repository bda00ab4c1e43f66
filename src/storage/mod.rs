//! Storage module for persisting crawl progress
//!
//! This module handles the checkpoint that lets an interrupted crawl resume:
//! - the [`CheckpointStorage`] backend interface
//! - the JSON file backend, one file per calendar day
//! - atomic file replacement shared with the results writer

mod checkpoint;
mod traits;

pub use checkpoint::{CheckpointDate, JsonCheckpointStore};
pub use traits::{Checkpoint, CheckpointResult, CheckpointStorage};

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replaces `path` with `bytes` without ever exposing a partial file
///
/// The content goes to a temporary file in the destination directory, is
/// synced, and is then renamed over `path`. Missing parent directories are
/// created.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
