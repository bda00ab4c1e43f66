//! JSON checkpoint file
//!
//! One file per calendar day, `checkpoint_<YYYYMMDD>.json`, holding the
//! accumulated posts of that day as a JSON array. Every flush re-reads the
//! file, merges, and replaces it through a temporary file in the same
//! directory, so readers only ever see a complete array. Comment forests are
//! written flat, so the file's nesting does not grow with thread depth.

use crate::model::Post;
use crate::storage::{write_atomic, Checkpoint, CheckpointResult, CheckpointStorage};
use crate::CheckpointError;
use chrono::{Local, NaiveDate};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Which calendar day a store writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointDate {
    /// Local date at the time of each flush
    Today,
    Fixed(NaiveDate),
}

/// Checkpoint file in a directory, keyed by date
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    dir: PathBuf,
    date: CheckpointDate,
}

impl JsonCheckpointStore {
    /// Creates a store writing to today's file in `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            date: CheckpointDate::Today,
        }
    }

    /// Creates a store pinned to one date
    pub fn for_date(dir: impl Into<PathBuf>, date: NaiveDate) -> Self {
        Self {
            dir: dir.into(),
            date: CheckpointDate::Fixed(date),
        }
    }

    /// Path of the checkpoint file for the store's date
    pub fn path(&self) -> PathBuf {
        let date = match self.date {
            CheckpointDate::Today => Local::now().date_naive(),
            CheckpointDate::Fixed(date) => date,
        };
        self.dir
            .join(format!("checkpoint_{}.json", date.format("%Y%m%d")))
    }

    fn read(path: &Path) -> CheckpointResult<Checkpoint> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Checkpoint::new()),
            Err(source) => {
                return Err(CheckpointError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let posts: Vec<Post> =
            serde_json::from_str(&content).map_err(|source| CheckpointError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Checkpoint::from_posts(posts))
    }
}

impl CheckpointStorage for JsonCheckpointStore {
    fn load(&self) -> CheckpointResult<Checkpoint> {
        Self::read(&self.path())
    }

    fn flush(&mut self, posts: &[Post]) -> CheckpointResult<usize> {
        let path = self.path();
        let mut checkpoint = Self::read(&path)?;
        let added = checkpoint.merge(posts);

        let bytes =
            serde_json::to_vec_pretty(checkpoint.posts()).map_err(|source| CheckpointError::Encode {
                path: path.clone(),
                source,
            })?;
        write_atomic(&path, &bytes).map_err(|source| CheckpointError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            flushed = posts.len(),
            added,
            total = checkpoint.len(),
            "Checkpoint written"
        );
        Ok(checkpoint.len())
    }

    fn location(&self) -> PathBuf {
        self.path()
    }
}
