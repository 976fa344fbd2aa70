//! Rotating checkpoint retention
//!
//! Checkpoints are written as `checkpoint_epoch_{n}.json` under the run's
//! output directory. Only the newest `keep` files survive; older ones are
//! removed as new ones land. Removal failure is reported but never aborts
//! training, the new checkpoint is already safely on disk by then.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::StateDict;
use crate::optim::SgdState;
use crate::{Error, Result};

/// Full training snapshot: everything needed to resume a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingCheckpoint {
    pub epoch: usize,
    pub model: StateDict,
    pub optimizer: SgdState,
}

/// Writes checkpoints and rotates old ones out
pub struct CheckpointPolicy {
    dir: PathBuf,
    keep: usize,
    retained: VecDeque<PathBuf>,
}

impl CheckpointPolicy {
    /// `keep` is clamped to at least one retained checkpoint.
    ///
    /// Checkpoints already in `dir` from an earlier run are picked up in
    /// epoch order, so a resumed run rotates them out like its own.
    pub fn new(dir: impl Into<PathBuf>, keep: usize) -> Self {
        let dir = dir.into();
        let mut existing: Vec<(usize, PathBuf)> = Vec::new();
        if let Ok(entries) = fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let epoch = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_prefix("checkpoint_epoch_"))
                    .and_then(|n| n.strip_suffix(".json"))
                    .and_then(|n| n.parse::<usize>().ok());
                if let Some(epoch) = epoch {
                    existing.push((epoch, path));
                }
            }
        }
        existing.sort_by_key(|&(epoch, _)| epoch);
        Self {
            dir,
            keep: keep.max(1),
            retained: existing.into_iter().map(|(_, path)| path).collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one checkpoint and drop the oldest beyond the retention limit
    pub fn save(&mut self, checkpoint: &TrainingCheckpoint) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("checkpoint_epoch_{}.json", checkpoint.epoch));
        let json = serde_json::to_string(checkpoint)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(&path, json).map_err(|source| Error::StorageWrite {
            path: path.clone(),
            source,
        })?;

        self.retained.push_back(path.clone());
        while self.retained.len() > self.keep {
            let stale = self.retained.pop_front().unwrap_or_default();
            if let Err(e) = fs::remove_file(&stale) {
                eprintln!("warning: could not remove {}: {e}", stale.display());
            }
        }
        Ok(path)
    }
}
