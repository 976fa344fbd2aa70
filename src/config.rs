//! Run configuration
//!
//! Defaults follow the long-standing training recipe for these models;
//! a run's effective options are echoed into the report log so every
//! `training.log` records the exact configuration that produced it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::report::ReportSink;
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    /// SGD learning rate. Held as f64 so the option echo reproduces the
    /// configured value exactly; narrowed when the optimizer is built.
    pub base_lr: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    /// Training epochs to run
    pub iterations: usize,
    /// Evaluate and report every this many epochs
    pub test_every: usize,
    /// Write a checkpoint every this many epochs
    pub checkpoint_every: usize,
    /// Rotating checkpoint retention count
    pub num_checkpoints: usize,
    /// Directory for checkpoints and the report log
    pub out_dir: PathBuf,
    /// Fixed seed for reproducible runs; a random seed is drawn when unset
    pub seed: Option<u64>,
    /// In-place epoch counter on the console
    pub progress: bool,
    /// Suppress console reporting (the log file is always written)
    pub silent: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            base_lr: 0.01,
            momentum: 0.9,
            weight_decay: 0.001,
            iterations: 250_000,
            test_every: 1000,
            checkpoint_every: 100,
            num_checkpoints: 1,
            out_dir: PathBuf::from("."),
            seed: None,
            progress: false,
            silent: false,
        }
    }
}

impl TrainOptions {
    /// Write every option as a `key = value` line into the report sink
    pub fn echo(&self, sink: &mut ReportSink) -> Result<()> {
        sink.line("--- acoplar training ---")?;
        let value =
            serde_json::to_value(self).map_err(|e| Error::Serialization(e.to_string()))?;
        if let serde_json::Value::Object(fields) = value {
            for (name, field) in fields {
                sink.line(&format!("{name} = {field}"))?;
            }
        }
        sink.line("")?;
        Ok(())
    }
}
