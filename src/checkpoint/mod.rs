//! Checkpoint compatibility and persistence
//!
//! Two concerns live here: loading historical checkpoints whose flat
//! parameter names predate the current hierarchical namespace, and writing
//! rotating training checkpoints of model plus optimizer state.

mod keymap;
mod loader;
mod policy;

pub use keymap::rename_key;
pub use loader::load_scoring_model;
pub use policy::{CheckpointPolicy, TrainingCheckpoint};
