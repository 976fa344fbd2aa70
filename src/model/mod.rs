//! Model variants and the scoring-model capability
//!
//! The convolutional network's internal topology is outside this core; what
//! the training engine and the checkpoint loader need from a model is its
//! variant, its expected grid shape, a forward pass, an analytic backward
//! pass, and named parameter access for optimization and (de)serialization.

mod scorer;

pub use scorer::{GridScorer, HIDDEN_FEATURES};

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::{Result, Tensor};

/// Serialized parameter mapping: dotted parameter key to flat tensor values.
/// `BTreeMap` keeps key order deterministic across save/load.
pub type StateDict = BTreeMap<String, Vec<f32>>;

/// Which prediction heads a model carries. Selected once at construction or
/// load time, immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    /// Binary pose classification only
    PoseOnly,
    /// Pose classification plus binding-affinity regression
    PoseAndAffinity,
}

/// Architecture generation of a checkpoint, with its declared input channel
/// count. The dense family is known but deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// Legacy generation: 21 ligand types plus 14 receptor types
    Legacy2017,
    /// Current generation: 14 ligand types plus 14 receptor types
    Current2018,
}

impl Generation {
    /// Input channels the generation's voxelizer produces
    pub fn input_channels(&self) -> usize {
        match self {
            Generation::Legacy2017 => 35,
            Generation::Current2018 => 28,
        }
    }

    /// Identifier substring used in checkpoint names
    pub fn tag(&self) -> &'static str {
        match self {
            Generation::Legacy2017 => "default2017",
            Generation::Current2018 => "default2018",
        }
    }
}

/// Fixed per-batch grid shape: `channels` density channels over a cubic grid
/// of `points` voxels per side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub channels: usize,
    pub points: usize,
}

impl GridDims {
    pub fn new(channels: usize, points: usize) -> Self {
        Self { channels, points }
    }

    /// Length of one flattened grid sample
    pub fn flat_len(&self) -> usize {
        self.channels * self.points * self.points * self.points
    }
}

impl fmt::Display for GridDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.channels, self.points, self.points, self.points
        )
    }
}

/// Number of voxels per grid dimension for a given physical grid size.
pub fn grid_points(dimension: f64, resolution: f64) -> usize {
    (dimension / resolution).round() as usize + 1
}

/// Forward-pass output; the arity mirrors the model variant
#[derive(Debug, Clone)]
pub enum ModelOutput {
    Pose {
        /// Per-sample class log-probabilities, shape `(N, 2)`
        pose_log_probs: Array2<f32>,
    },
    PoseAffinity {
        pose_log_probs: Array2<f32>,
        /// Per-sample predicted binding affinity, shape `(N,)`
        affinity_pred: Array1<f32>,
    },
}

impl ModelOutput {
    pub fn pose_log_probs(&self) -> &Array2<f32> {
        match self {
            ModelOutput::Pose { pose_log_probs } => pose_log_probs,
            ModelOutput::PoseAffinity { pose_log_probs, .. } => pose_log_probs,
        }
    }

    pub fn affinity_pred(&self) -> Option<&Array1<f32>> {
        match self {
            ModelOutput::Pose { .. } => None,
            ModelOutput::PoseAffinity { affinity_pred, .. } => Some(affinity_pred),
        }
    }
}

/// Loss gradients with respect to the model's output heads, fed to the
/// backward pass
#[derive(Debug, Clone)]
pub struct OutputGrads {
    /// Gradient w.r.t. the pose-head logits, shape `(N, 2)`
    pub pose_logits: Array2<f32>,
    /// Gradient w.r.t. the affinity prediction, shape `(N,)`; dual-task only
    pub affinity: Option<Array1<f32>>,
}

/// The model capability the engine and loader are written against:
/// forward/backward over flattened grid batches plus named parameter access
/// for optimization and checkpointing.
pub trait ScoringModel {
    fn variant(&self) -> ModelVariant;

    fn dims(&self) -> GridDims;

    /// Forward pass over a batch of flattened grids, shape `(N, flat_len)`
    fn forward(&self, grids: &Array2<f32>) -> ModelOutput;

    /// Accumulate parameter gradients for the given output-head gradients
    fn backward(&mut self, grids: &Array2<f32>, grads: &OutputGrads);

    /// Named learnable parameters, in a stable order
    fn parameters_mut(&mut self) -> Vec<(&'static str, &mut Tensor)>;

    /// Snapshot of all parameters as a serializable mapping
    fn state(&self) -> StateDict;

    /// Install a parameter mapping. Fails if any expected parameter is
    /// missing, any value has the wrong length, or any key in the mapping
    /// does not belong to this model.
    fn load_state(&mut self, state: StateDict) -> Result<()>;
}
