//! acoplar: training and evaluation engine for 3D-grid convolutional
//! ligand pose and binding-affinity scoring models.
//!
//! The crate trains a scoring model over voxelized ligand-receptor grids
//! supplied by a [`data::GridSource`], evaluates it on a schedule, writes
//! rotating checkpoints, and loads historical weight files whose parameter
//! names predate the current layer namespace.
//!
//! # Example
//!
//! ```
//! use acoplar::config::TrainOptions;
//! use acoplar::data::SyntheticGridSource;
//! use acoplar::model::GridDims;
//! use acoplar::setup::run_training;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let dims = GridDims::new(2, 2);
//! let train = SyntheticGridSource::random(dims, 4, 2, true, 42);
//! let options = TrainOptions {
//!     iterations: 2,
//!     test_every: 1,
//!     checkpoint_every: 1,
//!     out_dir: dir.path().to_path_buf(),
//!     seed: Some(42),
//!     silent: true,
//!     ..TrainOptions::default()
//! };
//! let run = run_training(&options, &train, None).unwrap();
//! assert_eq!(run.epochs, 2);
//! ```

pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod optim;
pub mod report;
pub mod setup;
pub mod tensor;
pub mod train;

pub use error::{Error, Result};
pub use tensor::Tensor;
