//! Streaming evaluation metrics and the per-split evaluation harness

mod adapter;
mod classification;
mod eval;
mod regression;
mod trait_def;

pub use adapter::OutputAdapter;
pub use classification::{Accuracy, BalancedAccuracy, RocAuc};
pub use eval::{EvalReport, Evaluation};
pub use regression::{MeanAbsoluteError, MeanSquaredError};
pub use trait_def::Metric;
