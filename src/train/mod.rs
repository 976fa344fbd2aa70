//! Training engine, step functions, losses and evaluation metrics

pub mod engine;
pub mod loss;
pub mod metrics;
pub mod step;

pub use engine::{Engine, EngineRun, EpochContext};
pub use loss::{NllLoss, PseudoHuberLoss};
pub use metrics::{EvalReport, Evaluation, Metric, OutputAdapter};
pub use step::{OutputRecord, StepFunction};
