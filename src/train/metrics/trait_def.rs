use ndarray::{Array1, Array2};

/// Streaming evaluation metric.
///
/// Metrics accumulate over the batches of one evaluation pass and produce a
/// scalar at the end. `predictions` arrive already transformed by the
/// metric's output adapter, so each implementation sees exactly the
/// representation it expects.
pub trait Metric {
    /// Discard accumulated state before a new pass
    fn reset(&mut self);

    /// Fold in one batch of adapted predictions and targets
    fn update(&mut self, predictions: &Array2<f32>, targets: &Array1<f32>);

    /// Scalar value over everything seen since the last reset
    fn finalize(&self) -> f32;

    fn name(&self) -> &'static str;
}
