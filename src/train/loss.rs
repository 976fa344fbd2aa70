//! Loss functions for the two prediction heads
//!
//! Pose classification trains under negative log-likelihood over class
//! log-probabilities; affinity regression trains under a pseudo-Huber loss
//! that is quadratic near zero and linear for large residuals, so a handful
//! of badly mispredicted affinities cannot dominate the gradient.

use ndarray::{Array1, Array2};

/// Negative log-likelihood over per-sample class log-probabilities
#[derive(Debug, Clone, Default)]
pub struct NllLoss;

impl NllLoss {
    /// Mean negative log-probability of the labeled class
    pub fn loss(&self, log_probs: &Array2<f32>, labels: &Array1<usize>) -> f32 {
        let n = labels.len().max(1) as f32;
        let total: f32 = labels
            .iter()
            .enumerate()
            .map(|(i, &label)| -log_probs[[i, label]])
            .sum();
        total / n
    }

    /// Gradient w.r.t. the pre-softmax logits: `(softmax - onehot) / N`
    pub fn grad(&self, log_probs: &Array2<f32>, labels: &Array1<usize>) -> Array2<f32> {
        let n = labels.len().max(1) as f32;
        let mut grad = log_probs.mapv(f32::exp);
        for (i, &label) in labels.iter().enumerate() {
            grad[[i, label]] -= 1.0;
        }
        grad / n
    }
}

/// Pseudo-Huber loss, `delta^2 * (sqrt(1 + (r/delta)^2) - 1)`, mean-reduced
#[derive(Debug, Clone)]
pub struct PseudoHuberLoss {
    delta: f32,
}

impl PseudoHuberLoss {
    pub fn new(delta: f32) -> Self {
        assert!(delta > 0.0, "delta must be positive");
        Self { delta }
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }

    pub fn loss(&self, predictions: &Array1<f32>, targets: &Array1<f32>) -> f32 {
        let n = targets.len().max(1) as f32;
        let d2 = self.delta * self.delta;
        let total: f32 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(&p, &t)| {
                let r = p - t;
                d2 * ((1.0 + (r / self.delta).powi(2)).sqrt() - 1.0)
            })
            .sum();
        total / n
    }

    /// Gradient w.r.t. the predictions: `r / sqrt(1 + (r/delta)^2) / N`
    pub fn grad(&self, predictions: &Array1<f32>, targets: &Array1<f32>) -> Array1<f32> {
        let n = targets.len().max(1) as f32;
        Array1::from_shape_fn(predictions.len(), |i| {
            let r = predictions[i] - targets[i];
            r / (1.0 + (r / self.delta).powi(2)).sqrt() / n
        })
    }
}

impl Default for PseudoHuberLoss {
    fn default() -> Self {
        Self::new(4.0)
    }
}
