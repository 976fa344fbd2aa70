//! Stochastic gradient descent with momentum and weight decay
//!
//! Velocity buffers are keyed by parameter name so the optimizer state can
//! be checkpointed alongside the model and restored onto a freshly
//! constructed optimizer.

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::Tensor;

/// SGD optimizer
pub struct SgdOptimizer {
    lr: f32,
    momentum: f32,
    weight_decay: f32,
    velocities: BTreeMap<String, Array1<f32>>,
}

/// Serializable optimizer snapshot for checkpointing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SgdState {
    pub lr: f32,
    pub momentum: f32,
    pub weight_decay: f32,
    pub velocities: BTreeMap<String, Vec<f32>>,
}

impl SgdOptimizer {
    pub fn new(lr: f32, momentum: f32, weight_decay: f32) -> Self {
        Self {
            lr,
            momentum,
            weight_decay,
            velocities: BTreeMap::new(),
        }
    }

    pub fn lr(&self) -> f32 {
        self.lr
    }

    pub fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    /// Clear accumulated gradients on all parameters
    pub fn zero_grad(&mut self, params: &mut [(&'static str, &mut Tensor)]) {
        for (_, param) in params.iter_mut() {
            param.zero_grad();
        }
    }

    /// Apply one update to every parameter that has a gradient
    pub fn step(&mut self, params: &mut [(&'static str, &mut Tensor)]) {
        for (name, param) in params.iter_mut() {
            let Some(mut grad) = param.grad().cloned() else {
                continue;
            };
            if self.weight_decay > 0.0 {
                grad = grad + &(param.data() * self.weight_decay);
            }

            if self.momentum > 0.0 {
                let velocity = self
                    .velocities
                    .entry((*name).to_string())
                    .or_insert_with(|| Array1::zeros(grad.len()));
                *velocity = &*velocity * self.momentum - &grad * self.lr;
                *param.data_mut() = param.data() + &*velocity;
            } else {
                *param.data_mut() = param.data() - &(grad * self.lr);
            }
        }
    }

    /// Snapshot for checkpointing
    pub fn state(&self) -> SgdState {
        SgdState {
            lr: self.lr,
            momentum: self.momentum,
            weight_decay: self.weight_decay,
            velocities: self
                .velocities
                .iter()
                .map(|(name, v)| (name.clone(), v.to_vec()))
                .collect(),
        }
    }

    /// Restore a snapshot taken with [`SgdOptimizer::state`]
    pub fn load_state(&mut self, state: SgdState) {
        self.lr = state.lr;
        self.momentum = state.momentum;
        self.weight_decay = state.weight_decay;
        self.velocities = state
            .velocities
            .into_iter()
            .map(|(name, v)| (name, Array1::from_vec(v)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params_with_grad(values: Vec<f32>, grad: Vec<f32>) -> Tensor {
        let mut t = Tensor::from_vec(values, true);
        t.accumulate_grad(&Array1::from_vec(grad));
        t
    }

    #[test]
    fn test_plain_sgd_step() {
        let mut optimizer = SgdOptimizer::new(0.1, 0.0, 0.0);
        let mut t = params_with_grad(vec![1.0, 2.0], vec![1.0, -1.0]);
        let mut params = vec![("w", &mut t)];

        optimizer.step(&mut params);
        assert_eq!(t.data(), &array![0.9, 2.1]);
    }

    #[test]
    fn test_momentum_accumulates() {
        let mut optimizer = SgdOptimizer::new(0.1, 0.9, 0.0);
        let mut t = params_with_grad(vec![0.0], vec![1.0]);

        let mut params = vec![("w", &mut t)];
        optimizer.step(&mut params);
        // v1 = -0.1
        assert!((t.data()[0] - (-0.1)).abs() < 1e-6);

        let mut params = vec![("w", &mut t)];
        optimizer.step(&mut params);
        // v2 = 0.9 * -0.1 - 0.1 = -0.19
        assert!((t.data()[0] - (-0.29)).abs() < 1e-6);
    }

    #[test]
    fn test_weight_decay_shrinks_params() {
        let mut optimizer = SgdOptimizer::new(0.1, 0.0, 0.5);
        let mut t = params_with_grad(vec![2.0], vec![0.0]);
        let mut params = vec![("w", &mut t)];

        optimizer.step(&mut params);
        // effective grad = 0 + 0.5 * 2.0 = 1.0
        assert!((t.data()[0] - 1.9).abs() < 1e-6);
    }

    #[test]
    fn test_skips_params_without_grad() {
        let mut optimizer = SgdOptimizer::new(0.1, 0.0, 0.0);
        let mut t = Tensor::from_vec(vec![1.0], true);
        let mut params = vec![("w", &mut t)];

        optimizer.step(&mut params);
        assert_eq!(t.data()[0], 1.0);
    }

    #[test]
    fn test_state_round_trip() {
        let mut optimizer = SgdOptimizer::new(0.1, 0.9, 0.001);
        let mut t = params_with_grad(vec![1.0, 1.0], vec![0.5, 0.5]);
        let mut params = vec![("w", &mut t)];
        optimizer.step(&mut params);

        let state = optimizer.state();
        assert_eq!(state.velocities.len(), 1);

        let mut restored = SgdOptimizer::new(1.0, 0.0, 0.0);
        restored.load_state(state);
        assert_eq!(restored.lr(), 0.1);
        assert_eq!(restored.state().velocities["w"].len(), 2);
    }

    #[test]
    fn test_zero_grad() {
        let mut optimizer = SgdOptimizer::new(0.1, 0.0, 0.0);
        let mut t = params_with_grad(vec![1.0], vec![1.0]);
        let mut params = vec![("w", &mut t)];

        optimizer.zero_grad(&mut params);
        assert!(t.grad().is_none());
    }
}
