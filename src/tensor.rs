//! Parameter tensor with explicit gradient storage
//!
//! Model parameters are flat `f32` buffers with an optional gradient slot.
//! Gradients are produced analytically by the model's backward pass and
//! consumed by the optimizer; there is no autograd graph in this core.

use ndarray::Array1;

/// A learnable parameter: flat data plus an accumulated gradient
#[derive(Debug, Clone)]
pub struct Tensor {
    data: Array1<f32>,
    grad: Option<Array1<f32>>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a tensor from raw values
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self {
            data: Array1::from_vec(data),
            grad: None,
            requires_grad,
        }
    }

    /// Create a zero-filled tensor
    pub fn zeros(len: usize, requires_grad: bool) -> Self {
        Self {
            data: Array1::zeros(len),
            grad: None,
            requires_grad,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        &mut self.data
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.data.to_vec()
    }

    /// Accumulated gradient, if any step has produced one since the last
    /// [`Tensor::zero_grad`]
    pub fn grad(&self) -> Option<&Array1<f32>> {
        self.grad.as_ref()
    }

    /// Add a gradient contribution. No-op when the tensor is frozen.
    pub fn accumulate_grad(&mut self, delta: &Array1<f32>) {
        if !self.requires_grad {
            return;
        }
        match self.grad.as_mut() {
            Some(grad) => *grad += delta,
            None => self.grad = Some(delta.clone()),
        }
    }

    /// Clear the accumulated gradient
    pub fn zero_grad(&mut self) {
        self.grad = None;
    }
}
