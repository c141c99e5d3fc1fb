//! Optimizer trait

use crate::Tensor;

/// Trait for optimization algorithms
pub trait Optimizer {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [Tensor]);

    /// Perform optimization step on referenced parameters
    ///
    /// This is the path used when parameters are borrowed from a model.
    fn step_refs(&mut self, params: &mut [&mut Tensor]) {
        for param in params.iter_mut() {
            if let Some(grad) = param.grad() {
                // Plain SGD fallback
                let lr = self.lr();
                let grad_data = grad.to_vec();
                let data = param.data_mut();
                for (d, g) in data.iter_mut().zip(grad_data.iter()) {
                    *d -= lr * g;
                }
            }
        }
    }

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}
