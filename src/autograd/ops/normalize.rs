//! Normalization autograd operations: instance norm, batch norm
//!
//! Instance normalization computes statistics per sample and channel, which
//! keeps the critic's gradient penalty well defined per sample. Batch
//! normalization mixes statistics across the batch and is used only in the
//! generator.

use crate::autograd::kernels;
use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Instance normalization over an NCHW batch with per-channel affine
/// parameters `gamma` and `beta`.
pub fn instance_norm2d(x: &Tensor, gamma: &Tensor, beta: &Tensor, eps: f32) -> Tensor {
    let (n, c, spatial) = split_nchw(x.shape());
    assert_eq!(gamma.len(), c, "instance_norm2d: gamma length mismatch");
    assert_eq!(beta.len(), c, "instance_norm2d: beta length mismatch");

    let (out, xhat, inv_std) = kernels::instance_norm_forward(
        x.data().as_slice().expect("contiguous input"),
        n,
        c,
        spatial,
        gamma.data().as_slice().expect("contiguous gamma"),
        beta.data().as_slice().expect("contiguous beta"),
        eps,
    );

    let requires_grad = x.requires_grad() || gamma.requires_grad() || beta.requires_grad();
    let mut result = Tensor::from_shape_vec(x.shape(), out, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(InstanceNormBackward {
            x: x.clone(),
            gamma: gamma.clone(),
            beta: beta.clone(),
            xhat,
            inv_std,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct InstanceNormBackward {
    x: Tensor,
    gamma: Tensor,
    beta: Tensor,
    xhat: Vec<f32>,
    inv_std: Vec<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for InstanceNormBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let (n, c, spatial) = split_nchw(self.x.shape());
            let (gx, ggamma, gbeta) = kernels::instance_norm_backward(
                grad.as_slice().expect("contiguous grad"),
                &self.xhat,
                &self.inv_std,
                n,
                c,
                spatial,
                self.gamma.data().as_slice().expect("contiguous gamma"),
            );

            if self.x.requires_grad() {
                self.x.accumulate_grad(Array1::from(gx));
            }
            if self.gamma.requires_grad() {
                self.gamma.accumulate_grad(Array1::from(ggamma));
            }
            if self.beta.requires_grad() {
                self.beta.accumulate_grad(Array1::from(gbeta));
            }

            if let Some(op) = self.x.backward_op() {
                op.backward();
            }
        }
    }
}

/// Batch normalization over an NCHW batch with per-channel affine
/// parameters. Training-mode statistics: computed from the batch itself.
pub fn batch_norm2d(x: &Tensor, gamma: &Tensor, beta: &Tensor, eps: f32) -> Tensor {
    let (n, c, spatial) = split_nchw(x.shape());
    assert_eq!(gamma.len(), c, "batch_norm2d: gamma length mismatch");
    assert_eq!(beta.len(), c, "batch_norm2d: beta length mismatch");

    let (out, xhat, inv_std) = kernels::batch_norm_forward(
        x.data().as_slice().expect("contiguous input"),
        n,
        c,
        spatial,
        gamma.data().as_slice().expect("contiguous gamma"),
        beta.data().as_slice().expect("contiguous beta"),
        eps,
    );

    let requires_grad = x.requires_grad() || gamma.requires_grad() || beta.requires_grad();
    let mut result = Tensor::from_shape_vec(x.shape(), out, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(BatchNormBackward {
            x: x.clone(),
            gamma: gamma.clone(),
            beta: beta.clone(),
            xhat,
            inv_std,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct BatchNormBackward {
    x: Tensor,
    gamma: Tensor,
    beta: Tensor,
    xhat: Vec<f32>,
    inv_std: Vec<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for BatchNormBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let (n, c, spatial) = split_nchw(self.x.shape());
            let (gx, ggamma, gbeta) = kernels::batch_norm_backward(
                grad.as_slice().expect("contiguous grad"),
                &self.xhat,
                &self.inv_std,
                n,
                c,
                spatial,
                self.gamma.data().as_slice().expect("contiguous gamma"),
            );

            if self.x.requires_grad() {
                self.x.accumulate_grad(Array1::from(gx));
            }
            if self.gamma.requires_grad() {
                self.gamma.accumulate_grad(Array1::from(ggamma));
            }
            if self.beta.requires_grad() {
                self.beta.accumulate_grad(Array1::from(gbeta));
            }

            if let Some(op) = self.x.backward_op() {
                op.backward();
            }
        }
    }
}

fn split_nchw(shape: &[usize]) -> (usize, usize, usize) {
    assert_eq!(shape.len(), 4, "normalization expects an NCHW tensor, got {shape:?}");
    (shape[0], shape[1], shape[2] * shape[3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::ops::sum;
    use crate::autograd::backward;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_instance_norm_output_normalized() {
        let x = Tensor::from_shape_vec(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0], false);
        let gamma = Tensor::from_vec(vec![1.0], false);
        let beta = Tensor::from_vec(vec![0.0], false);
        let out = instance_norm2d(&x, &gamma, &beta, 1e-5);

        let mean: f32 = out.data().iter().sum::<f32>() / 4.0;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_instance_norm_affine_shift() {
        let x = Tensor::from_shape_vec(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0], false);
        let gamma = Tensor::from_vec(vec![2.0], false);
        let beta = Tensor::from_vec(vec![5.0], false);
        let out = instance_norm2d(&x, &gamma, &beta, 1e-5);

        let mean: f32 = out.data().iter().sum::<f32>() / 4.0;
        assert_abs_diff_eq!(mean, 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_instance_norm_grad_flows_to_affine() {
        let x = Tensor::from_shape_vec(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0], true);
        let gamma = Tensor::from_vec(vec![1.0], true);
        let beta = Tensor::from_vec(vec![0.0], true);

        let mut loss = sum(&instance_norm2d(&x, &gamma, &beta, 1e-5));
        backward(&mut loss, None);

        // sum of xhat is ~0, so dL/dgamma ~ 0; dL/dbeta = #elements
        assert_abs_diff_eq!(gamma.grad().unwrap()[0], 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(beta.grad().unwrap()[0], 4.0, epsilon = 1e-5);
        assert!(x.grad().is_some());
    }

    #[test]
    fn test_batch_norm_stats_across_batch() {
        // Two samples, one channel: batch norm centers over both samples
        let x = Tensor::from_shape_vec(&[2, 1, 1, 2], vec![0.0, 0.0, 10.0, 10.0], false);
        let gamma = Tensor::from_vec(vec![1.0], false);
        let beta = Tensor::from_vec(vec![0.0], false);
        let out = batch_norm2d(&x, &gamma, &beta, 1e-5);

        // Mean over all four values is 5.0, so the halves normalize to ±1
        assert!(out.data()[0] < 0.0);
        assert!(out.data()[2] > 0.0);
        let mean: f32 = out.data().iter().sum::<f32>() / 4.0;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_batch_norm_grad_flows() {
        let x = Tensor::from_shape_vec(&[2, 1, 1, 2], vec![1.0, 2.0, 3.0, 4.0], true);
        let gamma = Tensor::from_vec(vec![1.0], true);
        let beta = Tensor::from_vec(vec![0.0], true);

        let mut loss = sum(&batch_norm2d(&x, &gamma, &beta, 1e-5));
        backward(&mut loss, None);

        assert!(x.grad().is_some());
        assert_abs_diff_eq!(beta.grad().unwrap()[0], 4.0, epsilon = 1e-5);
    }
}
