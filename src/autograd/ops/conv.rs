//! Convolution autograd operations
//!
//! Forward math delegates to the shared kernels so the tape ops and the
//! frozen inference path compute identical values.

use crate::autograd::kernels;
use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// 2D convolution over an NCHW batch.
///
/// `x` is `[n, c_in, h, w]`, `weight` is `[c_out, c_in, k, k]`, optional
/// `bias` is `[c_out]`.
pub fn conv2d(
    x: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    stride: usize,
    pad: usize,
) -> Tensor {
    let [n, c_in, h, w] = dims4(x.shape(), "conv2d input");
    let [c_out, wc_in, k, k2] = dims4(weight.shape(), "conv2d weight");
    assert_eq!(c_in, wc_in, "conv2d: channel mismatch");
    assert_eq!(k, k2, "conv2d: non-square kernel");

    let (out, h_out, w_out) = kernels::conv2d_forward(
        x.data().as_slice().expect("contiguous input"),
        n,
        c_in,
        h,
        w,
        weight.data().as_slice().expect("contiguous weight"),
        c_out,
        k,
        bias.map(|b| b.data().as_slice().expect("contiguous bias")),
        stride,
        pad,
    );

    let requires_grad =
        x.requires_grad() || weight.requires_grad() || bias.is_some_and(Tensor::requires_grad);
    let mut result = Tensor::from_shape_vec(&[n, c_out, h_out, w_out], out, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(Conv2dBackward {
            x: x.clone(),
            weight: weight.clone(),
            bias: bias.cloned(),
            stride,
            pad,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct Conv2dBackward {
    x: Tensor,
    weight: Tensor,
    bias: Option<Tensor>,
    stride: usize,
    pad: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for Conv2dBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let [n, c_in, h, w] = dims4(self.x.shape(), "conv2d input");
            let [c_out, _, k, _] = dims4(self.weight.shape(), "conv2d weight");

            let (gx, gw, gb) = kernels::conv2d_backward(
                self.x.data().as_slice().expect("contiguous input"),
                n,
                c_in,
                h,
                w,
                self.weight.data().as_slice().expect("contiguous weight"),
                c_out,
                k,
                self.stride,
                self.pad,
                grad.as_slice().expect("contiguous grad"),
                self.bias.is_some(),
            );

            if self.x.requires_grad() {
                self.x.accumulate_grad(Array1::from(gx));
            }
            if self.weight.requires_grad() {
                self.weight.accumulate_grad(Array1::from(gw));
            }
            if let (Some(bias), Some(gb)) = (&self.bias, gb) {
                if bias.requires_grad() {
                    bias.accumulate_grad(Array1::from(gb));
                }
            }

            if let Some(op) = self.x.backward_op() {
                op.backward();
            }
            if let Some(op) = self.weight.backward_op() {
                op.backward();
            }
            if let Some(op) = self.bias.as_ref().and_then(Tensor::backward_op) {
                op.backward();
            }
        }
    }
}

/// 2D transposed convolution over an NCHW batch.
///
/// `x` is `[n, c_in, h, w]`, `weight` is `[c_in, c_out, k, k]`, optional
/// `bias` is `[c_out]`.
pub fn conv_transpose2d(
    x: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    stride: usize,
    pad: usize,
) -> Tensor {
    let [n, c_in, h, w] = dims4(x.shape(), "conv_transpose2d input");
    let [wc_in, c_out, k, k2] = dims4(weight.shape(), "conv_transpose2d weight");
    assert_eq!(c_in, wc_in, "conv_transpose2d: channel mismatch");
    assert_eq!(k, k2, "conv_transpose2d: non-square kernel");

    let (out, h_out, w_out) = kernels::conv_transpose2d_forward(
        x.data().as_slice().expect("contiguous input"),
        n,
        c_in,
        h,
        w,
        weight.data().as_slice().expect("contiguous weight"),
        c_out,
        k,
        bias.map(|b| b.data().as_slice().expect("contiguous bias")),
        stride,
        pad,
    );

    let requires_grad =
        x.requires_grad() || weight.requires_grad() || bias.is_some_and(Tensor::requires_grad);
    let mut result = Tensor::from_shape_vec(&[n, c_out, h_out, w_out], out, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ConvTranspose2dBackward {
            x: x.clone(),
            weight: weight.clone(),
            bias: bias.cloned(),
            stride,
            pad,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ConvTranspose2dBackward {
    x: Tensor,
    weight: Tensor,
    bias: Option<Tensor>,
    stride: usize,
    pad: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for ConvTranspose2dBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let [n, c_in, h, w] = dims4(self.x.shape(), "conv_transpose2d input");
            let [_, c_out, k, _] = dims4(self.weight.shape(), "conv_transpose2d weight");

            let (gx, gw, gb) = kernels::conv_transpose2d_backward(
                self.x.data().as_slice().expect("contiguous input"),
                n,
                c_in,
                h,
                w,
                self.weight.data().as_slice().expect("contiguous weight"),
                c_out,
                k,
                self.stride,
                self.pad,
                grad.as_slice().expect("contiguous grad"),
                self.bias.is_some(),
            );

            if self.x.requires_grad() {
                self.x.accumulate_grad(Array1::from(gx));
            }
            if self.weight.requires_grad() {
                self.weight.accumulate_grad(Array1::from(gw));
            }
            if let (Some(bias), Some(gb)) = (&self.bias, gb) {
                if bias.requires_grad() {
                    bias.accumulate_grad(Array1::from(gb));
                }
            }

            if let Some(op) = self.x.backward_op() {
                op.backward();
            }
            if let Some(op) = self.weight.backward_op() {
                op.backward();
            }
            if let Some(op) = self.bias.as_ref().and_then(Tensor::backward_op) {
                op.backward();
            }
        }
    }
}

fn dims4(shape: &[usize], what: &str) -> [usize; 4] {
    assert_eq!(shape.len(), 4, "{what}: expected 4-D shape, got {shape:?}");
    [shape[0], shape[1], shape[2], shape[3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::ops::sum;
    use crate::autograd::backward;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_conv2d_shape() {
        let x = Tensor::zeros(&[2, 3, 64, 64], false);
        let w = Tensor::zeros(&[8, 3, 4, 4], false);
        let out = conv2d(&x, &w, None, 2, 1);
        assert_eq!(out.shape(), &[2, 8, 32, 32]);
    }

    #[test]
    fn test_conv_transpose2d_shape() {
        let x = Tensor::zeros(&[2, 16, 1, 1], false);
        let w = Tensor::zeros(&[16, 8, 4, 4], false);
        let out = conv_transpose2d(&x, &w, None, 1, 0);
        assert_eq!(out.shape(), &[2, 8, 4, 4]);

        let w2 = Tensor::zeros(&[8, 4, 4, 4], false);
        let out2 = conv_transpose2d(&out, &w2, None, 2, 1);
        assert_eq!(out2.shape(), &[2, 4, 8, 8]);
    }

    #[test]
    fn test_conv2d_grad_flows_to_weight_and_input() {
        let x = Tensor::from_shape_vec(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0], true);
        let w = Tensor::from_shape_vec(&[1, 1, 2, 2], vec![1.0; 4], true);
        let b = Tensor::from_vec(vec![0.0], true);

        let mut loss = sum(&conv2d(&x, &w, Some(&b), 2, 0));
        assert_abs_diff_eq!(loss.scalar(), 10.0, epsilon = 1e-6);

        backward(&mut loss, None);
        // d(sum)/dw = x, d(sum)/dx = w, d(sum)/db = #outputs
        assert_eq!(w.grad().unwrap().to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(x.grad().unwrap().to_vec(), vec![1.0; 4]);
        assert_abs_diff_eq!(b.grad().unwrap()[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_conv_transpose2d_grad_flows() {
        let x = Tensor::from_shape_vec(&[1, 1, 1, 1], vec![2.0], true);
        let w = Tensor::from_shape_vec(&[1, 1, 2, 2], vec![0.5, 1.0, 1.5, 2.0], true);

        let mut loss = sum(&conv_transpose2d(&x, &w, None, 1, 0));
        // out = x * w elementwise over the 2x2 kernel footprint
        assert_abs_diff_eq!(loss.scalar(), 10.0, epsilon = 1e-6);

        backward(&mut loss, None);
        assert_abs_diff_eq!(x.grad().unwrap()[0], 5.0, epsilon = 1e-6);
        assert_eq!(w.grad().unwrap().to_vec(), vec![2.0; 4]);
    }

    #[test]
    fn test_no_grad_tracking_when_inputs_frozen() {
        let x = Tensor::zeros(&[1, 1, 4, 4], false);
        let w = Tensor::zeros(&[1, 1, 2, 2], false);
        let out = conv2d(&x, &w, None, 2, 0);
        assert!(!out.requires_grad());
        assert!(out.backward_op().is_none());
    }
}
