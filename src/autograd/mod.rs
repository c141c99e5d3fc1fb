//! Tape-based autograd engine
//!
//! Automatic differentiation over a computational graph with a gradient
//! tape. Tensors carry a flat `f32` buffer plus an explicit NCHW-style
//! shape; cloning shares the gradient cell so parameter updates see the
//! gradients accumulated anywhere in the graph.

mod backward;
pub mod kernels;
pub mod ops;
mod tensor;

pub use backward::BackwardOp;
pub use ops::*;
pub use tensor::Tensor;

/// Perform backward pass from a tensor
pub fn backward(tensor: &mut Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    if let Some(grad) = grad_output {
        tensor.set_grad(grad);
    } else {
        // Initialize with ones for scalar loss
        let ones = ndarray::Array1::ones(tensor.data().len());
        tensor.set_grad(ones);
    }

    if let Some(op) = tensor.backward_op() {
        op.backward();
    }
}
