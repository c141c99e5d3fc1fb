//! Basic autograd operations: add, sub, scale, sum, mean, reshape

use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Add two tensors element-wise
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.shape(), b.shape(), "add: shape mismatch");
    let data = a.data() + b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::from_shape_vec(a.shape(), data.to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
            if let Some(op) = self.b.backward_op() {
                op.backward();
            }
        }
    }
}

/// Subtract two tensors element-wise
pub fn sub(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.shape(), b.shape(), "sub: shape mismatch");
    let data = a.data() - b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::from_shape_vec(a.shape(), data.to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SubBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SubBackward {
    a: Tensor,
    b: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for SubBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.mapv(|g| -g));
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
            if let Some(op) = self.b.backward_op() {
                op.backward();
            }
        }
    }
}

/// Scale tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = a.data() * factor;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::from_shape_vec(a.shape(), data.to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad * self.factor);
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

/// Sum all elements into a scalar tensor
pub fn sum(a: &Tensor) -> Tensor {
    let data = Array1::from(vec![a.data().sum()]);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SumBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SumBackward {
    a: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for SumBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let grad_val = grad[0];
                self.a.accumulate_grad(Array1::from(vec![grad_val; self.a.len()]));
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

/// Mean of all elements as a scalar tensor
pub fn mean(a: &Tensor) -> Tensor {
    let n = a.len() as f32;
    let data = Array1::from(vec![a.data().sum() / n]);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MeanBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MeanBackward {
    a: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for MeanBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let grad_val = grad[0] / self.a.len() as f32;
                self.a.accumulate_grad(Array1::from(vec![grad_val; self.a.len()]));
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

/// View the tensor under a different shape; gradients pass through unchanged
pub fn reshape(a: &Tensor, shape: &[usize]) -> Tensor {
    assert_eq!(
        shape.iter().product::<usize>(),
        a.len(),
        "reshape: element count mismatch"
    );
    let requires_grad = a.requires_grad();
    let mut result = Tensor::from_shape_vec(shape, a.data().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ReshapeBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ReshapeBackward {
    a: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for ReshapeBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_add_forward_backward() {
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let b = Tensor::from_vec(vec![3.0, 4.0], true);
        let mut c = add(&a, &b);
        assert_eq!(c.data().to_vec(), vec![4.0, 6.0]);

        backward(&mut c, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![1.0, 1.0]);
        assert_eq!(b.grad().unwrap().to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_sub_backward_negates() {
        let a = Tensor::from_vec(vec![5.0], true);
        let b = Tensor::from_vec(vec![2.0], true);
        let mut c = sub(&a, &b);
        assert_abs_diff_eq!(c.scalar(), 3.0, epsilon = 1e-6);

        backward(&mut c, None);
        assert_abs_diff_eq!(a.grad().unwrap()[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(b.grad().unwrap()[0], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_scale_backward() {
        let a = Tensor::from_vec(vec![1.0, -2.0], true);
        let mut c = sum(&scale(&a, -1.0));
        backward(&mut c, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![-1.0, -1.0]);
    }

    #[test]
    fn test_mean_forward_backward() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], true);
        let mut m = mean(&a);
        assert_abs_diff_eq!(m.scalar(), 2.5, epsilon = 1e-6);

        backward(&mut m, None);
        for &g in a.grad().unwrap().iter() {
            assert_abs_diff_eq!(g, 0.25, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reshape_preserves_grad_flow() {
        let a = Tensor::from_shape_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0], true);
        let r = reshape(&a, &[4]);
        assert_eq!(r.shape(), &[4]);
        let mut s = sum(&r);
        backward(&mut s, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![1.0; 4]);
    }

    #[test]
    fn test_chain_through_ops() {
        // d/da of mean(2a - b) = 2/n
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let b = Tensor::from_vec(vec![0.5, 0.5], true);
        let mut loss = mean(&sub(&scale(&a, 2.0), &b));
        backward(&mut loss, None);
        for &g in a.grad().unwrap().iter() {
            assert_abs_diff_eq!(g, 1.0, epsilon = 1e-6);
        }
        for &g in b.grad().unwrap().iter() {
            assert_abs_diff_eq!(g, -0.5, epsilon = 1e-6);
        }
    }
}
