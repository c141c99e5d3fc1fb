//! Tensor with shared gradient cell and explicit shape
//!
//! Storage is a flat `ndarray::Array1<f32>` plus a shape vector; the
//! convolution and normalization ops interpret the shape as NCHW. Cloning a
//! tensor clones the data but shares the gradient cell, so backward passes
//! recorded against a clone accumulate into the original parameter.

use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

use super::backward::BackwardOp;

/// A tensor in the gradient tape.
#[derive(Clone)]
pub struct Tensor {
    data: Array1<f32>,
    shape: Vec<usize>,
    requires_grad: bool,
    grad: Rc<RefCell<Option<Array1<f32>>>>,
    backward_op: Option<Rc<dyn BackwardOp>>,
}

impl Tensor {
    /// Create a rank-1 tensor from an ndarray
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        let shape = vec![data.len()];
        Self {
            data,
            shape,
            requires_grad,
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
        }
    }

    /// Create a rank-1 tensor from a Vec
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Create a tensor with an explicit shape (data is flat, row-major)
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>, requires_grad: bool) -> Self {
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {shape:?} does not match data length {}",
            data.len()
        );
        Self {
            data: Array1::from(data),
            shape: shape.to_vec(),
            requires_grad,
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
        }
    }

    /// Create a zero-filled tensor with an explicit shape
    pub fn zeros(shape: &[usize], requires_grad: bool) -> Self {
        let len = shape.iter().product();
        Self::from_shape_vec(shape, vec![0.0; len], requires_grad)
    }

    /// Borrow the underlying flat data
    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    /// Mutably borrow the underlying flat data
    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        &mut self.data
    }

    /// Logical shape of the tensor
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor has no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether gradients are tracked for this tensor
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Read the scalar value of a single-element tensor
    pub fn scalar(&self) -> f32 {
        debug_assert_eq!(self.data.len(), 1, "scalar() on non-scalar tensor");
        self.data[0]
    }

    /// Current gradient, if any
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Shared handle to the gradient cell
    pub fn grad_cell(&self) -> Rc<RefCell<Option<Array1<f32>>>> {
        Rc::clone(&self.grad)
    }

    /// Replace the gradient
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add into the gradient, initializing it if unset
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut cell = self.grad.borrow_mut();
        match cell.as_mut() {
            Some(existing) => *existing += &grad,
            None => *cell = Some(grad),
        }
    }

    /// Clear the gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Recorded backward operation, if this tensor is an op result
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.clone()
    }

    /// Attach a backward operation
    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        self.backward_op = Some(op);
    }

    /// Copy of the data as a graph leaf: no gradient tracking, fresh
    /// gradient cell, no recorded op.
    pub fn detach(&self) -> Tensor {
        Tensor::from_shape_vec(&self.shape, self.data.to_vec(), false)
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_shape() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], false);
        assert_eq!(t.shape(), &[3]);
        assert_eq!(t.len(), 3);
        assert!(!t.requires_grad());
    }

    #[test]
    fn test_from_shape_vec() {
        let t = Tensor::from_shape_vec(&[2, 3], vec![0.0; 6], true);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.len(), 6);
        assert!(t.requires_grad());
    }

    #[test]
    #[should_panic(expected = "does not match data length")]
    fn test_shape_mismatch_panics() {
        let _ = Tensor::from_shape_vec(&[2, 3], vec![0.0; 5], false);
    }

    #[test]
    fn test_clone_shares_grad_cell() {
        let t = Tensor::from_vec(vec![1.0, 2.0], true);
        let clone = t.clone();
        clone.accumulate_grad(ndarray::arr1(&[0.5, 0.5]));
        assert_eq!(t.grad().unwrap(), ndarray::arr1(&[0.5, 0.5]));
    }

    #[test]
    fn test_accumulate_adds() {
        let t = Tensor::from_vec(vec![0.0], true);
        t.accumulate_grad(ndarray::arr1(&[1.0]));
        t.accumulate_grad(ndarray::arr1(&[2.0]));
        assert_eq!(t.grad().unwrap()[0], 3.0);
    }

    #[test]
    fn test_zero_grad() {
        let t = Tensor::from_vec(vec![0.0], true);
        t.set_grad(ndarray::arr1(&[1.0]));
        t.zero_grad();
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_detach_breaks_sharing() {
        let t = Tensor::from_vec(vec![1.0], true);
        let d = t.detach();
        assert!(!d.requires_grad());
        d.accumulate_grad(ndarray::arr1(&[9.0]));
        assert!(t.grad().is_none());
    }
}
