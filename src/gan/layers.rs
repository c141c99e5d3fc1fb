//! Composed network layers
//!
//! Explicit layer structs with a `forward` method, so shapes stay checkable
//! at construction time instead of hiding inside an ordered layer list.

use rand::Rng;

use crate::autograd::ops;
use crate::Tensor;

/// Sample from N(0, std²) using the Box-Muller transform
pub fn sample_normal<R: Rng>(rng: &mut R, std: f64) -> f32 {
    let u1: f64 = rng.random::<f64>().max(1e-10);
    let u2: f64 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    (z * std) as f32
}

/// Initialization scale used by the DCGAN family
const WEIGHT_STD: f64 = 0.02;

/// Strided 2D convolution layer
pub struct Conv2d {
    /// `[out_c, in_c, k, k]`
    pub weight: Tensor,
    /// `[out_c]`
    pub bias: Option<Tensor>,
    stride: usize,
    pad: usize,
}

impl Conv2d {
    /// Create with N(0, 0.02²) weights and zero bias
    pub fn new<R: Rng>(
        rng: &mut R,
        in_c: usize,
        out_c: usize,
        k: usize,
        stride: usize,
        pad: usize,
        bias: bool,
    ) -> Self {
        let weight: Vec<f32> =
            (0..out_c * in_c * k * k).map(|_| sample_normal(rng, WEIGHT_STD)).collect();
        Self {
            weight: Tensor::from_shape_vec(&[out_c, in_c, k, k], weight, true),
            bias: bias.then(|| Tensor::from_vec(vec![0.0; out_c], true)),
            stride,
            pad,
        }
    }

    /// Forward pass
    pub fn forward(&self, x: &Tensor) -> Tensor {
        ops::conv2d(x, &self.weight, self.bias.as_ref(), self.stride, self.pad)
    }
}

/// Strided 2D transposed convolution layer
pub struct ConvTranspose2d {
    /// `[in_c, out_c, k, k]`
    pub weight: Tensor,
    /// `[out_c]`
    pub bias: Option<Tensor>,
    stride: usize,
    pad: usize,
}

impl ConvTranspose2d {
    /// Create with N(0, 0.02²) weights and zero bias
    pub fn new<R: Rng>(
        rng: &mut R,
        in_c: usize,
        out_c: usize,
        k: usize,
        stride: usize,
        pad: usize,
        bias: bool,
    ) -> Self {
        let weight: Vec<f32> =
            (0..in_c * out_c * k * k).map(|_| sample_normal(rng, WEIGHT_STD)).collect();
        Self {
            weight: Tensor::from_shape_vec(&[in_c, out_c, k, k], weight, true),
            bias: bias.then(|| Tensor::from_vec(vec![0.0; out_c], true)),
            stride,
            pad,
        }
    }

    /// Forward pass
    pub fn forward(&self, x: &Tensor) -> Tensor {
        ops::conv_transpose2d(x, &self.weight, self.bias.as_ref(), self.stride, self.pad)
    }
}

/// Instance normalization with per-channel affine parameters
pub struct InstanceNorm2d {
    /// `[c]`, initialized to 1
    pub weight: Tensor,
    /// `[c]`, initialized to 0
    pub bias: Tensor,
    eps: f32,
}

impl InstanceNorm2d {
    /// Create an affine instance norm over `c` channels
    pub fn new(c: usize) -> Self {
        Self {
            weight: Tensor::from_vec(vec![1.0; c], true),
            bias: Tensor::from_vec(vec![0.0; c], true),
            eps: 1e-5,
        }
    }

    /// Forward pass
    pub fn forward(&self, x: &Tensor) -> Tensor {
        ops::instance_norm2d(x, &self.weight, &self.bias, self.eps)
    }
}

/// Batch normalization with per-channel affine parameters
pub struct BatchNorm2d {
    /// `[c]`, initialized to 1
    pub weight: Tensor,
    /// `[c]`, initialized to 0
    pub bias: Tensor,
    eps: f32,
}

impl BatchNorm2d {
    /// Create an affine batch norm over `c` channels
    pub fn new(c: usize) -> Self {
        Self {
            weight: Tensor::from_vec(vec![1.0; c], true),
            bias: Tensor::from_vec(vec![0.0; c], true),
            eps: 1e-5,
        }
    }

    /// Forward pass (training-mode statistics)
    pub fn forward(&self, x: &Tensor) -> Tensor {
        ops::batch_norm2d(x, &self.weight, &self.bias, self.eps)
    }
}
