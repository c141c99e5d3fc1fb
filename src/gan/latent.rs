//! Latent vector sampling for the generator input space

use rand::Rng;

use super::layers::sample_normal;
use crate::Tensor;

/// A latent vector in the generator's input space
#[derive(Debug, Clone, PartialEq)]
pub struct LatentVector {
    /// The latent values
    pub vector: Vec<f32>,
}

impl LatentVector {
    /// Create from an explicit vector
    #[must_use]
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }

    /// Sample from the standard normal distribution
    pub fn sample<R: Rng>(rng: &mut R, dim: usize) -> Self {
        Self { vector: (0..dim).map(|_| sample_normal(rng, 1.0)).collect() }
    }

    /// Dimension of the latent vector
    #[must_use]
    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    /// Linear interpolation toward another latent vector
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        assert_eq!(self.dim(), other.dim(), "latent dimensions must match");
        let vector = self
            .vector
            .iter()
            .zip(&other.vector)
            .map(|(a, b)| a * (1.0 - t) + b * t)
            .collect();
        Self { vector }
    }

    /// Sample a `[n, dim]` batch tensor of fresh latent vectors
    pub fn sample_batch<R: Rng>(rng: &mut R, n: usize, dim: usize) -> Tensor {
        let data: Vec<f32> = (0..n * dim).map(|_| sample_normal(rng, 1.0)).collect();
        Tensor::from_shape_vec(&[n, dim], data, false)
    }
}
