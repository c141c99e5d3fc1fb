//! Generator network
//!
//! Maps latent vectors to synthetic 64×64 RGB images. Training-only: the
//! deployed detector uses the critic alone.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::GeneratorConfig;
use super::layers::{BatchNorm2d, ConvTranspose2d};
use crate::autograd::ops;
use crate::Tensor;

/// One upsampling block: transposed conv (no bias) → batch norm → ReLU
struct GeneratorBlock {
    conv: ConvTranspose2d,
    norm: BatchNorm2d,
}

impl GeneratorBlock {
    fn new<R: Rng>(rng: &mut R, in_c: usize, out_c: usize, k: usize, stride: usize, pad: usize) -> Self {
        Self {
            conv: ConvTranspose2d::new(rng, in_c, out_c, k, stride, pad, false),
            norm: BatchNorm2d::new(out_c),
        }
    }

    fn forward(&self, x: &Tensor) -> Tensor {
        ops::relu(&self.norm.forward(&self.conv.forward(x)))
    }
}

/// Generator network: latent batch → image batch in [-1, 1]
pub struct Generator {
    /// Configuration
    pub config: GeneratorConfig,
    blocks: Vec<GeneratorBlock>,
    head: ConvTranspose2d,
}

impl Generator {
    /// Create a new generator with random initialization
    pub fn new(config: GeneratorConfig) -> Self {
        let mut rng = StdRng::from_os_rng();
        Self::init(config, &mut rng)
    }

    /// Create a new generator with a seed for reproducibility
    pub fn with_seed(config: GeneratorConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::init(config, &mut rng)
    }

    fn init<R: Rng>(config: GeneratorConfig, rng: &mut R) -> Self {
        let f = config.features;
        // 1x1 -> 4x4 -> 8x8 -> 16x16 -> 32x32, halving channels after the projection
        let blocks = vec![
            GeneratorBlock::new(rng, config.z_dim, f * 16, 4, 1, 0),
            GeneratorBlock::new(rng, f * 16, f * 8, 4, 2, 1),
            GeneratorBlock::new(rng, f * 8, f * 4, 4, 2, 1),
            GeneratorBlock::new(rng, f * 4, f * 2, 4, 2, 1),
        ];
        // 32x32 -> 64x64, bounded by tanh
        let head = ConvTranspose2d::new(rng, f * 2, config.channels_img, 4, 2, 1, true);
        Self { config, blocks, head }
    }

    /// Generate images from a `[n, z_dim]` latent batch. Output is
    /// `[n, channels, size, size]` with values in (-1, 1).
    pub fn generate(&self, latent: &Tensor) -> Tensor {
        assert_eq!(latent.shape()[1], self.config.z_dim, "latent dimension mismatch");
        let n = latent.shape()[0];
        let mut x = ops::reshape(latent, &[n, self.config.z_dim, 1, 1]);
        for block in &self.blocks {
            x = block.forward(&x);
        }
        ops::tanh(&self.head.forward(&x))
    }

    /// Parameter snapshot sharing gradient cells with the live network
    pub fn parameters(&self) -> Vec<Tensor> {
        self.named_parameters().into_iter().map(|(_, t)| t).collect()
    }

    /// Named parameter snapshot in a stable order
    pub fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = Vec::new();
        for (i, block) in self.blocks.iter().enumerate() {
            params.push((format!("blocks.{i}.conv.weight"), block.conv.weight.clone()));
            params.push((format!("blocks.{i}.norm.weight"), block.norm.weight.clone()));
            params.push((format!("blocks.{i}.norm.bias"), block.norm.bias.clone()));
        }
        params.push(("head.weight".to_string(), self.head.weight.clone()));
        params
            .push(("head.bias".to_string(), self.head.bias.clone().expect("head conv has bias")));
        params
    }

    /// Mutable references to the live parameters, in `named_parameters` order
    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params: Vec<&mut Tensor> = Vec::new();
        for block in &mut self.blocks {
            params.push(&mut block.conv.weight);
            params.push(&mut block.norm.weight);
            params.push(&mut block.norm.bias);
        }
        params.push(&mut self.head.weight);
        params.push(self.head.bias.as_mut().expect("head conv has bias"));
        params
    }

    /// Clear all parameter gradients
    pub fn zero_grad(&self) {
        for param in self.parameters() {
            param.zero_grad();
        }
    }

    /// Total number of parameters
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.parameters().iter().map(Tensor::len).sum()
    }

    /// Replace all parameters with checkpoint values. Fails on any missing
    /// tensor or shape mismatch.
    pub fn load_state(&mut self, checkpoint: &crate::io::CheckpointTensors) -> crate::Result<()> {
        let names: Vec<String> =
            self.named_parameters().into_iter().map(|(name, _)| name).collect();
        crate::io::restore_parameters(&names, &mut self.parameters_mut(), checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gan::latent::LatentVector;

    fn small_config() -> GeneratorConfig {
        GeneratorConfig { z_dim: 8, channels_img: 3, features: 4, image_size: 64 }
    }

    #[test]
    fn test_generator_creation() {
        let gen = Generator::with_seed(small_config(), 42);
        assert!(gen.num_parameters() > 0);
        // 4 blocks * (conv w + norm w + norm b) + head (w+b)
        assert_eq!(gen.named_parameters().len(), 14);
    }

    #[test]
    fn test_generate_shape_and_range() {
        let gen = Generator::with_seed(small_config(), 42);
        let mut rng = StdRng::seed_from_u64(1);
        let z = LatentVector::sample_batch(&mut rng, 2, 8);

        let images = gen.generate(&z);
        assert_eq!(images.shape(), &[2, 3, 64, 64]);
        assert!(images.data().iter().all(|&v| (-1.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_generate_deterministic() {
        let gen = Generator::with_seed(small_config(), 42);
        let z = Tensor::from_shape_vec(&[1, 8], vec![0.5; 8], false);
        let a = gen.generate(&z);
        let b = gen.generate(&z);
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_gradients_reach_all_parameters() {
        let gen = Generator::with_seed(small_config(), 42);
        let z = Tensor::from_shape_vec(&[2, 8], (0..16).map(|i| i as f32 * 0.1).collect(), false);
        let mut loss = crate::autograd::mean(&gen.generate(&z));
        crate::autograd::backward(&mut loss, None);

        for (name, param) in gen.named_parameters() {
            assert!(param.grad().is_some(), "no gradient reached {name}");
        }
    }

    #[test]
    #[should_panic(expected = "latent dimension mismatch")]
    fn test_wrong_latent_dim_panics() {
        let gen = Generator::with_seed(small_config(), 42);
        let z = Tensor::from_shape_vec(&[1, 5], vec![0.0; 5], false);
        let _ = gen.generate(&z);
    }
}
