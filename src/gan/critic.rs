//! Critic (discriminator) network
//!
//! A convolutional downsampling stack scoring the "realness" of 64×64 RGB
//! images. Instance normalization instead of batch normalization: the
//! gradient penalty is defined per sample, and batch statistics would mix
//! gradients across samples.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::CriticConfig;
use super::layers::{Conv2d, InstanceNorm2d};
use crate::autograd::ops;
use crate::Tensor;

const LEAKY_SLOPE: f32 = 0.2;

/// One downsampling block: conv (no bias) → instance norm → leaky ReLU
struct CriticBlock {
    conv: Conv2d,
    norm: InstanceNorm2d,
}

impl CriticBlock {
    fn new<R: Rng>(rng: &mut R, in_c: usize, out_c: usize) -> Self {
        Self {
            conv: Conv2d::new(rng, in_c, out_c, 4, 2, 1, false),
            norm: InstanceNorm2d::new(out_c),
        }
    }

    fn forward(&self, x: &Tensor) -> Tensor {
        ops::leaky_relu(&self.norm.forward(&self.conv.forward(x)), LEAKY_SLOPE)
    }
}

/// Critic network: image batch → one real-valued score per image
pub struct Critic {
    /// Configuration
    pub config: CriticConfig,
    initial: Conv2d,
    blocks: Vec<CriticBlock>,
    head: Conv2d,
}

impl Critic {
    /// Create a new critic with random initialization
    pub fn new(config: CriticConfig) -> Self {
        let mut rng = StdRng::from_os_rng();
        Self::init(config, &mut rng)
    }

    /// Create a new critic with a seed for reproducibility
    pub fn with_seed(config: CriticConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::init(config, &mut rng)
    }

    fn init<R: Rng>(config: CriticConfig, rng: &mut R) -> Self {
        let f = config.features;
        // 64 -> 32
        let initial = Conv2d::new(rng, config.channels_img, f, 4, 2, 1, true);
        // 32 -> 16 -> 8 -> 4 -> 2, doubling channels each time
        let blocks = (0..4).map(|i| CriticBlock::new(rng, f << i, f << (i + 1))).collect();
        // 2 -> 1: collapse the remaining spatial extent to one scalar
        let head_k = config.image_size / 32;
        let head = Conv2d::new(rng, f * 16, 1, head_k, 1, 0, true);
        Self { config, initial, blocks, head }
    }

    /// Score a `[n, channels, size, size]` batch. Returns a `[n]` tensor of
    /// raw critic scores; higher means more real under the WGAN convention.
    /// Gradients accumulate into whatever inputs require them.
    pub fn score(&self, images: &Tensor) -> Tensor {
        let n = images.shape()[0];
        let mut x = ops::leaky_relu(&self.initial.forward(images), LEAKY_SLOPE);
        for block in &self.blocks {
            x = block.forward(&x);
        }
        ops::reshape(&self.head.forward(&x), &[n])
    }

    /// Parameter snapshot sharing gradient cells with the live network
    pub fn parameters(&self) -> Vec<Tensor> {
        self.named_parameters().into_iter().map(|(_, t)| t).collect()
    }

    /// Named parameter snapshot in a stable order
    pub fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = vec![
            ("initial.weight".to_string(), self.initial.weight.clone()),
            (
                "initial.bias".to_string(),
                self.initial.bias.clone().expect("initial conv has bias"),
            ),
        ];
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
        let mut params: Vec<&mut Tensor> = vec![
            &mut self.initial.weight,
            self.initial.bias.as_mut().expect("initial conv has bias"),
        ];
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
    /// tensor or shape mismatch; on failure the network must be rebuilt
    /// before use, as earlier tensors may already have been replaced.
    pub fn load_state(&mut self, checkpoint: &crate::io::CheckpointTensors) -> crate::Result<()> {
        let names: Vec<String> =
            self.named_parameters().into_iter().map(|(name, _)| name).collect();
        crate::io::restore_parameters(&names, &mut self.parameters_mut(), checkpoint)
    }
}
