//! Inference service adapter
//!
//! Loads the critic checkpoint once into a frozen, `Send + Sync` forward
//! path and serves predictions from it. Weights are immutable after load;
//! every call allocates its own intermediates, so concurrent predictions
//! need no locking. Reloading is an explicit administrative operation that
//! builds a fresh `Detector`, never an implicit per-call behavior.

use std::path::{Path, PathBuf};

use crate::autograd::kernels;
use crate::data::{decode_base64, preprocess_bytes};
use crate::gan::CriticConfig;
use crate::io::{load_checkpoint, CheckpointTensors};
use crate::{Error, Result};

const LEAKY_SLOPE: f32 = 0.2;
const NORM_EPS: f32 = 1e-5;

/// Fixed explanatory tags attached to positive detections.
///
/// Placeholder explainability: the tags are illustrative and not derived
/// from the network's internal state.
pub const ARTIFACT_TAGS: [&str; 3] =
    ["Unnatural color consistency", "Blurred texture boundaries", "Symmetry artifacts"];

/// One inference result
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Classification at the configured threshold
    pub is_ai: bool,
    /// Sigmoid-squashed critic score in [0, 1]
    pub confidence: f32,
    /// Human-readable artifact tags; non-empty only for positive detections
    pub artifacts: Vec<String>,
}

#[derive(Debug)]
struct FrozenConv {
    weight: Vec<f32>,
    bias: Option<Vec<f32>>,
    in_c: usize,
    out_c: usize,
    k: usize,
    stride: usize,
    pad: usize,
}

impl FrozenConv {
    fn forward(&self, x: &[f32], n: usize, h: usize, w: usize) -> (Vec<f32>, usize, usize) {
        kernels::conv2d_forward(
            x,
            n,
            self.in_c,
            h,
            w,
            &self.weight,
            self.out_c,
            self.k,
            self.bias.as_deref(),
            self.stride,
            self.pad,
        )
    }
}

#[derive(Debug)]
struct FrozenBlock {
    conv: FrozenConv,
    gamma: Vec<f32>,
    beta: Vec<f32>,
}

/// Immutable critic weights with a pure-kernel forward pass.
///
/// Plain buffers only, so the type is `Send + Sync` and shareable across
/// request handlers without synchronization.
#[derive(Debug)]
pub struct FrozenCritic {
    config: CriticConfig,
    initial: FrozenConv,
    blocks: Vec<FrozenBlock>,
    head: FrozenConv,
}

impl FrozenCritic {
    /// Build from checkpoint tensors, validating every shape against the
    /// architecture the config describes.
    pub fn from_checkpoint(config: CriticConfig, checkpoint: &CheckpointTensors) -> Result<Self> {
        let f = config.features;
        let take = |name: &str, expected: &[usize]| -> Result<Vec<f32>> {
            let (shape, values) = checkpoint.get(name).ok_or_else(|| Error::Serialization {
                message: format!("checkpoint is missing tensor '{name}'"),
            })?;
            if shape != expected {
                return Err(Error::ShapeMismatch {
                    name: name.to_string(),
                    expected: expected.to_vec(),
                    actual: shape.clone(),
                });
            }
            Ok(values.clone())
        };

        let initial = FrozenConv {
            weight: take("initial.weight", &[f, config.channels_img, 4, 4])?,
            bias: Some(take("initial.bias", &[f])?),
            in_c: config.channels_img,
            out_c: f,
            k: 4,
            stride: 2,
            pad: 1,
        };

        let mut blocks = Vec::with_capacity(4);
        for i in 0..4 {
            let in_c = f << i;
            let out_c = f << (i + 1);
            blocks.push(FrozenBlock {
                conv: FrozenConv {
                    weight: take(&format!("blocks.{i}.conv.weight"), &[out_c, in_c, 4, 4])?,
                    bias: None,
                    in_c,
                    out_c,
                    k: 4,
                    stride: 2,
                    pad: 1,
                },
                gamma: take(&format!("blocks.{i}.norm.weight"), &[out_c])?,
                beta: take(&format!("blocks.{i}.norm.bias"), &[out_c])?,
            });
        }

        let head_k = config.image_size / 32;
        let head = FrozenConv {
            weight: take("head.weight", &[1, f * 16, head_k, head_k])?,
            bias: Some(take("head.bias", &[1])?),
            in_c: f * 16,
            out_c: 1,
            k: head_k,
            stride: 1,
            pad: 0,
        };

        Ok(Self { config, initial, blocks, head })
    }

    /// Raw critic scores for a flat `[n, channels, size, size]` pixel buffer
    pub fn score_batch(&self, pixels: &[f32], n: usize) -> Vec<f32> {
        let size = self.config.image_size;
        debug_assert_eq!(pixels.len(), n * self.config.channels_img * size * size);

        let (mut x, mut h, mut w) = self.initial.forward(pixels, n, size, size);
        for v in &mut x {
            *v = kernels::leaky_relu_scalar(*v, LEAKY_SLOPE);
        }
        for block in &self.blocks {
            let (conv_out, nh, nw) = block.conv.forward(&x, n, h, w);
            let (normed, _, _) = kernels::instance_norm_forward(
                &conv_out,
                n,
                block.conv.out_c,
                nh * nw,
                &block.gamma,
                &block.beta,
                NORM_EPS,
            );
            x = normed;
            for v in &mut x {
                *v = kernels::leaky_relu_scalar(*v, LEAKY_SLOPE);
            }
            h = nh;
            w = nw;
        }
        let (scores, _, _) = self.head.forward(&x, n, h, w);
        scores
    }
}

/// The deployed detector: frozen critic plus the classification policy
#[derive(Debug)]
pub struct Detector {
    critic: FrozenCritic,
    threshold: f32,
    checkpoint_path: PathBuf,
}

impl Detector {
    /// Load the critic checkpoint from disk. Called once at service start.
    pub fn load(checkpoint_path: &Path, config: CriticConfig, threshold: f32) -> Result<Self> {
        let checkpoint = load_checkpoint(checkpoint_path)?;
        let critic = FrozenCritic::from_checkpoint(config, &checkpoint)?;
        Ok(Self { critic, threshold, checkpoint_path: checkpoint_path.to_path_buf() })
    }

    /// Classify raw image bytes
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Prediction> {
        let chw = preprocess_bytes(bytes, self.critic.config.image_size)?;
        let score = self.critic.score_batch(&chw, 1)[0];
        let confidence = kernels::sigmoid(score);
        let is_ai = confidence > self.threshold;
        let artifacts = if is_ai {
            ARTIFACT_TAGS.iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        };
        Ok(Prediction { is_ai, confidence, artifacts })
    }

    /// Classify a base64-encoded image payload
    pub fn predict_base64(&self, payload: &str) -> Result<Prediction> {
        let bytes = decode_base64(payload)?;
        self.predict_bytes(&bytes)
    }

    /// Administrative reload: fresh weights from the original checkpoint
    /// path. Returns a new detector; the caller swaps it in.
    pub fn reload(&self) -> Result<Detector> {
        Detector::load(&self.checkpoint_path, self.critic.config.clone(), self.threshold)
    }

    /// Path the weights were loaded from
    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Decision threshold
    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}
