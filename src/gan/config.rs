//! Configuration types for the face GAN

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Side length of every image tensor the networks see
pub const IMAGE_SIZE: usize = 64;
/// RGB
pub const CHANNELS_IMG: usize = 3;
/// Latent vector length
pub const Z_DIM: usize = 100;
/// Generator feature-width base
pub const FEATURES_GEN: usize = 64;
/// Critic feature-width base
pub const FEATURES_CRITIC: usize = 64;
/// Critic updates per generator update
pub const CRITIC_ITERATIONS: usize = 5;
/// Gradient penalty coefficient
pub const LAMBDA_GP: f32 = 10.0;

/// Configuration for the critic network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriticConfig {
    /// Input channels
    pub channels_img: usize,
    /// Feature-width base; channel depth doubles per downsampling block
    pub features: usize,
    /// Input spatial size
    pub image_size: usize,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self { channels_img: CHANNELS_IMG, features: FEATURES_CRITIC, image_size: IMAGE_SIZE }
    }
}

/// Configuration for the generator network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    /// Latent space dimension
    pub z_dim: usize,
    /// Output channels
    pub channels_img: usize,
    /// Feature-width base; channel depth halves per upsampling block
    pub features: usize,
    /// Output spatial size
    pub image_size: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            z_dim: Z_DIM,
            channels_img: CHANNELS_IMG,
            features: FEATURES_GEN,
            image_size: IMAGE_SIZE,
        }
    }
}

/// Configuration for adversarial training
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GanConfig {
    /// Critic configuration
    pub critic: CriticConfig,
    /// Generator configuration
    pub generator: GeneratorConfig,
    /// Learning rate for both optimizers
    pub learning_rate: f32,
    /// Adam β1
    pub beta1: f32,
    /// Adam β2
    pub beta2: f32,
    /// Critic updates per generator update
    pub critic_iterations: usize,
    /// Gradient penalty coefficient
    pub lambda_gp: f32,
    /// Training batch size
    pub batch_size: usize,
    /// Number of epochs
    pub epochs: usize,
}

impl Default for GanConfig {
    fn default() -> Self {
        Self {
            critic: CriticConfig::default(),
            generator: GeneratorConfig::default(),
            learning_rate: 1e-4,
            beta1: 0.0,
            beta2: 0.9,
            critic_iterations: CRITIC_ITERATIONS,
            lambda_gp: LAMBDA_GP,
            batch_size: 256,
            epochs: 20,
        }
    }
}

impl GanConfig {
    /// Validate that the configuration describes a trainable setup
    pub fn validate(&self) -> Result<()> {
        if self.critic.image_size != IMAGE_SIZE || self.generator.image_size != IMAGE_SIZE {
            return Err(Error::ConfigValue {
                field: "image_size".into(),
                message: format!("must be {IMAGE_SIZE} for the fixed five-stage architecture"),
                suggestion: format!("Set image_size to {IMAGE_SIZE}"),
            });
        }
        if self.critic.channels_img != self.generator.channels_img {
            return Err(Error::ConfigValue {
                field: "channels_img".into(),
                message: "critic and generator must agree on image channels".into(),
                suggestion: "Use the same channels_img in both sections".into(),
            });
        }
        if self.learning_rate <= 0.0 {
            return Err(Error::ConfigValue {
                field: "learning_rate".into(),
                message: "must be positive".into(),
                suggestion: "Use a value like 1e-4".into(),
            });
        }
        if self.batch_size == 0 {
            return Err(Error::ConfigValue {
                field: "batch_size".into(),
                message: "must be positive".into(),
                suggestion: "Use a value like 64".into(),
            });
        }
        if self.critic_iterations == 0 {
            return Err(Error::ConfigValue {
                field: "critic_iterations".into(),
                message: "must be positive".into(),
                suggestion: "The WGAN-GP default is 5".into(),
            });
        }
        if self.critic.features == 0 || self.generator.features == 0 {
            return Err(Error::ConfigValue {
                field: "features".into(),
                message: "must be positive".into(),
                suggestion: "The reference width is 64".into(),
            });
        }
        if self.generator.z_dim == 0 {
            return Err(Error::ConfigValue {
                field: "z_dim".into(),
                message: "must be positive".into(),
                suggestion: "The reference latent dimension is 100".into(),
            });
        }
        Ok(())
    }

    /// Scaled-down configuration for fast tests
    #[cfg(test)]
    pub fn small_test_config() -> Self {
        Self {
            critic: CriticConfig { channels_img: 3, features: 4, image_size: IMAGE_SIZE },
            generator: GeneratorConfig {
                z_dim: 8,
                channels_img: 3,
                features: 4,
                image_size: IMAGE_SIZE,
            },
            learning_rate: 1e-4,
            beta1: 0.0,
            beta2: 0.9,
            critic_iterations: 5,
            lambda_gp: 10.0,
            batch_size: 2,
            epochs: 1,
        }
    }
}
