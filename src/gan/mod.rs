//! Adversarial training core
//!
//! A Wasserstein GAN with gradient penalty over 64×64 face images:
//!
//! ```text
//! Latent z ─┬─► Generator ─► fake images ─┬─► Critic ─► realness score
//!           │                             │
//!           │      real images ───────────┘
//!           │
//!           └── (sampled from N(0, I))
//! ```
//!
//! The critic doubles as the deployed forgery detector once its checkpoint
//! is loaded by the inference adapter.

mod config;
mod critic;
mod eval;
mod generator;
mod latent;
mod layers;
mod penalty;
mod trainer;

pub use config::{
    CriticConfig, GanConfig, GeneratorConfig, CHANNELS_IMG, CRITIC_ITERATIONS, FEATURES_CRITIC,
    FEATURES_GEN, IMAGE_SIZE, LAMBDA_GP, Z_DIM,
};
pub use critic::Critic;
pub use eval::{evaluate_critic, EvalReport};
pub use generator::Generator;
pub use latent::LatentVector;
pub use layers::{BatchNorm2d, Conv2d, ConvTranspose2d, InstanceNorm2d};
pub use penalty::{interpolate, input_gradients, penalty_value, GradientPenalty, PenaltyTerm};
pub use trainer::{GanTrainer, TrainOptions, TrainStats, TrainingReport};
