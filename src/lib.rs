//! # Discernir
//!
//! Trains a Wasserstein GAN with gradient penalty over 64×64 face images
//! and serves the trained critic as an AI-image detector through one HTTP
//! endpoint.
//!
//! ## Layout
//!
//! - [`autograd`] - tape-based autograd over shaped f32 tensors
//! - [`optim`] - Adam
//! - [`data`] - image preprocessing and the labeled-folder loader
//! - [`gan`] - critic, generator, gradient penalty, training loop
//! - [`io`] - safetensors checkpoints
//! - [`infer`] - the frozen, concurrency-safe detector
//! - [`server`] - axum HTTP boundary
//! - [`config`] - YAML training manifest
//!
//! ## Example
//!
//! ```no_run
//! use discernir::gan::{GanConfig, GanTrainer, TrainOptions};
//! use discernir::data::FaceDataset;
//!
//! let dataset = FaceDataset::open("datasets/train", 64).unwrap();
//! let mut trainer = GanTrainer::with_seed(GanConfig::default(), 42).unwrap();
//! let report = trainer.train(&dataset, None, &TrainOptions::default()).unwrap();
//! println!("{} critic updates", report.critic_updates);
//! ```

pub mod autograd;
pub mod cli;
pub mod config;
pub mod data;
pub mod gan;
pub mod infer;
pub mod io;
pub mod optim;
pub mod server;

mod error;

pub use autograd::Tensor;
pub use error::{Error, Result};
