//! WGAN-GP training loop
//!
//! Drives the adversarial min-max optimization: `critic_iterations`
//! consecutive critic updates per generator update, each on a fresh data
//! batch and fresh latent batch. The asymmetric ratio is the core training
//! invariant: the critic must sit closer to optimality than the generator
//! for the Wasserstein estimate to mean anything.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::config::GanConfig;
use super::critic::Critic;
use super::eval::{evaluate_critic, EvalReport};
use super::generator::Generator;
use super::latent::LatentVector;
use super::penalty::GradientPenalty;
use crate::autograd::{self, ops};
use crate::data::{FaceDataset, ImageBatch, Label};
use crate::io::checkpoint::save_checkpoint;
use crate::optim::{Adam, Optimizer};
use crate::{Error, Result};

const LOSS_HISTORY: usize = 100;

/// Running statistics over a training run
pub struct TrainStats {
    /// Total outer steps (one per data batch consumed by the critic)
    pub steps: usize,
    /// Critic optimizer updates
    pub critic_updates: usize,
    /// Generator optimizer updates
    pub generator_updates: usize,
    /// Recent critic losses
    pub critic_losses: VecDeque<f32>,
    /// Recent generator losses
    pub generator_losses: VecDeque<f32>,
}

impl Default for TrainStats {
    fn default() -> Self {
        Self {
            steps: 0,
            critic_updates: 0,
            generator_updates: 0,
            critic_losses: VecDeque::with_capacity(LOSS_HISTORY),
            generator_losses: VecDeque::with_capacity(LOSS_HISTORY),
        }
    }
}

impl TrainStats {
    fn record_critic(&mut self, loss: f32) {
        self.steps += 1;
        self.critic_updates += 1;
        if self.critic_losses.len() >= LOSS_HISTORY {
            self.critic_losses.pop_front();
        }
        self.critic_losses.push_back(loss);
    }

    fn record_generator(&mut self, loss: f32) {
        self.generator_updates += 1;
        if self.generator_losses.len() >= LOSS_HISTORY {
            self.generator_losses.pop_front();
        }
        self.generator_losses.push_back(loss);
    }

    /// Average critic loss over recent history
    #[must_use]
    pub fn avg_critic_loss(&self) -> f32 {
        if self.critic_losses.is_empty() {
            return 0.0;
        }
        self.critic_losses.iter().sum::<f32>() / self.critic_losses.len() as f32
    }

    /// Average generator loss over recent history
    #[must_use]
    pub fn avg_generator_loss(&self) -> f32 {
        if self.generator_losses.is_empty() {
            return 0.0;
        }
        self.generator_losses.iter().sum::<f32>() / self.generator_losses.len() as f32
    }
}

/// Where and how to persist checkpoints during training
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Directory receiving `critic.safetensors` / `generator.safetensors`
    pub output_dir: PathBuf,
    /// Keep one checkpoint pair per epoch instead of overwriting
    pub versioned_checkpoints: bool,
    /// Decision threshold for the held-out evaluation
    pub eval_threshold: f32,
    /// Print a summary line per epoch
    pub verbose: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("models"),
            versioned_checkpoints: false,
            eval_threshold: 0.5,
            verbose: true,
        }
    }
}

/// Result of a completed training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Epochs completed
    pub epochs: usize,
    /// Critic optimizer updates
    pub critic_updates: usize,
    /// Generator optimizer updates
    pub generator_updates: usize,
    /// Final recent-average critic loss
    pub final_critic_loss: f32,
    /// Final recent-average generator loss
    pub final_generator_loss: f32,
    /// Held-out evaluation after the last epoch, when configured
    pub eval: Option<EvalReport>,
    /// Wall-clock seconds
    pub elapsed_secs: f64,
}

/// Adversarial trainer owning both networks and their optimizers
pub struct GanTrainer {
    /// Configuration
    pub config: GanConfig,
    /// Critic network
    pub critic: Critic,
    /// Generator network
    pub generator: Generator,
    /// Training statistics
    pub stats: TrainStats,
    opt_critic: Adam,
    opt_generator: Adam,
    penalty: GradientPenalty,
    rng: StdRng,
}

impl GanTrainer {
    /// Create a trainer with OS-seeded randomness
    pub fn new(config: GanConfig) -> Result<Self> {
        let seed = rand::random::<u64>();
        Self::with_seed(config, seed)
    }

    /// Create a trainer with a fixed seed for reproducible runs
    pub fn with_seed(config: GanConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let critic = Critic::with_seed(config.critic.clone(), seed);
        let generator = Generator::with_seed(config.generator.clone(), seed.wrapping_add(1));
        let opt_critic = Adam::new(config.learning_rate, config.beta1, config.beta2, 1e-8);
        let opt_generator = Adam::new(config.learning_rate, config.beta1, config.beta2, 1e-8);
        let penalty = GradientPenalty::new(config.lambda_gp);
        Ok(Self {
            config,
            critic,
            generator,
            stats: TrainStats::default(),
            opt_critic,
            opt_generator,
            penalty,
            rng: StdRng::seed_from_u64(seed.wrapping_add(2)),
        })
    }

    /// Run the configured number of epochs over the real samples of
    /// `train_data`, checkpointing both networks at the end of each epoch
    /// and evaluating on `eval_data` when provided.
    pub fn train(
        &mut self,
        train_data: &FaceDataset,
        eval_data: Option<&FaceDataset>,
        opts: &TrainOptions,
    ) -> Result<TrainingReport> {
        let real_data = train_data.only(Label::Real);
        if real_data.is_empty() {
            return Err(Error::io(
                "training requires images under real/".to_string(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no real samples"),
            ));
        }
        std::fs::create_dir_all(&opts.output_dir)
            .map_err(|e| Error::io(format!("creating {}", opts.output_dir.display()), e))?;

        let start = Instant::now();
        let mut eval_report = None;
        // Carries across epoch boundaries so short epochs still reach the
        // critic-iteration quota
        let mut since_generator = 0;

        for epoch in 0..self.config.epochs {
            for (step, batch) in
                real_data.batches(self.config.batch_size, &mut self.rng).enumerate()
            {
                self.critic_step(&batch, epoch, step)?;
                since_generator += 1;
                if since_generator == self.config.critic_iterations {
                    self.generator_step(batch.size(), epoch, step)?;
                    since_generator = 0;
                }
            }

            self.save_checkpoints(&opts.output_dir, opts.versioned_checkpoints, epoch)?;

            if let Some(eval) = eval_data {
                let report = evaluate_critic(
                    &self.critic,
                    eval,
                    self.config.batch_size,
                    opts.eval_threshold,
                    &mut self.rng,
                )?;
                if opts.verbose {
                    println!(
                        "epoch {}/{}: critic loss {:.4}, generator loss {:.4}, eval accuracy {:.3}",
                        epoch + 1,
                        self.config.epochs,
                        self.stats.avg_critic_loss(),
                        self.stats.avg_generator_loss(),
                        report.accuracy
                    );
                }
                eval_report = Some(report);
            } else if opts.verbose {
                println!(
                    "epoch {}/{}: critic loss {:.4}, generator loss {:.4}",
                    epoch + 1,
                    self.config.epochs,
                    self.stats.avg_critic_loss(),
                    self.stats.avg_generator_loss()
                );
            }
        }

        Ok(TrainingReport {
            epochs: self.config.epochs,
            critic_updates: self.stats.critic_updates,
            generator_updates: self.stats.generator_updates,
            final_critic_loss: self.stats.avg_critic_loss(),
            final_generator_loss: self.stats.avg_generator_loss(),
            eval: eval_report,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// One critic update: fresh latent batch, Wasserstein loss plus gradient
    /// penalty, step on critic parameters only.
    fn critic_step(&mut self, real: &ImageBatch, epoch: usize, step: usize) -> Result<f32> {
        let n = real.size();
        let z = LatentVector::sample_batch(&mut self.rng, n, self.config.generator.z_dim);
        // Detached: the critic loss must not reach generator parameters
        let fake = self.generator.generate(&z).detach();

        // The penalty runs its own tape passes and leaves the critic clean
        let term = self.penalty.apply(&self.critic, &real.images, &fake, &mut self.rng);

        self.critic.zero_grad();
        let d_real = self.critic.score(&real.images);
        let d_fake = self.critic.score(&fake);
        let mut wasserstein = ops::sub(&ops::mean(&d_fake), &ops::mean(&d_real));
        autograd::backward(&mut wasserstein, None);
        term.accumulate(&self.critic);

        let loss = wasserstein.scalar() + term.value;
        if !loss.is_finite() {
            return Err(Error::NumericInstability { epoch, step, loss });
        }

        self.opt_critic.step_refs(&mut self.critic.parameters_mut());
        self.stats.record_critic(loss);
        Ok(loss)
    }

    /// One generator update: fresh latent batch, loss −mean(critic(fake)),
    /// step on generator parameters only.
    fn generator_step(&mut self, batch_size: usize, epoch: usize, step: usize) -> Result<f32> {
        let z = LatentVector::sample_batch(&mut self.rng, batch_size, self.config.generator.z_dim);

        self.generator.zero_grad();
        let fake = self.generator.generate(&z);
        let scores = self.critic.score(&fake);
        let mut loss_t = ops::scale(&ops::mean(&scores), -1.0);
        autograd::backward(&mut loss_t, None);

        let loss = loss_t.scalar();
        if !loss.is_finite() {
            return Err(Error::NumericInstability { epoch, step, loss });
        }

        self.opt_generator.step_refs(&mut self.generator.parameters_mut());
        // The backward pass also left gradients on critic parameters; the
        // next critic step zeroes them before they can be applied.
        self.stats.record_generator(loss);
        Ok(loss)
    }

    fn save_checkpoints(&self, dir: &Path, versioned: bool, epoch: usize) -> Result<()> {
        let (critic_name, generator_name) = if versioned {
            (format!("critic-epoch{:03}.safetensors", epoch + 1),
             format!("generator-epoch{:03}.safetensors", epoch + 1))
        } else {
            ("critic.safetensors".to_string(), "generator.safetensors".to_string())
        };
        save_checkpoint(&self.critic.named_parameters(), "critic", &dir.join(critic_name))?;
        save_checkpoint(
            &self.generator.named_parameters(),
            "generator",
            &dir.join(generator_name),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gan::config::GanConfig;

    fn tiny_dataset(real: usize) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("real")).unwrap();
        for i in 0..real {
            let img = image::RgbImage::from_fn(16, 16, |x, y| {
                image::Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y + i as u32) * 8) as u8])
            });
            image::DynamicImage::ImageRgb8(img)
                .save(dir.path().join("real").join(format!("r{i}.png")))
                .unwrap();
        }
        dir
    }

    fn tiny_config(batch_size: usize, epochs: usize) -> GanConfig {
        GanConfig { batch_size, epochs, ..GanConfig::small_test_config() }
    }

    #[test]
    fn test_update_ratio_invariant() {
        // Over enough batches for 10 outer generator steps, exactly 5 critic
        // updates precede each generator update.
        let data_dir = tiny_dataset(4);
        let dataset = FaceDataset::open(data_dir.path(), 64).unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        // 2 batches per epoch at batch size 2; 25 epochs = 50 critic steps
        let mut config = tiny_config(2, 25);
        config.critic.features = 2;
        config.generator.features = 2;
        config.generator.z_dim = 4;
        let mut trainer = GanTrainer::with_seed(config, 42).unwrap();
        let opts = TrainOptions {
            output_dir: out_dir.path().to_path_buf(),
            verbose: false,
            ..Default::default()
        };
        let report = trainer.train(&dataset, None, &opts).expect("training");

        assert_eq!(report.critic_updates, 50);
        assert_eq!(report.generator_updates, 10);
        assert_eq!(report.critic_updates, report.generator_updates * 5);
    }

    #[test]
    fn test_losses_finite_and_checkpoints_written() {
        let data_dir = tiny_dataset(2);
        let dataset = FaceDataset::open(data_dir.path(), 64).unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        let mut trainer = GanTrainer::with_seed(tiny_config(2, 1), 7).unwrap();
        let opts = TrainOptions {
            output_dir: out_dir.path().to_path_buf(),
            verbose: false,
            ..Default::default()
        };
        let report = trainer.train(&dataset, None, &opts).expect("training");

        assert!(report.final_critic_loss.is_finite());
        assert!(out_dir.path().join("critic.safetensors").exists());
        assert!(out_dir.path().join("generator.safetensors").exists());
    }

    #[test]
    fn test_versioned_checkpoints() {
        let data_dir = tiny_dataset(2);
        let dataset = FaceDataset::open(data_dir.path(), 64).unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        let mut trainer = GanTrainer::with_seed(tiny_config(2, 2), 8).unwrap();
        let opts = TrainOptions {
            output_dir: out_dir.path().to_path_buf(),
            versioned_checkpoints: true,
            verbose: false,
            ..Default::default()
        };
        trainer.train(&dataset, None, &opts).expect("training");

        assert!(out_dir.path().join("critic-epoch001.safetensors").exists());
        assert!(out_dir.path().join("critic-epoch002.safetensors").exists());
        assert!(out_dir.path().join("generator-epoch002.safetensors").exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GanConfig { learning_rate: -1.0, ..GanConfig::small_test_config() };
        assert!(GanTrainer::with_seed(config, 1).is_err());
    }

    #[test]
    fn test_training_updates_parameters() {
        let data_dir = tiny_dataset(2);
        let dataset = FaceDataset::open(data_dir.path(), 64).unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        let mut trainer = GanTrainer::with_seed(tiny_config(2, 1), 21).unwrap();
        let before: Vec<f32> = trainer.critic.parameters()[0].data().to_vec();

        let opts = TrainOptions {
            output_dir: out_dir.path().to_path_buf(),
            verbose: false,
            ..Default::default()
        };
        trainer.train(&dataset, None, &opts).expect("training");

        let after: Vec<f32> = trainer.critic.parameters()[0].data().to_vec();
        assert_ne!(before, after, "critic parameters did not move");
    }
}
