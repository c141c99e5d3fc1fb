//! Train command implementation

use crate::cli::args::{apply_overrides, TrainArgs};
use crate::cli::logging::{log, LogLevel};
use crate::config::load_manifest;
use crate::data::FaceDataset;
use crate::gan::{GanTrainer, TrainOptions};

pub fn run_train(args: TrainArgs, level: LogLevel) -> Result<(), String> {
    log(level, LogLevel::Normal, &format!("Discernir: training from {}", args.config.display()));

    let mut manifest = load_manifest(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut manifest, &args);

    if args.dry_run {
        log(level, LogLevel::Normal, "Dry run - manifest validated successfully");
        log(level, LogLevel::Verbose, &format!("  Train data: {}", manifest.data.train_dir.display()));
        log(
            level,
            LogLevel::Verbose,
            &format!("  Epochs: {}, batch size: {}", manifest.gan.epochs, manifest.gan.batch_size),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!(
                "  Adam lr={} betas=({}, {})",
                manifest.gan.learning_rate, manifest.gan.beta1, manifest.gan.beta2
            ),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!(
                "  Critic iterations: {}, lambda_gp: {}",
                manifest.gan.critic_iterations, manifest.gan.lambda_gp
            ),
        );
        return Ok(());
    }

    let image_size = manifest.gan.critic.image_size;
    let dataset = FaceDataset::open(&manifest.data.train_dir, image_size)
        .map_err(|e| format!("Data error: {e}"))?;
    let eval_dataset = manifest
        .data
        .eval_dir
        .as_ref()
        .map(|dir| FaceDataset::open(dir, image_size))
        .transpose()
        .map_err(|e| format!("Data error: {e}"))?;

    let mut trainer = match manifest.output.seed {
        Some(seed) => GanTrainer::with_seed(manifest.gan.clone(), seed),
        None => GanTrainer::new(manifest.gan.clone()),
    }
    .map_err(|e| format!("Config error: {e}"))?;

    let opts = TrainOptions {
        output_dir: manifest.output.dir.clone(),
        versioned_checkpoints: manifest.output.versioned_checkpoints,
        eval_threshold: manifest.inference.threshold,
        verbose: level != LogLevel::Quiet,
    };

    let report = trainer
        .train(&dataset, eval_dataset.as_ref(), &opts)
        .map_err(|e| format!("Training error: {e}"))?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Training complete: {} epochs, {} critic updates, {} generator updates in {:.1}s",
            report.epochs, report.critic_updates, report.generator_updates, report.elapsed_secs
        ),
    );
    if let Some(eval) = &report.eval {
        log(
            level,
            LogLevel::Normal,
            &format!(
                "Held-out accuracy {:.3} over {} samples (real {:.3}, fake {:.3})",
                eval.accuracy, eval.samples, eval.real_accuracy, eval.fake_accuracy
            ),
        );
    }
    Ok(())
}
