//! Evaluate command implementation

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cli::args::EvaluateArgs;
use crate::cli::logging::{log, LogLevel};
use crate::data::FaceDataset;
use crate::gan::{evaluate_critic, Critic, CriticConfig, IMAGE_SIZE};
use crate::io::load_checkpoint;

pub fn run_evaluate(args: EvaluateArgs, level: LogLevel) -> Result<(), String> {
    let config = CriticConfig { features: args.features, ..Default::default() };

    let checkpoint = load_checkpoint(&args.checkpoint)
        .map_err(|e| format!("Checkpoint error: {e}"))?;
    let mut critic = Critic::with_seed(config, 0);
    critic.load_state(&checkpoint).map_err(|e| format!("Checkpoint error: {e}"))?;

    let dataset = FaceDataset::open(&args.data_dir, IMAGE_SIZE)
        .map_err(|e| format!("Data error: {e}"))?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Evaluating {} on {} samples at threshold {}",
            args.checkpoint.display(),
            dataset.len(),
            args.threshold
        ),
    );

    let mut rng = StdRng::seed_from_u64(0);
    let report = evaluate_critic(&critic, &dataset, args.batch_size, args.threshold, &mut rng)
        .map_err(|e| format!("Evaluation error: {e}"))?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Accuracy {:.3} over {} samples (real {:.3}, fake {:.3})",
            report.accuracy, report.samples, report.real_accuracy, report.fake_accuracy
        ),
    );
    Ok(())
}
