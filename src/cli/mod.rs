// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap, hands off to a use case in Layer 2
// and prints the result.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, DownloadArgs, EvaluateArgs, PredictArgs, TrainArgs};

use crate::infra::kaggle::CopyOutcome;

#[derive(Parser, Debug)]
#[command(
    name = "defect-classifier",
    version,
    about = "Download the NEU surface defect dataset and fine-tune MobileNetV2 on it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Download(args) => run_download(args),
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
            Commands::Predict(args)  => run_predict(args),
        }
    }
}

fn run_download(args: DownloadArgs) -> Result<()> {
    use crate::application::download_use_case::DownloadUseCase;
    use crate::infra::kaggle::KaggleClient;

    let use_case = DownloadUseCase::new(KaggleClient::from_env(), args.dataset, args.dataset_dir);
    let report   = use_case.execute()?;

    println!("Dataset is available at: {}", report.cache_path.display());
    match report.outcome {
        CopyOutcome::Copied         => println!("Dataset copied into: {}", report.dataset_dir.display()),
        CopyOutcome::AlreadyPresent => println!("Dataset already exists in: {}", report.dataset_dir.display()),
    }
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::{TrainConfig, TrainUseCase};

    let config: TrainConfig = args.into();
    tracing::info!("Starting training on images in: {}", config.train_dir.display());

    let report = TrainUseCase::new(config).execute()?;

    if let Some(best) = report.history.iter().max_by(|a, b| a.val_acc.total_cmp(&b.val_acc)) {
        tracing::info!("Best epoch: {} (val_accuracy={:.4})", best.epoch, best.val_acc);
    }

    println!("Classes: {:?}", report.classes.names());
    println!("Model saved as {}", report.model_path.display());
    println!("Validation Accuracy: {:.2}%", report.validation.accuracy * 100.0);
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let batch_size = crate::application::train_use_case::TrainConfig::default().batch_size;
    let evaluation = EvaluateUseCase::new(args.model_path, args.data_dir, batch_size).execute()?;

    println!("Validation Loss: {:.4}", evaluation.loss);
    println!("Validation Accuracy: {:.2}%", evaluation.accuracy * 100.0);
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let prediction = PredictUseCase::new(args.model_path).execute(&args.image)?;
    println!(
        "{}: {} ({:.2}%)",
        args.image.display(),
        prediction.class_name,
        prediction.probability * 100.0
    );
    for (name, probability) in &prediction.scores {
        println!("  {:<16} {:>6.2}%", name, probability * 100.0);
    }
    Ok(())
}
