// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands each subcommand to its
// use case in Layer 2:
//   1. `train`    - train on synthetic clips, checkpoint per epoch
//   2. `evaluate` - score the latest checkpoint on one split
//   3. `inspect`  - print the layer plan and parameter count
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, InspectArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "densenet3d",
    version,
    about = "Train and evaluate 3D DenseNets for video classification."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
            Commands::Inspect(args)  => run_inspect(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let report = TrainUseCase::new(args.into()).execute()?;
    println!(
        "Training complete: {} ({} batches)",
        report.model_identifier, report.batches_step
    );
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    EvaluateUseCase::new(args.into()).execute()?;
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let report = InspectUseCase::new(args.into()).execute()?;
    println!("Model: {}", report.model_identifier);
    print!("{}", report.summary);
    println!("Final features: {}", report.final_features);
    println!("Total training params: {:.1}M", report.trainable_params as f64 / 1e6);
    Ok(())
}
