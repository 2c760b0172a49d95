// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    — prepares CIFAR-10, trains AlexNet, tests the
//                   best checkpoint and plots its mistakes
//   2. `evaluate` — reloads a saved checkpoint and repeats the
//                   test + plotting stage
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

use crate::application::train_use_case::RunSummary;

#[derive(Parser, Debug)]
#[command(
    name = "alexnet-cifar",
    version,
    about = "Train AlexNet on CIFAR-10, then evaluate it and inspect its mistakes."
)]
pub struct Cli {
    /// The subcommand to run (train or evaluate)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on images in: {}", args.source_path);
    let summary = TrainUseCase::new(args.into()).execute()?;
    print_summary(&summary);
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let summary = EvaluateUseCase::new(args.into()).execute()?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(s: &RunSummary) {
    println!("Test Loss: {:.3} | Test Acc: {:.2}%", s.test.loss, s.test.accuracy * 100.0);
    println!("Best epoch: {} | Misclassified: {}", s.best_epoch, s.incorrect);
}
