//! Abalone age predictor CLI
//!
//! Trains the model/preprocessor pair and runs batch predictions.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{predict, train};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Abalone age predictor CLI
#[derive(Parser)]
#[command(name = "abalone")]
#[command(author, version, about = "Train and run the abalone age predictor", long_about = None)]
pub struct Cli {
    /// Directory holding model.json and preprocessor.json
    #[arg(long, env = "ABALONE_ARTIFACTS_DIR", default_value = abalone_core::workflow::DEFAULT_ARTIFACTS_DIR)]
    pub artifacts_dir: PathBuf,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the model on a labeled CSV and write the artifact pair
    Train {
        /// Labeled dataset (CSV with a Rings column)
        trainset_path: PathBuf,
    },

    /// Predict ring counts for every row of an unlabeled CSV
    Predict {
        /// Input CSV with the measurement and Sex columns
        input: PathBuf,

        /// Write predictions to this CSV file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Retries after a failed attempt
        #[arg(long, default_value_t = 1)]
        retries: u32,

        /// Seconds to wait between attempts
        #[arg(long, default_value_t = 30)]
        retry_delay_secs: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Train { trainset_path } => {
            train::run_training(&trainset_path, &cli.artifacts_dir, cli.format)?;
        }
        Commands::Predict {
            input,
            output,
            retries,
            retry_delay_secs,
        } => {
            predict::run_prediction(
                &input,
                &cli.artifacts_dir,
                output.as_deref(),
                retries,
                retry_delay_secs,
                cli.format,
            )?;
        }
    }

    Ok(())
}
