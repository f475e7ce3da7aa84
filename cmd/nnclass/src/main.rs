//! nnclass - train subjects and classify feature vectors from the command line.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use giztoy_nnclass::ClassifierKind;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

/// nnclass - nearest-neighbor subject classification.
///
/// Subjects are trained from mean feature vectors and stored under
/// ~/.giztoy/nnclass/models, one blob per classifier kind and pipeline.
/// Settings come from ~/.giztoy/nnclass/config.yaml; flags override them.
#[derive(Parser)]
#[command(name = "nnclass")]
#[command(about = "Nearest-neighbor subject classification")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.giztoy/nnclass/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Classifier kind (manhattan, euclidean, chebyshev, minkowski, cosine, random)
    #[arg(short = 'k', long, global = true)]
    pub classifier: Option<ClassifierKind>,

    /// Minkowski order r
    #[arg(short = 'r', long, global = true)]
    pub order: Option<f64>,

    /// Directory holding model files
    #[arg(long, global = true)]
    pub model_dir: Option<PathBuf>,

    /// Preprocessing method id the features were produced with
    #[arg(long, global = true)]
    pub preprocessing: Option<u32>,

    /// Feature extraction method id the features were produced with
    #[arg(long, global = true)]
    pub extraction: Option<u32>,

    /// Seed for the random baseline
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a subject's mean feature vector
    Train {
        /// Subject id
        #[arg(short, long, allow_hyphen_values = true)]
        subject: i32,

        /// Comma-separated feature values
        #[arg(short, long, allow_hyphen_values = true)]
        features: String,
    },
    /// Rank every trained subject against a feature vector
    Classify {
        /// Comma-separated feature values
        #[arg(short, long, allow_hyphen_values = true)]
        features: String,
    },
    /// List available classifier kinds
    Kinds,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_target(false)
            .init();
    }

    match &cli.command {
        Commands::Train { subject, features } => commands::train(&cli, *subject, features),
        Commands::Classify { features } => commands::classify(&cli, features),
        Commands::Kinds => commands::kinds(&cli),
    }
}
