//! qtiscore CLI: score QTI assessment results from the command line.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "qtiscore", version, about = "QTI response and outcome processing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a batch of assessment results
    Run {
        /// Package JSON file or package directory (test.json + items/)
        #[arg(long)]
        package: PathBuf,

        /// Assessment results JSON file
        #[arg(long)]
        results: PathBuf,

        /// Processing stage: responses, outcomes, all
        #[arg(long, default_value = "all")]
        stage: String,

        /// Process results concurrently
        #[arg(long)]
        parallel: bool,

        /// Output report path
        #[arg(long, default_value = "./qtiscore-report.json")]
        output: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print normalised item scores
    Score {
        /// Package JSON file or package directory
        #[arg(long)]
        package: PathBuf,

        /// Assessment results JSON file
        #[arg(long)]
        results: PathBuf,

        /// Item identifier to score
        #[arg(long)]
        item: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate a scoring package
    Validate {
        /// Package JSON file or package directory
        #[arg(long)]
        package: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("qtiscore=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            package,
            results,
            stage,
            parallel,
            output,
            config,
        } => commands::run::execute(package, results, stage, parallel, output, config).await,
        Commands::Score {
            package,
            results,
            item,
            config,
        } => commands::score::execute(package, results, item, config),
        Commands::Validate { package } => commands::validate::execute(package),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
