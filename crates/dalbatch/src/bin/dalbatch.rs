//! Batch recipe runner
//!
//! Runs each recipe given on the command line in order and exits non-zero if
//! any of them failed.

use clap::Parser;
use dalbatch::{PipelineOptions, ProcessRunner, ToolPaths, log_level, run_recipes};
use std::path::PathBuf;
use std::process::ExitCode;

/// Command-line arguments for the batch runner
#[derive(Parser)]
#[command(version, about = "Converts textures, rewrites and packages DAL scenes from YAML recipes")]
struct Args {
    /// Recipe files to run, in order
    #[arg(required = true)]
    recipes: Vec<PathBuf>,

    /// Texture codec executable
    #[arg(long, default_value = "ktx")]
    ktx: PathBuf,

    /// Scene compiler and bundler executable
    #[arg(long, default_value = "daltools")]
    daltools: PathBuf,

    /// Conversion workers (0 uses one per core)
    #[arg(long, short, default_value = "0")]
    jobs: usize,

    /// More logging (-v debug, -vv trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(long, short)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt().with_max_level(log_level(args.verbose, args.quiet)).with_writer(std::io::stderr).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error installing logger: {e}");
    }

    let options = PipelineOptions {
        tools: ToolPaths {
            ktx: args.ktx,
            daltools: args.daltools,
        },
        jobs: args.jobs,
    };
    let report = run_recipes(&args.recipes, &options, &ProcessRunner);

    tracing::info!(succeeded = report.succeeded(), total = report.outcomes.len(), "batch finished");
    if report.all_succeeded() {
        return ExitCode::SUCCESS;
    }

    for (recipe, error) in report.failures() {
        eprintln!("[ERR] {}: {error}", recipe.display());
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            eprintln!("      caused by: {cause}");
            source = cause.source();
        }
    }
    ExitCode::FAILURE
}
