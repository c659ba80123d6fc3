//! Standalone KTX conversion tool
//!
//! Converts image files, or every file in the given directories, into `.ktx`
//! containers written beside each source. Files that cannot be converted are
//! reported and skipped.

use clap::Parser;
use dalbatch::convert::{ConversionExecutor, ConversionOutcome, collect_sources, standalone_task};
use dalbatch::plan::ConversionPlan;
use dalbatch::recipe::{CodecSettings, ColorSpace};
use dalbatch::{ProcessRunner, ToolPaths, log_level};
use std::path::PathBuf;
use std::process::ExitCode;

/// Command-line arguments for the standalone converter
#[derive(Parser)]
#[command(version, about = "Convert images to KTX (Khronos Texture) files")]
struct Args {
    /// Files, or directories with --directory
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Treat every path as a directory and convert the files in it
    #[arg(long, short)]
    directory: bool,

    /// Descend into subdirectories (with --directory)
    #[arg(long, short)]
    recursive: bool,

    /// Store linear data instead of sRGB color
    #[arg(long)]
    linear: bool,

    /// Zstandard supercompression level (1-22)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=22))]
    zstd: Option<u32>,

    /// Directory for PNG re-encodes of formats the codec cannot read
    #[arg(long)]
    png_dir: Option<PathBuf>,

    /// Texture codec executable
    #[arg(long, default_value = "ktx")]
    ktx: PathBuf,

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

    let sources = match collect_sources(&args.paths, args.directory, args.recursive) {
        Ok(sources) => sources,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let color_space = if args.linear { ColorSpace::Linear } else { ColorSpace::Srgb };
    let png_dir = args.png_dir.unwrap_or_else(|| std::env::temp_dir().join("build_ktx"));

    // Sources that would overwrite another's container (a.png next to a.tga) are skipped
    let mut failed = 0usize;
    let mut plan = ConversionPlan::default();
    for source in &sources {
        if let Err(e) = standalone_task(source, color_space, &png_dir).and_then(|task| plan.push(task)) {
            eprintln!("[ERR] {e}");
            failed += 1;
        }
    }

    let tools = ToolPaths {
        ktx: args.ktx,
        ..Default::default()
    };
    let executor = ConversionExecutor::new(&tools, CodecSettings { zstd_level: args.zstd }, &ProcessRunner);
    let outcomes = match executor.execute_all(&plan, args.jobs) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    for (task, outcome) in plan.tasks().iter().zip(outcomes) {
        match outcome {
            Ok(ConversionOutcome::Converted) => println!("[OK] Converted: '{}'", task.source.display()),
            Ok(ConversionOutcome::Cached) => println!("[OK] Up to date: '{}'", task.destination.display()),
            Err(e) => {
                eprintln!("[ERR] {e}");
                failed += 1;
            }
        }
    }

    println!("{} converted or up to date, {failed} failed", sources.len() - failed);
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
