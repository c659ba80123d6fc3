//! Recipe inspection tool
//!
//! Loads a recipe, plans its conversions and resolves every texture its scene
//! references, then dumps the result as JSON. No external tool is run and
//! nothing is written besides the output.

use clap::Parser;
use dalbatch::inspect_recipe;
use dalbatch::plan::ConversionTask;
use dalbatch::rewrite::StagedTexture;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{fs, process};

/// Command-line arguments for the plan dumper
#[derive(Parser)]
#[command(version, about = "Dumps the conversion plan and texture references of a recipe as JSON")]
struct Args {
    /// Recipe file
    recipe: PathBuf,

    /// Write JSON here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

/// Everything a run of the recipe would act on
#[derive(Serialize)]
struct PlanDump<'a> {
    recipe: &'a Path,
    scene: &'a Path,
    search_roots: &'a [PathBuf],
    conversions: &'a [ConversionTask],
    references: &'a BTreeMap<String, StagedTexture>,
    archive: Option<&'a str>,
}

fn main() {
    let args = Args::parse();

    let (recipe, plan, table) = match inspect_recipe(&args.recipe) {
        Ok(inspected) => inspected,
        Err(e) => {
            eprintln!("Error inspecting recipe '{}': {e}", args.recipe.display());
            process::exit(1);
        }
    };

    let dump = PlanDump {
        recipe: &recipe.path,
        scene: &recipe.scene_path,
        search_roots: recipe.search_roots.roots(),
        conversions: plan.tasks(),
        references: table.entries(),
        archive: recipe.archive.enabled.then_some(recipe.archive.name.as_str()),
    };

    let json = match serde_json::to_string_pretty(&dump) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing plan: {e}");
            process::exit(1);
        }
    };

    match args.output {
        Some(path) => {
            if let Err(e) = fs::write(&path, json) {
                eprintln!("Error writing '{}': {e}", path.display());
                process::exit(1);
            }
            eprintln!("Wrote {} conversions and {} references to '{}'", plan.len(), table.len(), path.display());
        }
        None => println!("{json}"),
    }
}
