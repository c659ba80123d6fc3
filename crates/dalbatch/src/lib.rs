//! Batch asset build pipeline for DAL scenes
//!
//! A YAML recipe names a JSON scene document, the directories its textures are
//! looked up in, and which textures to convert into mipmapped KTX containers.
//! Running a recipe converts those textures (reusing earlier outputs), rewrites
//! the scene's texture references to the converted names, compiles the scene
//! and packages it either as one bundle archive or as loose files.
//!
//! The external programs (`ktx` and `daltools`) are driven through
//! [`tools::ToolRunner`], so every stage can be exercised without them.

pub mod convert;
pub mod driver;
pub mod error;
pub mod layout;
pub mod package;
pub mod plan;
pub mod recipe;
pub mod resolve;
pub mod rewrite;
pub mod scene;
pub mod tools;

pub use driver::{BatchReport, Pipeline, PipelineOptions, RunReport, run_recipes};
pub use error::{PipelineError, Result};
pub use recipe::Recipe;
pub use tools::{ProcessRunner, ToolPaths, ToolRunner};

/// Loads a recipe, plans its conversions and resolves every scene texture
///
/// Nothing is converted and no external tool is launched. Used to inspect what
/// a run would do.
///
/// # Arguments
/// * `path` - Path to the YAML recipe
///
/// # Returns
/// The recipe, its conversion plan and its texture reference table
pub fn inspect_recipe<P: AsRef<std::path::Path>>(path: P) -> Result<(Recipe, plan::ConversionPlan, rewrite::TextureReferenceTable)> {
    let recipe = Recipe::from_file(path)?;
    let layout = layout::OutputLayout::new(&recipe.output_dir, &recipe.name);
    let plan = plan::ConversionPlan::build(&recipe, &layout)?;
    let scene = scene::SceneDocument::from_file(&recipe.scene_path)?;
    let table = rewrite::TextureReferenceTable::build(&scene.texture_references(), &recipe.search_roots, &plan)?;
    Ok((recipe, plan, table))
}

/// Maps command line verbosity flags to the maximum log level
///
/// `quiet` wins over any number of `-v`.
pub fn log_level(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::WARN,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}
