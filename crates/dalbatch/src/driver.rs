//! Per-recipe pipeline sequencing
//!
//! A run plans every conversion before any tool is launched, executes the plan,
//! builds the reference table, rewrites and stages the scene, and only then
//! packages into the final directory. The first error ends the recipe.

use crate::convert::ConversionExecutor;
use crate::error::{PipelineError, Result};
use crate::layout::OutputLayout;
use crate::package::{Packager, check_staged_names, stage_scene};
use crate::plan::ConversionPlan;
use crate::recipe::Recipe;
use crate::rewrite::TextureReferenceTable;
use crate::scene::SceneDocument;
use crate::tools::{ToolPaths, ToolRunner};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Process-wide options shared by every recipe in an invocation
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub tools: ToolPaths,
    /// Conversion worker count; 0 picks one per core
    pub jobs: usize,
}

/// What a successful recipe run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub converted: usize,
    pub cached: usize,
    pub textures_staged: usize,
    pub rewritten_fields: usize,
    pub final_files: Vec<PathBuf>,
}

/// Runs one recipe through every stage
pub struct Pipeline<'a> {
    options: &'a PipelineOptions,
    runner: &'a dyn ToolRunner,
}

impl<'a> Pipeline<'a> {
    pub fn new(options: &'a PipelineOptions, runner: &'a dyn ToolRunner) -> Self {
        Self { options, runner }
    }

    /// Loads the recipe at `path` and runs it
    pub fn run_file(&self, path: &Path) -> Result<RunReport> {
        let recipe = Recipe::from_file(path)?;
        self.run(&recipe)
    }

    /// Runs an already loaded recipe
    ///
    /// # Returns
    /// A report of the run, or the first error any stage raised. The final
    /// directory is untouched unless packaging succeeded.
    pub fn run(&self, recipe: &Recipe) -> Result<RunReport> {
        let span = tracing::info_span!("recipe", name = %recipe.name);
        let _guard = span.enter();

        let layout = OutputLayout::new(&recipe.output_dir, &recipe.name);

        let plan = ConversionPlan::build(recipe, &layout)?;
        tracing::info!(tasks = plan.len(), "planned conversions");

        let executor = ConversionExecutor::new(&self.options.tools, recipe.codec, self.runner);
        let summary = executor.execute_plan(&plan, self.options.jobs)?;
        tracing::info!(converted = summary.converted, cached = summary.cached, "conversions complete");

        let mut scene = SceneDocument::from_file(&recipe.scene_path)?;
        let table = TextureReferenceTable::build(&scene.texture_references(), &recipe.search_roots, &plan)?;
        check_staged_names(&table, &recipe.scene_path, &recipe.archive)?;

        layout.reset_intermediate()?;
        let textures_staged = table.stage(layout.intermediate_dir())?;
        let rewritten_fields = table.apply(&mut scene);
        tracing::info!(references = table.len(), staged = textures_staged, rewritten = rewritten_fields, "rewrote scene references");

        let staged = stage_scene(&scene, &recipe.scene_path, layout.intermediate_dir())?;
        let packager = Packager::new(&self.options.tools, self.runner, &layout);
        let compiled = packager.compile(&staged, recipe.scene_compression)?;
        let final_files = packager.promote(&compiled, &table, &recipe.archive)?;
        tracing::info!(files = final_files.len(), final_dir = %layout.final_dir().display(), "packaged");

        Ok(RunReport {
            converted: summary.converted,
            cached: summary.cached,
            textures_staged,
            rewritten_fields,
            final_files,
        })
    }
}

/// Outcome of one recipe in a batch
#[derive(Debug)]
pub struct RecipeOutcome {
    pub recipe: PathBuf,
    pub result: Result<RunReport>,
}

/// Outcomes of a batch, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RecipeOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.result.is_ok()).count()
    }

    /// Recipes that failed with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &PipelineError)> {
        self.outcomes.iter().filter_map(|outcome| outcome.result.as_ref().err().map(|err| (outcome.recipe.as_path(), err)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }
}

/// Runs `recipes` one after another
///
/// A failing recipe is logged and recorded; later recipes still run.
pub fn run_recipes<P: AsRef<Path>>(recipes: &[P], options: &PipelineOptions, runner: &dyn ToolRunner) -> BatchReport {
    let pipeline = Pipeline::new(options, runner);
    let mut report = BatchReport::default();

    for recipe in recipes {
        let recipe = recipe.as_ref();
        let result = pipeline.run_file(recipe);
        match &result {
            Ok(run) => tracing::info!(
                recipe = %recipe.display(),
                converted = run.converted,
                cached = run.cached,
                staged = run.textures_staged,
                final_files = run.final_files.len(),
                "recipe finished"
            ),
            Err(err) => tracing::error!(recipe = %recipe.display(), kind = err.kind(), "{err}"),
        }
        report.outcomes.push(RecipeOutcome {
            recipe: recipe.to_path_buf(),
            result,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolCommand;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records commands and fails every one of them
    #[derive(Default)]
    struct RefusingRunner {
        calls: Mutex<Vec<ToolCommand>>,
    }

    impl ToolRunner for RefusingRunner {
        fn run(&self, command: &ToolCommand) -> Result<()> {
            self.calls.lock().unwrap().push(command.clone());
            Err(PipelineError::ExternalToolFailure {
                command: command.to_string(),
                status: "exit status: 1".to_string(),
            })
        }
    }

    #[test]
    fn test_missing_recipe_file_is_reported_and_batch_continues() {
        let dir = TempDir::new().unwrap();
        let second = dir.path().join("empty.yml");
        fs::write(&second, "texture_search_roots: []\n").unwrap();

        let runner = RefusingRunner::default();
        let report = run_recipes(&[dir.path().join("absent.yml"), second], &PipelineOptions::default(), &runner);

        assert_eq!(report.outcomes.len(), 2);
        assert!(!report.all_succeeded());
        let kinds: Vec<_> = report.failures().map(|(_, err)| err.kind()).collect();
        assert_eq!(kinds, vec!["Io", "MissingRequiredConfig"]);
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_codec_failure_stops_before_scene_is_read() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("floor.png"), b"png").unwrap();
        fs::write(dir.path().join("castle.yml"), "scene: missing.json\nconversions:\n  - channels: 4\n    files: [floor.png]\n").unwrap();

        let runner = RefusingRunner::default();
        let err = Pipeline::new(&PipelineOptions::default(), &runner).run_file(&dir.path().join("castle.yml")).unwrap_err();

        assert!(matches!(err, PipelineError::ExternalToolFailure { .. }));
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
        assert!(!dir.path().join("build/intermediate").exists());
    }
}
