//! Conversion planning
//!
//! Expands the recipe's conversion directives into one [`ConversionTask`] per
//! source texture. Destination paths are derived from the source location so
//! that reruns land on the same cache entries.

use crate::convert::accepts_natively;
use crate::error::{PipelineError, Result};
use crate::layout::OutputLayout;
use crate::recipe::{ChannelLayout, ColorSpace, Recipe};
use crate::resolve::ResolvedTexture;
use crate::tools::TEXTURE_CONTAINER_EXTENSION;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Extension of re-encoded codec inputs
const INTERMEDIATE_EXTENSION: &str = "png";

/// A single texture conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionTask {
    /// Identifier as written in the recipe
    pub identifier: String,
    /// Label of the directive that produced this task
    pub directive: String,
    /// Canonical source file
    pub source: PathBuf,
    /// Converted container inside the cache
    pub destination: PathBuf,
    /// Where a re-encoded copy goes if the codec cannot read the source
    pub intermediate: PathBuf,
    pub channels: ChannelLayout,
    pub color_space: ColorSpace,
}

impl ConversionTask {
    /// Directive label and identifier, for error messages
    fn label(&self) -> String {
        format!("{} via '{}'", self.directive, self.identifier)
    }

    /// Files this task writes
    fn outputs(&self) -> Vec<&Path> {
        let mut outputs = vec![self.destination.as_path()];
        if !accepts_natively(&self.source) {
            outputs.push(self.intermediate.as_path());
        }
        outputs
    }
}

/// Every conversion task of a recipe, indexed by source path
///
/// Built once per run and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionPlan {
    tasks: Vec<ConversionTask>,
    #[serde(skip)]
    by_source: HashMap<PathBuf, usize>,
    /// Output paths already claimed: destinations, and intermediates of tasks that re-encode
    #[serde(skip)]
    by_output: HashMap<PathBuf, usize>,
}

impl ConversionPlan {
    /// Resolves every directive source and builds the task list
    ///
    /// # Returns
    /// The plan, or the first [`PipelineError::NotFound`] or
    /// [`PipelineError::DuplicateSource`] encountered.
    pub fn build(recipe: &Recipe, layout: &OutputLayout) -> Result<Self> {
        let mut plan = Self::default();

        for directive in &recipe.conversions {
            let label = directive.describe();
            for identifier in &directive.files {
                let resolved = recipe.search_roots.resolve(identifier)?;
                let relative = cache_relative_path(&recipe.base_dir, &resolved);
                let task = ConversionTask {
                    identifier: identifier.clone(),
                    directive: label.clone(),
                    destination: layout.cache_dir().join(&relative).with_extension(TEXTURE_CONTAINER_EXTENSION),
                    intermediate: layout.png_dir().join(&relative).with_extension(INTERMEDIATE_EXTENSION),
                    source: resolved.path,
                    channels: directive.channels,
                    color_space: directive.color_space,
                };
                tracing::debug!(source = %task.source.display(), destination = %task.destination.display(), "planned conversion");
                plan.push(task)?;
            }
        }

        Ok(plan)
    }

    /// Builds a plan from ready-made tasks
    ///
    /// Fails on the first task that [`push`](Self::push) rejects.
    pub fn from_tasks(tasks: Vec<ConversionTask>) -> Result<Self> {
        let mut plan = Self::default();
        for task in tasks {
            plan.push(task)?;
        }
        Ok(plan)
    }

    /// Appends `task` unless it shares a source or an output file with a planned task
    ///
    /// # Returns
    /// [`PipelineError::DuplicateSource`] for a repeated source, or
    /// [`PipelineError::DuplicateDestination`] when two sources would be
    /// written to the same container or PNG intermediate. The plan is
    /// unchanged on error.
    pub fn push(&mut self, task: ConversionTask) -> Result<()> {
        if let Some(&existing) = self.by_source.get(&task.source) {
            return Err(PipelineError::DuplicateSource {
                path: task.source.clone(),
                first: self.tasks[existing].label(),
                second: task.label(),
            });
        }

        let outputs = task.outputs();
        for output in &outputs {
            if let Some(&existing) = self.by_output.get(*output) {
                return Err(PipelineError::DuplicateDestination {
                    path: output.to_path_buf(),
                    first: self.tasks[existing].label(),
                    second: task.label(),
                });
            }
        }

        let index = self.tasks.len();
        for output in outputs {
            self.by_output.insert(output.to_path_buf(), index);
        }
        self.by_source.insert(task.source.clone(), index);
        self.tasks.push(task);
        Ok(())
    }

    /// Tasks in directive order
    pub fn tasks(&self) -> &[ConversionTask] {
        &self.tasks
    }

    /// The task converting `source`, if any
    pub fn task_for_source(&self, source: &Path) -> Option<&ConversionTask> {
        self.by_source.get(source).map(|&index| &self.tasks[index])
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Cache-relative location for a resolved texture
///
/// Sources under the recipe directory keep their directory structure. Sources
/// found under a root outside it go under `_root<N>/` so they cannot escape
/// the cache or collide with in-tree files.
fn cache_relative_path(base_dir: &Path, resolved: &ResolvedTexture) -> PathBuf {
    match resolved.path.strip_prefix(base_dir) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => {
            let relative: PathBuf = resolved.relative.components().filter(|c| matches!(c, std::path::Component::Normal(_))).collect();
            Path::new(&format!("_root{}", resolved.root_index)).join(relative)
        }
    }
}
