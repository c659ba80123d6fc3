//! Conversion execution with cache-by-existence
//!
//! A task whose destination already exists is skipped. There is no content
//! hashing: changing a directive's channel layout or color space leaves the
//! old container in place until the cache directory is cleared.

use super::intermediate::{accepts_natively, encode_intermediate};
use crate::error::{IoResultExt, PipelineError, Result};
use crate::plan::{ConversionPlan, ConversionTask};
use crate::recipe::CodecSettings;
use crate::tools::{ToolPaths, ToolRunner};
use rayon::prelude::*;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What happened to a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// Destination already existed; nothing was run
    Cached,
    /// The codec produced the destination
    Converted,
}

/// Counts of task outcomes for a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub converted: usize,
    pub cached: usize,
}

/// Runs conversion tasks through the external codec
pub struct ConversionExecutor<'a> {
    tools: &'a ToolPaths,
    settings: CodecSettings,
    runner: &'a dyn ToolRunner,
}

impl<'a> ConversionExecutor<'a> {
    pub fn new(tools: &'a ToolPaths, settings: CodecSettings, runner: &'a dyn ToolRunner) -> Self {
        Self { tools, settings, runner }
    }

    /// Produces the destination of `task`, or confirms it already exists
    pub fn execute(&self, task: &ConversionTask) -> Result<ConversionOutcome> {
        if task.destination.exists() {
            tracing::debug!(destination = %task.destination.display(), "conversion cached");
            return Ok(ConversionOutcome::Cached);
        }

        let input = if accepts_natively(&task.source) {
            task.source.as_path()
        } else {
            encode_intermediate(&task.source, &task.intermediate)?;
            task.intermediate.as_path()
        };

        if let Some(parent) = task.destination.parent() {
            fs::create_dir_all(parent).at_path(parent)?;
        }

        let command = self.tools.codec(input, &task.destination, task.channels, task.color_space, &self.settings);
        if let Err(err) = self.runner.run(&command) {
            // A half-written container would otherwise be taken as cached next run
            if task.destination.exists() {
                if let Err(remove_err) = fs::remove_file(&task.destination) {
                    tracing::warn!(destination = %task.destination.display(), error = %remove_err, "failed to remove partial output");
                }
            }
            return Err(err);
        }

        if !task.destination.is_file() {
            return Err(PipelineError::MissingToolOutput {
                command: command.to_string(),
                path: task.destination.clone(),
            });
        }

        tracing::info!(source = %task.source.display(), destination = %task.destination.display(), "converted texture");
        Ok(ConversionOutcome::Converted)
    }

    /// Executes every task of `plan` on a pool of at most `jobs` workers
    ///
    /// `jobs == 0` uses one worker per available core. The first failure stops
    /// further tasks from starting and is returned once running tasks finish.
    pub fn execute_plan(&self, plan: &ConversionPlan, jobs: usize) -> Result<ConversionSummary> {
        let pool = pool(jobs)?;

        let converted = AtomicUsize::new(0);
        let cached = AtomicUsize::new(0);
        pool.install(|| {
            plan.tasks().par_iter().try_for_each(|task| {
                match self.execute(task)? {
                    ConversionOutcome::Converted => converted.fetch_add(1, Ordering::Relaxed),
                    ConversionOutcome::Cached => cached.fetch_add(1, Ordering::Relaxed),
                };
                Ok::<_, PipelineError>(())
            })
        })?;

        Ok(ConversionSummary {
            converted: converted.into_inner(),
            cached: cached.into_inner(),
        })
    }

    /// Executes every task of `plan`, continuing past failures
    ///
    /// # Returns
    /// One outcome per task, in plan order
    pub fn execute_all(&self, plan: &ConversionPlan, jobs: usize) -> Result<Vec<Result<ConversionOutcome>>> {
        let pool = pool(jobs)?;
        Ok(pool.install(|| plan.tasks().par_iter().map(|task| self.execute(task)).collect()))
    }
}

/// Conversion worker pool; `jobs == 0` lets rayon pick one thread per core
fn pool(jobs: usize) -> Result<rayon::ThreadPool> {
    Ok(rayon::ThreadPoolBuilder::new().num_threads(jobs).thread_name(|index| format!("dalbatch-convert-{index}")).build()?)
}
