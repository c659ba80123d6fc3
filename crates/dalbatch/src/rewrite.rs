//! Texture reference table and scene rewriting
//!
//! Every texture the scene references is resolved, redirected to its
//! converted container when a conversion task covers it, and staged under its
//! base file name. The scene's map fields are then rewritten to those names.

use crate::error::{IoResultExt, PipelineError, Result};
use crate::plan::ConversionPlan;
use crate::resolve::SearchRoots;
use crate::scene::SceneDocument;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Where one referenced texture comes from and what it is called in staging
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedTexture {
    /// File name inside the staging directory
    pub final_name: String,
    /// File copied into staging (converted container or passthrough source)
    pub file: PathBuf,
    /// True when `file` is a conversion output
    pub converted: bool,
}

/// Mapping from scene texture identifiers to staged final names
///
/// Built once per run after conversions complete; read-only afterwards.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TextureReferenceTable {
    entries: BTreeMap<String, StagedTexture>,
}

impl TextureReferenceTable {
    /// Resolves `identifiers` and assigns each a final name
    ///
    /// # Returns
    /// The table, [`PipelineError::NotFound`] for an unresolvable identifier,
    /// or [`PipelineError::FinalNameCollision`] when two different files would
    /// share a final name.
    pub fn build(identifiers: &BTreeSet<String>, roots: &SearchRoots, plan: &ConversionPlan) -> Result<Self> {
        let mut entries = BTreeMap::new();
        let mut claimed: BTreeMap<String, PathBuf> = BTreeMap::new();

        for identifier in identifiers {
            let resolved = roots.resolve(identifier)?;
            let (file, converted) = match plan.task_for_source(&resolved.path) {
                Some(task) => (task.destination.clone(), true),
                None => (resolved.path, false),
            };

            let final_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| PipelineError::InvalidScene {
                    path: file.clone(),
                    reason: format!("texture '{identifier}' has no file name"),
                })?;

            match claimed.get(&final_name) {
                Some(existing) if *existing != file => {
                    return Err(PipelineError::FinalNameCollision {
                        name: final_name,
                        first: existing.clone(),
                        second: file,
                    });
                }
                Some(_) => tracing::debug!(identifier = %identifier, final_name = %final_name, "texture shares a staged file with another reference"),
                None => {
                    claimed.insert(final_name.clone(), file.clone());
                }
            }

            entries.insert(identifier.clone(), StagedTexture { final_name, file, converted });
        }

        Ok(Self { entries })
    }

    /// Final name for `identifier`, if the scene references it
    pub fn final_name(&self, identifier: &str) -> Option<&str> {
        self.entries.get(identifier).map(|entry| entry.final_name.as_str())
    }

    /// Distinct final names in sorted order
    pub fn final_names(&self) -> BTreeSet<&str> {
        self.entries.values().map(|entry| entry.final_name.as_str()).collect()
    }

    /// Identifier to staged texture entries
    pub fn entries(&self) -> &BTreeMap<String, StagedTexture> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every referenced file into `staging_dir` under its final name
    ///
    /// # Returns
    /// The number of distinct files staged
    pub fn stage(&self, staging_dir: &Path) -> Result<usize> {
        let mut staged = BTreeSet::new();
        for entry in self.entries.values() {
            if !staged.insert(entry.final_name.as_str()) {
                continue;
            }
            let target = staging_dir.join(&entry.final_name);
            fs::copy(&entry.file, &target).at_path(&entry.file)?;
            tracing::debug!(file = %entry.file.display(), staged = %target.display(), "staged texture");
        }
        Ok(staged.len())
    }

    /// Rewrites the scene's map fields to final names
    ///
    /// # Returns
    /// The number of fields changed
    pub fn apply(&self, scene: &mut SceneDocument) -> usize {
        scene.rewrite_references(|identifier| self.final_name(identifier))
    }
}
