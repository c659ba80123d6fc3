//! Scene document access
//!
//! The scene is a JSON document with a top-level `scenes` list. Each scene
//! holds `materials`, and every material key ending in [`MAP_FIELD_SUFFIX`]
//! names a texture. Everything else in the document is carried through
//! untouched.

use crate::error::{IoResultExt, PipelineError, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Material keys ending in this suffix are texture references
pub const MAP_FIELD_SUFFIX: &str = "map";
/// Companion binary payload extension, copied alongside the document
pub const SCENE_BINARY_EXTENSION: &str = "bin";

/// A loaded scene document
#[derive(Debug, Clone)]
pub struct SceneDocument {
    path: PathBuf,
    root: Value,
}

impl SceneDocument {
    /// Reads and validates the scene document at `path`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).at_path(path)?;
        Self::from_json(&content, path)
    }

    /// Parses scene JSON; `path` is used for error messages only
    pub fn from_json(content: &str, path: &Path) -> Result<Self> {
        let root: Value = serde_json::from_str(content).map_err(|source| PipelineError::SceneParse { path: path.to_path_buf(), source })?;
        let document = Self { path: path.to_path_buf(), root };
        document.validate()?;
        Ok(document)
    }

    /// Path the document was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Distinct texture identifiers referenced by any material, sorted
    pub fn texture_references(&self) -> BTreeSet<String> {
        let mut references = BTreeSet::new();
        for material in self.materials() {
            for (key, value) in material {
                if let Some(identifier) = map_field_value(key, value) {
                    references.insert(identifier.to_string());
                }
            }
        }
        references
    }

    /// Replaces map-field values using `rename`
    ///
    /// `rename` returns the replacement for an identifier, or `None` to leave
    /// the field unchanged.
    ///
    /// # Returns
    /// The number of fields whose value changed
    pub fn rewrite_references<'t>(&mut self, rename: impl Fn(&str) -> Option<&'t str>) -> usize {
        let mut changed = 0;
        for material in self.materials_mut() {
            for (key, value) in material.iter_mut() {
                let Some(identifier) = map_field_value(key, value) else {
                    continue;
                };
                if let Some(new_name) = rename(identifier) {
                    if new_name != identifier {
                        *value = Value::String(new_name.to_string());
                        changed += 1;
                    }
                }
            }
        }
        changed
    }

    /// Serializes the document to `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.root).map_err(|source| PipelineError::SceneParse { path: path.to_path_buf(), source })?;
        fs::write(path, content).at_path(path)
    }

    /// Checks the `scenes[].materials[]` shape once so accessors can skip it
    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| PipelineError::InvalidScene { path: self.path.clone(), reason };

        let scenes = self.root.get("scenes").ok_or_else(|| invalid("missing top-level 'scenes'".to_string()))?;
        let scenes = scenes.as_array().ok_or_else(|| invalid("'scenes' is not a list".to_string()))?;

        for (scene_index, scene) in scenes.iter().enumerate() {
            let Some(materials) = scene.get("materials") else {
                continue;
            };
            let materials = materials.as_array().ok_or_else(|| invalid(format!("scenes[{scene_index}].materials is not a list")))?;
            for (material_index, material) in materials.iter().enumerate() {
                let material = material.as_object().ok_or_else(|| invalid(format!("scenes[{scene_index}].materials[{material_index}] is not an object")))?;
                for (key, value) in material {
                    if key.ends_with(MAP_FIELD_SUFFIX) && !matches!(value, Value::String(_) | Value::Null) {
                        return Err(invalid(format!("scenes[{scene_index}].materials[{material_index}].{key} is not a string")));
                    }
                }
            }
        }
        Ok(())
    }

    fn materials(&self) -> impl Iterator<Item = &serde_json::Map<String, Value>> {
        self.root
            .get("scenes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|scene| scene.get("materials").and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_object)
    }

    fn materials_mut(&mut self) -> impl Iterator<Item = &mut serde_json::Map<String, Value>> {
        self.root
            .get_mut("scenes")
            .and_then(Value::as_array_mut)
            .into_iter()
            .flatten()
            .filter_map(|scene| scene.get_mut("materials").and_then(Value::as_array_mut))
            .flatten()
            .filter_map(Value::as_object_mut)
    }
}

/// The texture identifier held by a material field, if it is a non-empty map field
fn map_field_value<'v>(key: &str, value: &'v Value) -> Option<&'v str> {
    if !key.ends_with(MAP_FIELD_SUFFIX) {
        return None;
    }
    value.as_str().filter(|identifier| !identifier.is_empty())
}

/// Path of the companion binary payload for a scene document
pub fn companion_binary_path(document: &Path) -> PathBuf {
    document.with_extension(SCENE_BINARY_EXTENSION)
}
