//! Validated recipe with defaults applied
//!
//! A [`Recipe`] is built once from a [`RecipeSpec`] and never mutated. All
//! optional fields receive their named defaults here, so later stages never
//! have to decide what a missing value means.

use super::{ChannelLayout, ColorSpace, RecipeSpec, SceneCompression};
use crate::error::{IoResultExt, PipelineError, Result};
use crate::resolve::SearchRoots;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Archive output is off unless a recipe asks for it
pub const DEFAULT_ARCHIVE_ENABLED: bool = false;
/// Bundler compression level when the recipe gives none
pub const DEFAULT_ARCHIVE_COMPRESSION_LEVEL: u32 = 9;
/// Highest compression level the bundler accepts
pub const MAX_ARCHIVE_COMPRESSION_LEVEL: u32 = 11;
/// Extension of the bundle archive when the recipe names none
pub const DEFAULT_ARCHIVE_EXTENSION: &str = "dun";
/// Valid zstd supercompression levels for the codec
pub const CODEC_ZSTD_LEVELS: std::ops::RangeInclusive<u32> = 1..=22;
/// Output root relative to the recipe directory
pub const DEFAULT_OUTPUT_DIR: &str = "build";

/// Conversion parameters shared by a group of source textures
#[derive(Debug, Clone, Serialize)]
pub struct ConversionDirective {
    /// Position of the directive in the recipe
    pub index: usize,
    pub channels: ChannelLayout,
    pub color_space: ColorSpace,
    /// Logical source identifiers, never empty
    pub files: Vec<String>,
}

impl ConversionDirective {
    /// Human-readable label used in error messages
    pub fn describe(&self) -> String {
        format!("conversions[{}] ({}_{})", self.index, self.channels.format_prefix(), self.color_space.format_suffix())
    }
}

/// Archive output settings with defaults applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSettings {
    pub enabled: bool,
    /// Archive file name inside the final directory
    pub name: String,
    pub compression_level: u32,
}

/// Recipe-level codec settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CodecSettings {
    /// Zstandard supercompression level, if any
    pub zstd_level: Option<u32>,
}

/// A fully validated recipe
#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    /// Recipe name (file stem), used to scope per-recipe output directories
    pub name: String,
    /// Path of the recipe file itself
    pub path: PathBuf,
    /// Canonical directory containing the recipe
    pub base_dir: PathBuf,
    /// Scene document to process
    pub scene_path: PathBuf,
    pub search_roots: SearchRoots,
    pub conversions: Vec<ConversionDirective>,
    pub scene_compression: SceneCompression,
    pub archive: ArchiveSettings,
    pub codec: CodecSettings,
    /// Root of the cache, intermediate and final directories
    pub output_dir: PathBuf,
}

impl Recipe {
    /// Loads and validates a recipe file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML recipe
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).at_path(path)?;
        Self::from_yaml(&content, path)
    }

    /// Parses and validates recipe content that was read from `path`
    ///
    /// `path` locates the recipe directory, which anchors every relative path
    /// in the recipe.
    pub fn from_yaml(yaml_content: &str, path: &Path) -> Result<Self> {
        let spec = RecipeSpec::from_yaml(yaml_content).map_err(|source| PipelineError::RecipeParse { path: path.to_path_buf(), source })?;
        Self::from_spec(spec, path)
    }

    /// Validates a raw [`RecipeSpec`] and applies defaults
    pub fn from_spec(spec: RecipeSpec, path: &Path) -> Result<Self> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let base_dir = parent.canonicalize().at_path(parent)?;
        let name = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_else(|| "recipe".to_string());

        let missing = |field: &str| PipelineError::MissingRequiredConfig {
            recipe: path.to_path_buf(),
            field: field.to_string(),
        };
        let invalid = |field: &str, reason: String| PipelineError::InvalidConfig {
            recipe: path.to_path_buf(),
            field: field.to_string(),
            reason,
        };

        let scene = spec.scene.filter(|scene| !scene.trim().is_empty()).ok_or_else(|| missing("scene"))?;
        let scene_path = base_dir.join(&scene);

        let mut conversions = Vec::with_capacity(spec.conversions.len());
        for (index, conversion) in spec.conversions.into_iter().enumerate() {
            let channels = conversion.channels.ok_or_else(|| missing(&format!("conversions[{index}].channels")))?;
            if conversion.files.is_empty() {
                return Err(missing(&format!("conversions[{index}].files")));
            }
            if conversion.files.iter().any(|file| file.trim().is_empty()) {
                return Err(invalid(&format!("conversions[{index}].files"), "empty texture identifier".to_string()));
            }
            conversions.push(ConversionDirective {
                index,
                channels,
                color_space: conversion.color_space.unwrap_or_default(),
                files: conversion.files,
            });
        }

        let archive_spec = spec.archive.unwrap_or_default();
        let compression_level = archive_spec.compression_level.unwrap_or(DEFAULT_ARCHIVE_COMPRESSION_LEVEL);
        if compression_level > MAX_ARCHIVE_COMPRESSION_LEVEL {
            return Err(invalid(
                "archive.compression_level",
                format!("{compression_level} is above the maximum of {MAX_ARCHIVE_COMPRESSION_LEVEL}"),
            ));
        }
        let archive_name = match archive_spec.name {
            Some(name) if name.contains(['/', '\\']) || name.trim().is_empty() => {
                return Err(invalid("archive.name", format!("'{name}' must be a plain file name")));
            }
            Some(name) => name,
            None => default_archive_name(&scene_path),
        };
        let archive = ArchiveSettings {
            enabled: archive_spec.enabled.unwrap_or(DEFAULT_ARCHIVE_ENABLED),
            name: archive_name,
            compression_level,
        };

        let codec = CodecSettings {
            zstd_level: spec.ktx.and_then(|ktx| ktx.zstd_level),
        };
        if let Some(level) = codec.zstd_level {
            if !CODEC_ZSTD_LEVELS.contains(&level) {
                return Err(invalid("ktx.zstd_level", format!("{level} is outside {CODEC_ZSTD_LEVELS:?}")));
            }
        }

        let search_roots = SearchRoots::new(&base_dir, &spec.texture_search_roots);
        for root in &search_roots.roots()[1..] {
            if !root.is_dir() {
                tracing::warn!(recipe = %path.display(), root = %root.display(), "texture search root does not exist");
            }
        }

        let output_dir = base_dir.join(spec.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR));

        Ok(Self {
            name,
            path: path.to_path_buf(),
            base_dir,
            scene_path,
            search_roots,
            conversions,
            scene_compression: spec.scene_compression.unwrap_or_default(),
            archive,
            codec,
            output_dir,
        })
    }
}

fn default_archive_name(scene_path: &Path) -> String {
    let stem = scene_path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_else(|| "scene".to_string());
    format!("{stem}.{DEFAULT_ARCHIVE_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn load(yaml: &str) -> (TempDir, Result<Recipe>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("castle.yml");
        fs::write(&path, yaml).unwrap();
        let recipe = Recipe::from_file(&path);
        (dir, recipe)
    }

    #[test]
    fn test_defaults_are_applied() {
        let (dir, recipe) = load("scene: castle.json\n");
        let recipe = recipe.unwrap();
        let base = dir.path().canonicalize().unwrap();

        assert_eq!(recipe.name, "castle");
        assert_eq!(recipe.base_dir, base);
        assert_eq!(recipe.scene_path, base.join("castle.json"));
        assert_eq!(recipe.search_roots.roots(), &[base.clone()]);
        assert!(recipe.conversions.is_empty());
        assert_eq!(recipe.scene_compression, SceneCompression::Brotli);
        assert_eq!(
            recipe.archive,
            ArchiveSettings {
                enabled: DEFAULT_ARCHIVE_ENABLED,
                name: "castle.dun".to_string(),
                compression_level: DEFAULT_ARCHIVE_COMPRESSION_LEVEL,
            }
        );
        assert_eq!(recipe.codec, CodecSettings::default());
        assert_eq!(recipe.output_dir, base.join(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn test_full_recipe() {
        let yaml = r#"
scene: scenes/castle.json
texture_search_roots: [art, shared]
scene_compression: none
output_dir: out
archive:
  enabled: true
  name: castle_pack.dun
  compression_level: 11
ktx:
  zstd_level: 20
conversions:
  - channels: 4
    files: [banner.png]
  - channels: 1
    color_space: linear
    files: [rough.png, metal.png]
"#;
        let (dir, recipe) = load(yaml);
        let recipe = recipe.unwrap();
        let base = dir.path().canonicalize().unwrap();

        assert_eq!(recipe.search_roots.roots(), &[base.clone(), base.join("art"), base.join("shared")]);
        assert_eq!(recipe.scene_compression, SceneCompression::None);
        assert!(recipe.archive.enabled);
        assert_eq!(recipe.archive.name, "castle_pack.dun");
        assert_eq!(recipe.codec.zstd_level, Some(20));
        assert_eq!(recipe.output_dir, base.join("out"));

        assert_eq!(recipe.conversions.len(), 2);
        assert_eq!(recipe.conversions[0].color_space, ColorSpace::Srgb);
        assert_eq!(recipe.conversions[0].describe(), "conversions[0] (R8G8B8A8_SRGB)");
        assert_eq!(recipe.conversions[1].index, 1);
        assert_eq!(recipe.conversions[1].files, vec!["rough.png", "metal.png"]);
    }

    #[test]
    fn test_missing_scene() {
        let (_dir, recipe) = load("texture_search_roots: [art]\n");
        match recipe {
            Err(PipelineError::MissingRequiredConfig { field, .. }) => assert_eq!(field, "scene"),
            other => panic!("expected MissingRequiredConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_directive_fields() {
        let (_dir, recipe) = load("scene: a.json\nconversions:\n  - files: [a.png]\n");
        assert!(matches!(recipe, Err(PipelineError::MissingRequiredConfig { field, .. }) if field == "conversions[0].channels"));

        let (_dir, recipe) = load("scene: a.json\nconversions:\n  - channels: 3\n");
        assert!(matches!(recipe, Err(PipelineError::MissingRequiredConfig { field, .. }) if field == "conversions[0].files"));
    }

    #[test]
    fn test_out_of_range_values() {
        let (_dir, recipe) = load("scene: a.json\narchive:\n  compression_level: 12\n");
        assert!(matches!(recipe, Err(PipelineError::InvalidConfig { field, .. }) if field == "archive.compression_level"));

        let (_dir, recipe) = load("scene: a.json\nktx:\n  zstd_level: 0\n");
        assert!(matches!(recipe, Err(PipelineError::InvalidConfig { field, .. }) if field == "ktx.zstd_level"));

        let (_dir, recipe) = load("scene: a.json\narchive:\n  name: sub/pack.dun\n");
        assert!(matches!(recipe, Err(PipelineError::InvalidConfig { field, .. }) if field == "archive.name"));
    }

    #[test]
    fn test_yaml_errors_carry_the_path() {
        let (dir, recipe) = load("scene: [unterminated\n");
        match recipe {
            Err(PipelineError::RecipeParse { path, .. }) => assert_eq!(path, dir.path().join("castle.yml")),
            other => panic!("expected RecipeParse, got {other:?}"),
        }
    }
}
