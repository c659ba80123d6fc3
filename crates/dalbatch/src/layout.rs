//! Output directory layout for a recipe run
//!
//! ```text
//! <output_dir>/
//!   ktx/                      converted-texture cache, kept across runs
//!   png/                      re-encoded codec inputs
//!   intermediate/<recipe>/    staging, wiped before rewriting
//!   final/<recipe>/           deliverable, wiped only after packaging succeeds
//! ```
//!
//! Staging and final directories are scoped by recipe name so recipes sharing
//! an output root never clobber each other's results.

use crate::error::{IoResultExt, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory names under the output root
const CACHE_DIR: &str = "ktx";
const PNG_DIR: &str = "png";
const INTERMEDIATE_DIR: &str = "intermediate";
const FINAL_DIR: &str = "final";

/// Cache, intermediate and final directories for one recipe
#[derive(Debug, Clone, Serialize)]
pub struct OutputLayout {
    cache: PathBuf,
    png: PathBuf,
    intermediate: PathBuf,
    final_dir: PathBuf,
}

impl OutputLayout {
    /// Lays out directories under `output_root` for recipe `recipe_name`
    ///
    /// Nothing is created on disk until a stage asks for it.
    pub fn new(output_root: &Path, recipe_name: &str) -> Self {
        Self {
            cache: output_root.join(CACHE_DIR),
            png: output_root.join(PNG_DIR),
            intermediate: output_root.join(INTERMEDIATE_DIR).join(recipe_name),
            final_dir: output_root.join(FINAL_DIR).join(recipe_name),
        }
    }

    /// Persistent converted-texture cache
    pub fn cache_dir(&self) -> &Path {
        &self.cache
    }

    /// Root of re-encoded codec inputs
    pub fn png_dir(&self) -> &Path {
        &self.png
    }

    /// Staging directory for the rewritten scene and its textures
    pub fn intermediate_dir(&self) -> &Path {
        &self.intermediate
    }

    /// Deliverable directory
    pub fn final_dir(&self) -> &Path {
        &self.final_dir
    }

    /// Empties (or creates) the staging directory
    pub fn reset_intermediate(&self) -> Result<()> {
        recreate_dir(&self.intermediate)
    }

    /// Empties (or creates) the final directory
    pub fn reset_final(&self) -> Result<()> {
        recreate_dir(&self.final_dir)
    }
}

fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).at_path(dir)?;
    }
    fs::create_dir_all(dir).at_path(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directories_are_scoped_per_recipe() {
        let a = OutputLayout::new(Path::new("/out"), "castle");
        let b = OutputLayout::new(Path::new("/out"), "village");

        assert_eq!(a.cache_dir(), b.cache_dir());
        assert_eq!(a.cache_dir(), Path::new("/out/ktx"));
        assert_eq!(a.png_dir(), Path::new("/out/png"));
        assert_eq!(a.intermediate_dir(), Path::new("/out/intermediate/castle"));
        assert_ne!(a.final_dir(), b.final_dir());
    }

    #[test]
    fn test_reset_wipes_only_its_own_directory() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path(), "castle");
        let other = OutputLayout::new(dir.path(), "village");

        layout.reset_final().unwrap();
        other.reset_final().unwrap();
        fs::write(layout.final_dir().join("stale.dmd"), b"old").unwrap();
        fs::write(other.final_dir().join("keep.dmd"), b"keep").unwrap();
        fs::create_dir_all(layout.cache_dir()).unwrap();
        fs::write(layout.cache_dir().join("wall.ktx"), b"ktx").unwrap();

        layout.reset_final().unwrap();
        layout.reset_intermediate().unwrap();

        assert!(layout.final_dir().is_dir());
        assert!(!layout.final_dir().join("stale.dmd").exists());
        assert!(other.final_dir().join("keep.dmd").exists());
        assert!(layout.cache_dir().join("wall.ktx").exists());
        assert!(layout.intermediate_dir().is_dir());
    }
}
