//! Texture lookup against an ordered list of search roots

use crate::error::{IoResultExt, PipelineError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Ordered texture search roots
///
/// Roots are tried strictly in order and the first root containing the
/// identifier as a regular file wins. The recipe directory is always first.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRoots {
    roots: Vec<PathBuf>,
}

/// A texture identifier resolved to a file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTexture {
    /// Canonical path of the file
    pub path: PathBuf,
    /// Index of the search root that matched
    pub root_index: usize,
    /// The identifier as a relative path (separators normalized)
    pub relative: PathBuf,
}

impl SearchRoots {
    /// Builds the root list: `base_dir` first, then `extra` in order
    ///
    /// Relative extra roots are interpreted against `base_dir`. Repeated roots
    /// are kept only at their first position.
    pub fn new(base_dir: &Path, extra: impl IntoIterator<Item = impl AsRef<Path>>) -> Self {
        let mut roots = vec![base_dir.to_path_buf()];
        for root in extra {
            let root = base_dir.join(root.as_ref());
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        Self { roots }
    }

    /// All roots in lookup order
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolves `identifier` to the first matching file
    ///
    /// # Returns
    /// The canonical file path, or [`PipelineError::NotFound`] when no root
    /// contains the identifier.
    pub fn resolve(&self, identifier: &str) -> Result<ResolvedTexture> {
        let relative = identifier_to_path(identifier);
        if relative.as_os_str().is_empty() {
            return Err(self.not_found(identifier));
        }

        for (root_index, root) in self.roots.iter().enumerate() {
            let candidate = root.join(&relative);
            if candidate.is_file() {
                let path = candidate.canonicalize().at_path(&candidate)?;
                tracing::trace!(identifier, path = %path.display(), "resolved texture");
                return Ok(ResolvedTexture { path, root_index, relative });
            }
        }

        Err(self.not_found(identifier))
    }

    fn not_found(&self, identifier: &str) -> PipelineError {
        PipelineError::NotFound {
            identifier: identifier.to_string(),
            searched: self.roots.clone(),
        }
    }
}

/// Splits an identifier on both `/` and `\` so Windows-authored scenes resolve
fn identifier_to_path(identifier: &str) -> PathBuf {
    identifier.split(['/', '\\']).filter(|part| !part.is_empty() && *part != ".").collect()
}
