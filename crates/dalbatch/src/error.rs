//! Error types shared by every pipeline stage
//!
//! All failures abort the current recipe. Each variant carries enough context
//! (identifier, directive, path or command line) to act on the message alone.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Errors that abort a recipe's pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A texture identifier could not be found under any search root
    #[error("texture '{identifier}' not found in any search root ({})", join_paths(.searched))]
    NotFound { identifier: String, searched: Vec<PathBuf> },

    /// Two conversion tasks resolve to the same source file
    #[error("'{}' is listed by both {first} and {second}", .path.display())]
    DuplicateSource { path: PathBuf, first: String, second: String },

    /// Two conversion tasks would write the same output file
    #[error("'{}' would be written by both {first} and {second}", .path.display())]
    DuplicateDestination { path: PathBuf, first: String, second: String },

    /// Two different files would be staged under the same final name
    #[error("final name '{name}' is claimed by both '{}' and '{}'", .first.display(), .second.display())]
    FinalNameCollision { name: String, first: PathBuf, second: PathBuf },

    /// An external tool exited with a non-zero status
    #[error("external tool failed ({status}): {command}")]
    ExternalToolFailure { command: String, status: String },

    /// An external tool could not be started at all
    #[error("failed to launch external tool: {command}")]
    ToolLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external tool reported success but its output file is missing
    #[error("external tool did not produce '{}': {command}", .path.display())]
    MissingToolOutput { command: String, path: PathBuf },

    /// A required recipe field is absent
    #[error("recipe '{}' is missing required field '{field}'", .recipe.display())]
    MissingRequiredConfig { recipe: PathBuf, field: String },

    /// A recipe field is present but holds an unusable value
    #[error("recipe '{}' has an invalid value for '{field}': {reason}", .recipe.display())]
    InvalidConfig { recipe: PathBuf, field: String, reason: String },

    /// The recipe file is not valid YAML for the recipe schema
    #[error("failed to parse recipe '{}'", .path.display())]
    RecipeParse {
        path: PathBuf,
        #[source]
        source: serde_norway::Error,
    },

    /// The scene document is not valid JSON
    #[error("failed to parse scene document '{}'", .path.display())]
    SceneParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The scene document is valid JSON but does not have the expected shape
    #[error("malformed scene document '{}': {reason}", .path.display())]
    InvalidScene { path: PathBuf, reason: String },

    /// A source image could not be decoded or re-encoded
    #[error("failed to re-encode image '{}'", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A source image decodes but has no matching channel layout
    #[error("unsupported image '{}': {reason}", .path.display())]
    UnsupportedImage { path: PathBuf, reason: String },

    /// Filesystem failure on a specific path
    #[error("I/O error on '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The conversion worker pool could not be created
    #[error("failed to start conversion workers")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl PipelineError {
    /// Short machine-friendly name of the error kind, used in batch summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::DuplicateSource { .. } | Self::DuplicateDestination { .. } => "DuplicateSource",
            Self::FinalNameCollision { .. } => "FinalNameCollision",
            Self::ExternalToolFailure { .. } | Self::ToolLaunch { .. } | Self::MissingToolOutput { .. } => "ExternalToolFailure",
            Self::MissingRequiredConfig { .. } => "MissingRequiredConfig",
            Self::InvalidConfig { .. } | Self::RecipeParse { .. } => "InvalidConfig",
            Self::SceneParse { .. } | Self::InvalidScene { .. } => "InvalidScene",
            Self::Image { .. } | Self::UnsupportedImage { .. } => "Image",
            Self::Io { .. } | Self::WorkerPool(_) => "Io",
        }
    }
}

/// Attaches the offending path to `std::io::Error` results
pub(crate) trait IoResultExt<T> {
    fn at_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at_path(self, path: &Path) -> Result<T> {
        self.map_err(|source| PipelineError::Io { path: path.to_path_buf(), source })
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| format!("'{}'", p.display())).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_every_root() {
        let err = PipelineError::NotFound {
            identifier: "wall.tga".to_string(),
            searched: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        };
        let message = err.to_string();
        assert!(message.contains("wall.tga"));
        assert!(message.contains("'/a', '/b'"));
        assert_eq!(err.kind(), "NotFound");
    }

    #[test]
    fn test_io_context_keeps_path() {
        let result: std::io::Result<()> = Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = result.at_path(Path::new("/tmp/missing")).unwrap_err();
        assert!(matches!(&err, PipelineError::Io { path, .. } if path == Path::new("/tmp/missing")));
        assert_eq!(err.kind(), "Io");
    }
}
