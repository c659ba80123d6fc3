//! Recipe-less conversion of loose image files
//!
//! Each image becomes a `.ktx` beside itself. The channel layout comes from the
//! decoded image rather than a directive.

use crate::error::{IoResultExt, PipelineError, Result};
use crate::plan::ConversionTask;
use crate::recipe::{ChannelLayout, ColorSpace};
use crate::tools::TEXTURE_CONTAINER_EXTENSION;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// An input file and its path relative to the argument it was found under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandaloneSource {
    pub path: PathBuf,
    pub relative: PathBuf,
}

/// Expands command line paths into input files
///
/// Without `directory` every path must be a file. With it every path must be a
/// directory, whose files are listed (descending into subdirectories only when
/// `recursive` is set). Results are sorted per directory.
pub fn collect_sources(paths: &[PathBuf], directory: bool, recursive: bool) -> Result<Vec<StandaloneSource>> {
    let mut sources = Vec::new();
    for path in paths {
        if !directory {
            if !path.is_file() {
                return Err(not_a(path, std::io::ErrorKind::NotFound, "not a file"));
            }
            let relative = path.file_name().map(PathBuf::from).unwrap_or_else(|| path.clone());
            sources.push(StandaloneSource { path: path.clone(), relative });
            continue;
        }

        if !path.is_dir() {
            return Err(not_a(path, std::io::ErrorKind::NotADirectory, "not a directory"));
        }
        let walker = WalkDir::new(path).min_depth(1).max_depth(if recursive { usize::MAX } else { 1 }).sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|err| {
                let at = err.path().unwrap_or(path.as_path()).to_path_buf();
                PipelineError::Io {
                    path: at,
                    source: err.into(),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(path).map(Path::to_path_buf).unwrap_or_else(|_| entry.path().to_path_buf());
            sources.push(StandaloneSource {
                path: entry.into_path(),
                relative,
            });
        }
    }
    Ok(sources)
}

fn not_a(path: &Path, kind: std::io::ErrorKind, what: &str) -> PipelineError {
    PipelineError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(kind, what),
    }
}

/// Decodes `path` and maps its channel count onto a layout
pub fn detect_channel_layout(path: &Path) -> Result<ChannelLayout> {
    let image = image::open(path).map_err(|source| PipelineError::Image { path: path.to_path_buf(), source })?;
    let channels = u32::from(image.color().channel_count());
    ChannelLayout::try_from(channels).map_err(|err| PipelineError::UnsupportedImage {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Builds the task converting `source` into a container beside it
///
/// # Arguments
/// * `source` - Input file
/// * `color_space` - Transfer function for the container
/// * `png_dir` - Root for PNG intermediates, mirrored by `source.relative`
pub fn standalone_task(source: &StandaloneSource, color_space: ColorSpace, png_dir: &Path) -> Result<ConversionTask> {
    let channels = detect_channel_layout(&source.path)?;
    let path = source.path.canonicalize().at_path(&source.path)?;
    Ok(ConversionTask {
        identifier: source.relative.to_string_lossy().into_owned(),
        directive: format!("{channels} {}", color_space.transfer_function()),
        destination: path.with_extension(TEXTURE_CONTAINER_EXTENSION),
        intermediate: png_dir.join(&source.relative).with_extension("png"),
        source: path,
        channels,
        color_space,
    })
}
