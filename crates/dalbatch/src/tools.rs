//! External tool invocation
//!
//! The texture codec, scene compiler and bundler are separate programs. They
//! are always launched from argument vectors, never through a shell, and
//! every non-zero exit is reported as [`PipelineError::ExternalToolFailure`].
//!
//! Stages go through the [`ToolRunner`] trait so tests can stand in for the
//! real programs.

use crate::error::{PipelineError, Result};
use crate::recipe::{ChannelLayout, CodecSettings, ColorSpace, SceneCompression};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Extension of converted texture containers
pub const TEXTURE_CONTAINER_EXTENSION: &str = "ktx";
/// Extension of the scene compiler's output
pub const COMPILED_SCENE_EXTENSION: &str = "dmd";

/// Which external tool a command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Codec,
    SceneCompiler,
    Bundler,
}

/// A fully specified external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub kind: ToolKind,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    fn new(kind: ToolKind, program: &Path) -> Self {
        Self {
            kind,
            program: program.to_path_buf(),
            args: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Arguments as lossy UTF-8 strings, for logging and tests
    pub fn args_lossy(&self) -> Vec<String> {
        self.args.iter().map(|arg| arg.to_string_lossy().into_owned()).collect()
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in self.args_lossy() {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Locations of the external programs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// KTX-Software command line tool
    pub ktx: PathBuf,
    /// Scene compiler and bundler
    pub daltools: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ktx: PathBuf::from("ktx"),
            daltools: PathBuf::from("daltools"),
        }
    }
}

impl ToolPaths {
    /// Codec command converting `input` into a mipmapped container at `output`
    pub fn codec(&self, input: &Path, output: &Path, channels: ChannelLayout, color_space: ColorSpace, settings: &CodecSettings) -> ToolCommand {
        let transfer = color_space.transfer_function();
        let mut command = ToolCommand::new(ToolKind::Codec, &self.ktx)
            .arg("create")
            .arg("--generate-mipmap")
            .arg("--format")
            .arg(format!("{}_{}", channels.format_prefix(), color_space.format_suffix()))
            .arg("--assign-oetf")
            .arg(transfer)
            .arg("--convert-oetf")
            .arg(transfer);
        if let Some(level) = settings.zstd_level {
            command = command.arg("--zstd").arg(level.to_string());
        }
        command.arg(input).arg(output)
    }

    /// Scene compiler command; the output lands beside `document`
    pub fn scene_compiler(&self, document: &Path, compression: SceneCompression) -> ToolCommand {
        ToolCommand::new(ToolKind::SceneCompiler, &self.daltools)
            .arg("compile")
            .arg("--compression")
            .arg(compression.as_str())
            .arg(document)
    }

    /// Bundler command packing every file matching `patterns` into `output`
    pub fn bundler(&self, output: &Path, level: u32, patterns: &[String]) -> ToolCommand {
        let mut command = ToolCommand::new(ToolKind::Bundler, &self.daltools)
            .arg("bundle")
            .arg("--level")
            .arg(level.to_string())
            .arg("--output")
            .arg(output);
        for pattern in patterns {
            command = command.arg(pattern);
        }
        command
    }
}

/// Path of the file the scene compiler writes for `document`
pub fn compiled_scene_path(document: &Path) -> PathBuf {
    document.with_extension(COMPILED_SCENE_EXTENSION)
}

/// Escapes glob metacharacters so `path` matches only itself
pub fn glob_literal(path: &Path) -> String {
    let mut escaped = String::new();
    for c in path.to_string_lossy().chars() {
        match c {
            '*' | '?' | '[' | ']' => {
                escaped.push('[');
                escaped.push(c);
                escaped.push(']');
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Executes external tool commands
///
/// Implementations must be shareable across conversion workers.
pub trait ToolRunner: Sync {
    /// Runs `command` to completion
    ///
    /// # Returns
    /// `Ok(())` on a zero exit status, [`PipelineError::ExternalToolFailure`]
    /// otherwise.
    fn run(&self, command: &ToolCommand) -> Result<()>;
}

/// Runs commands as child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, command: &ToolCommand) -> Result<()> {
        tracing::debug!(%command, "running external tool");
        let status = Command::new(&command.program).args(&command.args).status().map_err(|source| PipelineError::ToolLaunch {
            command: command.to_string(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(PipelineError::ExternalToolFailure {
                command: command.to_string(),
                status: status.to_string(),
            })
        }
    }
}
