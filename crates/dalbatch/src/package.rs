//! Scene compilation and final output promotion
//!
//! The rewritten scene is written to staging and compiled there. Only after
//! every external step succeeds is the final directory rebuilt, either with
//! one bundle archive or with the compiled scene and its textures as loose
//! files. Staging is left as it is.

use crate::error::{IoResultExt, PipelineError, Result};
use crate::layout::OutputLayout;
use crate::recipe::{ArchiveSettings, SceneCompression};
use crate::rewrite::TextureReferenceTable;
use crate::scene::{SceneDocument, companion_binary_path};
use crate::tools::{ToolPaths, ToolRunner, compiled_scene_path, glob_literal};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Scene files placed in staging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedScene {
    /// Rewritten scene document
    pub document: PathBuf,
    /// Companion binary payload, when the source scene has one
    pub binary: Option<PathBuf>,
}

/// Writes the rewritten scene (and its binary payload) into staging
///
/// `source_path` is the original scene location; its file name is kept.
pub fn stage_scene(scene: &SceneDocument, source_path: &Path, staging_dir: &Path) -> Result<StagedScene> {
    let file_name = source_path.file_name().ok_or_else(|| PipelineError::InvalidScene {
        path: source_path.to_path_buf(),
        reason: "scene path has no file name".to_string(),
    })?;
    let document = staging_dir.join(file_name);
    scene.write_to(&document)?;

    let source_binary = companion_binary_path(source_path);
    let binary = if source_binary.is_file() {
        let staged = companion_binary_path(&document);
        fs::copy(&source_binary, &staged).at_path(&source_binary)?;
        Some(staged)
    } else {
        None
    };

    Ok(StagedScene { document, binary })
}

/// Checks that nothing written to staging lands on another staged file
///
/// Staging holds the scene document, its binary payload, the compiled scene,
/// every texture under its final name and, in archive mode, the archive. Each
/// of those names must belong to exactly one file.
///
/// # Returns
/// [`PipelineError::FinalNameCollision`] naming both claimants of the first
/// shared name
pub fn check_staged_names(table: &TextureReferenceTable, scene_path: &Path, archive: &ArchiveSettings) -> Result<()> {
    let mut claimed = BTreeMap::new();

    claim(&mut claimed, scene_path)?;
    claim(&mut claimed, &compiled_scene_path(scene_path))?;
    let binary = companion_binary_path(scene_path);
    if binary.is_file() {
        claim(&mut claimed, &binary)?;
    }
    for entry in table.entries().values() {
        claim_as(&mut claimed, &entry.final_name, &entry.file)?;
    }
    if archive.enabled {
        claim_as(&mut claimed, &archive.name, Path::new(&archive.name))?;
    }
    Ok(())
}

fn claim(claimed: &mut BTreeMap<String, PathBuf>, owner: &Path) -> Result<()> {
    match owner.file_name() {
        Some(name) => claim_as(claimed, &name.to_string_lossy(), owner),
        None => Ok(()),
    }
}

fn claim_as(claimed: &mut BTreeMap<String, PathBuf>, name: &str, owner: &Path) -> Result<()> {
    match claimed.get(name) {
        Some(existing) if existing != owner => Err(PipelineError::FinalNameCollision {
            name: name.to_string(),
            first: existing.clone(),
            second: owner.to_path_buf(),
        }),
        Some(_) => Ok(()),
        None => {
            claimed.insert(name.to_string(), owner.to_path_buf());
            Ok(())
        }
    }
}

/// Packages staged outputs into the final directory
pub struct Packager<'a> {
    tools: &'a ToolPaths,
    runner: &'a dyn ToolRunner,
    layout: &'a OutputLayout,
}

impl<'a> Packager<'a> {
    pub fn new(tools: &'a ToolPaths, runner: &'a dyn ToolRunner, layout: &'a OutputLayout) -> Self {
        Self { tools, runner, layout }
    }

    /// Runs the scene compiler on the staged document
    ///
    /// # Returns
    /// Path of the compiled document inside staging
    pub fn compile(&self, staged: &StagedScene, compression: SceneCompression) -> Result<PathBuf> {
        let command = self.tools.scene_compiler(&staged.document, compression);
        self.runner.run(&command)?;

        let compiled = compiled_scene_path(&staged.document);
        if !compiled.is_file() {
            return Err(PipelineError::MissingToolOutput {
                command: command.to_string(),
                path: compiled,
            });
        }
        tracing::info!(compiled = %compiled.display(), "compiled scene");
        Ok(compiled)
    }

    /// Promotes the compiled scene and staged textures into the final directory
    ///
    /// Staged names are expected to have passed [`check_staged_names`].
    ///
    /// # Returns
    /// Paths of the files now in the final directory
    pub fn promote(&self, compiled: &Path, table: &TextureReferenceTable, archive: &ArchiveSettings) -> Result<Vec<PathBuf>> {
        let staging = self.layout.intermediate_dir();
        let mut inputs = vec![compiled.to_path_buf()];
        inputs.extend(table.final_names().into_iter().map(|name| staging.join(name)));

        if archive.enabled {
            let archive_path = staging.join(&archive.name);
            let patterns: Vec<String> = inputs.iter().map(|input| glob_literal(input)).collect();
            let command = self.tools.bundler(&archive_path, archive.compression_level, &patterns);
            self.runner.run(&command)?;
            if !archive_path.is_file() {
                return Err(PipelineError::MissingToolOutput {
                    command: command.to_string(),
                    path: archive_path,
                });
            }
            tracing::info!(archive = %archive_path.display(), files = inputs.len(), "bundled archive");

            self.layout.reset_final()?;
            Ok(vec![move_into(&archive_path, self.layout.final_dir())?])
        } else {
            self.layout.reset_final()?;
            inputs.iter().map(|input| move_into(input, self.layout.final_dir())).collect()
        }
    }
}

/// Moves `file` into `dir`, keeping its name
fn move_into(file: &Path, dir: &Path) -> Result<PathBuf> {
    let name = file.file_name().ok_or_else(|| PipelineError::Io {
        path: file.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
    })?;
    let target = dir.join(name);
    if fs::rename(file, &target).is_err() {
        // Cross-device moves fall back to copy and delete
        fs::copy(file, &target).at_path(file)?;
        fs::remove_file(file).at_path(file)?;
    }
    tracing::debug!(file = %target.display(), "promoted to final output");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ConversionPlan;
    use crate::recipe::Recipe;
    use crate::tools::{ToolCommand, ToolKind};
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Emulates `daltools compile` and `daltools bundle`
    #[derive(Default)]
    struct FakeDaltools {
        fail_compile: bool,
        calls: Mutex<Vec<ToolCommand>>,
    }

    impl ToolRunner for FakeDaltools {
        fn run(&self, command: &ToolCommand) -> Result<()> {
            self.calls.lock().unwrap().push(command.clone());
            let args = command.args_lossy();
            match command.kind {
                ToolKind::SceneCompiler if self.fail_compile => Err(PipelineError::ExternalToolFailure {
                    command: command.to_string(),
                    status: "exit status: 2".to_string(),
                }),
                ToolKind::SceneCompiler => {
                    fs::write(compiled_scene_path(Path::new(args.last().unwrap())), b"DMD").unwrap();
                    Ok(())
                }
                ToolKind::Bundler => {
                    fs::write(&args[4], args[5..].join("\n")).unwrap();
                    Ok(())
                }
                ToolKind::Codec => unreachable!("packaging never runs the codec"),
            }
        }
    }

    struct Fixture {
        _dir: TempDir,
        recipe: Recipe,
        layout: OutputLayout,
        table: TextureReferenceTable,
        scene: SceneDocument,
    }

    fn fixture(recipe_yaml: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("art")).unwrap();
        fs::write(base.join("art/wall.png"), b"wall").unwrap();
        fs::write(base.join("art/floor.png"), b"floor").unwrap();
        fs::write(base.join("castle.bin"), b"vertices").unwrap();
        let scene_json = r#"{"scenes": [{"materials": [{"albedo map": "wall.png", "normal map": "floor.png"}]}]}"#;
        fs::write(base.join("castle.json"), scene_json).unwrap();
        fs::write(base.join("castle.yml"), recipe_yaml).unwrap();

        let recipe = Recipe::from_file(base.join("castle.yml")).unwrap();
        let layout = OutputLayout::new(&recipe.output_dir, &recipe.name);
        let scene = SceneDocument::from_file(&recipe.scene_path).unwrap();
        let table = TextureReferenceTable::build(&scene.texture_references(), &recipe.search_roots, &ConversionPlan::default()).unwrap();
        layout.reset_intermediate().unwrap();
        table.stage(layout.intermediate_dir()).unwrap();
        Fixture {
            _dir: dir,
            recipe,
            layout,
            table,
            scene,
        }
    }

    /// Like [`fixture`], but the scene also references `art/<name>`
    fn fixture_with_texture(name: &str) -> Fixture {
        let fx = fixture("scene: castle.json\ntexture_search_roots: [art]\n");
        let base = fx.recipe.base_dir.clone();
        fs::write(base.join("art").join(name), b"texture").unwrap();
        let scene_json = format!(r#"{{"scenes": [{{"materials": [{{"albedo map": "wall.png", "extra map": "{name}"}}]}}]}}"#);
        let scene = SceneDocument::from_json(&scene_json, &fx.recipe.scene_path).unwrap();
        let table = TextureReferenceTable::build(&scene.texture_references(), &fx.recipe.search_roots, &ConversionPlan::default()).unwrap();
        Fixture { table, scene, ..fx }
    }

    fn final_names(layout: &OutputLayout) -> BTreeSet<String> {
        fs::read_dir(layout.final_dir()).unwrap().map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_stage_scene_copies_binary_payload() {
        let fx = fixture("scene: castle.json\ntexture_search_roots: [art]\n");
        let staged = stage_scene(&fx.scene, &fx.recipe.scene_path, fx.layout.intermediate_dir()).unwrap();
        assert_eq!(staged.document, fx.layout.intermediate_dir().join("castle.json"));
        assert_eq!(fs::read(staged.binary.unwrap()).unwrap(), b"vertices");
    }

    #[test]
    fn test_loose_mode_moves_compiled_scene_and_textures() {
        let fx = fixture("scene: castle.json\ntexture_search_roots: [art]\n");
        let tools = ToolPaths::default();
        let runner = FakeDaltools::default();
        let packager = Packager::new(&tools, &runner, &fx.layout);

        let staged = stage_scene(&fx.scene, &fx.recipe.scene_path, fx.layout.intermediate_dir()).unwrap();
        let compiled = packager.compile(&staged, fx.recipe.scene_compression).unwrap();
        let promoted = packager.promote(&compiled, &fx.table, &fx.recipe.archive).unwrap();

        assert_eq!(promoted.len(), 3);
        let expected: BTreeSet<String> = ["castle.dmd", "floor.png", "wall.png"].iter().map(|s| s.to_string()).collect();
        assert_eq!(final_names(&fx.layout), expected);
        assert!(fx.layout.intermediate_dir().join("castle.json").exists());
    }

    #[test]
    fn test_archive_mode_bundles_same_files() {
        let fx = fixture("scene: castle.json\ntexture_search_roots: [art]\narchive:\n  enabled: true\n  compression_level: 4\n");
        let tools = ToolPaths::default();
        let runner = FakeDaltools::default();
        let packager = Packager::new(&tools, &runner, &fx.layout);

        let staged = stage_scene(&fx.scene, &fx.recipe.scene_path, fx.layout.intermediate_dir()).unwrap();
        let compiled = packager.compile(&staged, fx.recipe.scene_compression).unwrap();
        let promoted = packager.promote(&compiled, &fx.table, &fx.recipe.archive).unwrap();

        assert_eq!(promoted, vec![fx.layout.final_dir().join("castle.dun")]);
        let bundled: BTreeSet<String> = fs::read_to_string(&promoted[0])
            .unwrap()
            .lines()
            .map(|line| Path::new(line).file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let expected: BTreeSet<String> = ["castle.dmd", "floor.png", "wall.png"].iter().map(|s| s.to_string()).collect();
        assert_eq!(bundled, expected);

        let calls = runner.calls.lock().unwrap();
        assert_eq!(&calls[1].args_lossy()[..3], ["bundle", "--level", "4"]);
    }

    #[test]
    fn test_staged_names_accept_distinct_files() {
        let fx = fixture("scene: castle.json\ntexture_search_roots: [art]\narchive:\n  enabled: true\n");
        check_staged_names(&fx.table, &fx.recipe.scene_path, &fx.recipe.archive).unwrap();
    }

    fn collision(fx: &Fixture, archive: &ArchiveSettings) -> String {
        match check_staged_names(&fx.table, &fx.recipe.scene_path, archive) {
            Err(PipelineError::FinalNameCollision { name, .. }) => name,
            other => panic!("expected FinalNameCollision, got {other:?}"),
        }
    }

    #[test]
    fn test_texture_named_like_scene_files_collides() {
        for name in ["castle.json", "castle.bin", "castle.dmd"] {
            let fx = fixture_with_texture(name);
            assert_eq!(collision(&fx, &fx.recipe.archive), name);
        }
    }

    #[test]
    fn test_archive_cannot_overwrite_a_bundle_input() {
        let fx = fixture("scene: castle.json\ntexture_search_roots: [art]\n");
        for name in ["castle.dmd", "wall.png"] {
            let archive = ArchiveSettings {
                enabled: true,
                name: name.to_string(),
                compression_level: 9,
            };
            assert_eq!(collision(&fx, &archive), name);
        }

        let disabled = ArchiveSettings {
            enabled: false,
            name: "wall.png".to_string(),
            compression_level: 9,
        };
        check_staged_names(&fx.table, &fx.recipe.scene_path, &disabled).unwrap();
    }

    #[test]
    fn test_compile_failure_leaves_final_untouched() {
        let fx = fixture("scene: castle.json\ntexture_search_roots: [art]\n");
        fx.layout.reset_final().unwrap();
        fs::write(fx.layout.final_dir().join("previous.dmd"), b"old").unwrap();

        let tools = ToolPaths::default();
        let runner = FakeDaltools {
            fail_compile: true,
            ..Default::default()
        };
        let packager = Packager::new(&tools, &runner, &fx.layout);
        let staged = stage_scene(&fx.scene, &fx.recipe.scene_path, fx.layout.intermediate_dir()).unwrap();

        assert!(matches!(packager.compile(&staged, SceneCompression::Brotli), Err(PipelineError::ExternalToolFailure { .. })));
        assert!(fx.layout.final_dir().join("previous.dmd").exists());
    }
}
