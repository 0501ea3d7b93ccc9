//! The model import pipeline.
//!
//! Parse -> map nodes -> build materials -> build meshes -> assemble entities.
//! The pass is linear. A failure aborts the import and leaves any sub-assets
//! already written in place.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use catalyst_assets::{AssetDatabase, Handle, material::MaterialData, mesh::MeshData};
use flecs_ecs::prelude::*;
use log::{error, info};

use crate::{
    error::ImportError,
    parser::{GltfParser, ObjParser, SceneParser},
    postprocess,
    scene::{Material, Scene},
    settings::ModelImportSettings,
};

mod materials;
mod meshes;
mod nodes;
mod writer;

pub use materials::{FALLBACK_MATERIAL_NAME, build_materials, convert_material, material_name};
pub use meshes::{BuiltMeshes, build_meshes, convert_mesh, rejection_reason};
pub use nodes::{NodeMap, assemble, map_nodes};
pub use writer::{SubAssetWriter, sanitize_file_name};

/// Told about every finished import, successful or not.
pub trait ImportNotifier {
    fn imported(&self, source: &Path, model: &ImportedModel);
    fn failed(&self, source: &Path, error: &ImportError);
}

/// Reports imports through the log.
pub struct LogNotifier;

impl ImportNotifier for LogNotifier {
    fn imported(&self, source: &Path, model: &ImportedModel) {
        info!(
            "Imported {}: {} meshes ({} skipped), {} materials",
            source.display(),
            model.meshes.iter().flatten().count(),
            model.skipped_meshes.len(),
            model.materials.len()
        );
    }

    fn failed(&self, source: &Path, error: &ImportError) {
        error!("Import of {} failed: {}", source.display(), error);
    }
}

/// Everything one import produced.
pub struct ImportedModel {
    /// World holding the spawned entities. Owns the whole hierarchy.
    pub world: World,
    pub root: Entity,
    /// One entry per parsed mesh, `None` where the mesh was skipped.
    pub meshes: Vec<Option<Handle<MeshData>>>,
    pub materials: Vec<Handle<MaterialData>>,
    pub skipped_meshes: Vec<String>,
    /// The `<stem>_Data` directory the sub-assets were written to.
    pub data_dir: PathBuf,
}

impl ImportedModel {
    pub fn root_entity(&self) -> EntityView<'_> {
        self.world.entity_from_id(self.root)
    }
}

impl fmt::Debug for ImportedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportedModel")
            .field("root", &self.root)
            .field("meshes", &self.meshes)
            .field("materials", &self.materials)
            .field("skipped_meshes", &self.skipped_meshes)
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

pub struct ModelImporter {
    parsers: Vec<Box<dyn SceneParser>>,
    notifier: Box<dyn ImportNotifier>,
}

impl Default for ModelImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelImporter {
    /// Importer for glTF and OBJ that reports through the log.
    pub fn new() -> Self {
        Self::empty().with_parser(GltfParser).with_parser(ObjParser)
    }

    /// Importer without any parser. Every file is unsupported until one is added.
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
            notifier: Box::new(LogNotifier),
        }
    }

    pub fn with_parser(mut self, parser: impl SceneParser + 'static) -> Self {
        self.parsers.push(Box::new(parser));
        self
    }

    pub fn with_notifier(mut self, notifier: impl ImportNotifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn supported_extensions(&self) -> Vec<&str> {
        self.parsers
            .iter()
            .flat_map(|p| p.extensions().iter().copied())
            .collect()
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.parser_for(path).is_ok()
    }

    fn parser_for(&self, path: &Path) -> Result<&dyn SceneParser, ImportError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.parsers
            .iter()
            .find(|p| p.handles(extension))
            .map(|p| p.as_ref())
            .ok_or_else(|| ImportError::UnsupportedFormat(path.display().to_string()))
    }

    /// Parses and post-processes `path`. Fails on files without meshes and on
    /// faces pointing past their mesh's vertices.
    pub fn load_scene(
        &self,
        path: &Path,
        settings: &ModelImportSettings,
    ) -> Result<Scene, ImportError> {
        let parser = self.parser_for(path)?;
        let mut scene = parser.parse(path)?;
        if scene.meshes.is_empty() {
            return Err(ImportError::NoMeshes);
        }
        check_face_indices(&scene, path)?;
        postprocess::apply(&mut scene, settings.post_process_steps());
        Ok(scene)
    }

    /// Imports the model at `path` (absolute, or relative to the database root).
    pub fn import(
        &self,
        db: &mut dyn AssetDatabase,
        path: &Path,
        settings: &ModelImportSettings,
    ) -> Result<ImportedModel, ImportError> {
        match self.run(db, path, settings) {
            Ok(model) => {
                self.notifier.imported(path, &model);
                Ok(model)
            }
            Err(e) => {
                self.notifier.failed(path, &e);
                Err(e)
            }
        }
    }

    fn run(
        &self,
        db: &mut dyn AssetDatabase,
        path: &Path,
        settings: &ModelImportSettings,
    ) -> Result<ImportedModel, ImportError> {
        // --- STEP 1: PARSE ---
        self.parser_for(path)?;
        let source = resolve_source(db, path)?;
        let mut scene = self.load_scene(&source, settings)?;
        add_fallback_material(&mut scene);

        // --- STEP 2: NODES ---
        let world = World::new();
        let nodes = map_nodes(&world, &scene.root);

        let data_dir = data_dir_for(&source);
        fs::create_dir_all(&data_dir).map_err(|source| ImportError::Io {
            path: data_dir.clone(),
            source,
        })?;
        let source_dir = source.parent().unwrap_or(db.root()).to_path_buf();
        let mut writer = SubAssetWriter::new(db, data_dir.clone(), settings.reimport_policy);

        // --- STEP 3: MATERIALS ---
        let materials = build_materials(&mut writer, &scene.materials, &source_dir)?;

        // --- STEP 4: MESHES ---
        let built = build_meshes(
            &mut writer,
            &scene.meshes,
            &nodes,
            &source,
            settings.bone_weight_mode,
        )?;

        // --- STEP 5: ENTITIES ---
        let root = assemble(
            &world,
            &scene.root,
            &nodes,
            &scene.meshes,
            &built.handles,
            &materials,
            settings.effective_unit_scale(),
        )
        .ok_or_else(|| ImportError::parse(&source, "model has no nodes"))?;

        Ok(ImportedModel {
            world,
            root,
            meshes: built.handles,
            materials,
            skipped_meshes: built.skipped,
            data_dir,
        })
    }
}

fn resolve_source(db: &dyn AssetDatabase, path: &Path) -> Result<PathBuf, ImportError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        db.root().join(path)
    };
    fs::canonicalize(&joined).map_err(|source| ImportError::Io {
        path: joined,
        source,
    })
}

/// `Models/crate.gltf` -> `Models/crate_Data`.
pub fn data_dir_for(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{stem}_Data"))
}

fn check_face_indices(scene: &Scene, path: &Path) -> Result<(), ImportError> {
    for mesh in &scene.meshes {
        let vertex_count = mesh.vertex_count();
        if let Some(&index) = mesh.faces.iter().flatten().find(|&&i| i as usize >= vertex_count) {
            return Err(ImportError::parse(
                path,
                format!(
                    "mesh '{}' references vertex {} but has only {}",
                    mesh.name, index, vertex_count
                ),
            ));
        }
    }
    Ok(())
}

/// Points meshes with an out-of-range material index at one shared fallback material.
fn add_fallback_material(scene: &mut Scene) {
    let count = scene.materials.len();
    if scene.meshes.iter().all(|m| m.material_index < count) {
        return;
    }
    scene.materials.push(Material::default());
    for mesh in scene.meshes.iter_mut().filter(|m| m.material_index >= count) {
        mesh.material_index = count;
    }
}
