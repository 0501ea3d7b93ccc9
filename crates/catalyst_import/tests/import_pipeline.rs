use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use catalyst_assets::{
    AssetDatabase, AssetDocument, FileAssetDatabase,
    material::{BuiltinTexture, EMISSION_TEX, MAIN_COLOR, MAIN_TEX, MaterialData, NORMAL_TEX, SURFACE_TEX},
    mesh::MeshData,
};
use catalyst_import::{
    ImportError, ImportNotifier, ImportedModel, ModelImportSettings, ModelImporter, ReimportPolicy,
    SceneParser,
    scene::{Bone, Material, Mesh, Node, Scene, TextureSlot, VertexWeight},
};
use catalyst_scene::{children, has_renderer, mesh_renderer, node_name, skinned_mesh_renderer, transform};
use flecs_ecs::prelude::*;
use glam::{Mat4, Quat, Vec2, Vec3};
use tempfile::TempDir;

/// Hands out a fixed scene for `.fake` files.
struct FakeParser(Scene);

impl SceneParser for FakeParser {
    fn extensions(&self) -> &[&str] {
        &["fake"]
    }

    fn parse(&self, _path: &Path) -> Result<Scene, ImportError> {
        Ok(self.0.clone())
    }
}

struct Fixture {
    dir: TempDir,
    db: FileAssetDatabase,
    importer: ModelImporter,
}

const MODEL: &str = "Models/model.fake";

impl Fixture {
    fn new(scene: Scene) -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Models")).unwrap();
        fs::write(dir.path().join(MODEL), b"").unwrap();
        let db = FileAssetDatabase::open(dir.path()).unwrap();
        Self {
            dir,
            db,
            importer: ModelImporter::empty().with_parser(FakeParser(scene)),
        }
    }

    fn import(&mut self, settings: &ModelImportSettings) -> Result<ImportedModel, ImportError> {
        self.importer.import(&mut self.db, Path::new(MODEL), settings)
    }

    fn data_dir(&self) -> PathBuf {
        self.db.root().join("Models/model_Data")
    }

    fn material(&self, model: &ImportedModel, index: usize) -> MaterialData {
        let id = model.materials[index].id;
        self.db.load_document(id).unwrap().into_material().unwrap()
    }

    fn mesh(&self, model: &ImportedModel, index: usize) -> MeshData {
        let id = model.meshes[index].unwrap().id;
        self.db.load_document(id).unwrap().into_mesh().unwrap()
    }
}

/// Keeps the source data as-is so assertions can compare against it.
fn plain() -> ModelImportSettings {
    ModelImportSettings {
        make_left_handed: false,
        ..Default::default()
    }
}

fn triangle(name: &str) -> Mesh {
    Mesh {
        name: name.into(),
        positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        normals: vec![Vec3::Z; 3],
        tangents: vec![Vec3::X; 3],
        bitangents: vec![Vec3::Y; 3],
        tex_coords: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
        faces: vec![vec![0, 1, 2]],
        ..Default::default()
    }
}

fn quad(name: &str) -> Mesh {
    Mesh {
        name: name.into(),
        positions: vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
        normals: vec![Vec3::Z; 4],
        tangents: vec![Vec3::X; 4],
        bitangents: vec![Vec3::Y; 4],
        tex_coords: vec![Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y],
        faces: vec![vec![0, 1, 2], vec![0, 2, 3]],
        ..Default::default()
    }
}

fn weights(list: &[(u32, f32)]) -> Vec<VertexWeight> {
    list.iter()
        .map(|&(vertex_id, weight)| VertexWeight { vertex_id, weight })
        .collect()
}

fn renderer_children(entity: EntityView<'_>) -> Vec<EntityView<'_>> {
    children(entity).into_iter().filter(|&c| has_renderer(c)).collect()
}

#[test]
fn single_mesh_with_missing_albedo_uses_defaults() {
    let mut scene = Scene::new(Node::new("Root").with_meshes([0]));
    scene.meshes.push(triangle("Tri"));
    scene
        .materials
        .push(Material::default().with_texture(TextureSlot::Albedo, "albedo.png"));

    let mut fx = Fixture::new(scene);
    let model = fx.import(&plain()).unwrap();

    let root = model.root_entity();
    assert_eq!(node_name(root), "Root");
    let root_children = children(root);
    assert_eq!(root_children.len(), 1);
    let child = root_children[0];
    assert_eq!(node_name(child), "Tri");
    let renderer = mesh_renderer(child).unwrap();
    assert!(skinned_mesh_renderer(child).is_none());
    assert_eq!(renderer.material, model.materials[0]);

    let material = fx.material(&model, 0);
    assert_eq!(material.name, "albedo");
    assert_eq!(material.texture(MAIN_TEX), Some(BuiltinTexture::Grid.handle()));
    assert_eq!(material.texture(NORMAL_TEX), Some(BuiltinTexture::FlatNormal.handle()));
    assert_eq!(material.texture(SURFACE_TEX), Some(BuiltinTexture::FlatSurface.handle()));
    assert_eq!(material.texture(EMISSION_TEX), Some(BuiltinTexture::Black.handle()));
    assert_eq!(material.color(MAIN_COLOR), Some([1.0; 4]));

    assert!(fx.data_dir().join("albedo.mat").exists());
    assert!(fx.data_dir().join("Tri.mesh").exists());
    assert_eq!(model.data_dir, fx.data_dir());
}

#[test]
fn bone_weights_land_in_their_list_positions() {
    let mut mesh = quad("Body");
    mesh.bones = vec![
        Bone {
            name: "Hip".into(),
            weights: weights(&[(0, 0.5), (1, 0.5), (2, 0.5), (3, 0.5)]),
            offset_matrix: Mat4::IDENTITY,
        },
        Bone {
            name: "Knee".into(),
            weights: weights(&[(1, 0.5), (0, 0.5), (3, 0.5), (2, 0.5)]),
            offset_matrix: Mat4::IDENTITY,
        },
    ];
    let root = Node::new("Root")
        .with_meshes([0])
        .with_child(Node::new("Hip").with_child(Node::new("Knee")));
    let mut scene = Scene::new(root);
    scene.meshes.push(mesh);
    scene.materials.push(Material::named("Skin"));

    let mut fx = Fixture::new(scene);
    let model = fx.import(&plain()).unwrap();
    let data = fx.mesh(&model, 0);

    // Hip is node 1, Knee node 2. Entry k of each bone goes to slot k.
    assert_eq!(data.vertices[0].bone_indices, [1, 2, 0, 0]);
    assert_eq!(data.vertices[1].bone_indices, [2, 1, 0, 0]);
    assert_eq!(data.vertices[2].bone_indices, [0, 0, 1, 2]);
    assert_eq!(data.vertices[3].bone_indices, [0, 0, 2, 1]);
    assert_eq!(data.vertices[0].bone_weights, [0.5, 0.5, 0.0, 0.0]);
    assert_eq!(data.vertices[2].bone_weights, [0.0, 0.0, 0.5, 0.5]);
    for v in &data.vertices {
        assert!((v.total_weight() - 1.0).abs() < 1e-5);
    }

    let body = renderer_children(model.root_entity())[0];
    let skinned = skinned_mesh_renderer(body).unwrap();
    assert_eq!(skinned.root, model.root);
    let bone_names: Vec<String> = skinned
        .bones
        .iter()
        .map(|&b| node_name(model.world.entity_from_id(b)))
        .collect();
    assert_eq!(bone_names, ["Root", "Hip", "Knee"]);
}

#[test]
fn empty_mesh_lists_produce_no_renderers() {
    let root = Node::new("Root")
        .with_child(Node::new("A").with_meshes([0]))
        .with_child(Node::new("B"))
        .with_child(Node::new("C").with_meshes([1]));
    let mut scene = Scene::new(root);
    scene.meshes = vec![triangle("First"), triangle("Second")];
    scene.materials.push(Material::named("Shared"));

    let mut fx = Fixture::new(scene);
    let model = fx.import(&plain()).unwrap();

    let nodes = children(model.root_entity());
    assert_eq!(nodes.len(), 3);
    assert_eq!(node_name(nodes[0]), "A");
    assert_eq!(renderer_children(nodes[0]).len(), 1);
    assert!(children(nodes[1]).is_empty());
    assert_eq!(renderer_children(nodes[2]).len(), 1);

    let second = renderer_children(nodes[2])[0];
    assert_eq!(node_name(second), "Second");
}

#[test]
fn model_without_meshes_fails_and_writes_nothing() {
    let mut scene = Scene::new(Node::new("Root"));
    scene.materials.push(Material::named("Unused"));

    let mut fx = Fixture::new(scene);
    let err = fx.import(&plain()).unwrap_err();

    assert!(matches!(err, ImportError::NoMeshes));
    assert_eq!(err.to_string(), "Model has no Meshes.");
    assert!(!fx.data_dir().exists());
}

#[test]
fn face_past_the_vertex_list_fails_to_parse() {
    let mut mesh = triangle("Broken");
    mesh.normals.clear();
    mesh.faces = vec![vec![0, 1, 7]];
    let mut scene = Scene::new(Node::new("Root").with_meshes([0]));
    scene.meshes.push(mesh);

    let mut fx = Fixture::new(scene);
    let err = fx.import(&plain()).unwrap_err();

    assert!(matches!(err, ImportError::ParseFailed { .. }));
    assert!(!fx.data_dir().exists());
}

#[test]
fn invalid_meshes_are_skipped_and_the_rest_imported() {
    let mut lines = triangle("Wire");
    lines.faces = vec![vec![0, 1], vec![1, 2]];
    let mut bare = triangle("Bare");
    bare.tangents.clear();
    bare.bitangents.clear();
    bare.tex_coords.clear();

    let root = Node::new("Root").with_meshes([0, 1, 2]);
    let mut scene = Scene::new(root);
    scene.meshes = vec![lines, triangle("Good"), bare];
    scene.materials.push(Material::named("M"));

    let mut fx = Fixture::new(scene);
    let model = fx.import(&plain()).unwrap();

    assert_eq!(model.skipped_meshes, ["Wire", "Bare"]);
    assert!(model.meshes[0].is_none());
    assert!(model.meshes[1].is_some());
    assert!(model.meshes[2].is_none());
    assert!(!fx.data_dir().join("Wire.mesh").exists());
    assert!(!fx.data_dir().join("Bare.mesh").exists());

    let rendered = renderer_children(model.root_entity());
    assert_eq!(rendered.len(), 1);
    assert_eq!(node_name(rendered[0]), "Good");
}

#[test]
fn node_transforms_are_applied_and_root_scale_replaced() {
    let rotation = Quat::from_rotation_y(0.5);
    let child_matrix =
        Mat4::from_scale_rotation_translation(Vec3::splat(2.0), rotation, Vec3::new(1.0, 2.0, 3.0));
    let root = Node::new("Root")
        .with_transform(Mat4::from_scale(Vec3::splat(100.0)))
        .with_child(Node::new("Child").with_transform(child_matrix).with_meshes([0]));
    let mut scene = Scene::new(root);
    scene.meshes.push(triangle("Tri"));

    let mut fx = Fixture::new(scene);
    let settings = ModelImportSettings {
        unit_scale: 0.25,
        ..plain()
    };
    let model = fx.import(&settings).unwrap();

    assert_eq!(transform(model.root_entity()).scale, Vec3::splat(0.25));
    let child = transform(children(model.root_entity())[0]);
    assert!(child.translation.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-5));
    assert!(child.scale.abs_diff_eq(Vec3::splat(2.0), 1e-5));
    assert!(child.rotation.dot(rotation).abs() > 1.0 - 1e-5);
}

#[test]
fn mesh_without_material_gets_standard_fallback() {
    let mut scene = Scene::new(Node::new("Root").with_meshes([0]));
    let mut mesh = triangle("Loose");
    mesh.material_index = 3;
    scene.meshes.push(mesh);

    let mut fx = Fixture::new(scene);
    let model = fx.import(&plain()).unwrap();

    assert_eq!(model.materials.len(), 1);
    assert_eq!(fx.material(&model, 0).name, "StandardMat");
    assert!(fx.data_dir().join("StandardMat.mat").exists());
}

#[test]
fn duplicate_material_names_get_suffixes() {
    let mut scene = Scene::new(Node::new("Root").with_meshes([0]));
    scene.meshes.push(triangle("Tri"));
    scene.materials = vec![Material::named("Metal"), Material::named("Metal")];

    let mut fx = Fixture::new(scene);
    let model = fx.import(&plain()).unwrap();

    assert_ne!(model.materials[0], model.materials[1]);
    assert!(fx.data_dir().join("Metal.mat").exists());
    assert!(fx.data_dir().join("Metal_1.mat").exists());
}

#[test]
fn reimport_overwrites_or_keeps_existing_sub_assets() {
    let mut scene = Scene::new(Node::new("Root").with_meshes([0]));
    scene.meshes.push(triangle("Tri"));
    scene.materials.push(Material::named("Paint"));

    let mut fx = Fixture::new(scene);
    let first = fx.import(&plain()).unwrap();

    // Hand edit the generated material.
    let mut edited = fx.material(&first, 0);
    edited.set_color(MAIN_COLOR, [1.0, 0.0, 0.0, 1.0]);
    let path = fx.data_dir().join("Paint.mat");
    fx.db.write_document(&path, &AssetDocument::Material(edited)).unwrap();

    let keep = ModelImportSettings {
        reimport_policy: ReimportPolicy::KeepExisting,
        ..plain()
    };
    let kept = fx.import(&keep).unwrap();
    assert_eq!(kept.materials[0], first.materials[0]);
    assert_eq!(kept.meshes[0], first.meshes[0]);
    assert_eq!(fx.material(&kept, 0).color(MAIN_COLOR), Some([1.0, 0.0, 0.0, 1.0]));

    let overwritten = fx.import(&plain()).unwrap();
    assert_ne!(overwritten.materials[0], first.materials[0]);
    assert_eq!(fx.material(&overwritten, 0).color(MAIN_COLOR), Some([1.0; 4]));
    assert!(fx.db.load_document(first.materials[0].id).is_err());
}

#[test]
fn unknown_bone_aborts_the_import() {
    let mut mesh = triangle("Tri");
    mesh.bones.push(Bone {
        name: "Missing".into(),
        weights: weights(&[(0, 1.0)]),
        offset_matrix: Mat4::IDENTITY,
    });
    let mut scene = Scene::new(Node::new("Root").with_meshes([0]));
    scene.meshes.push(mesh);

    let mut fx = Fixture::new(scene);
    let err = fx.import(&plain()).unwrap_err();
    assert!(matches!(err, ImportError::UnknownBone { ref bone, .. } if bone == "Missing"));
}

#[test]
fn unsupported_extension_is_rejected() {
    let mut fx = Fixture::new(Scene::new(Node::new("Root")));
    fs::write(fx.dir.path().join("Models/model.fbx"), b"").unwrap();

    let err = fx
        .importer
        .import(&mut fx.db, Path::new("Models/model.fbx"), &plain())
        .unwrap_err();
    assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    assert!(err.to_string().starts_with("Format Not Supported"));
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<String>>>);

impl ImportNotifier for Recorder {
    fn imported(&self, _source: &Path, model: &ImportedModel) {
        self.0.borrow_mut().push(format!("ok {}", model.materials.len()));
    }

    fn failed(&self, _source: &Path, error: &ImportError) {
        self.0.borrow_mut().push(format!("failed {error}"));
    }
}

#[test]
fn notifier_hears_about_success_and_failure() {
    let recorder = Recorder::default();

    let mut failing = Fixture::new(Scene::new(Node::new("Empty")));
    failing.importer = ModelImporter::empty()
        .with_parser(FakeParser(Scene::new(Node::new("Empty"))))
        .with_notifier(recorder.clone());
    assert!(failing.import(&plain()).is_err());

    let mut scene = Scene::new(Node::new("Root").with_meshes([0]));
    scene.meshes.push(triangle("Tri"));
    scene.materials.push(Material::named("M"));
    let mut working = Fixture::new(scene.clone());
    working.importer = ModelImporter::empty()
        .with_parser(FakeParser(scene))
        .with_notifier(recorder.clone());
    working.import(&plain()).unwrap();

    assert_eq!(
        *recorder.0.borrow(),
        ["failed Model has no Meshes.".to_owned(), "ok 1".to_owned()]
    );
}

#[test]
fn obj_file_imports_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quad.obj");
    fs::write(
        &path,
        "o Quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
         vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\nf 1/1 2/2 3/3 4/4\n",
    )
    .unwrap();
    let mut db = FileAssetDatabase::open(dir.path()).unwrap();

    let model = ModelImporter::new()
        .import(&mut db, Path::new("quad.obj"), &ModelImportSettings::default())
        .unwrap();

    assert_eq!(node_name(model.root_entity()), "quad.obj");
    assert!(model.skipped_meshes.is_empty());

    let node = children(model.root_entity())[0];
    assert_eq!(node_name(node), "Quad");
    assert_eq!(renderer_children(node).len(), 1);

    let id = model.meshes[0].unwrap().id;
    let mesh = db.load_document(id).unwrap().into_mesh().unwrap();
    assert_eq!(mesh.triangle_count(), 2);
    assert!(mesh.vertices.iter().all(|v| v.normal != [0.0; 3]));

    let material = db
        .load_document(model.materials[0].id)
        .unwrap()
        .into_material()
        .unwrap();
    assert_eq!(material.name, "DefaultMaterial");
    assert!(dir.path().join("quad_Data/DefaultMaterial.mat").exists());
}
