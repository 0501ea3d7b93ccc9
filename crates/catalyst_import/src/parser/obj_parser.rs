use std::path::Path;

use glam::{Vec2, Vec3, Vec4};
use log::warn;

use crate::{
    error::ImportError,
    parser::{DEFAULT_MATERIAL_NAME, SceneParser},
    scene::{Material, Mesh, Node, Scene, TextureSlot},
};

/// Wavefront OBJ with its MTL library.
pub struct ObjParser;

impl SceneParser for ObjParser {
    fn extensions(&self) -> &[&str] {
        &["obj"]
    }

    fn parse(&self, path: &Path) -> Result<Scene, ImportError> {
        // Polygons are kept so triangulation stays an import option.
        let (models, mtl) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: false,
                ..Default::default()
            },
        )
        .map_err(|e| ImportError::parse(path, e))?;

        let mut materials: Vec<Material> = match mtl {
            Ok(list) => list.into_iter().map(convert_material).collect(),
            Err(e) => {
                warn!("{}: material library not loaded ({})", path.display(), e);
                Vec::new()
            }
        };
        let mut default_material = None;

        let root_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Root".to_owned());
        let mut root = Node::new(root_name);
        let mut meshes = Vec::with_capacity(models.len());

        for model in models {
            let m = model.mesh;

            let material_index = match m.material_id.filter(|&i| i < materials.len()) {
                Some(index) => index,
                None => *default_material.get_or_insert_with(|| {
                    materials.push(Material::named(DEFAULT_MATERIAL_NAME));
                    materials.len() - 1
                }),
            };

            let faces = if m.face_arities.is_empty() {
                m.indices.chunks_exact(3).map(<[u32]>::to_vec).collect()
            } else {
                let mut faces = Vec::with_capacity(m.face_arities.len());
                let mut start = 0usize;
                for &arity in &m.face_arities {
                    let end = start + arity as usize;
                    match m.indices.get(start..end) {
                        Some(face) => faces.push(face.to_vec()),
                        None => return Err(ImportError::parse(path, "face runs past index list")),
                    }
                    start = end;
                }
                faces
            };

            let mesh = Mesh {
                name: model.name.clone(),
                positions: m.positions.chunks_exact(3).map(Vec3::from_slice).collect(),
                normals: m.normals.chunks_exact(3).map(Vec3::from_slice).collect(),
                tex_coords: m.texcoords.chunks_exact(2).map(Vec2::from_slice).collect(),
                colors: m
                    .vertex_color
                    .chunks_exact(3)
                    .map(|c| Vec4::new(c[0], c[1], c[2], 1.0))
                    .collect(),
                faces,
                material_index,
                ..Default::default()
            };

            root.children
                .push(Node::new(model.name).with_meshes([meshes.len()]));
            meshes.push(mesh);
        }

        Ok(Scene {
            materials,
            meshes,
            root,
            unit_scale: 1.0,
        })
    }
}

fn convert_material(mat: tobj::Material) -> Material {
    let mut material = Material::named(mat.name);
    if let Some([r, g, b]) = mat.diffuse {
        material.diffuse_color = Some(Vec4::new(r, g, b, mat.dissolve.unwrap_or(1.0)));
    }
    let textures = [
        (TextureSlot::Albedo, mat.diffuse_texture),
        (TextureSlot::Normal, mat.normal_texture),
        (TextureSlot::Surface, mat.unknown_param.get("map_Pr").cloned()),
        (TextureSlot::Emissive, mat.unknown_param.get("map_Ke").cloned()),
    ];
    for (slot, texture) in textures {
        if let Some(path) = texture.filter(|p| !p.is_empty()) {
            material.set_texture(slot, path);
        }
    }
    material
}
