use std::{collections::HashMap, path::Path};

use glam::{Mat4, Vec2, Vec3, Vec4};
use gltf::mesh::Mode;
use log::{debug, warn};

use crate::{
    error::ImportError,
    parser::{DEFAULT_MATERIAL_NAME, SceneParser},
    scene::{Bone, Material, Mesh, Node, Scene, TextureSlot, VertexWeight},
};

/// glTF 2.0 (`.gltf` + buffers, or binary `.glb`).
pub struct GltfParser;

impl SceneParser for GltfParser {
    fn extensions(&self) -> &[&str] {
        &["gltf", "glb"]
    }

    fn parse(&self, path: &Path) -> Result<Scene, ImportError> {
        // A. Load Document & Buffers. Images are only referenced, never decoded.
        let gltf::Gltf { document, blob } =
            gltf::Gltf::open(path).map_err(|e| ImportError::parse(path, e))?;
        let buffers = gltf::import_buffers(&document, path.parent(), blob)
            .map_err(|e| ImportError::parse(path, e))?;

        // --- STEP 1: MATERIALS ---
        let mut materials: Vec<Material> = document.materials().map(convert_material).collect();
        let mut default_material = None;

        // --- STEP 2: MESHES ---
        // glTF skins live on nodes; a mesh borrows the skin of the first node drawing it.
        let mut mesh_skins = HashMap::new();
        for node in document.nodes() {
            if let (Some(mesh), Some(skin)) = (node.mesh(), node.skin()) {
                mesh_skins.entry(mesh.index()).or_insert(skin);
            }
        }

        let mut meshes = Vec::new();
        let mut mesh_map = Vec::new(); // Maps GLTF Mesh Index -> our mesh indices

        for mesh in document.meshes() {
            let base_name = mesh
                .name()
                .map(str::to_owned)
                .unwrap_or_else(|| format!("Mesh{}", mesh.index()));
            let primitive_count = mesh.primitives().len();
            let mut indices_for_mesh = Vec::with_capacity(primitive_count);

            for primitive in mesh.primitives() {
                let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

                let positions: Vec<Vec3> = reader
                    .read_positions()
                    .map(|iter| iter.map(Vec3::from).collect())
                    .ok_or_else(|| ImportError::parse(path, "mesh missing positions"))?;

                let normals: Vec<Vec3> = reader
                    .read_normals()
                    .map(|iter| iter.map(Vec3::from).collect())
                    .unwrap_or_default();

                let (tangents, bitangents): (Vec<Vec3>, Vec<Vec3>) = match reader.read_tangents() {
                    Some(iter) if normals.len() == positions.len() => iter
                        .zip(&normals)
                        .map(|(t, n)| {
                            let tangent = Vec3::new(t[0], t[1], t[2]);
                            (tangent, n.cross(tangent) * t[3])
                        })
                        .unzip(),
                    _ => (Vec::new(), Vec::new()),
                };

                let tex_coords: Vec<Vec2> = reader
                    .read_tex_coords(0)
                    .map(|read| read.into_f32().map(Vec2::from).collect())
                    .unwrap_or_default();

                let colors: Vec<Vec4> = reader
                    .read_colors(0)
                    .map(|read| read.into_rgba_f32().map(Vec4::from).collect())
                    .unwrap_or_default();

                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|read| read.into_u32().collect())
                    .unwrap_or_else(|| (0..positions.len() as u32).collect());

                let mut bones = Vec::new();
                if let (Some(skin), Some(joints), Some(weights)) = (
                    mesh_skins.get(&mesh.index()),
                    reader.read_joints(0),
                    reader.read_weights(0),
                ) {
                    let joint_names: Vec<String> = skin.joints().map(|j| node_name(&j)).collect();
                    let inverse_binds: Vec<Mat4> = skin
                        .reader(|buffer| Some(&buffers[buffer.index()]))
                        .read_inverse_bind_matrices()
                        .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
                        .unwrap_or_default();

                    let mut per_joint: Vec<Vec<VertexWeight>> = vec![Vec::new(); joint_names.len()];
                    for (vertex, (j, w)) in joints.into_u16().zip(weights.into_f32()).enumerate() {
                        for k in 0..4 {
                            if w[k] <= 0.0 {
                                continue;
                            }
                            if let Some(list) = per_joint.get_mut(j[k] as usize) {
                                list.push(VertexWeight {
                                    vertex_id: vertex as u32,
                                    weight: w[k],
                                });
                            }
                        }
                    }

                    bones = per_joint
                        .into_iter()
                        .enumerate()
                        .filter(|(_, weights)| !weights.is_empty())
                        .map(|(j, weights)| Bone {
                            name: joint_names[j].clone(),
                            weights,
                            offset_matrix: inverse_binds.get(j).copied().unwrap_or(Mat4::IDENTITY),
                        })
                        .collect();
                }

                let material_index = match primitive.material().index() {
                    Some(index) => index,
                    None => *default_material.get_or_insert_with(|| {
                        materials.push(Material::named(DEFAULT_MATERIAL_NAME));
                        materials.len() - 1
                    }),
                };

                let name = if primitive_count > 1 {
                    format!("{}-{}", base_name, primitive.index())
                } else {
                    base_name.clone()
                };

                indices_for_mesh.push(meshes.len());
                meshes.push(Mesh {
                    name,
                    positions,
                    normals,
                    tangents,
                    bitangents,
                    tex_coords,
                    colors,
                    faces: faces_for(primitive.mode(), &indices),
                    bones,
                    material_index,
                });
            }
            mesh_map.push(indices_for_mesh);
        }

        // --- STEP 3: NODES (The Hierarchy) ---
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| ImportError::parse(path, "file contains no scene"))?;

        let mut roots: Vec<Node> = scene.nodes().map(|n| convert_node(&n, &mesh_map)).collect();
        let root = if roots.len() == 1 {
            roots.remove(0)
        } else {
            Node {
                children: roots,
                ..Node::new("Root")
            }
        };

        Ok(Scene {
            materials,
            meshes,
            root,
            unit_scale: 1.0,
        })
    }
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Node{}", node.index()))
}

fn convert_node(node: &gltf::Node, mesh_map: &[Vec<usize>]) -> Node {
    let mesh_indices = node
        .mesh()
        .and_then(|m| mesh_map.get(m.index()).cloned())
        .unwrap_or_default();

    Node {
        name: node_name(node),
        transform: Mat4::from_cols_array_2d(&node.transform().matrix()),
        children: node.children().map(|c| convert_node(&c, mesh_map)).collect(),
        mesh_indices,
    }
}

/// Relative file path of an image, with its URI escapes (`%20`) decoded.
fn texture_path(texture: gltf::Texture) -> Option<String> {
    match texture.source().source() {
        gltf::image::Source::Uri { uri, .. } if !uri.starts_with("data:") => {
            match urlencoding::decode(uri) {
                Ok(decoded) => Some(decoded.into_owned()),
                Err(e) => {
                    warn!("Image uri '{}' is not valid UTF-8 once decoded: {}", uri, e);
                    Some(uri.to_owned())
                }
            }
        }
        _ => {
            debug!("Skipping embedded texture {}", texture.index());
            None
        }
    }
}

fn convert_material(mat: gltf::Material) -> Material {
    let pbr = mat.pbr_metallic_roughness();

    let mut material = mat.name().map_or_else(Material::default, Material::named);
    material.diffuse_color = Some(Vec4::from(pbr.base_color_factor()));

    let albedo = pbr.base_color_texture().map(|info| info.texture());
    let normal = mat.normal_texture().map(|info| info.texture());
    let surface = pbr
        .metallic_roughness_texture()
        .map(|info| info.texture())
        .or_else(|| mat.occlusion_texture().map(|info| info.texture()));
    let emissive = mat.emissive_texture().map(|info| info.texture());

    for (slot, texture) in [
        (TextureSlot::Albedo, albedo),
        (TextureSlot::Normal, normal),
        (TextureSlot::Surface, surface),
        (TextureSlot::Emissive, emissive),
    ] {
        if let Some(path) = texture.and_then(texture_path) {
            material.set_texture(slot, path);
        }
    }
    material
}

/// Converts an index stream of the given topology into faces.
fn faces_for(mode: Mode, indices: &[u32]) -> Vec<Vec<u32>> {
    match mode {
        Mode::Points => indices.iter().map(|&i| vec![i]).collect(),
        Mode::Lines => indices.chunks_exact(2).map(<[u32]>::to_vec).collect(),
        Mode::LineStrip => indices.windows(2).map(<[u32]>::to_vec).collect(),
        Mode::LineLoop => {
            let mut faces: Vec<Vec<u32>> = indices.windows(2).map(<[u32]>::to_vec).collect();
            if let (Some(&first), Some(&last)) = (indices.first(), indices.last()) {
                if indices.len() > 2 {
                    faces.push(vec![last, first]);
                }
            }
            faces
        }
        Mode::Triangles => indices.chunks_exact(3).map(<[u32]>::to_vec).collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                if i % 2 == 0 {
                    vec![w[0], w[1], w[2]]
                } else {
                    vec![w[1], w[0], w[2]]
                }
            })
            .collect(),
        Mode::TriangleFan => match indices.split_first() {
            Some((&hub, rest)) => rest.windows(2).map(|w| vec![hub, w[0], w[1]]).collect(),
            None => Vec::new(),
        },
    }
}
