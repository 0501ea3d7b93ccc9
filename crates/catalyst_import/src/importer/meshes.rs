use std::{collections::HashMap, path::Path};

use catalyst_assets::{
    AssetDocument, Handle,
    mesh::{Indices, MAX_BONE_INFLUENCES, MeshData, Vertex, VertexFormat},
};
use log::{info, warn};

use crate::{
    error::ImportError,
    importer::{nodes::NodeMap, writer::SubAssetWriter},
    scene::{Mesh, PrimitiveTypes},
    settings::BoneWeightMode,
};

/// Meshes written by one import.
#[derive(Debug, Default)]
pub struct BuiltMeshes {
    /// One entry per parsed mesh. `None` where the mesh was skipped.
    pub handles: Vec<Option<Handle<MeshData>>>,
    /// Names of the skipped meshes.
    pub skipped: Vec<String>,
}

/// Why a mesh cannot be rendered, if it cannot.
pub fn rejection_reason(mesh: &Mesh) -> Option<&'static str> {
    if mesh.primitive_types() != PrimitiveTypes::TRIANGLE {
        Some("not a triangle list")
    } else if !mesh.has_normals() {
        Some("no normals")
    } else if !mesh.has_tangent_basis() {
        Some("no tangents")
    } else {
        None
    }
}

pub fn build_meshes(
    writer: &mut SubAssetWriter,
    meshes: &[Mesh],
    nodes: &NodeMap,
    source: &Path,
    mode: BoneWeightMode,
) -> Result<BuiltMeshes, ImportError> {
    let mut built = BuiltMeshes::default();

    for (index, mesh) in meshes.iter().enumerate() {
        if let Some(reason) = rejection_reason(mesh) {
            info!(
                "{}: skipping mesh '{}' ({})",
                source.display(),
                mesh.name,
                reason
            );
            built.skipped.push(mesh.name.clone());
            built.handles.push(None);
            continue;
        }

        let name = if mesh.name.trim().is_empty() {
            format!("Mesh{index}")
        } else {
            mesh.name.clone()
        };
        let data = convert_mesh(mesh, &name, &nodes.index_by_name, mode)?;
        let path = writer.reserve(&name, "mesh");
        let id = writer.persist(&path, &AssetDocument::Mesh(data))?;
        built.handles.push(Some(Handle::from_id(id)));
    }
    Ok(built)
}

/// Builds the vertex and index buffers of an accepted mesh.
pub fn convert_mesh(
    mesh: &Mesh,
    name: &str,
    node_indices: &HashMap<String, usize>,
    mode: BoneWeightMode,
) -> Result<MeshData, ImportError> {
    let mut vertices: Vec<Vertex> = (0..mesh.vertex_count())
        .map(|i| Vertex {
            position: mesh.positions[i].to_array(),
            uv: mesh
                .tex_coords
                .get(i)
                .filter(|_| mesh.has_tex_coords())
                .map_or([0.0; 2], |uv| uv.to_array()),
            normal: mesh.normals.get(i).copied().unwrap_or_default().to_array(),
            color: mesh
                .colors
                .get(i)
                .filter(|_| mesh.has_vertex_colors())
                .map_or([1.0; 3], |c| c.truncate().to_array()),
            tangent: mesh.tangents.get(i).copied().unwrap_or_default().to_array(),
            ..Default::default()
        })
        .collect();

    if mesh.has_bones() {
        assign_bone_weights(mesh, &mut vertices, node_indices, mode)?;
    }

    let indices = mesh.faces.iter().flatten().copied().collect();

    Ok(MeshData {
        name: name.to_owned(),
        format: VertexFormat::standard(),
        vertices,
        indices: Indices::compact(indices),
    })
}

fn assign_bone_weights(
    mesh: &Mesh,
    vertices: &mut [Vertex],
    node_indices: &HashMap<String, usize>,
    mode: BoneWeightMode,
) -> Result<(), ImportError> {
    // 1. Resolve every bone to the index of its node
    let mut bones = Vec::with_capacity(mesh.bones.len());
    for bone in &mesh.bones {
        let index = *node_indices
            .get(&bone.name)
            .ok_or_else(|| ImportError::UnknownBone {
                mesh: mesh.name.clone(),
                bone: bone.name.clone(),
            })?;
        let index = u8::try_from(index).map_err(|_| ImportError::BoneIndexOverflow {
            bone: bone.name.clone(),
            index,
        })?;
        bones.push((index, bone));
    }

    // 2. Fill the slots
    match mode {
        BoneWeightMode::BoneSlot => {
            for (index, bone) in &bones {
                for (slot, w) in bone.weights.iter().take(MAX_BONE_INFLUENCES).enumerate() {
                    if let Some(v) = vertices.get_mut(w.vertex_id as usize) {
                        v.bone_indices[slot] = *index;
                        v.bone_weights[slot] = w.weight;
                    }
                }
            }
        }
        BoneWeightMode::TopInfluences => {
            let mut influences: Vec<Vec<(u8, f32)>> = vec![Vec::new(); vertices.len()];
            for (index, bone) in &bones {
                for w in &bone.weights {
                    if let Some(list) = influences.get_mut(w.vertex_id as usize) {
                        list.push((*index, w.weight));
                    }
                }
            }
            for (v, mut list) in vertices.iter_mut().zip(influences) {
                list.sort_by(|a, b| b.1.total_cmp(&a.1));
                for (slot, (index, weight)) in list.into_iter().take(MAX_BONE_INFLUENCES).enumerate() {
                    v.bone_indices[slot] = index;
                    v.bone_weights[slot] = weight;
                }
            }
        }
    }

    // 3. Normalize. Vertices without influence keep zero weights.
    let unweighted = vertices
        .iter_mut()
        .map(Vertex::normalize_weights)
        .filter(|normalized| !normalized)
        .count();
    if unweighted > 0 {
        warn!(
            "Mesh '{}': {} of {} vertices have no bone weight",
            mesh.name,
            unweighted,
            vertices.len()
        );
    }
    Ok(())
}
