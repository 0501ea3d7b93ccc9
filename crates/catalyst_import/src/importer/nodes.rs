use std::collections::HashMap;

use catalyst_assets::{Handle, material::MaterialData, mesh::MeshData};
use catalyst_core::Transform;
use catalyst_scene::{MeshRenderer, SkinnedMeshRenderer, process_bone_tree, spawn_node};
use flecs_ecs::prelude::*;
use glam::Vec3;
use log::warn;

use crate::scene::{Mesh, Node};

/// Result of mapping the node hierarchy onto entities.
#[derive(Debug, Default)]
pub struct NodeMap {
    /// Entity of every node, by depth-first visitation index.
    pub entities: Vec<Entity>,
    /// Node name -> visitation index. Bones are resolved through this table.
    pub index_by_name: HashMap<String, usize>,
}

impl NodeMap {
    pub fn root(&self) -> Option<Entity> {
        self.entities.first().copied()
    }
}

/// Spawns one entity per node, parents before children.
pub fn map_nodes(world: &World, root: &Node) -> NodeMap {
    let mut map = NodeMap {
        entities: Vec::with_capacity(root.count()),
        index_by_name: HashMap::new(),
    };
    map_node(world, root, None, &mut map);
    map
}

fn map_node(world: &World, node: &Node, parent: Option<Entity>, map: &mut NodeMap) {
    let index = map.entities.len();
    let entity = spawn_node(world, &node.name, node_transform(node, Transform::default()), parent);

    if let Some(previous) = map.index_by_name.insert(node.name.clone(), index) {
        warn!(
            "Duplicate node name '{}' (nodes {} and {}), bones resolve to the later one",
            node.name, previous, index
        );
    }
    map.entities.push(entity.id());

    for child in &node.children {
        map_node(world, child, Some(entity.id()), map);
    }
}

fn node_transform(node: &Node, mut current: Transform) -> Transform {
    Transform::from_matrix(&node.transform).apply_to(&mut current);
    current
}

fn flatten<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    out.push(node);
    for child in &node.children {
        flatten(child, out);
    }
}

/// Attaches renderers for every mesh a node references and returns the root entity.
///
/// `meshes` is indexed like `scene_meshes`; `None` marks a skipped mesh, which
/// produces no entity at all.
pub fn assemble(
    world: &World,
    root: &Node,
    nodes: &NodeMap,
    scene_meshes: &[Mesh],
    meshes: &[Option<Handle<MeshData>>],
    materials: &[Handle<MaterialData>],
    unit_scale: f32,
) -> Option<Entity> {
    let root_entity = nodes.root()?;

    let mut flat = Vec::with_capacity(nodes.entities.len());
    flatten(root, &mut flat);

    for (node, &entity) in flat.into_iter().zip(&nodes.entities) {
        for &mesh_index in &node.mesh_indices {
            let (Some(Some(mesh)), Some(source)) = (meshes.get(mesh_index), scene_meshes.get(mesh_index))
            else {
                continue;
            };
            let Some(&material) = materials.get(source.material_index) else {
                warn!("Mesh '{}' has no material, not rendered", source.name);
                continue;
            };

            let child = spawn_node(world, &source.name, Transform::default(), Some(entity));
            if source.has_bones() {
                child.set(SkinnedMeshRenderer {
                    mesh: *mesh,
                    material,
                    root: root_entity,
                    bones: Vec::new(),
                });
                process_bone_tree(child);
            } else {
                child.set(MeshRenderer {
                    mesh: *mesh,
                    material,
                });
            }
        }

        let view = world.entity_from_id(entity);
        view.set(node_transform(node, catalyst_scene::transform(view)));
    }

    // The root's own scale from the file is replaced by the import setting.
    let root_view = world.entity_from_id(root_entity);
    let mut root_transform = catalyst_scene::transform(root_view);
    root_transform.scale = Vec3::splat(unit_scale);
    root_view.set(root_transform);
    Some(root_entity)
}
