use std::fmt;

use catalyst_assets::{Handle, material::MaterialData, mesh::MeshData};
use catalyst_core::Transform;
use flecs_ecs::prelude::*;

/// Display name of a node.
///
/// Kept out of the flecs name index, which rejects two siblings with the same
/// name. Imported files have those often enough.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct NodeName(pub String);

// "Please render this Mesh with this Material"
#[derive(Component, Clone, Debug, PartialEq)]
pub struct MeshRenderer {
    pub mesh: Handle<MeshData>,
    pub material: Handle<MaterialData>,
}

#[derive(Component, Clone, Debug, PartialEq)]
pub struct SkinnedMeshRenderer {
    pub mesh: Handle<MeshData>,
    pub material: Handle<MaterialData>,
    /// Top of the skeleton the bone indices are resolved against.
    pub root: Entity,
    /// Bone index -> entity, filled by [`process_bone_tree`].
    pub bones: Vec<Entity>,
}

/// Spawns a named entity carrying `transform`, as a child of `parent` when given.
pub fn spawn_node<'a>(
    world: &'a World,
    name: &str,
    transform: Transform,
    parent: Option<Entity>,
) -> EntityView<'a> {
    let entity = world
        .entity()
        .set(NodeName(name.to_owned()))
        .set(transform);
    match parent {
        Some(parent) => entity.child_of(parent),
        None => entity,
    }
}

pub fn node_name(entity: EntityView) -> String {
    entity
        .try_get::<&NodeName>(|name| name.0.clone())
        .unwrap_or_default()
}

pub fn transform(entity: EntityView) -> Transform {
    entity.try_get::<&Transform>(|t| *t).unwrap_or_default()
}

pub fn mesh_renderer(entity: EntityView) -> Option<MeshRenderer> {
    entity.try_get::<&MeshRenderer>(|r| r.clone())
}

pub fn skinned_mesh_renderer(entity: EntityView) -> Option<SkinnedMeshRenderer> {
    entity.try_get::<&SkinnedMeshRenderer>(|r| r.clone())
}

pub fn has_renderer(entity: EntityView) -> bool {
    mesh_renderer(entity).is_some() || skinned_mesh_renderer(entity).is_some()
}

/// Direct children of `entity` in spawn order.
///
/// flecs groups children by table, so the order is restored from the entity
/// ids, which a world hands out in increasing order.
pub fn children(entity: EntityView<'_>) -> Vec<EntityView<'_>> {
    let mut ids: Vec<Entity> = Vec::new();
    entity.each_child(|child| ids.push(child.id()));
    ids.sort_by_key(|id| id.0);

    let world = entity.world();
    ids.into_iter().map(|id| EntityView::new_from(world, id)).collect()
}

/// Rebuilds the bone list of the skinned renderer on `entity`.
///
/// Bones are the skeleton entities under the renderer's root in depth-first
/// order, skipping entities that carry renderers themselves. That order is
/// the order the importer numbered nodes in, so bone index `i` maps to `bones[i]`.
pub fn process_bone_tree(entity: EntityView) {
    let Some(mut renderer) = skinned_mesh_renderer(entity) else {
        return;
    };

    let world = entity.world();
    let mut bones = Vec::new();
    let mut stack = vec![world.entity_from_id(renderer.root)];
    while let Some(current) = stack.pop() {
        if current.id() != entity.id() && !has_renderer(current) {
            bones.push(current.id());
        }
        stack.extend(children(current).into_iter().rev());
    }

    renderer.bones = bones;
    entity.set(renderer);
}

/// Indented dump of the hierarchy below an entity, one line per entity.
pub struct SceneDump<'a>(pub EntityView<'a>);

impl SceneDump<'_> {
    fn fmt_entity(f: &mut fmt::Formatter<'_>, entity: EntityView, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{}", "", node_name(entity), indent = depth * 2)?;
        if let Some(r) = mesh_renderer(entity) {
            write!(f, " [MeshRenderer mesh={} material={}]", r.mesh.id, r.material.id)?;
        }
        if let Some(r) = skinned_mesh_renderer(entity) {
            write!(
                f,
                " [SkinnedMeshRenderer mesh={} material={} bones={}]",
                r.mesh.id,
                r.material.id,
                r.bones.len()
            )?;
        }
        writeln!(f)?;
        for child in children(entity) {
            Self::fmt_entity(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for SceneDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Self::fmt_entity(f, self.0, 0)
    }
}
