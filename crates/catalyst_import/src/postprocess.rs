//! Geometry clean-up run on a freshly parsed [`Scene`] before it is materialized.

use std::collections::HashMap;

use catalyst_assets::mesh::MAX_BONE_INFLUENCES;
use glam::{Mat4, Vec2, Vec3};
use log::debug;

use crate::scene::{Bone, Mesh, Node, PrimitiveTypes, Scene, VertexWeight};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PostProcessSteps: u32 {
        const LIMIT_BONE_WEIGHTS      = 1 << 0;
        const GENERATE_NORMALS        = 1 << 1;
        const GENERATE_SMOOTH_NORMALS = 1 << 2;
        const CALC_TANGENT_SPACE      = 1 << 3;
        const TRIANGULATE             = 1 << 4;
        const MAKE_LEFT_HANDED        = 1 << 5;
        const FLIP_UVS                = 1 << 6;
        const OPTIMIZE_MESHES         = 1 << 7;
        const FLIP_WINDING_ORDER      = 1 << 8;
        const JOIN_IDENTICAL_VERTICES = 1 << 9;
        const GLOBAL_SCALE            = 1 << 10;
    }
}

/// Runs every requested step, in a fixed order.
pub fn apply(scene: &mut Scene, steps: PostProcessSteps) {
    debug!("Post-processing with {steps:?}");

    if steps.contains(PostProcessSteps::MAKE_LEFT_HANDED) {
        make_left_handed(scene);
    }

    for mesh in &mut scene.meshes {
        if steps.contains(PostProcessSteps::TRIANGULATE) {
            triangulate(mesh);
        }
        if steps.contains(PostProcessSteps::FLIP_UVS) {
            flip_uvs(mesh);
        }
        if steps.contains(PostProcessSteps::FLIP_WINDING_ORDER) {
            flip_winding_order(mesh);
        }
        if steps.contains(PostProcessSteps::GENERATE_SMOOTH_NORMALS) {
            generate_normals(mesh, true);
        } else if steps.contains(PostProcessSteps::GENERATE_NORMALS) {
            generate_normals(mesh, false);
        }
        if steps.contains(PostProcessSteps::CALC_TANGENT_SPACE) {
            calc_tangent_space(mesh);
        }
        if steps.contains(PostProcessSteps::JOIN_IDENTICAL_VERTICES) {
            join_identical_vertices(mesh);
        }
        if steps.contains(PostProcessSteps::OPTIMIZE_MESHES) {
            remove_unreferenced_vertices(mesh);
        }
        if steps.contains(PostProcessSteps::LIMIT_BONE_WEIGHTS) {
            limit_bone_weights(mesh, MAX_BONE_INFLUENCES);
        }
    }

    if steps.contains(PostProcessSteps::GLOBAL_SCALE) && scene.unit_scale != 1.0 {
        let scale = Mat4::from_scale(Vec3::splat(scene.unit_scale));
        scene.root.transform = scale * scene.root.transform;
    }
}

/// Splits polygons into triangle fans. Points and lines are left alone.
pub fn triangulate(mesh: &mut Mesh) {
    if !mesh.primitive_types().contains(PrimitiveTypes::POLYGON) {
        return;
    }
    let mut faces = Vec::with_capacity(mesh.faces.len());
    for face in mesh.faces.drain(..) {
        if face.len() <= 3 {
            faces.push(face);
            continue;
        }
        for i in 1..face.len() - 1 {
            faces.push(vec![face[0], face[i], face[i + 1]]);
        }
    }
    mesh.faces = faces;
}

/// Mirrors the scene along Z.
pub fn make_left_handed(scene: &mut Scene) {
    let mirror = Mat4::from_scale(Vec3::new(1.0, 1.0, -1.0));
    let flip = |v: &mut Vec3| v.z = -v.z;

    for mesh in &mut scene.meshes {
        mesh.positions.iter_mut().for_each(flip);
        mesh.normals.iter_mut().for_each(flip);
        mesh.tangents.iter_mut().for_each(flip);
        mesh.bitangents.iter_mut().for_each(flip);
        for bone in &mut mesh.bones {
            bone.offset_matrix = mirror * bone.offset_matrix * mirror;
        }
    }
    scene
        .root
        .visit_mut(&mut |node: &mut Node| node.transform = mirror * node.transform * mirror);
}

pub fn flip_uvs(mesh: &mut Mesh) {
    for uv in &mut mesh.tex_coords {
        uv.y = 1.0 - uv.y;
    }
}

pub fn flip_winding_order(mesh: &mut Mesh) {
    for face in &mut mesh.faces {
        face.reverse();
    }
}

/// Newell normal of a face; works for triangles and planar polygons alike.
fn face_normal(positions: &[Vec3], face: &[u32]) -> Vec3 {
    let mut normal = Vec3::ZERO;
    for (i, &a) in face.iter().enumerate() {
        let b = face[(i + 1) % face.len()];
        let (Some(&p), Some(&q)) = (positions.get(a as usize), positions.get(b as usize)) else {
            return Vec3::ZERO;
        };
        normal += p.cross(q);
    }
    normal * 0.5
}

/// Gives normals to a mesh that has none.
///
/// Smooth normals average the area-weighted normals of adjacent faces. Flat
/// normals give every face corner its own vertex.
pub fn generate_normals(mesh: &mut Mesh, smooth: bool) {
    if mesh.has_normals() {
        return;
    }
    if !mesh
        .primitive_types()
        .intersects(PrimitiveTypes::TRIANGLE | PrimitiveTypes::POLYGON)
    {
        return;
    }

    if smooth {
        let mut normals = vec![Vec3::ZERO; mesh.vertex_count()];
        for face in &mesh.faces {
            if face.len() < 3 {
                continue;
            }
            let n = face_normal(&mesh.positions, face);
            for &i in face {
                if let Some(slot) = normals.get_mut(i as usize) {
                    *slot += n;
                }
            }
        }
        mesh.normals = normals.into_iter().map(Vec3::normalize_or_zero).collect();
        return;
    }

    let mut new_to_old = Vec::new();
    let mut faces = Vec::with_capacity(mesh.faces.len());
    let mut normals = Vec::new();
    for face in &mesh.faces {
        let n = if face.len() >= 3 {
            face_normal(&mesh.positions, face).normalize_or_zero()
        } else {
            Vec3::ZERO
        };
        let mut new_face = Vec::with_capacity(face.len());
        for &i in face {
            new_face.push(new_to_old.len() as u32);
            new_to_old.push(i);
            normals.push(n);
        }
        faces.push(new_face);
    }
    rebuild(mesh, &new_to_old, faces);
    mesh.normals = normals;
}

/// Computes per-vertex tangents and bitangents from UV channel 0.
pub fn calc_tangent_space(mesh: &mut Mesh) {
    if mesh.has_tangent_basis() || !mesh.has_normals() || !mesh.has_tex_coords() {
        return;
    }

    let count = mesh.vertex_count();
    let mut tangents = vec![Vec3::ZERO; count];
    let mut bitangents = vec![Vec3::ZERO; count];

    for face in mesh.faces.iter().filter(|f| f.len() >= 3) {
        if face.iter().any(|&i| i as usize >= count) {
            continue;
        }
        for k in 1..face.len() - 1 {
            let [ia, ib, ic] = [face[0], face[k], face[k + 1]].map(|i| i as usize);
            let (p0, p1, p2) = (mesh.positions[ia], mesh.positions[ib], mesh.positions[ic]);
            let (w0, w1, w2) = (mesh.tex_coords[ia], mesh.tex_coords[ib], mesh.tex_coords[ic]);

            let e1 = p1 - p0;
            let e2 = p2 - p0;
            let d1: Vec2 = w1 - w0;
            let d2: Vec2 = w2 - w0;
            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let t = (e1 * d2.y - e2 * d1.y) * r;
            let bt = (e2 * d1.x - e1 * d2.x) * r;
            for i in [ia, ib, ic] {
                tangents[i] += t;
                bitangents[i] += bt;
            }
        }
    }

    for i in 0..count {
        let n = mesh.normals[i];
        let mut t = (tangents[i] - n * n.dot(tangents[i])).normalize_or_zero();
        if t == Vec3::ZERO {
            t = n.any_orthonormal_vector();
        }
        let mut b = n.cross(t);
        if b.dot(bitangents[i]) < 0.0 {
            b = -b;
        }
        tangents[i] = t;
        bitangents[i] = b;
    }

    mesh.tangents = tangents;
    mesh.bitangents = bitangents;
}

/// Merges vertices whose attributes and skin influences are bit-identical.
pub fn join_identical_vertices(mesh: &mut Mesh) {
    let count = mesh.vertex_count();
    let influences = influences_per_vertex(mesh);

    let mut seen: HashMap<Vec<u32>, u32> = HashMap::new();
    let mut old_to_new = Vec::with_capacity(count);
    let mut new_to_old = Vec::new();

    for i in 0..count {
        let mut key: Vec<u32> = Vec::new();
        let mut push = |values: &[f32]| key.extend(values.iter().map(|v| v.to_bits()));
        push(mesh.positions[i].to_array().as_slice());
        if let Some(n) = mesh.normals.get(i) {
            push(n.to_array().as_slice());
        }
        if let Some(t) = mesh.tangents.get(i) {
            push(t.to_array().as_slice());
        }
        if let Some(b) = mesh.bitangents.get(i) {
            push(b.to_array().as_slice());
        }
        if let Some(uv) = mesh.tex_coords.get(i) {
            push(uv.to_array().as_slice());
        }
        if let Some(c) = mesh.colors.get(i) {
            push(c.to_array().as_slice());
        }
        for &(bone, weight) in &influences[i] {
            key.push(bone as u32);
            key.push(weight.to_bits());
        }

        let next = new_to_old.len() as u32;
        let id = *seen.entry(key).or_insert(next);
        if id == next {
            new_to_old.push(i as u32);
        }
        old_to_new.push(id);
    }

    if new_to_old.len() == count {
        return;
    }
    debug!("Welded mesh '{}' from {} to {} vertices", mesh.name, count, new_to_old.len());

    let faces = mesh
        .faces
        .iter()
        .map(|f| f.iter().map(|&i| old_to_new.get(i as usize).copied().unwrap_or(i)).collect())
        .collect();
    rebuild(mesh, &new_to_old, faces);
}

/// Drops vertices no face references.
pub fn remove_unreferenced_vertices(mesh: &mut Mesh) {
    let count = mesh.vertex_count();
    let mut used = vec![false; count];
    for &i in mesh.faces.iter().flatten() {
        if let Some(u) = used.get_mut(i as usize) {
            *u = true;
        }
    }
    if used.iter().all(|&u| u) {
        return;
    }

    let mut old_to_new = vec![u32::MAX; count];
    let mut new_to_old = Vec::new();
    for (i, _) in used.iter().enumerate().filter(|(_, u)| **u) {
        old_to_new[i] = new_to_old.len() as u32;
        new_to_old.push(i as u32);
    }
    let faces = mesh
        .faces
        .iter()
        .map(|f| {
            f.iter()
                .map(|&i| old_to_new.get(i as usize).copied().unwrap_or(i))
                .collect()
        })
        .collect();
    rebuild(mesh, &new_to_old, faces);
}

/// Keeps at most `max` influences per vertex, renormalizing the ones kept.
pub fn limit_bone_weights(mesh: &mut Mesh, max: usize) {
    if !mesh.has_bones() {
        return;
    }
    let mut influences = influences_per_vertex(mesh);
    if influences.iter().all(|inf| inf.len() <= max) {
        return;
    }

    let mut removed = 0;
    for inf in &mut influences {
        if inf.len() <= max {
            continue;
        }
        inf.sort_by(|a, b| b.1.total_cmp(&a.1));
        removed += inf.len() - max;
        inf.truncate(max);
        let total: f32 = inf.iter().map(|(_, w)| w).sum();
        if total > 0.0 {
            for (_, w) in inf.iter_mut() {
                *w /= total;
            }
        }
    }
    debug!("Removed {removed} bone influences from mesh '{}'", mesh.name);

    for bone in &mut mesh.bones {
        bone.weights.clear();
    }
    for (vertex, inf) in influences.into_iter().enumerate() {
        for (bone, weight) in inf {
            mesh.bones[bone].weights.push(VertexWeight {
                vertex_id: vertex as u32,
                weight,
            });
        }
    }
}

/// `(bone index, weight)` pairs for every vertex, in bone order.
fn influences_per_vertex(mesh: &Mesh) -> Vec<Vec<(usize, f32)>> {
    let mut influences = vec![Vec::new(); mesh.vertex_count()];
    for (b, bone) in mesh.bones.iter().enumerate() {
        for w in &bone.weights {
            if let Some(inf) = influences.get_mut(w.vertex_id as usize) {
                inf.push((b, w.weight));
            }
        }
    }
    influences
}

/// Rebuilds every per-vertex stream so that new vertex `i` is a copy of old
/// vertex `new_to_old[i]`, then installs `faces`.
fn rebuild(mesh: &mut Mesh, new_to_old: &[u32], faces: Vec<Vec<u32>>) {
    // Streams that do not cover every old vertex are dropped rather than guessed.
    fn gather<T: Copy>(stream: &[T], old_len: usize, new_to_old: &[u32]) -> Vec<T> {
        if stream.len() != old_len {
            return Vec::new();
        }
        new_to_old.iter().map(|&o| stream[o as usize]).collect()
    }

    let old_len = mesh.vertex_count();
    mesh.positions = gather(&mesh.positions, old_len, new_to_old);
    mesh.normals = gather(&mesh.normals, old_len, new_to_old);
    mesh.tangents = gather(&mesh.tangents, old_len, new_to_old);
    mesh.bitangents = gather(&mesh.bitangents, old_len, new_to_old);
    mesh.tex_coords = gather(&mesh.tex_coords, old_len, new_to_old);
    mesh.colors = gather(&mesh.colors, old_len, new_to_old);
    mesh.faces = faces;

    let mut copies: HashMap<u32, Vec<u32>> = HashMap::new();
    for (new, &old) in new_to_old.iter().enumerate() {
        copies.entry(old).or_default().push(new as u32);
    }
    for bone in &mut mesh.bones {
        bone.weights = remap_weights(bone, &copies);
    }
}

fn remap_weights(bone: &Bone, copies: &HashMap<u32, Vec<u32>>) -> Vec<VertexWeight> {
    let mut out: Vec<VertexWeight> = Vec::new();
    let mut taken = std::collections::HashSet::new();
    for w in &bone.weights {
        let Some(targets) = copies.get(&w.vertex_id) else {
            continue;
        };
        for &vertex_id in targets {
            if taken.insert(vertex_id) {
                out.push(VertexWeight {
                    vertex_id,
                    weight: w.weight,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec4, vec2, vec3};

    fn quad() -> Mesh {
        Mesh {
            name: "quad".into(),
            positions: vec![
                vec3(0.0, 0.0, 0.0),
                vec3(1.0, 0.0, 0.0),
                vec3(1.0, 1.0, 0.0),
                vec3(0.0, 1.0, 0.0),
            ],
            tex_coords: vec![vec2(0.0, 0.0), vec2(1.0, 0.0), vec2(1.0, 1.0), vec2(0.0, 1.0)],
            faces: vec![vec![0, 1, 2, 3]],
            ..Default::default()
        }
    }

    #[test]
    fn triangulate_fans_polygons() {
        let mut mesh = quad();
        mesh.faces.push(vec![0, 1]);
        triangulate(&mut mesh);
        assert_eq!(mesh.faces, vec![vec![0, 1, 2], vec![0, 2, 3], vec![0, 1]]);
        assert_eq!(
            mesh.primitive_types(),
            PrimitiveTypes::TRIANGLE | PrimitiveTypes::LINE
        );
    }

    #[test]
    fn flat_normals_split_shared_vertices() {
        let mut mesh = quad();
        triangulate(&mut mesh);
        generate_normals(&mut mesh, false);

        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.faces, vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert!(mesh.normals.iter().all(|n| n.abs_diff_eq(Vec3::Z, 1e-6)));
        assert_eq!(mesh.tex_coords[3], vec2(0.0, 0.0));
    }

    #[test]
    fn smooth_normals_keep_vertex_count() {
        let mut mesh = quad();
        triangulate(&mut mesh);
        generate_normals(&mut mesh, true);
        assert_eq!(mesh.vertex_count(), 4);
        assert!(mesh.normals.iter().all(|n| n.abs_diff_eq(Vec3::Z, 1e-6)));
    }

    #[test]
    fn existing_normals_are_kept() {
        let mut mesh = quad();
        mesh.normals = vec![Vec3::Y; 4];
        generate_normals(&mut mesh, false);
        assert_eq!(mesh.normals, vec![Vec3::Y; 4]);
    }

    #[test]
    fn tangents_follow_u_direction() {
        let mut mesh = quad();
        triangulate(&mut mesh);
        generate_normals(&mut mesh, true);
        calc_tangent_space(&mut mesh);

        assert!(mesh.has_tangent_basis());
        for (t, b) in mesh.tangents.iter().zip(&mesh.bitangents) {
            assert!(t.abs_diff_eq(Vec3::X, 1e-5));
            assert!(b.abs_diff_eq(Vec3::Y, 1e-5));
        }
    }

    #[test]
    fn no_tangents_without_uvs() {
        let mut mesh = quad();
        mesh.tex_coords.clear();
        triangulate(&mut mesh);
        generate_normals(&mut mesh, true);
        calc_tangent_space(&mut mesh);
        assert!(!mesh.has_tangent_basis());
    }

    #[test]
    fn welding_merges_split_vertices_back() {
        let mut mesh = quad();
        triangulate(&mut mesh);
        generate_normals(&mut mesh, false);
        assert_eq!(mesh.vertex_count(), 6);

        join_identical_vertices(&mut mesh);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.faces, vec![vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn welding_respects_skin() {
        let mut mesh = Mesh {
            positions: vec![Vec3::ZERO, Vec3::ZERO, Vec3::X],
            faces: vec![vec![0, 1, 2]],
            bones: vec![Bone {
                name: "b".into(),
                weights: vec![VertexWeight { vertex_id: 0, weight: 1.0 }],
                offset_matrix: Mat4::IDENTITY,
            }],
            ..Default::default()
        };
        join_identical_vertices(&mut mesh);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn unreferenced_vertices_are_dropped_with_their_weights() {
        let mut mesh = Mesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
            colors: vec![Vec4::ONE, Vec4::ZERO, Vec4::ONE, Vec4::ONE],
            faces: vec![vec![0, 2, 3]],
            bones: vec![Bone {
                name: "b".into(),
                weights: vec![
                    VertexWeight { vertex_id: 1, weight: 1.0 },
                    VertexWeight { vertex_id: 3, weight: 0.5 },
                ],
                offset_matrix: Mat4::IDENTITY,
            }],
            ..Default::default()
        };
        remove_unreferenced_vertices(&mut mesh);
        assert_eq!(mesh.positions, vec![Vec3::ZERO, Vec3::Y, Vec3::Z]);
        assert_eq!(mesh.colors, vec![Vec4::ONE; 3]);
        assert_eq!(mesh.faces, vec![vec![0, 1, 2]]);
        assert_eq!(mesh.bones[0].weights, vec![VertexWeight { vertex_id: 2, weight: 0.5 }]);
    }

    #[test]
    fn bone_weights_are_limited_to_strongest_four() {
        let weights = [0.1, 0.4, 0.2, 0.05, 0.25];
        let bones = weights
            .iter()
            .enumerate()
            .map(|(i, &w)| Bone {
                name: format!("b{i}"),
                weights: vec![VertexWeight { vertex_id: 0, weight: w }],
                offset_matrix: Mat4::IDENTITY,
            })
            .collect();
        let mut mesh = Mesh {
            positions: vec![Vec3::ZERO],
            bones,
            ..Default::default()
        };

        limit_bone_weights(&mut mesh, 4);
        assert!(mesh.bones[3].weights.is_empty());
        let total: f32 = mesh.bones.iter().flat_map(|b| &b.weights).map(|w| w.weight).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bone_weights_under_the_limit_are_untouched() {
        let mut mesh = Mesh {
            positions: vec![Vec3::ZERO, Vec3::X],
            bones: vec![Bone {
                name: "b".into(),
                weights: vec![
                    VertexWeight { vertex_id: 1, weight: 0.3 },
                    VertexWeight { vertex_id: 0, weight: 0.2 },
                ],
                offset_matrix: Mat4::IDENTITY,
            }],
            ..Default::default()
        };
        let before = mesh.clone();
        limit_bone_weights(&mut mesh, 4);
        assert_eq!(mesh, before);
    }

    #[test]
    fn left_handed_mirrors_z() {
        let mut scene = Scene::new(
            Node::new("root").with_transform(Mat4::from_translation(vec3(1.0, 2.0, 3.0))),
        );
        scene.meshes.push(Mesh {
            positions: vec![vec3(0.0, 0.0, 5.0)],
            normals: vec![Vec3::Z],
            ..Default::default()
        });
        make_left_handed(&mut scene);
        assert_eq!(scene.meshes[0].positions[0], vec3(0.0, 0.0, -5.0));
        assert_eq!(scene.meshes[0].normals[0], -Vec3::Z);
        let t = scene.root.transform.transform_point3(Vec3::ZERO);
        assert!(t.abs_diff_eq(vec3(1.0, 2.0, -3.0), 1e-6));
    }

    #[test]
    fn flips_uvs_and_winding() {
        let mut mesh = quad();
        flip_uvs(&mut mesh);
        flip_winding_order(&mut mesh);
        assert_eq!(mesh.tex_coords[0], vec2(0.0, 1.0));
        assert_eq!(mesh.faces[0], vec![3, 2, 1, 0]);
    }

    #[test]
    fn global_scale_scales_root_only_when_requested() {
        let mut scene = Scene::new(Node::new("root"));
        scene.unit_scale = 0.01;
        apply(&mut scene, PostProcessSteps::empty());
        assert_eq!(scene.root.transform, Mat4::IDENTITY);

        apply(&mut scene, PostProcessSteps::GLOBAL_SCALE);
        let (scale, _, _) = scene.root.transform.to_scale_rotation_translation();
        assert!(scale.abs_diff_eq(Vec3::splat(0.01), 1e-6));
    }
}
