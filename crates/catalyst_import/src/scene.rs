//! The parsed scene a [`SceneParser`](crate::parser::SceneParser) hands to the importer.
//!
//! This is source data: it is post-processed in place and then thrown away once
//! meshes, materials and entities have been built from it.

use catalyst_assets::material::{
    BuiltinTexture, EMISSION_TEX, MAIN_TEX, NORMAL_TEX, SURFACE_TEX,
};
use glam::{Mat4, Vec2, Vec3, Vec4};

bitflags::bitflags! {
    /// Kinds of faces found in a mesh.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PrimitiveTypes: u8 {
        const POINT    = 1 << 0;
        const LINE     = 1 << 1;
        const TRIANGLE = 1 << 2;
        const POLYGON  = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexWeight {
    pub vertex_id: u32,
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    /// Name of the node this bone animates.
    pub name: String,
    pub weights: Vec<VertexWeight>,
    pub offset_matrix: Mat4,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Empty when the source has none.
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub bitangents: Vec<Vec3>,
    /// UV channel 0.
    pub tex_coords: Vec<Vec2>,
    /// Vertex color channel 0.
    pub colors: Vec<Vec4>,
    pub faces: Vec<Vec<u32>>,
    pub bones: Vec<Bone>,
    pub material_index: usize,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn primitive_types(&self) -> PrimitiveTypes {
        self.faces
            .iter()
            .fold(PrimitiveTypes::empty(), |acc, face| {
                acc | match face.len() {
                    1 => PrimitiveTypes::POINT,
                    2 => PrimitiveTypes::LINE,
                    3 => PrimitiveTypes::TRIANGLE,
                    _ => PrimitiveTypes::POLYGON,
                }
            })
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.vertex_count()
    }

    pub fn has_tangent_basis(&self) -> bool {
        !self.tangents.is_empty()
            && self.tangents.len() == self.vertex_count()
            && self.bitangents.len() == self.vertex_count()
    }

    pub fn has_tex_coords(&self) -> bool {
        !self.tex_coords.is_empty() && self.tex_coords.len() == self.vertex_count()
    }

    pub fn has_vertex_colors(&self) -> bool {
        !self.colors.is_empty() && self.colors.len() == self.vertex_count()
    }

    pub fn has_bones(&self) -> bool {
        !self.bones.is_empty()
    }
}

/// Texture channels a material can declare, in name-priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Albedo,
    Normal,
    Surface,
    Emissive,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 4] = [
        TextureSlot::Albedo,
        TextureSlot::Normal,
        TextureSlot::Surface,
        TextureSlot::Emissive,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Material property the slot binds to.
    pub fn property(self) -> &'static str {
        match self {
            TextureSlot::Albedo => MAIN_TEX,
            TextureSlot::Normal => NORMAL_TEX,
            TextureSlot::Surface => SURFACE_TEX,
            TextureSlot::Emissive => EMISSION_TEX,
        }
    }

    pub fn fallback(self) -> BuiltinTexture {
        match self {
            TextureSlot::Albedo => BuiltinTexture::Grid,
            TextureSlot::Normal => BuiltinTexture::FlatNormal,
            TextureSlot::Surface => BuiltinTexture::FlatSurface,
            TextureSlot::Emissive => BuiltinTexture::Black,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub diffuse_color: Option<Vec4>,
    /// Texture file paths, relative to the model file.
    textures: [Option<String>; 4],
}

impl Material {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&str> {
        self.textures[slot.index()].as_deref()
    }

    pub fn set_texture(&mut self, slot: TextureSlot, path: impl Into<String>) {
        self.textures[slot.index()] = Some(path.into());
    }

    pub fn with_texture(mut self, slot: TextureSlot, path: impl Into<String>) -> Self {
        self.set_texture(slot, path);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Mat4,
    pub children: Vec<Node>,
    pub mesh_indices: Vec<usize>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            children: Vec::new(),
            mesh_indices: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_meshes(mut self, meshes: impl IntoIterator<Item = usize>) -> Self {
        self.mesh_indices.extend(meshes);
        self
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }

    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub root: Node,
    /// Size of one source unit in meters, as declared by the file.
    pub unit_scale: f32,
}

impl Scene {
    pub fn new(root: Node) -> Self {
        Self {
            materials: Vec::new(),
            meshes: Vec::new(),
            root,
            unit_scale: 1.0,
        }
    }
}
