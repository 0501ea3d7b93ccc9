use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Number of bone influences a single vertex can carry.
pub const MAX_BONE_INFLUENCES: usize = 4;

// #[repr(C)] keeps the field order identical to `VertexFormat::standard()`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub tangent: [f32; 3],
    pub bone_indices: [u8; MAX_BONE_INFLUENCES],
    pub bone_weights: [f32; MAX_BONE_INFLUENCES],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            ..Zeroable::zeroed()
        }
    }
}

impl Vertex {
    pub fn total_weight(&self) -> f32 {
        self.bone_weights.iter().sum()
    }

    /// Scales the four weights so they sum to one.
    /// Returns `false` and leaves the weights untouched when the vertex has no influence at all.
    pub fn normalize_weights(&mut self) -> bool {
        let total = self.total_weight();
        if total <= 0.0 || !total.is_finite() {
            return false;
        }
        for weight in &mut self.bone_weights {
            *weight /= total;
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexSemantic {
    Position,
    TexCoord,
    Normal,
    Color,
    Tangent,
    BoneIndex,
    BoneWeight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexType {
    Float,
    UnsignedByte,
}

impl VertexType {
    pub fn size(self) -> usize {
        match self {
            VertexType::Float => 4,
            VertexType::UnsignedByte => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexElement {
    pub semantic: VertexSemantic,
    pub ty: VertexType,
    pub count: u8,
    #[serde(default)]
    pub normalized: bool,
}

impl VertexElement {
    pub fn new(semantic: VertexSemantic, ty: VertexType, count: u8) -> Self {
        Self {
            semantic,
            ty,
            count,
            normalized: false,
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }

    pub fn size(&self) -> usize {
        self.ty.size() * self.count as usize
    }
}

/// Describes how a vertex buffer is laid out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexFormat {
    pub elements: Vec<VertexElement>,
}

impl VertexFormat {
    /// Layout matching [`Vertex`].
    pub fn standard() -> Self {
        use VertexSemantic::*;
        use VertexType::*;

        Self {
            elements: vec![
                VertexElement::new(Position, Float, 3),
                VertexElement::new(TexCoord, Float, 2),
                VertexElement::new(Normal, Float, 3).normalized(),
                VertexElement::new(Color, Float, 3),
                VertexElement::new(Tangent, Float, 3),
                VertexElement::new(BoneIndex, UnsignedByte, 4),
                VertexElement::new(BoneWeight, Float, 4),
            ],
        }
    }

    pub fn stride(&self) -> usize {
        self.elements.iter().map(VertexElement::size).sum()
    }

    /// Byte offset of the first element with `semantic`.
    pub fn offset_of(&self, semantic: VertexSemantic) -> Option<usize> {
        let mut offset = 0;
        for element in &self.elements {
            if element.semantic == semantic {
                return Some(offset);
            }
            offset += element.size();
        }
        None
    }
}

/// Index buffer, stored in the smallest width that fits every index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Indices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Indices {
    pub fn compact(indices: Vec<u32>) -> Self {
        if indices.iter().all(|&i| i <= u16::MAX as u32) {
            Indices::U16(indices.into_iter().map(|i| i as u16).collect())
        } else {
            Indices::U32(indices)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Indices::U16(v) => v.len(),
            Indices::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            Indices::U16(v) => Box::new(v.iter().map(|&i| i as u32)),
            Indices::U32(v) => Box::new(v.iter().copied()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub name: String,
    pub format: VertexFormat,
    pub vertices: Vec<Vertex>,
    pub indices: Indices,
}

impl MeshData {
    /// Raw vertex bytes, laid out as described by `format`.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
