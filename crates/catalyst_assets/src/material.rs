use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::Handle;

/// Marker for texture handles. Materials only ever reference textures by id.
#[derive(Debug)]
pub enum Texture2D {}

/// Marker for shader handles.
#[derive(Debug)]
pub enum Shader {}

pub const MAIN_COLOR: &str = "_MainColor";
pub const MAIN_TEX: &str = "_MainTex";
pub const NORMAL_TEX: &str = "_NormalTex";
pub const SURFACE_TEX: &str = "_SurfaceTex";
pub const EMISSION_TEX: &str = "_EmissionTex";

pub const STANDARD_SHADER: Handle<Shader> =
    Handle::from_id(Uuid::from_u128(0x5d1c_0a7e_0000_4000_8000_0000_0000_0001));

/// Textures shipped with the engine, used when a model does not provide its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinTexture {
    Grid,
    FlatNormal,
    FlatSurface,
    Black,
}

impl BuiltinTexture {
    pub fn path(self) -> &'static str {
        match self {
            BuiltinTexture::Grid => "Defaults/grid.png",
            BuiltinTexture::FlatNormal => "Defaults/default_normal.png",
            BuiltinTexture::FlatSurface => "Defaults/default_surface.png",
            BuiltinTexture::Black => "Defaults/default_emission.png",
        }
    }

    pub fn handle(self) -> Handle<Texture2D> {
        let low = match self {
            BuiltinTexture::Grid => 1,
            BuiltinTexture::FlatNormal => 2,
            BuiltinTexture::FlatSurface => 3,
            BuiltinTexture::Black => 4,
        };
        Handle::from_id(Uuid::from_u128(0x7e47_0000_0000_4000_8000_0000_0000_0000 | low))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MaterialProperty {
    Color([f32; 4]),
    Texture(Handle<Texture2D>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialData {
    pub name: String,
    pub shader: Handle<Shader>,
    pub properties: BTreeMap<String, MaterialProperty>,
}

impl MaterialData {
    pub fn new(name: impl Into<String>, shader: Handle<Shader>) -> Self {
        Self {
            name: name.into(),
            shader,
            properties: BTreeMap::new(),
        }
    }

    pub fn set_color(&mut self, slot: &str, color: [f32; 4]) {
        self.properties
            .insert(slot.to_owned(), MaterialProperty::Color(color));
    }

    pub fn set_texture(&mut self, slot: &str, texture: Handle<Texture2D>) {
        self.properties
            .insert(slot.to_owned(), MaterialProperty::Texture(texture));
    }

    pub fn color(&self, slot: &str) -> Option<[f32; 4]> {
        match self.properties.get(slot) {
            Some(MaterialProperty::Color(c)) => Some(*c),
            _ => None,
        }
    }

    pub fn texture(&self, slot: &str) -> Option<Handle<Texture2D>> {
        match self.properties.get(slot) {
            Some(MaterialProperty::Texture(t)) => Some(*t),
            _ => None,
        }
    }
}
