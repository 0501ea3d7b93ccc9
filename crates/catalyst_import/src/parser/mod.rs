use std::path::Path;

use crate::{error::ImportError, scene::Scene};

pub mod gltf_parser;
pub mod obj_parser;

pub use gltf_parser::GltfParser;
pub use obj_parser::ObjParser;

/// Turns a model file into a [`Scene`].
pub trait SceneParser {
    /// Lower-case file extensions handled, without the dot.
    fn extensions(&self) -> &[&str];

    fn parse(&self, path: &Path) -> Result<Scene, ImportError>;

    fn handles(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

/// Name given to a parsed material that a mesh falls back to when the file assigns none.
pub const DEFAULT_MATERIAL_NAME: &str = "DefaultMaterial";
