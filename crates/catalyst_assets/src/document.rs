use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{error::AssetError, material::MaterialData, mesh::MeshData};

/// On-disk form of a sub-asset. The `type` tag decides how the body is read back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssetDocument {
    Mesh(MeshData),
    Material(MaterialData),
}

impl AssetDocument {
    pub fn kind(&self) -> &'static str {
        match self {
            AssetDocument::Mesh(_) => "Mesh",
            AssetDocument::Material(_) => "Material",
        }
    }

    pub fn to_json(&self) -> Result<String, AssetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, AssetError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), AssetError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
        }
        fs::write(path, self.to_json()?).map_err(|e| AssetError::io(path, e))
    }

    pub fn read_from_file(path: &Path) -> Result<Self, AssetError> {
        let text = fs::read_to_string(path).map_err(|e| AssetError::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn into_mesh(self) -> Result<MeshData, AssetError> {
        match self {
            AssetDocument::Mesh(mesh) => Ok(mesh),
            other => Err(AssetError::WrongDocument {
                expected: "Mesh",
                found: other.kind(),
            }),
        }
    }

    pub fn into_material(self) -> Result<MaterialData, AssetError> {
        match self {
            AssetDocument::Material(material) => Ok(material),
            other => Err(AssetError::WrongDocument {
                expected: "Material",
                found: other.kind(),
            }),
        }
    }
}
