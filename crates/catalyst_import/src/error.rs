use std::path::{Path, PathBuf};

use catalyst_assets::AssetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Format Not Supported: {0}")]
    UnsupportedFormat(String),

    #[error("failed to parse '{path}': {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    #[error("Model has no Meshes.")]
    NoMeshes,

    #[error("bone '{bone}' of mesh '{mesh}' does not name a node of the model")]
    UnknownBone { mesh: String, bone: String },

    #[error("bone '{bone}' maps to node {index}, past the 255 bones a vertex can address")]
    BoneIndexOverflow { bone: String, index: usize },

    #[error("invalid importer settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ImportError {
    pub fn parse(path: &Path, reason: impl ToString) -> Self {
        ImportError::ParseFailed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
