use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed asset document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a {expected} document, found {found}")]
    WrongDocument {
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{0}' is not inside the asset root")]
    OutsideRoot(PathBuf),

    #[error("no asset registered with id {0}")]
    UnknownAsset(Uuid),
}

impl AssetError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssetError::Io {
            path: path.into(),
            source,
        }
    }
}
