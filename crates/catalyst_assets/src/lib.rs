pub mod assets;
pub mod database;
pub mod document;
mod error;
pub mod material;
pub mod mesh;

pub use assets::Handle;
pub use database::{AssetDatabase, AssetMeta, FileAssetDatabase};
pub use document::AssetDocument;
pub use error::AssetError;
