pub mod error;
pub mod importer;
pub mod parser;
pub mod postprocess;
pub mod scene;
pub mod settings;

pub use error::ImportError;
pub use importer::{ImportNotifier, ImportedModel, LogNotifier, ModelImporter};
pub use parser::SceneParser;
pub use settings::{BoneWeightMode, ModelImportSettings, ReimportPolicy};
