use std::{
    collections::HashMap,
    ffi::OsString,
    fs,
    path::{Component, Path, PathBuf},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{document::AssetDocument, error::AssetError};

const META_EXTENSION: &str = "meta";

/// What the importer needs from the asset database.
///
/// Paths handed in may be absolute or relative to [`AssetDatabase::root`].
pub trait AssetDatabase {
    fn root(&self) -> &Path;

    /// Id of the asset stored at `path`, if the database knows it.
    fn guid_from_path(&self, path: &Path) -> Option<Uuid>;

    /// Maps a path to its form relative to the asset root.
    fn file_to_relative(&self, path: &Path) -> Result<PathBuf, AssetError>;

    /// Forgets the asset at `relative` and deletes it from disk. Returns whether anything existed.
    fn remove(&mut self, relative: &Path) -> Result<bool, AssetError>;

    fn write_document(&mut self, path: &Path, document: &AssetDocument) -> Result<(), AssetError>;

    /// Registers the file at `path` and returns its id, assigning a new one if it had none.
    fn refresh(&mut self, path: &Path) -> Result<Uuid, AssetError>;

    fn load_document(&self, id: Uuid) -> Result<AssetDocument, AssetError>;
}

/// Sidecar stored next to every asset as `<file>.meta`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetMeta {
    pub guid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importer: Option<serde_json::Value>,
}

impl AssetMeta {
    pub fn read(path: &Path) -> Result<Option<Self>, AssetError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AssetError::io(path, e)),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), AssetError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).map_err(|e| AssetError::io(path, e))
    }
}

pub fn meta_path(asset: &Path) -> PathBuf {
    let mut name = asset.file_name().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(META_EXTENSION);
    asset.with_file_name(name)
}

/// Resolves `.` and `..` without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Asset database backed by a directory tree with `.meta` sidecars.
pub struct FileAssetDatabase {
    root: PathBuf,
    by_id: HashMap<Uuid, PathBuf>,
    by_path: HashMap<PathBuf, Uuid>,
}

impl FileAssetDatabase {
    /// Opens `root` and indexes every sidecar found below it.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AssetError> {
        let root = root.as_ref();
        let root = fs::canonicalize(root).map_err(|e| AssetError::io(root, e))?;

        let mut db = Self {
            root,
            by_id: HashMap::new(),
            by_path: HashMap::new(),
        };
        let root = db.root.clone();
        db.scan(&root)?;
        debug!("Indexed {} assets under {}", db.by_id.len(), db.root.display());
        Ok(db)
    }

    fn scan(&mut self, dir: &Path) -> Result<(), AssetError> {
        let entries = fs::read_dir(dir).map_err(|e| AssetError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| AssetError::io(dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                self.scan(&path)?;
                continue;
            }
            if path.extension().is_none_or(|ext| ext != META_EXTENSION) {
                continue;
            }

            let asset = path.with_extension("");
            if !asset.exists() {
                warn!("Orphaned meta file {}", path.display());
                continue;
            }
            if let Some(meta) = AssetMeta::read(&path)? {
                let relative = self.file_to_relative(&asset)?;
                self.insert(meta.guid, relative);
            }
        }
        Ok(())
    }

    fn insert(&mut self, id: Uuid, relative: PathBuf) {
        if let Some(previous) = self.by_path.insert(relative.clone(), id) {
            self.by_id.remove(&previous);
        }
        self.by_id.insert(id, relative);
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.root.join(path))
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn path_of(&self, id: Uuid) -> Option<PathBuf> {
        self.by_id.get(&id).map(|relative| self.root.join(relative))
    }

    /// Importer settings stored in the sidecar of `asset`, if any.
    pub fn importer_settings(&self, asset: &Path) -> Result<Option<serde_json::Value>, AssetError> {
        let meta = AssetMeta::read(&meta_path(&self.absolute(asset)))?;
        Ok(meta.and_then(|m| m.importer))
    }

    /// Stores importer settings in the sidecar of `asset`, registering it first if needed.
    pub fn set_importer_settings(
        &mut self,
        asset: &Path,
        settings: serde_json::Value,
    ) -> Result<Uuid, AssetError> {
        let guid = self.refresh(asset)?;
        let meta = AssetMeta {
            guid,
            importer: Some(settings),
        };
        meta.write(&meta_path(&self.absolute(asset)))?;
        Ok(guid)
    }
}

impl AssetDatabase for FileAssetDatabase {
    fn root(&self) -> &Path {
        &self.root
    }

    fn guid_from_path(&self, path: &Path) -> Option<Uuid> {
        let relative = self.file_to_relative(path).ok()?;
        self.by_path.get(&relative).copied()
    }

    fn file_to_relative(&self, path: &Path) -> Result<PathBuf, AssetError> {
        let absolute = self.absolute(path);
        absolute
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .map_err(|_| AssetError::OutsideRoot(absolute.clone()))
    }

    fn remove(&mut self, relative: &Path) -> Result<bool, AssetError> {
        let relative = self.file_to_relative(relative)?;
        let absolute = self.root.join(&relative);

        let mut existed = false;
        if let Some(id) = self.by_path.remove(&relative) {
            self.by_id.remove(&id);
            existed = true;
        }
        for file in [absolute.clone(), meta_path(&absolute)] {
            match fs::remove_file(&file) {
                Ok(()) => existed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(AssetError::io(file, e)),
            }
        }
        Ok(existed)
    }

    fn write_document(&mut self, path: &Path, document: &AssetDocument) -> Result<(), AssetError> {
        let absolute = self.absolute(path);
        self.file_to_relative(&absolute)?;
        debug!("Writing {} document {}", document.kind(), absolute.display());
        document.write_to_file(&absolute)
    }

    fn refresh(&mut self, path: &Path) -> Result<Uuid, AssetError> {
        let relative = self.file_to_relative(path)?;
        let absolute = self.root.join(&relative);
        let meta_file = meta_path(&absolute);

        let guid = match AssetMeta::read(&meta_file)? {
            Some(meta) => meta.guid,
            None => {
                let meta = AssetMeta {
                    guid: Uuid::new_v4(),
                    importer: None,
                };
                meta.write(&meta_file)?;
                meta.guid
            }
        };
        self.insert(guid, relative);
        Ok(guid)
    }

    fn load_document(&self, id: Uuid) -> Result<AssetDocument, AssetError> {
        let path = self.path_of(id).ok_or(AssetError::UnknownAsset(id))?;
        AssetDocument::read_from_file(&path)
    }
}
