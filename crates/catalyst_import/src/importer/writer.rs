use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use catalyst_assets::{AssetDatabase, AssetDocument};
use log::debug;
use uuid::Uuid;

use crate::{error::ImportError, settings::ReimportPolicy};

/// Writes the sub-assets of one import into `<stem>_Data/`.
///
/// File names are unique within an import, so two materials both called
/// `Metal` end up as `Metal.mat` and `Metal_1.mat`. The same model imported
/// twice produces the same names, which is what lets a re-import find the
/// files it wrote last time.
pub struct SubAssetWriter<'a> {
    db: &'a mut dyn AssetDatabase,
    data_dir: PathBuf,
    policy: ReimportPolicy,
    used: HashSet<String>,
}

impl<'a> SubAssetWriter<'a> {
    pub fn new(db: &'a mut dyn AssetDatabase, data_dir: PathBuf, policy: ReimportPolicy) -> Self {
        Self {
            db,
            data_dir,
            policy,
            used: HashSet::new(),
        }
    }

    pub fn db(&self) -> &dyn AssetDatabase {
        &*self.db
    }

    /// Reserves `<name>.<extension>` inside the data directory.
    pub fn reserve(&mut self, name: &str, extension: &str) -> PathBuf {
        let base = sanitize_file_name(name);
        let mut file = format!("{base}.{extension}");
        let mut n = 1;
        while !self.used.insert(file.clone()) {
            file = format!("{base}_{n}.{extension}");
            n += 1;
        }
        self.data_dir.join(file)
    }

    /// Stores `document` at `path` according to the reimport policy and returns its id.
    pub fn persist(&mut self, path: &Path, document: &AssetDocument) -> Result<Uuid, ImportError> {
        let relative = self.db.file_to_relative(path)?;

        if self.policy == ReimportPolicy::KeepExisting && path.exists() {
            let id = match self.db.guid_from_path(path) {
                Some(id) => id,
                None => self.db.refresh(path)?,
            };
            debug!("Keeping existing {} {}", document.kind(), relative.display());
            return Ok(id);
        }

        // Overwrite: the old file and its id go away, hand edits included.
        self.db.remove(&relative)?;
        self.db.write_document(path, document)?;
        let id = self.db.refresh(path)?;
        debug!("Wrote {} {} ({})", document.kind(), relative.display(), id);
        Ok(id)
    }
}

/// Replaces characters file systems reject. Never returns an empty name.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "Unnamed".to_owned()
    } else {
        cleaned.to_owned()
    }
}
