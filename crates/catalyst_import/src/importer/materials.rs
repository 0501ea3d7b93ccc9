use std::path::{Path, PathBuf};

use catalyst_assets::{
    AssetDatabase, AssetDocument, Handle,
    database::normalize_path,
    material::{MAIN_COLOR, MaterialData, STANDARD_SHADER},
};
use glam::Vec4;
use log::{error, warn};

use crate::{
    error::ImportError,
    importer::writer::SubAssetWriter,
    scene::{Material, TextureSlot},
};

/// Name used when neither the material nor any of its textures has one.
pub const FALLBACK_MATERIAL_NAME: &str = "StandardMat";

/// Display name: material name, then texture file stems in slot order.
pub fn material_name(material: &Material) -> String {
    if let Some(name) = material.name.as_deref().filter(|n| !n.trim().is_empty()) {
        return name.to_owned();
    }
    TextureSlot::ALL
        .iter()
        .filter_map(|&slot| material.texture(slot))
        .filter_map(|file| {
            Path::new(&texture_file(file))
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .find(|stem| !stem.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_MATERIAL_NAME.to_owned())
}

// Exporters on Windows write backslashes.
fn texture_file(file: &str) -> String {
    file.replace('\\', "/")
}

/// Builds the material for `material` without touching disk.
pub fn convert_material(db: &dyn AssetDatabase, material: &Material, source_dir: &Path) -> MaterialData {
    let mut data = MaterialData::new(material_name(material), STANDARD_SHADER);
    data.set_color(MAIN_COLOR, material.diffuse_color.unwrap_or(Vec4::ONE).to_array());

    for slot in TextureSlot::ALL {
        let Some(file) = material.texture(slot) else {
            data.set_texture(slot.property(), slot.fallback().handle());
            continue;
        };

        let absolute: PathBuf = normalize_path(&source_dir.join(texture_file(file)));
        if !absolute.exists() {
            warn!(
                "Texture {} not found, using {}",
                absolute.display(),
                slot.fallback().path()
            );
            data.set_texture(slot.property(), slot.fallback().handle());
        } else if let Some(id) = db.guid_from_path(&absolute) {
            data.set_texture(slot.property(), Handle::from_id(id));
        } else {
            // Importing textures from outside the asset database is not supported.
            error!(
                "Texture {} is not a known asset, {} left unbound on '{}'",
                absolute.display(),
                slot.property(),
                data.name
            );
        }
    }
    data
}

/// Converts and persists every material, in order. Returns one handle per material.
pub fn build_materials(
    writer: &mut SubAssetWriter,
    materials: &[Material],
    source_dir: &Path,
) -> Result<Vec<Handle<MaterialData>>, ImportError> {
    let mut handles = Vec::with_capacity(materials.len());
    for material in materials {
        let data = convert_material(writer.db(), material, source_dir);
        let path = writer.reserve(&data.name, "mat");
        let id = writer.persist(&path, &AssetDocument::Material(data))?;
        handles.push(Handle::from_id(id));
    }
    Ok(handles)
}
