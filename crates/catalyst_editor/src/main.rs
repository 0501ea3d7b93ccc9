//! Command line front end for the model importer.
//!
//! Usage:
//!   catalyst_editor import <asset-root> <model-file>
//!   catalyst_editor settings <asset-root> <model-file> [settings-json]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use catalyst_assets::FileAssetDatabase;
use catalyst_import::{ModelImportSettings, ModelImporter};
use catalyst_scene::SceneDump;
use clap::{Parser, Subcommand};
use log::debug;

#[derive(Parser)]
#[command(name = "catalyst_editor")]
#[command(about = "Imports models into a catalyst asset folder")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a model and print the entity tree it produced
    Import {
        /// Asset folder the model lives in
        root: PathBuf,
        /// Model file, relative to the asset folder
        model: PathBuf,
    },
    /// Show the importer settings of a model, or merge JSON into them and re-import
    Settings {
        /// Asset folder the model lives in
        root: PathBuf,
        /// Model file, relative to the asset folder
        model: PathBuf,
        /// Fields to change, e.g. '{"unit_scale": 0.01}'
        json: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Import { root, model } => import(&root, &model),
        Command::Settings { root, model, json: None } => show_settings(&root, &model),
        Command::Settings { root, model, json: Some(json) } => store_settings(&root, &model, &json),
    }
}

fn open_database(root: &Path) -> Result<FileAssetDatabase> {
    FileAssetDatabase::open(root)
        .with_context(|| format!("Failed to open asset folder {}", root.display()))
}

/// Settings stored in the model's meta file, or the defaults.
fn load_settings(db: &FileAssetDatabase, model: &Path) -> Result<ModelImportSettings> {
    match db.importer_settings(model)? {
        Some(value) => ModelImportSettings::from_json(value)
            .with_context(|| format!("Bad importer settings for {}", model.display())),
        None => {
            debug!("No importer settings for {}, using defaults", model.display());
            Ok(ModelImportSettings::default())
        }
    }
}

fn run_import(db: &mut FileAssetDatabase, model: &Path, settings: &ModelImportSettings) -> Result<()> {
    let imported = ModelImporter::new()
        .import(db, model, settings)
        .with_context(|| format!("Failed to import {}", model.display()))?;

    print!("{}", SceneDump(imported.root_entity()));
    for name in &imported.skipped_meshes {
        println!("skipped mesh: {name}");
    }
    println!("sub-assets: {}", imported.data_dir.display());
    Ok(())
}

fn import(root: &Path, model: &Path) -> Result<()> {
    let mut db = open_database(root)?;
    let settings = load_settings(&db, model)?;
    run_import(&mut db, model, &settings)
}

fn show_settings(root: &Path, model: &Path) -> Result<()> {
    let db = open_database(root)?;
    let settings = load_settings(&db, model)?;
    println!("{}", serde_json::to_string_pretty(&settings.to_json()?)?);
    Ok(())
}

/// Merges `json` over the current settings, writes them to the meta file and
/// re-imports the model with them.
fn store_settings(root: &Path, model: &Path, json: &str) -> Result<()> {
    let mut db = open_database(root)?;

    let mut merged = load_settings(&db, model)?.to_json()?;
    let patch: serde_json::Value = serde_json::from_str(json).context("Settings are not valid JSON")?;
    if let (Some(target), serde_json::Value::Object(fields)) = (merged.as_object_mut(), patch) {
        target.extend(fields);
    }
    let settings = ModelImportSettings::from_json(merged)?;

    db.set_importer_settings(model, settings.to_json()?)?;
    println!("{}", serde_json::to_string_pretty(&settings.to_json()?)?);
    run_import(&mut db, model, &settings)
}
