//! Export and import of the recipe collection
//!
//! The export payload is pretty-printed JSON:
//!
//! ```text
//! { "version": 1, "exportDate": "2024-05-01T09:30:00.123Z", "recipes": [ ... ] }
//! ```
//!
//! Each recipe carries every field, photos included, with ISO-8601
//! timestamps. Import accepts the same shape in one of two modes:
//!
//! - [`ImportMode::Replace`] discards the current collection and restores
//!   the incoming records with their original ids and creation times.
//! - [`ImportMode::Merge`] keeps the current collection and adds the
//!   incoming records under fresh ids.
//!
//! ## Failure policy
//!
//! Every incoming record is parsed and validated before storage is
//! touched. The first invalid record aborts the import with a format error
//! naming its position, and nothing is written. The writes themselves run
//! in one transaction, so readers see either the old collection or the
//! complete new one.

use std::cmp;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{now_millis, nullable_list, Category, NewRecipe, Recipe};
use crate::storage::backup;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::records;
use crate::store::{generate_id, RecipeStore};

/// Payload format version written by [`RecipeStore::export`]
pub const EXPORT_VERSION: u64 = 1;

/// How imported records are combined with the existing collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Clear the collection first and keep incoming ids
    Replace,
    /// Keep existing records and give incoming ones fresh ids
    #[default]
    Merge,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Replace => write!(f, "replace"),
            ImportMode::Merge => write!(f, "merge"),
        }
    }
}

impl FromStr for ImportMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(ImportMode::Replace),
            "merge" => Ok(ImportMode::Merge),
            other => Err(StoreError::format(format!("unknown import mode '{}'", other))),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportPayload<'a> {
    version: u64,
    export_date: DateTime<Utc>,
    recipes: &'a [Recipe],
}

/// One incoming record as found in a payload
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipeSnapshot {
    #[serde(default)]
    id: Option<String>,
    title: String,
    category: Category,
    #[serde(default, deserialize_with = "nullable_list")]
    ingredients: Vec<String>,
    #[serde(default)]
    instructions: Option<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    photos: Vec<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    is_favorite: bool,
    #[serde(default)]
    servings: Option<u32>,
    #[serde(default)]
    cook_time: Option<u32>,
    #[serde(default)]
    notes: Option<String>,
    created_at: String,
}

/// A snapshot that passed validation
struct ValidSnapshot {
    id: Option<String>,
    created_at: DateTime<Utc>,
    recipe: NewRecipe,
}

impl RecipeStore {
    /// Serialize the whole collection
    pub fn export(&self) -> StoreResult<String> {
        let recipes = self.get_all()?;
        let payload = ExportPayload {
            version: EXPORT_VERSION,
            export_date: now_millis(),
            recipes: &recipes,
        };
        let json = serde_json::to_string_pretty(&payload)?;

        info!(count = recipes.len(), "Exported recipes");
        Ok(json)
    }

    /// Restore records from an export payload
    ///
    /// Returns the number of records inserted.
    pub fn import(&self, payload: &str, mode: ImportMode) -> StoreResult<usize> {
        let snapshots = parse_payload(payload).inspect_err(|e| {
            warn!(%mode, error = %e, "Rejected recipe import");
        })?;

        let now = now_millis();
        let recipes = build_records(snapshots, mode, now)?;

        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            if mode == ImportMode::Replace {
                records::clear_all(&tx)?;
            }
            for recipe in &recipes {
                records::insert_recipe(&tx, recipe)?;
            }
            tx.commit()?;
            Ok(())
        })?;

        info!(%mode, count = recipes.len(), "Imported recipes");
        Ok(recipes.len())
    }

    /// Export into a dated backup file in `dir`, returning its path
    pub fn export_to_dir(&self, dir: &Path) -> StoreResult<PathBuf> {
        let contents = self.export()?;
        let path = backup::write_backup(dir, &contents, Utc::now())?;
        info!("Wrote recipe backup to {:?}", path);
        Ok(path)
    }

    /// Export into the configured backup directory
    pub fn export_backup(&self, config: &Config) -> StoreResult<PathBuf> {
        self.export_to_dir(&config.backup_dir())
    }

    /// Import a backup file
    pub fn import_from_file(&self, path: &Path, mode: ImportMode) -> StoreResult<usize> {
        let contents = backup::read_backup(path)?;
        self.import(&contents, mode)
    }
}

/// Parse and validate every record in a payload
fn parse_payload(payload: &str) -> StoreResult<Vec<ValidSnapshot>> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| StoreError::format(format!("invalid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| StoreError::format("payload must be a JSON object"))?;

    if let Some(version) = object.get("version") {
        if version.as_u64() != Some(EXPORT_VERSION) {
            return Err(StoreError::format(format!(
                "unsupported version {} (expected {})",
                version, EXPORT_VERSION
            )));
        }
    }

    let entries = object
        .get("recipes")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::format("missing 'recipes' collection"))?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_snapshot(index, entry))
        .collect()
}

fn parse_snapshot(index: usize, entry: &Value) -> StoreResult<ValidSnapshot> {
    let record_error = |details: String| StoreError::format(format!("record {}: {}", index, details));

    let snapshot = RecipeSnapshot::deserialize(entry).map_err(|e| record_error(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&snapshot.created_at)
        .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(3))
        .map_err(|e| record_error(format!("invalid createdAt '{}': {}", snapshot.created_at, e)))?;

    let recipe = NewRecipe {
        title: snapshot.title,
        category: snapshot.category,
        ingredients: snapshot.ingredients,
        instructions: snapshot.instructions,
        photos: snapshot.photos,
        source_url: snapshot.source_url,
        is_favorite: snapshot.is_favorite,
        servings: snapshot.servings,
        cook_time: snapshot.cook_time,
        notes: snapshot.notes,
    };
    recipe.validate().map_err(record_error)?;

    Ok(ValidSnapshot {
        id: snapshot.id.filter(|id| !id.trim().is_empty()),
        created_at,
        recipe,
    })
}

/// Assign ids and timestamps according to the import mode
fn build_records(
    snapshots: Vec<ValidSnapshot>,
    mode: ImportMode,
    now: DateTime<Utc>,
) -> StoreResult<Vec<Recipe>> {
    let mut seen = HashSet::new();

    snapshots
        .into_iter()
        .enumerate()
        .map(|(index, snapshot)| {
            let id = match (mode, snapshot.id) {
                (ImportMode::Replace, Some(id)) => {
                    if !seen.insert(id.clone()) {
                        return Err(StoreError::format(format!(
                            "record {}: duplicate id '{}'",
                            index, id
                        )));
                    }
                    id
                }
                _ => generate_id(),
            };
            let updated_at = cmp::max(now, snapshot.created_at);
            Ok(Recipe::from_new(
                id,
                snapshot.recipe,
                snapshot.created_at,
                updated_at,
            ))
        })
        .collect()
}
