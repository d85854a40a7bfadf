//! Recipe store
//!
//! The `RecipeStore` is the single writer of the recipe collection. It
//! assigns identifiers and timestamps, and every other layer (queries,
//! import/export, the catalog) goes through it.
//!
//! ## Connection
//!
//! The store owns one SQLite connection which is opened on first use and
//! cached. Operations hold it exclusively while they run, so they are
//! linearized; share the store between threads with `Arc<RecipeStore>`.
//! The API is blocking; from async code run calls on a blocking thread.
//!
//! ## Usage
//!
//! ```ignore
//! let store = RecipeStore::open()?;
//!
//! let soup = store.add(NewRecipe::new("Tomato soup", Category::Soup))?;
//! store.toggle_favorite(&soup.id)?;
//!
//! let recent = store.get_all()?;
//! ```

use std::cmp;

use anyhow::Context;
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{now_millis, NewRecipe, Recipe, RecipePatch};
use crate::storage::connection::{ConnectionHandle, StorageLocation};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::records;

/// Durable recipe collection
pub struct RecipeStore {
    handle: ConnectionHandle,
}

impl RecipeStore {
    /// Open the store at the configured location
    ///
    /// The database itself is opened lazily by the first operation.
    pub fn open() -> anyhow::Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Ok(Self::open_with_config(&config))
    }

    /// Open the store with a specific configuration
    pub fn open_with_config(config: &Config) -> Self {
        Self::with_location(StorageLocation::File(config.database_path()))
    }

    /// A store backed by a private in-memory database
    pub fn in_memory() -> Self {
        Self::with_location(StorageLocation::Memory)
    }

    pub fn with_location(location: StorageLocation) -> Self {
        Self {
            handle: ConnectionHandle::new(location),
        }
    }

    pub fn location(&self) -> &StorageLocation {
        self.handle.location()
    }

    /// Whether the underlying connection is currently open
    pub fn is_connected(&self) -> bool {
        self.handle.is_open()
    }

    /// Close the cached connection; the next operation reopens it
    ///
    /// For an in-memory store this discards all recipes.
    pub fn reset(&self) -> StoreResult<()> {
        self.handle.reset()
    }

    /// Close the connection and delete the database file
    pub fn destroy(&self) -> StoreResult<()> {
        self.handle.reset()?;

        if let Some(path) = self.handle.location().path() {
            match std::fs::remove_file(path) {
                Ok(()) => info!("Deleted recipe database {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::from_io(e, path.to_path_buf())),
            }
        }
        Ok(())
    }

    // ==================== Record Operations ====================

    /// Add a new recipe, assigning its id and timestamps
    pub fn add(&self, new: NewRecipe) -> StoreResult<Recipe> {
        new.validate().map_err(StoreError::InvalidRecipe)?;

        let now = now_millis();
        let recipe = Recipe::from_new(generate_id(), new, now, now);

        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            records::insert_recipe(&tx, &recipe)?;
            tx.commit()?;
            Ok(())
        })?;

        debug!(id = %recipe.id, title = %recipe.title, "Added recipe");
        Ok(recipe)
    }

    /// Get every recipe, most recently updated first
    pub fn get_all(&self) -> StoreResult<Vec<Recipe>> {
        self.with_connection(|conn| records::fetch_all(conn))
    }

    /// Get a recipe by id
    ///
    /// A missing id is `Ok(None)`, not an error.
    pub fn get(&self, id: &str) -> StoreResult<Option<Recipe>> {
        self.with_connection(|conn| records::fetch_one(conn, id))
    }

    /// Apply partial changes to a recipe and return the updated record
    ///
    /// The id and creation time never change; `updated_at` never moves
    /// backwards.
    pub fn update(&self, id: &str, patch: RecipePatch) -> StoreResult<Recipe> {
        patch.validate().map_err(StoreError::InvalidRecipe)?;
        self.update_with(id, |_| patch)
    }

    /// Delete a recipe. Deleting a missing id succeeds.
    pub fn delete(&self, id: &str) -> StoreResult<()> {
        let removed = self.with_connection(|conn| records::delete_recipe(conn, id))?;
        debug!(id, removed, "Deleted recipe");
        Ok(())
    }

    /// Flip the favorite flag
    pub fn toggle_favorite(&self, id: &str) -> StoreResult<Recipe> {
        self.update_with(id, |current| {
            RecipePatch::new().with_favorite(!current.is_favorite)
        })
    }

    /// Number of stored recipes
    pub fn count(&self) -> StoreResult<usize> {
        self.with_connection(|conn| records::count(conn))
    }

    /// Remove every recipe, returning how many were removed
    pub fn clear(&self) -> StoreResult<usize> {
        let removed = self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let removed = records::clear_all(&tx)?;
            tx.commit()?;
            Ok(removed)
        })?;
        info!(removed, "Cleared recipe collection");
        Ok(removed)
    }

    // ==================== Internals ====================

    /// Run `f` against the store's connection
    pub(crate) fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.handle.with_connection(f)
    }

    /// Read-modify-write under one transaction
    fn update_with(
        &self,
        id: &str,
        make_patch: impl FnOnce(&Recipe) -> RecipePatch,
    ) -> StoreResult<Recipe> {
        let updated = self.with_connection(|conn| {
            let tx = conn.transaction()?;

            let mut recipe =
                records::fetch_one(&tx, id)?.ok_or_else(|| StoreError::not_found(id))?;

            let patch = make_patch(&recipe);
            recipe.apply(patch);
            recipe.updated_at = cmp::max(now_millis(), recipe.updated_at);

            if !records::replace_recipe(&tx, &recipe)? {
                return Err(StoreError::not_found(id));
            }
            tx.commit()?;
            Ok(recipe)
        })?;

        debug!(id = %updated.id, "Updated recipe");
        Ok(updated)
    }
}

/// Generate a new recipe id
///
/// Millisecond timestamp plus 48 random bits, so ids created within the
/// same millisecond still differ.
pub fn generate_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &random[..12])
}
