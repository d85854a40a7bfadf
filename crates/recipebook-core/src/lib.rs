//! Recipebook Core Library
//!
//! This crate provides the core functionality for Recipebook, a personal
//! recipe catalog: durable recipe records, search and filtering, and JSON
//! export/import for backup and moving between devices.
//!
//! # Architecture
//!
//! - **SQLite**: Single source of truth for the collection, one file in the
//!   data directory
//! - **RecipeStore**: The only writer; assigns ids and timestamps
//! - **RecipeCatalog**: Cached view for front ends, publishes change events
//!
//! # Quick Start
//!
//! ```text
//! let store = RecipeStore::open()?;
//!
//! // Add a recipe
//! let soup = store.add(
//!     NewRecipe::new("Tomato soup", Category::Soup)
//!         .with_ingredient_lines("4 tomatoes\n1 onion"),
//! )?;
//!
//! // Query recipes
//! let matches = store.search("tomato")?;
//!
//! // Back up
//! let path = store.export_backup(&Config::load()?)?;
//! ```
//!
//! # Modules
//!
//! - `store`: Record operations (main entry point)
//! - `query`: Search, category and favorite views
//! - `transfer`: Export and import
//! - `catalog`: Cached view with change events
//! - `models`: Recipe records and categories
//! - `storage`: SQLite schema, connection and backup files
//! - `config`: Application configuration
//! - `logging`: File logging setup

pub mod catalog;
pub mod config;
pub mod logging;
pub mod models;
pub mod query;
pub mod storage;
pub mod store;
pub mod transfer;

pub use catalog::{CatalogEvent, LoadState, RecipeCatalog};
pub use config::Config;
pub use logging::init_logging;
pub use models::{parse_ingredient_lines, Category, NewRecipe, Recipe, RecipePatch};
pub use query::{CategoryCounts, RecipeFilter};
pub use storage::{ErrorKind, StorageLocation, StoreError, StoreResult};
pub use store::RecipeStore;
pub use transfer::{ImportMode, EXPORT_VERSION};
