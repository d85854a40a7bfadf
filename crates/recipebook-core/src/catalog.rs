//! Cached view of the recipe collection for front ends
//!
//! `RecipeCatalog` keeps an in-memory copy of the collection, routes every
//! mutation through the [`RecipeStore`] and patches its copy from the
//! record the store returns, so a mutation never needs a full re-read.
//! It also tracks load state and the active filter, and publishes a
//! [`CatalogEvent`] after each change.
//!
//! ```ignore
//! let store = Arc::new(RecipeStore::open()?);
//! let mut catalog = RecipeCatalog::new(store);
//! let mut events = catalog.subscribe();
//!
//! catalog.load();
//! catalog.set_query("soup");
//! for recipe in catalog.filtered() {
//!     println!("{} {}", recipe.category.icon(), recipe.title);
//! }
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::{Category, NewRecipe, Recipe, RecipePatch};
use crate::query::{favorites_count, CategoryCounts, RecipeFilter};
use crate::storage::error::StoreResult;
use crate::store::RecipeStore;
use crate::transfer::ImportMode;

const EVENT_CAPACITY: usize = 64;

/// Where the catalog is in loading the collection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// `load` has not been called
    #[default]
    Idle,
    Ready,
    /// The last load failed; the message is meant for display
    Failed(String),
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Change notifications published by the catalog
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEvent {
    /// The cached copy was (re)read from the store
    Loaded { count: usize },
    Added(Recipe),
    Updated(Recipe),
    Deleted { id: String },
    /// An import finished and the catalog reloaded
    Imported { mode: ImportMode, count: usize },
    LoadFailed { message: String },
}

/// In-memory view over a shared [`RecipeStore`]
pub struct RecipeCatalog {
    store: Arc<RecipeStore>,
    recipes: Vec<Recipe>,
    state: LoadState,
    filter: RecipeFilter,
    events: broadcast::Sender<CatalogEvent>,
}

impl RecipeCatalog {
    pub fn new(store: Arc<RecipeStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            recipes: Vec::new(),
            state: LoadState::Idle,
            filter: RecipeFilter::default(),
            events,
        }
    }

    /// Receive events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<RecipeStore> {
        &self.store
    }

    // ==================== Loading ====================

    /// Read the whole collection from the store
    ///
    /// On failure the previous cached copy is kept and the state becomes
    /// [`LoadState::Failed`]; calling `load` again retries.
    pub fn load(&mut self) -> &LoadState {
        match self.store.get_all() {
            Ok(recipes) => {
                let count = recipes.len();
                self.recipes = recipes;
                self.state = LoadState::Ready;
                debug!(count, "Catalog loaded");
                self.publish(CatalogEvent::Loaded { count });
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "Catalog load failed");
                self.state = LoadState::Failed(message.clone());
                self.publish(CatalogEvent::LoadFailed { message });
            }
        }
        &self.state
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Cached recipes, most recently updated first
    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    // ==================== Mutations ====================

    pub fn add(&mut self, new: NewRecipe) -> StoreResult<Recipe> {
        let recipe = self.store.add(new)?;
        self.reconcile(&recipe);
        self.publish(CatalogEvent::Added(recipe.clone()));
        Ok(recipe)
    }

    pub fn update(&mut self, id: &str, patch: RecipePatch) -> StoreResult<Recipe> {
        let recipe = self.store.update(id, patch)?;
        self.reconcile(&recipe);
        self.publish(CatalogEvent::Updated(recipe.clone()));
        Ok(recipe)
    }

    pub fn toggle_favorite(&mut self, id: &str) -> StoreResult<Recipe> {
        let recipe = self.store.toggle_favorite(id)?;
        self.reconcile(&recipe);
        self.publish(CatalogEvent::Updated(recipe.clone()));
        Ok(recipe)
    }

    pub fn delete(&mut self, id: &str) -> StoreResult<()> {
        self.store.delete(id)?;
        self.recipes.retain(|r| r.id != id);
        self.publish(CatalogEvent::Deleted { id: id.to_string() });
        Ok(())
    }

    // ==================== Transfer ====================

    pub fn export_snapshot(&self) -> StoreResult<String> {
        self.store.export()
    }

    /// Import a payload and reload the cached copy
    ///
    /// The import itself is committed once this returns `Ok`. If the
    /// reload afterwards fails, the state is [`LoadState::Failed`], the
    /// cached copy is stale and only `LoadFailed` is published; call
    /// [`load`](Self::load) to retry.
    pub fn import_snapshot(&mut self, payload: &str, mode: ImportMode) -> StoreResult<usize> {
        let count = self.store.import(payload, mode)?;
        if self.load().is_ready() {
            self.publish(CatalogEvent::Imported { mode, count });
        }
        Ok(count)
    }

    // ==================== Filtering ====================

    pub fn filter(&self) -> &RecipeFilter {
        &self.filter
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.filter.query = query.into();
    }

    /// Restrict to one category, or `None` for all
    pub fn set_category(&mut self, category: Option<Category>) {
        self.filter.category = category;
    }

    pub fn set_favorites_only(&mut self, favorites_only: bool) {
        self.filter.favorites_only = favorites_only;
    }

    pub fn clear_filters(&mut self) {
        self.filter = RecipeFilter::default();
    }

    /// Cached recipes matching the active filter
    pub fn filtered(&self) -> Vec<&Recipe> {
        self.filter.apply(&self.recipes)
    }

    pub fn favorites_count(&self) -> usize {
        favorites_count(&self.recipes)
    }

    pub fn category_counts(&self) -> CategoryCounts {
        CategoryCounts::from_recipes(&self.recipes)
    }

    // ==================== Internals ====================

    /// Replace the cached copy of `recipe` at its position in `get_all` order
    fn reconcile(&mut self, recipe: &Recipe) {
        self.recipes.retain(|r| r.id != recipe.id);
        let index = self
            .recipes
            .partition_point(|r| most_recent_first(r, recipe) == Ordering::Less);
        self.recipes.insert(index, recipe.clone());
    }

    fn publish(&self, event: CatalogEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }
}

/// Sort order of the store: updated desc, then created desc, then id
fn most_recent_first(a: &Recipe, b: &Recipe) -> Ordering {
    b.updated_at
        .cmp(&a.updated_at)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::error::ErrorKind;
    use tempfile::TempDir;
    use tokio::sync::broadcast::error::TryRecvError;

    fn catalog() -> RecipeCatalog {
        let mut catalog = RecipeCatalog::new(Arc::new(RecipeStore::in_memory()));
        catalog.load();
        catalog
    }

    fn drain(rx: &mut broadcast::Receiver<CatalogEvent>) -> Vec<CatalogEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => return events,
                Err(e) => panic!("unexpected receive error: {e}"),
            }
        }
    }

    #[test]
    fn test_initial_state() {
        let catalog = RecipeCatalog::new(Arc::new(RecipeStore::in_memory()));
        assert_eq!(catalog.state(), &LoadState::Idle);
        assert!(catalog.recipes().is_empty());
    }

    #[test]
    fn test_load_reads_existing_records() {
        let store = Arc::new(RecipeStore::in_memory());
        store
            .add(NewRecipe::new("Tomato soup", Category::Soup))
            .unwrap();

        let mut catalog = RecipeCatalog::new(store);
        assert!(catalog.load().is_ready());
        assert_eq!(catalog.recipes().len(), 1);
    }

    #[test]
    fn test_mutations_reconcile_cache() {
        let mut catalog = catalog();

        let first = catalog
            .add(NewRecipe::new("Pancakes", Category::Breakfast))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = catalog
            .add(NewRecipe::new("Lemonade", Category::Drink))
            .unwrap();
        assert_eq!(catalog.recipes()[0].id, second.id);

        std::thread::sleep(std::time::Duration::from_millis(5));
        let toggled = catalog.toggle_favorite(&first.id).unwrap();
        assert!(toggled.is_favorite);
        assert_eq!(catalog.recipes()[0], toggled);

        let renamed = catalog
            .update(&second.id, RecipePatch::new().with_title("Fresh lemonade"))
            .unwrap();
        assert_eq!(catalog.get(&second.id), Some(&renamed));

        catalog.delete(&first.id).unwrap();
        assert!(catalog.get(&first.id).is_none());

        // Cached copy agrees with a fresh read
        assert_eq!(catalog.recipes(), catalog.store().get_all().unwrap().as_slice());
    }

    #[test]
    fn test_failed_mutation_leaves_cache_alone() {
        let mut catalog = catalog();
        catalog
            .add(NewRecipe::new("Pancakes", Category::Breakfast))
            .unwrap();
        let before = catalog.recipes().to_vec();

        let err = catalog.toggle_favorite("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = catalog.add(NewRecipe::new("", Category::Other)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert_eq!(catalog.recipes(), before.as_slice());
    }

    #[test]
    fn test_events_published() {
        let mut catalog = catalog();
        let mut rx = catalog.subscribe();

        let recipe = catalog
            .add(NewRecipe::new("Pancakes", Category::Breakfast))
            .unwrap();
        let toggled = catalog.toggle_favorite(&recipe.id).unwrap();
        catalog.delete(&recipe.id).unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                CatalogEvent::Added(recipe.clone()),
                CatalogEvent::Updated(toggled),
                CatalogEvent::Deleted { id: recipe.id },
            ]
        );
    }

    #[test]
    fn test_import_snapshot_reloads() {
        let mut source = catalog();
        source
            .add(NewRecipe::new("Apple Pie", Category::Dessert).with_favorite(true))
            .unwrap();
        let payload = source.export_snapshot().unwrap();

        let mut target = catalog();
        target.add(NewRecipe::new("Salad", Category::Salad)).unwrap();
        let mut rx = target.subscribe();

        let count = target.import_snapshot(&payload, ImportMode::Merge).unwrap();
        assert_eq!(count, 1);
        assert_eq!(target.recipes().len(), 2);
        assert_eq!(target.favorites_count(), 1);

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                CatalogEvent::Loaded { count: 2 },
                CatalogEvent::Imported {
                    mode: ImportMode::Merge,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_cache_follows_store_order_with_future_dated_records() {
        let mut catalog = catalog();
        let payload = r#"{"recipes": [
            {"id": "F", "title": "Future", "category": "dessert", "createdAt": "2999-01-01T00:00:00Z"}
        ]}"#;
        catalog.import_snapshot(payload, ImportMode::Replace).unwrap();

        let now = catalog.add(NewRecipe::new("Now", Category::Snack)).unwrap();
        let fresh = catalog.store().get_all().unwrap();
        assert_eq!(catalog.recipes(), fresh.as_slice());
        assert_eq!(catalog.recipes()[0].id, "F");

        catalog.toggle_favorite(&now.id).unwrap();
        catalog.toggle_favorite("F").unwrap();
        assert_eq!(catalog.recipes(), catalog.store().get_all().unwrap().as_slice());
    }

    #[test]
    fn test_import_with_failed_reload_skips_imported_event() {
        let mut catalog = catalog();
        // A stored row whose timestamp cannot be read back
        catalog
            .store()
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO recipes (id, title, category, created_at, updated_at) \
                     VALUES ('bad', 'Bad', 'soep', 0, 9223372036854775807)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        let mut rx = catalog.subscribe();

        let payload = r#"{"recipes": [{"title": "Soup", "category": "soep", "createdAt": "2024-01-01T00:00:00Z"}]}"#;
        let count = catalog.import_snapshot(payload, ImportMode::Merge).unwrap();
        assert_eq!(count, 1);
        assert!(catalog.state().error().is_some());

        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [CatalogEvent::LoadFailed { .. }]));
    }

    #[test]
    fn test_rejected_import_keeps_cache() {
        let mut catalog = catalog();
        catalog.add(NewRecipe::new("Salad", Category::Salad)).unwrap();

        let err = catalog
            .import_snapshot("{\"recipes\": 5}", ImportMode::Replace)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(catalog.recipes().len(), 1);
    }

    #[test]
    fn test_filters() {
        let mut catalog = catalog();
        catalog
            .add(
                NewRecipe::new("Chicken Curry", Category::MainCourse)
                    .with_ingredients(["Chicken", "Curry Paste"]),
            )
            .unwrap();
        catalog
            .add(NewRecipe::new("Caesar Salad", Category::Salad).with_ingredients(["Chicken"]))
            .unwrap();
        let pie = catalog
            .add(NewRecipe::new("Apple Pie", Category::Dessert))
            .unwrap();
        catalog.toggle_favorite(&pie.id).unwrap();

        catalog.set_query("chicken");
        assert_eq!(catalog.filtered().len(), 2);

        catalog.set_category(Some(Category::Salad));
        let titles: Vec<_> = catalog.filtered().iter().map(|r| r.title.clone()).collect();
        assert_eq!(titles, vec!["Caesar Salad"]);

        catalog.clear_filters();
        catalog.set_favorites_only(true);
        assert_eq!(catalog.filtered().len(), 1);

        catalog.clear_filters();
        assert!(catalog.filter().is_empty());
        assert_eq!(catalog.filtered().len(), 3);

        let counts = catalog.category_counts();
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.get(Category::Dessert), 1);
        assert_eq!(catalog.favorites_count(), 1);
    }

    #[test]
    fn test_load_failure_then_retry() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the data directory should be
        let blocker = temp_dir.path().join("blocked");
        std::fs::write(&blocker, b"").unwrap();
        let config = Config::with_data_dir(blocker.join("data"));

        let mut catalog = RecipeCatalog::new(Arc::new(RecipeStore::open_with_config(&config)));
        let mut rx = catalog.subscribe();

        let state = catalog.load().clone();
        assert!(state.error().is_some());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [CatalogEvent::LoadFailed { .. }]
        ));

        std::fs::remove_file(&blocker).unwrap();
        assert!(catalog.load().is_ready());
        assert!(catalog.recipes().is_empty());
    }
}
