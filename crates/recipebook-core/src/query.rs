//! Query layer
//!
//! Filtered and sorted views over the recipe collection. Category lookups
//! use the category index; everything else is a pure filter over a full
//! read, so results always come back in `get_all` order (most recently
//! updated first).

use std::collections::BTreeMap;

use crate::models::{Category, Recipe};
use crate::storage::error::StoreResult;
use crate::storage::records;
use crate::store::RecipeStore;

impl RecipeStore {
    /// Recipes in `category`, most recently updated first
    pub fn get_by_category(&self, category: Category) -> StoreResult<Vec<Recipe>> {
        self.with_connection(|conn| records::fetch_by_category(conn, category))
    }

    /// Recipes marked as favorite
    pub fn get_favorites(&self) -> StoreResult<Vec<Recipe>> {
        let mut recipes = self.get_all()?;
        recipes.retain(|r| r.is_favorite);
        Ok(recipes)
    }

    /// Case-insensitive substring search over title and ingredients
    ///
    /// A blank query returns every recipe.
    pub fn search(&self, query: &str) -> StoreResult<Vec<Recipe>> {
        let needle = normalize_query(query);
        let mut recipes = self.get_all()?;
        if let Some(needle) = needle {
            recipes.retain(|r| matches_needle(r, &needle));
        }
        Ok(recipes)
    }

    /// Apply a combined filter to a full read
    pub fn filter(&self, filter: &RecipeFilter) -> StoreResult<Vec<Recipe>> {
        let mut recipes = self.get_all()?;
        recipes.retain(|r| filter.matches(r));
        Ok(recipes)
    }
}

/// Whether `recipe` matches a free-text query
///
/// The query is trimmed and compared case-insensitively against the title
/// and each ingredient. A blank query matches everything.
pub fn matches_query(recipe: &Recipe, query: &str) -> bool {
    match normalize_query(query) {
        Some(needle) => matches_needle(recipe, &needle),
        None => true,
    }
}

fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn matches_needle(recipe: &Recipe, needle: &str) -> bool {
    recipe.title.to_lowercase().contains(needle)
        || recipe
            .ingredients
            .iter()
            .any(|ingredient| ingredient.to_lowercase().contains(needle))
}

/// Combined favorites / category / text filter
///
/// The default filter matches every recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub query: String,
    pub category: Option<Category>,
    pub favorites_only: bool,
}

impl RecipeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn favorites_only(mut self) -> Self {
        self.favorites_only = true;
        self
    }

    /// True when the filter lets everything through
    pub fn is_empty(&self) -> bool {
        !self.favorites_only && self.category.is_none() && self.query.trim().is_empty()
    }

    pub fn matches(&self, recipe: &Recipe) -> bool {
        if self.favorites_only && !recipe.is_favorite {
            return false;
        }
        if let Some(category) = self.category {
            if recipe.category != category {
                return false;
            }
        }
        matches_query(recipe, &self.query)
    }

    /// Matching recipes from `recipes`, order preserved
    pub fn apply<'a>(&self, recipes: &'a [Recipe]) -> Vec<&'a Recipe> {
        recipes.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Number of favorites in `recipes`
pub fn favorites_count(recipes: &[Recipe]) -> usize {
    recipes.iter().filter(|r| r.is_favorite).count()
}

/// Recipe counts per category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    total: usize,
    by_category: BTreeMap<Category, usize>,
}

impl CategoryCounts {
    pub fn from_recipes(recipes: &[Recipe]) -> Self {
        let mut by_category = BTreeMap::new();
        for recipe in recipes {
            *by_category.entry(recipe.category).or_insert(0) += 1;
        }
        Self {
            total: recipes.len(),
            by_category,
        }
    }

    /// Count across all categories
    pub fn total(&self) -> usize {
        self.total
    }

    /// Count for one category (zero when unused)
    pub fn get(&self, category: Category) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }

    /// Every category with its count, in display order
    pub fn iter(&self) -> impl Iterator<Item = (Category, usize)> + '_ {
        Category::ALL.into_iter().map(|c| (c, self.get(c)))
    }
}
