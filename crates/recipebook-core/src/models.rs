//! Data models for recipebook
//!
//! Defines the recipe record, its fixed category set, and the input types
//! used to create (`NewRecipe`) and partially modify (`RecipePatch`) records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Recipe category
///
/// Serialized with the wire values used by existing backups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "hoofdgerecht")]
    MainCourse,
    #[serde(rename = "voorgerecht")]
    Starter,
    #[serde(rename = "dessert")]
    Dessert,
    #[serde(rename = "bijgerecht")]
    SideDish,
    #[serde(rename = "snack")]
    Snack,
    #[serde(rename = "drank")]
    Drink,
    #[serde(rename = "soep")]
    Soup,
    #[serde(rename = "salade")]
    Salad,
    #[serde(rename = "ontbijt")]
    Breakfast,
    #[serde(rename = "anders")]
    Other,
}

impl Category {
    /// Every category, in display order
    pub const ALL: [Category; 10] = [
        Category::MainCourse,
        Category::Starter,
        Category::Dessert,
        Category::SideDish,
        Category::Snack,
        Category::Drink,
        Category::Soup,
        Category::Salad,
        Category::Breakfast,
        Category::Other,
    ];

    /// The stored/serialized value
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MainCourse => "hoofdgerecht",
            Category::Starter => "voorgerecht",
            Category::Dessert => "dessert",
            Category::SideDish => "bijgerecht",
            Category::Snack => "snack",
            Category::Drink => "drank",
            Category::Soup => "soep",
            Category::Salad => "salade",
            Category::Breakfast => "ontbijt",
            Category::Other => "anders",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Category::MainCourse => "Hoofdgerecht",
            Category::Starter => "Voorgerecht",
            Category::Dessert => "Dessert",
            Category::SideDish => "Bijgerecht",
            Category::Snack => "Snack",
            Category::Drink => "Drank",
            Category::Soup => "Soep",
            Category::Salad => "Salade",
            Category::Breakfast => "Ontbijt",
            Category::Other => "Anders",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Category::MainCourse => "🍽️",
            Category::Starter => "🥗",
            Category::Dessert => "🍰",
            Category::SideDish => "🥔",
            Category::Snack => "🍿",
            Category::Drink => "🍹",
            Category::Soup => "🍲",
            Category::Salad => "🥬",
            Category::Breakfast => "🍳",
            Category::Other => "📝",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Error returned when parsing an unknown category value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown recipe category: '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// A stored recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Unique identifier, never changes after creation
    pub id: String,
    pub title: String,
    pub category: Category,
    /// Ordered ingredient lines (empty when the recipe has none)
    #[serde(default, deserialize_with = "nullable_list")]
    pub ingredients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Encoded images (typically data URLs)
    #[serde(default, deserialize_with = "nullable_list")]
    pub photos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    /// Cooking time in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    /// Build a record from creation input and store-assigned fields
    pub(crate) fn from_new(
        id: String,
        new: NewRecipe,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: new.title,
            category: new.category,
            ingredients: new.ingredients,
            instructions: new.instructions,
            photos: new.photos,
            source_url: new.source_url,
            is_favorite: new.is_favorite,
            servings: new.servings,
            cook_time: new.cook_time,
            notes: new.notes,
            created_at,
            updated_at,
        }
    }

    /// Merge a patch into this record. Timestamps are left to the caller.
    pub(crate) fn apply(&mut self, patch: RecipePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(ingredients) = patch.ingredients {
            self.ingredients = ingredients;
        }
        if let Some(instructions) = patch.instructions {
            self.instructions = instructions;
        }
        if let Some(photos) = patch.photos {
            self.photos = photos;
        }
        if let Some(source_url) = patch.source_url {
            self.source_url = source_url;
        }
        if let Some(is_favorite) = patch.is_favorite {
            self.is_favorite = is_favorite;
        }
        if let Some(servings) = patch.servings {
            self.servings = servings;
        }
        if let Some(cook_time) = patch.cook_time {
            self.cook_time = cook_time;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }
}

/// Input for creating a recipe: everything except id and timestamps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRecipe {
    pub title: String,
    pub category: Category,
    pub ingredients: Vec<String>,
    pub instructions: Option<String>,
    pub photos: Vec<String>,
    pub source_url: Option<String>,
    pub is_favorite: bool,
    pub servings: Option<u32>,
    pub cook_time: Option<u32>,
    pub notes: Option<String>,
}

impl NewRecipe {
    /// Create a new recipe payload with the required fields
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            category,
            ..Default::default()
        }
    }

    pub fn with_ingredients<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ingredients = ingredients.into_iter().map(Into::into).collect();
        self
    }

    /// Set ingredients from newline-separated text, as entered in a form
    pub fn with_ingredient_lines(mut self, text: &str) -> Self {
        self.ingredients = parse_ingredient_lines(text);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photos.push(photo.into());
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    pub fn with_servings(mut self, servings: u32) -> Self {
        self.servings = Some(servings);
        self
    }

    /// Cooking time in minutes
    pub fn with_cook_time(mut self, minutes: u32) -> Self {
        self.cook_time = Some(minutes);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check the payload can be stored
    pub fn validate(&self) -> Result<(), String> {
        validate_title(&self.title)
    }
}

/// Partial changes to an existing recipe
///
/// `None` leaves a field untouched. For optional record fields the inner
/// `Option` is the new value, so `Some(None)` clears the field.
/// There is no id field: updates can never re-identify a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub category: Option<Category>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<Option<String>>,
    pub photos: Option<Vec<String>>,
    pub source_url: Option<Option<String>>,
    pub is_favorite: Option<bool>,
    pub servings: Option<Option<u32>>,
    pub cook_time: Option<Option<u32>>,
    pub notes: Option<Option<String>>,
}

impl RecipePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_ingredients<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ingredients = Some(ingredients.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = Some(instructions);
        self
    }

    pub fn with_photos(mut self, photos: Vec<String>) -> Self {
        self.photos = Some(photos);
        self
    }

    pub fn with_source_url(mut self, url: Option<String>) -> Self {
        self.source_url = Some(url);
        self
    }

    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = Some(is_favorite);
        self
    }

    pub fn with_servings(mut self, servings: Option<u32>) -> Self {
        self.servings = Some(servings);
        self
    }

    pub fn with_cook_time(mut self, minutes: Option<u32>) -> Self {
        self.cook_time = Some(minutes);
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = Some(notes);
        self
    }

    /// True when applying the patch would change nothing but `updatedAt`
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check the patch does not break record invariants
    pub fn validate(&self) -> Result<(), String> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }
}

/// Split newline-separated ingredient text into trimmed, non-empty lines
pub fn parse_ingredient_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Current time at storage precision (milliseconds)
pub(crate) fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        Err("title must not be empty".to_string())
    } else {
        Ok(())
    }
}

/// Accept `null` for list fields and read it as an empty list
pub(crate) fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
