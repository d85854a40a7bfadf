//! Row-level access to the recipe tables
//!
//! Reads hydrate a `recipes` row together with its ordered ingredient and
//! photo rows. Writes take a [`Transaction`] so a recipe and its children
//! always change together.
//!
//! Timestamps are normalized here: stored unix milliseconds become
//! `DateTime<Utc>`, and values that cannot be represented are reported as
//! corrupt instead of being replaced.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Params, Row, Transaction};

use crate::models::{Category, Recipe};
use crate::storage::error::{StoreError, StoreResult};

const SELECT_RECIPE: &str = "SELECT id, title, category, instructions, source_url, is_favorite, \
     servings, cook_time, notes, created_at, updated_at FROM recipes";

/// Most recently modified first; ties broken deterministically
const ORDER_RECENT: &str = "ORDER BY updated_at DESC, created_at DESC, id";

struct RecipeRow {
    id: String,
    title: String,
    category: String,
    instructions: Option<String>,
    source_url: Option<String>,
    is_favorite: bool,
    servings: Option<u32>,
    cook_time: Option<u32>,
    notes: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl RecipeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            category: row.get(2)?,
            instructions: row.get(3)?,
            source_url: row.get(4)?,
            is_favorite: row.get(5)?,
            servings: row.get(6)?,
            cook_time: row.get(7)?,
            notes: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

// ==================== Reads ====================

/// Every recipe, most recently updated first
pub(crate) fn fetch_all(conn: &Connection) -> StoreResult<Vec<Recipe>> {
    query_recipes(conn, &format!("{SELECT_RECIPE} {ORDER_RECENT}"), [])
}

/// Recipes in one category via the category index
pub(crate) fn fetch_by_category(conn: &Connection, category: Category) -> StoreResult<Vec<Recipe>> {
    query_recipes(
        conn,
        &format!("{SELECT_RECIPE} WHERE category = ?1 {ORDER_RECENT}"),
        params![category.as_str()],
    )
}

pub(crate) fn fetch_one(conn: &Connection, id: &str) -> StoreResult<Option<Recipe>> {
    let mut recipes = query_recipes(
        conn,
        &format!("{SELECT_RECIPE} WHERE id = ?1"),
        params![id],
    )?;
    Ok(recipes.pop())
}

pub(crate) fn count(conn: &Connection) -> StoreResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
    Ok(count.try_into().unwrap_or_default())
}

fn query_recipes<P: Params>(conn: &Connection, sql: &str, params: P) -> StoreResult<Vec<Recipe>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, RecipeRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(|row| hydrate(conn, row)).collect()
}

/// Turn a row into a recipe, loading its ordered child rows
fn hydrate(conn: &Connection, row: RecipeRow) -> StoreResult<Recipe> {
    let category: Category = row.category.parse().map_err(|e| StoreError::CorruptRecord {
        id: row.id.clone(),
        details: format!("{}", e),
    })?;
    let created_at = timestamp(&row.id, "created_at", row.created_at)?;
    let updated_at = timestamp(&row.id, "updated_at", row.updated_at)?;

    let ingredients = child_values(
        conn,
        "SELECT ingredient FROM recipe_ingredients WHERE recipe_id = ? ORDER BY position",
        &row.id,
    )?;
    let photos = child_values(
        conn,
        "SELECT data FROM recipe_photos WHERE recipe_id = ? ORDER BY position",
        &row.id,
    )?;

    Ok(Recipe {
        id: row.id,
        title: row.title,
        category,
        ingredients,
        instructions: row.instructions,
        photos,
        source_url: row.source_url,
        is_favorite: row.is_favorite,
        servings: row.servings,
        cook_time: row.cook_time,
        notes: row.notes,
        created_at,
        updated_at,
    })
}

fn child_values(conn: &Connection, sql: &str, recipe_id: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let values = stmt
        .query_map(params![recipe_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(values)
}

fn timestamp(id: &str, column: &str, millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| StoreError::CorruptRecord {
        id: id.to_string(),
        details: format!("{} out of range: {}", column, millis),
    })
}

// ==================== Transaction helpers ====================

/// Insert a new recipe and its child rows
///
/// Fails with a constraint error if the id is already taken.
pub(crate) fn insert_recipe(tx: &Transaction, recipe: &Recipe) -> StoreResult<()> {
    tx.execute(
        r#"
        INSERT INTO recipes (id, title, category, instructions, source_url, is_favorite,
                             servings, cook_time, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            recipe.id,
            recipe.title,
            recipe.category.as_str(),
            recipe.instructions,
            recipe.source_url,
            recipe.is_favorite,
            recipe.servings,
            recipe.cook_time,
            recipe.notes,
            recipe.created_at.timestamp_millis(),
            recipe.updated_at.timestamp_millis(),
        ],
    )?;
    insert_children(tx, recipe)
}

/// Overwrite an existing recipe and replace its child rows
///
/// Returns false when no row with the recipe's id exists.
pub(crate) fn replace_recipe(tx: &Transaction, recipe: &Recipe) -> StoreResult<bool> {
    let changed = tx.execute(
        r#"
        UPDATE recipes
        SET title = ?2, category = ?3, instructions = ?4, source_url = ?5, is_favorite = ?6,
            servings = ?7, cook_time = ?8, notes = ?9, created_at = ?10, updated_at = ?11
        WHERE id = ?1
        "#,
        params![
            recipe.id,
            recipe.title,
            recipe.category.as_str(),
            recipe.instructions,
            recipe.source_url,
            recipe.is_favorite,
            recipe.servings,
            recipe.cook_time,
            recipe.notes,
            recipe.created_at.timestamp_millis(),
            recipe.updated_at.timestamp_millis(),
        ],
    )?;
    if changed == 0 {
        return Ok(false);
    }

    tx.execute(
        "DELETE FROM recipe_ingredients WHERE recipe_id = ?",
        params![recipe.id],
    )?;
    tx.execute(
        "DELETE FROM recipe_photos WHERE recipe_id = ?",
        params![recipe.id],
    )?;
    insert_children(tx, recipe)?;
    Ok(true)
}

fn insert_children(tx: &Transaction, recipe: &Recipe) -> StoreResult<()> {
    for (i, ingredient) in recipe.ingredients.iter().enumerate() {
        tx.execute(
            "INSERT INTO recipe_ingredients (recipe_id, position, ingredient) VALUES (?, ?, ?)",
            params![recipe.id, i as i64, ingredient],
        )?;
    }
    for (i, photo) in recipe.photos.iter().enumerate() {
        tx.execute(
            "INSERT INTO recipe_photos (recipe_id, position, data) VALUES (?, ?, ?)",
            params![recipe.id, i as i64, photo],
        )?;
    }
    Ok(())
}

/// Delete one recipe (children cascade). Returns whether a row was removed.
pub(crate) fn delete_recipe(conn: &Connection, id: &str) -> StoreResult<bool> {
    let removed = conn.execute("DELETE FROM recipes WHERE id = ?", params![id])?;
    Ok(removed > 0)
}

/// Remove every recipe, returning how many were removed
pub(crate) fn clear_all(conn: &Connection) -> StoreResult<usize> {
    // Children first in case foreign keys are disabled on this connection
    conn.execute("DELETE FROM recipe_ingredients", [])?;
    conn.execute("DELETE FROM recipe_photos", [])?;
    let removed = conn.execute("DELETE FROM recipes", [])?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{now_millis, NewRecipe};
    use crate::storage::schema::init_schema;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn recipe(id: &str, new: NewRecipe) -> Recipe {
        let now = now_millis();
        Recipe::from_new(id.to_string(), new, now, now)
    }

    fn insert(conn: &mut Connection, recipe: &Recipe) {
        let tx = conn.transaction().unwrap();
        insert_recipe(&tx, recipe).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_insert_and_fetch_with_children() {
        let mut conn = open();
        let original = recipe(
            "r1",
            NewRecipe::new("Stamppot", Category::MainCourse)
                .with_ingredients(["Potatoes", "Kale", "Smoked sausage"])
                .with_photo("data:image/png;base64,AAAA")
                .with_photo("data:image/png;base64,BBBB")
                .with_servings(4)
                .with_notes("Winter classic"),
        );
        insert(&mut conn, &original);

        let fetched = fetch_one(&conn, "r1").unwrap().unwrap();
        assert_eq!(fetched, original);
        assert_eq!(fetched.ingredients[2], "Smoked sausage");
        assert_eq!(fetched.photos.len(), 2);
    }

    #[test]
    fn test_fetch_missing_returns_none() {
        let conn = open();
        assert!(fetch_one(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut conn = open();
        let r = recipe("dup", NewRecipe::new("A", Category::Snack));
        insert(&mut conn, &r);

        let tx = conn.transaction().unwrap();
        assert!(insert_recipe(&tx, &r).is_err());
    }

    #[test]
    fn test_replace_swaps_children() {
        let mut conn = open();
        let mut r = recipe(
            "r1",
            NewRecipe::new("Salad", Category::Salad).with_ingredients(["Lettuce", "Tomato"]),
        );
        insert(&mut conn, &r);

        r.ingredients = vec!["Rocket".to_string()];
        r.photos = vec!["data:x".to_string()];
        let tx = conn.transaction().unwrap();
        assert!(replace_recipe(&tx, &r).unwrap());
        tx.commit().unwrap();

        let fetched = fetch_one(&conn, "r1").unwrap().unwrap();
        assert_eq!(fetched.ingredients, vec!["Rocket"]);
        assert_eq!(fetched.photos, vec!["data:x"]);
    }

    #[test]
    fn test_replace_missing_returns_false() {
        let mut conn = open();
        let r = recipe("ghost", NewRecipe::new("Ghost", Category::Other));
        let tx = conn.transaction().unwrap();
        assert!(!replace_recipe(&tx, &r).unwrap());
    }

    #[test]
    fn test_delete_cascades_children() {
        let mut conn = open();
        let r = recipe(
            "r1",
            NewRecipe::new("Soup", Category::Soup).with_ingredients(["Water"]),
        );
        insert(&mut conn, &r);

        assert!(delete_recipe(&conn, "r1").unwrap());
        assert!(!delete_recipe(&conn, "r1").unwrap());

        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM recipe_ingredients", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_fetch_all_orders_by_updated_desc() {
        let mut conn = open();
        let mut older = recipe("old", NewRecipe::new("Old", Category::Dessert));
        older.updated_at = older.updated_at - chrono::Duration::seconds(60);
        older.created_at = older.updated_at;
        let newer = recipe("new", NewRecipe::new("New", Category::Dessert));
        insert(&mut conn, &older);
        insert(&mut conn, &newer);

        let ids: Vec<_> = fetch_all(&conn).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_fetch_by_category() {
        let mut conn = open();
        insert(&mut conn, &recipe("a", NewRecipe::new("A", Category::Drink)));
        insert(&mut conn, &recipe("b", NewRecipe::new("B", Category::Soup)));

        let drinks = fetch_by_category(&conn, Category::Drink).unwrap();
        assert_eq!(drinks.len(), 1);
        assert_eq!(drinks[0].id, "a");
        assert!(fetch_by_category(&conn, Category::Breakfast).unwrap().is_empty());
    }

    #[test]
    fn test_clear_all() {
        let mut conn = open();
        insert(&mut conn, &recipe("a", NewRecipe::new("A", Category::Drink)));
        insert(&mut conn, &recipe("b", NewRecipe::new("B", Category::Soup)));

        assert_eq!(clear_all(&conn).unwrap(), 2);
        assert_eq!(count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_out_of_range_timestamp_reported_as_corrupt() {
        let conn = open();
        conn.execute(
            "INSERT INTO recipes (id, title, category, created_at, updated_at) VALUES ('bad', 'T', 'soep', ?1, ?1)",
            params![i64::MAX],
        )
        .unwrap();

        let err = fetch_one(&conn, "bad").unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { .. }));
    }

    #[test]
    fn test_special_characters_in_content() {
        let mut conn = open();
        let r = recipe(
            "r1",
            NewRecipe::new("Crème brûlée \"classique\"", Category::Dessert)
                .with_instructions("Line one\nLine two\twith tab")
                .with_ingredients(["200 ml crème fraîche", "Sugar's best friend"]),
        );
        insert(&mut conn, &r);

        let fetched = fetch_one(&conn, "r1").unwrap().unwrap();
        assert_eq!(fetched.title, "Crème brûlée \"classique\"");
        assert!(fetched.instructions.as_ref().unwrap().contains('\t'));
        assert_eq!(fetched.ingredients[1], "Sugar's best friend");
    }
}
