//! SQLite schema for the recipe collection
//!
//! One row per recipe in `recipes`; ordered list fields live in child
//! tables keyed by `(recipe_id, position)` and are removed with their
//! recipe. Timestamps are unix milliseconds.

use rusqlite::{Connection, Result};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Recipes table
        CREATE TABLE IF NOT EXISTS recipes (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            category TEXT NOT NULL CHECK (category IN (
                'hoofdgerecht', 'voorgerecht', 'dessert', 'bijgerecht', 'snack',
                'drank', 'soep', 'salade', 'ontbijt', 'anders'
            )),
            instructions TEXT,
            source_url TEXT,
            is_favorite INTEGER NOT NULL DEFAULT 0,
            servings INTEGER,
            cook_time INTEGER,
            notes TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            CHECK (created_at <= updated_at)
        );

        -- Ingredients (ordered, one-to-many)
        CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            ingredient TEXT NOT NULL,
            PRIMARY KEY (recipe_id, position),
            FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE CASCADE
        );

        -- Photos (ordered, one-to-many)
        CREATE TABLE IF NOT EXISTS recipe_photos (
            recipe_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (recipe_id, position),
            FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE CASCADE
        );

        -- Secondary indexes for lookups and sorting
        CREATE INDEX IF NOT EXISTS idx_recipes_title ON recipes(title);
        CREATE INDEX IF NOT EXISTS idx_recipes_category ON recipes(category);
        CREATE INDEX IF NOT EXISTS idx_recipes_is_favorite ON recipes(is_favorite);
        CREATE INDEX IF NOT EXISTS idx_recipes_created_at ON recipes(created_at);
        CREATE INDEX IF NOT EXISTS idx_recipes_updated_at ON recipes(updated_at);
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(conn: &Connection, sql: &str) -> Vec<String> {
        conn.prepare(sql)
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables = names(
            &conn,
            "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
        );
        assert!(tables.contains(&"recipes".to_string()));
        assert!(tables.contains(&"recipe_ingredients".to_string()));
        assert!(tables.contains(&"recipe_photos".to_string()));
        assert!(tables.contains(&"schema_info".to_string()));
    }

    #[test]
    fn test_schema_version() {
        let conn = Connection::open_in_memory().unwrap();

        assert!(needs_init(&conn));

        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        assert!(!needs_init(&conn));
    }

    #[test]
    fn test_init_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_indexes_exist() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let indexes = names(
            &conn,
            "SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'",
        );
        for expected in [
            "idx_recipes_title",
            "idx_recipes_category",
            "idx_recipes_is_favorite",
            "idx_recipes_created_at",
            "idx_recipes_updated_at",
        ] {
            assert!(indexes.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_unknown_category_rejected_by_storage() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO recipes (id, title, category, created_at, updated_at) VALUES ('a', 'T', 'pizza', 0, 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_created_after_updated_rejected_by_storage() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO recipes (id, title, category, created_at, updated_at) VALUES ('a', 'T', 'soep', 10, 5)",
            [],
        );
        assert!(result.is_err());
    }
}
