//! Database connection and pool management
//!
//! Handles the SQLite document store using sqlx: pool construction, schema
//! creation, and the shared table definitions the wipe operation needs to
//! recreate the item collection.

use anyhow::Result;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;

/// Item collection schema. Also used by the wipe operation, which drops
/// and recreates the table instead of deleting rows.
pub(crate) const CREATE_ITEMS_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS items (
        id TEXT PRIMARY KEY,
        query TEXT NOT NULL,
        asin TEXT NOT NULL,
        product_name TEXT NOT NULL,
        thumbnail TEXT NOT NULL,
        category TEXT NOT NULL,
        subcategory TEXT NOT NULL,
        position INTEGER NOT NULL,
        listed BOOLEAN NOT NULL DEFAULT 0,
        revision TEXT NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

pub(crate) const CREATE_ITEMS_INDEXES_SQL: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_items_listed ON items (listed);
    CREATE INDEX IF NOT EXISTS idx_items_category ON items (category, subcategory)
"#;

const CREATE_CATEGORIES_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS categories (
        name TEXT PRIMARY KEY,
        node_id TEXT NOT NULL,
        item_count INTEGER NOT NULL,
        subcategories TEXT NOT NULL,
        ordinal INTEGER NOT NULL,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create database file directory if it doesn't exist
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");

        if let Some(parent) = Path::new(db_path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !Path::new(db_path).exists() {
            std::fs::File::create(db_path)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_CATEGORIES_TABLE_SQL)
            .execute(&self.pool)
            .await?;
        sqlx::query(CREATE_ITEMS_TABLE_SQL)
            .execute(&self.pool)
            .await?;
        for statement in CREATE_ITEMS_INDEXES_SQL.split(';') {
            if !statement.trim().is_empty() {
                sqlx::query(statement).execute(&self.pool).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn creates_and_migrates_a_fresh_database() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test.db");
        let database_url = format!("sqlite:{}", db_path.to_string_lossy());

        let connection = DatabaseConnection::new(&database_url).await?;
        connection.migrate().await?;
        // Running the migration twice must be harmless.
        connection.migrate().await?;

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(connection.pool())
            .await?;
        assert_eq!(count.0, 0);
        Ok(())
    }
}
