//! SQLite repositories for the catalog document store
//!
//! Raw `sqlx::query` + row mapping, no ORM. Optimistic concurrency is a
//! compare-and-swap on the `revision` column: an update that matches zero
//! rows means the caller held a stale revision and gets a conflict back;
//! nothing is ever silently overwritten.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::entities::{Category, Subcategory, VineItem};
use crate::domain::errors::CrawlError;
use crate::domain::repositories::{CategoryRepository, ItemRepository};
use crate::infrastructure::database_connection::{
    CREATE_ITEMS_INDEXES_SQL, CREATE_ITEMS_TABLE_SQL,
};

/// Category collection, replaced wholesale on each refresh.
#[derive(Clone)]
pub struct SqliteCategoryRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteCategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl CategoryRepository for SqliteCategoryRepository {
    async fn replace_all(&self, categories: &[Category]) -> Result<(), CrawlError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM categories")
            .execute(&mut *tx)
            .await?;

        for (ordinal, category) in categories.iter().enumerate() {
            let subcategories = serde_json::to_string(&category.subcategories)
                .map_err(|e| CrawlError::Storage(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO categories (name, node_id, item_count, subcategories, ordinal, updated_at)
                VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
                "#,
            )
            .bind(&category.name)
            .bind(&category.node_id)
            .bind(i64::from(category.item_count))
            .bind(subcategories)
            .bind(ordinal as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Category>, CrawlError> {
        let rows = sqlx::query(
            "SELECT name, node_id, item_count, subcategories FROM categories ORDER BY ordinal ASC",
        )
        .fetch_all(&*self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let subcategories: Vec<Subcategory> =
                    serde_json::from_str(row.get("subcategories"))
                        .map_err(|e| CrawlError::Storage(e.to_string()))?;
                Ok(Category {
                    name: row.get("name"),
                    node_id: row.get("node_id"),
                    item_count: row.get::<i64, _>("item_count") as u32,
                    subcategories,
                })
            })
            .collect()
    }
}

/// Item collection with revision-checked writes.
#[derive(Clone)]
pub struct SqliteItemRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    fn map_row(row: &sqlx::sqlite::SqliteRow) -> VineItem {
        VineItem {
            id: row.get("id"),
            query: row.get("query"),
            asin: row.get("asin"),
            product_name: row.get("product_name"),
            thumbnail: row.get("thumbnail"),
            category: row.get("category"),
            subcategory: row.get("subcategory"),
            position: row.get::<i64, _>("position") as u32,
            listed: row.get("listed"),
            revision: Some(row.get("revision")),
        }
    }
}

#[async_trait]
impl ItemRepository for SqliteItemRepository {
    async fn put(&self, item: &VineItem) -> Result<String, CrawlError> {
        let new_revision = Uuid::new_v4().to_string();

        match &item.revision {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO items
                    (id, query, asin, product_name, thumbnail, category, subcategory,
                     position, listed, revision, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
                    "#,
                )
                .bind(&item.id)
                .bind(&item.query)
                .bind(&item.asin)
                .bind(&item.product_name)
                .bind(&item.thumbnail)
                .bind(&item.category)
                .bind(&item.subcategory)
                .bind(i64::from(item.position))
                .bind(item.listed)
                .bind(&new_revision)
                .execute(&*self.pool)
                .await;

                match result {
                    Ok(_) => Ok(new_revision),
                    Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                        Err(CrawlError::Conflict {
                            id: item.id.clone(),
                        })
                    }
                    Err(other) => Err(other.into()),
                }
            }
            Some(revision) => {
                let result = sqlx::query(
                    r#"
                    UPDATE items
                    SET query = ?, asin = ?, product_name = ?, thumbnail = ?,
                        category = ?, subcategory = ?, position = ?, listed = ?,
                        revision = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE id = ? AND revision = ?
                    "#,
                )
                .bind(&item.query)
                .bind(&item.asin)
                .bind(&item.product_name)
                .bind(&item.thumbnail)
                .bind(&item.category)
                .bind(&item.subcategory)
                .bind(i64::from(item.position))
                .bind(item.listed)
                .bind(&new_revision)
                .bind(&item.id)
                .bind(revision)
                .execute(&*self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(CrawlError::Conflict {
                        id: item.id.clone(),
                    });
                }
                Ok(new_revision)
            }
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<VineItem>, CrawlError> {
        let row = sqlx::query(
            r#"
            SELECT id, query, asin, product_name, thumbnail, category, subcategory,
                   position, listed, revision
            FROM items WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.as_ref().map(Self::map_row))
    }

    async fn find_all(&self) -> Result<Vec<VineItem>, CrawlError> {
        let rows = sqlx::query(
            r#"
            SELECT id, query, asin, product_name, thumbnail, category, subcategory,
                   position, listed, revision
            FROM items
            ORDER BY category ASC, subcategory ASC, position ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(Self::map_row).collect())
    }

    async fn find_listed(&self) -> Result<Vec<VineItem>, CrawlError> {
        let rows = sqlx::query(
            r#"
            SELECT id, query, asin, product_name, thumbnail, category, subcategory,
                   position, listed, revision
            FROM items WHERE listed = 1
            ORDER BY category ASC, subcategory ASC, position ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(Self::map_row).collect())
    }

    async fn unlist_all(&self) -> Result<u64, CrawlError> {
        // Rediscovered items are re-marked listed as the refresh walks the
        // tree; revisions advance so stale copies still conflict.
        let result = sqlx::query(
            "UPDATE items SET listed = 0, updated_at = CURRENT_TIMESTAMP WHERE listed = 1",
        )
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn wipe(&self) -> Result<(), CrawlError> {
        sqlx::query("DROP TABLE IF EXISTS items")
            .execute(&*self.pool)
            .await?;
        sqlx::query(CREATE_ITEMS_TABLE_SQL)
            .execute(&*self.pool)
            .await?;
        for statement in CREATE_ITEMS_INDEXES_SQL.split(';') {
            if !statement.trim().is_empty() {
                sqlx::query(statement).execute(&*self.pool).await?;
            }
        }
        Ok(())
    }
}
