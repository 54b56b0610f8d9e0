//! ABOUTME: Category repository
//! ABOUTME: Category 0 ("all") is a process-wide sentinel seeded at schema init, never deleted

use cronctl_core::{time::now_iso8601, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, instrument};

use crate::schema::UNSCOPED_CATEGORY_ID;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CategoryRepository<'a> {
    pool: &'a SqlitePool,
    table: String,
}

impl<'a> CategoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, name: &str, description: Option<&str>) -> Result<Category> {
        debug!(name, "Creating category");
        let now = now_iso8601();

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO {table} (name, description, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            RETURNING id, name, description, created_at, updated_at
            "#,
            table = self.table
        ))
        .bind(name)
        .bind(description)
        .bind(&now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| Error::Conflict(format!("Failed to create category {}: {}", name, e)))?;

        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT id, name, description, created_at, updated_at FROM {} WHERE id = ?1",
            self.table
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to fetch category {}: {}", id, e)))?;

        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT id, name, description, created_at, updated_at FROM {} ORDER BY name",
            self.table
        ))
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list categories: {}", e)))?;

        Ok(categories)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: i64, name: &str, description: Option<&str>) -> Result<Category> {
        if id == UNSCOPED_CATEGORY_ID {
            return Err(Error::Validation(
                "Category 0 is a reserved sentinel and cannot be modified".to_string(),
            ));
        }
        let now = now_iso8601();

        sqlx::query(&format!(
            "UPDATE {table} SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            table = self.table
        ))
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to update category {}: {}", id, e)))?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Category {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        if id == UNSCOPED_CATEGORY_ID {
            return Err(Error::Validation(
                "Category 0 is a reserved sentinel and cannot be deleted".to_string(),
            ));
        }

        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", self.table))
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete category {}: {}", id, e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Category {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{init_schema, TableNames};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> (SqlitePool, TableNames) {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("pool");
        let tables = TableNames::default();
        init_schema(&pool, &tables).await.expect("schema");
        (pool, tables)
    }

    #[tokio::test]
    async fn category_zero_is_seeded_and_protected() {
        let (pool, tables) = setup().await;
        let repo = CategoryRepository::new(&pool, &tables.categories);

        let zero = repo.get(0).await.unwrap().expect("seeded");
        assert_eq!(zero.name, "all");

        assert!(matches!(
            repo.delete(0).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            repo.update(0, "renamed", None).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn create_list_update_delete() {
        let (pool, tables) = setup().await;
        let repo = CategoryRepository::new(&pool, &tables.categories);

        let created = repo
            .create("ops", Some("operations team"))
            .await
            .expect("create");

        let categories = repo.list().await.unwrap();
        assert!(categories.iter().any(|c| c.id == created.id));

        let updated = repo
            .update(created.id, "ops-renamed", None)
            .await
            .expect("update");
        assert_eq!(updated.name, "ops-renamed");

        repo.delete(created.id).await.expect("delete");
        assert!(repo.get(created.id).await.unwrap().is_none());
    }
}
