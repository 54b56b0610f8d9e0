//! ABOUTME: User repository: authentication-adjacent storage and category scoping
//! ABOUTME: Password verification is injected so this crate carries no KDF dependency

use cronctl_core::{time::now_iso8601, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, instrument};

/// User entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub category_id: i64,
    pub is_permission: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub category_id: i64,
    pub is_permission: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub is_admin: Option<bool>,
    pub category_id: Option<i64>,
    pub is_permission: Option<bool>,
}

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
    table: String,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreateUserRequest) -> Result<User> {
        debug!(username = %request.username, "Creating user");
        let now = now_iso8601();

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO {table} (username, password_hash, is_admin, category_id, is_permission, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING id, username, password_hash, is_admin, category_id, is_permission, created_at, updated_at
            "#,
            table = self.table
        ))
        .bind(&request.username)
        .bind(&request.password_hash)
        .bind(request.is_admin)
        .bind(request.category_id)
        .bind(request.is_permission)
        .bind(&now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| Error::Conflict(format!("Failed to create user {}: {}", request.username, e)))?;

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT id, username, password_hash, is_admin, category_id, is_permission, created_at, updated_at FROM {} WHERE id = ?1",
            self.table
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to find user {}: {}", id, e)))?;

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT id, username, password_hash, is_admin, category_id, is_permission, created_at, updated_at FROM {} WHERE username = ?1",
            self.table
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to find user {}: {}", username, e)))?;

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn exists(&self, username: &str) -> Result<bool> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    /// Verify a plaintext password against the stored hash for `username`.
    /// The hash comparison itself is delegated to `verify` (an argon2
    /// verifier supplied by the auth subsystem) so this crate has no KDF
    /// dependency of its own.
    #[instrument(skip(self, plaintext, verify))]
    pub async fn verify_password(
        &self,
        username: &str,
        plaintext: &str,
        verify: impl Fn(&str, &str) -> bool,
    ) -> Result<bool> {
        match self.find_by_username(username).await? {
            Some(user) => Ok(verify(&user.password_hash, plaintext)),
            None => Ok(false),
        }
    }

    /// List users ordered by username.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT id, username, password_hash, is_admin, category_id, is_permission, created_at, updated_at FROM {} ORDER BY username",
            self.table
        ))
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list users: {}", e)))?;

        Ok(users)
    }

    #[instrument(skip(self, request))]
    pub async fn update(&self, id: i64, request: UpdateUserRequest) -> Result<User> {
        let now = now_iso8601();

        sqlx::query(&format!(
            r#"
            UPDATE {table}
            SET
                username = COALESCE(?1, username),
                password_hash = COALESCE(?2, password_hash),
                is_admin = COALESCE(?3, is_admin),
                category_id = COALESCE(?4, category_id),
                is_permission = COALESCE(?5, is_permission),
                updated_at = ?6
            WHERE id = ?7
            "#,
            table = self.table
        ))
        .bind(request.username)
        .bind(request.password_hash)
        .bind(request.is_admin)
        .bind(request.category_id)
        .bind(request.is_permission)
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to update user {}: {}", id, e)))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", self.table))
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete user {}: {}", id, e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("User {} not found", id)));
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
    async fn create_then_find_round_trips() {
        let (pool, tables) = setup().await;
        let repo = UserRepository::new(&pool, &tables.users);

        let user = repo
            .create(CreateUserRequest {
                username: "alice".to_string(),
                password_hash: "hash".to_string(),
                is_admin: true,
                category_id: 0,
                is_permission: true,
            })
            .await
            .expect("create");

        let found = repo
            .find_by_username("alice")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.id, user.id);
        assert!(found.is_admin);
    }

    #[tokio::test]
    async fn duplicate_username_is_conflict() {
        let (pool, tables) = setup().await;
        let repo = UserRepository::new(&pool, &tables.users);

        let request = CreateUserRequest {
            username: "bob".to_string(),
            password_hash: "hash".to_string(),
            is_admin: false,
            category_id: 0,
            is_permission: false,
        };
        repo.create(request.clone()).await.expect("first create");
        let err = repo.create(request).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn verify_password_delegates_to_injected_verifier() {
        let (pool, tables) = setup().await;
        let repo = UserRepository::new(&pool, &tables.users);

        repo.create(CreateUserRequest {
            username: "carol".to_string(),
            password_hash: "correct-hash".to_string(),
            is_admin: false,
            category_id: 0,
            is_permission: false,
        })
        .await
        .unwrap();

        let ok = repo
            .verify_password("carol", "correct-pw", |hash, plaintext| {
                hash == "correct-hash" && plaintext == "correct-pw"
            })
            .await
            .unwrap();
        assert!(ok);

        let missing = repo
            .verify_password("nobody", "x", |_, _| true)
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn list_orders_by_username() {
        let (pool, tables) = setup().await;
        let repo = UserRepository::new(&pool, &tables.users);

        for name in ["zoe", "amy"] {
            repo.create(CreateUserRequest {
                username: name.to_string(),
                password_hash: "h".to_string(),
                is_admin: false,
                category_id: 0,
                is_permission: false,
            })
            .await
            .unwrap();
        }

        let users = repo.list().await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "zoe"]);
    }
}
