//! SQLite database operations
//!
//! All database access goes through this module.
//! Uniqueness of user names and of `(provider, uid)` pairs is enforced by
//! unique indexes, so concurrent writers cannot create duplicates.

use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Get a user by id
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get a user by exact display name
    pub async fn get_user_by_name(&self, name: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Insert a user unless one with the same name already exists.
    ///
    /// This is atomic at the SQL statement level; two concurrent callers
    /// with the same name end up with one row.
    ///
    /// # Returns
    /// `true` if inserted, `false` if the name was already taken.
    pub async fn insert_user_if_absent(&self, user: &User) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Count all users
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Authentications
    // =========================================================================

    /// Get an authentication by exact provider and uid
    pub async fn get_authentication_by_provider_uid(
        &self,
        provider: &str,
        uid: &str,
    ) -> Result<Option<Authentication>, AppError> {
        let authentication = sqlx::query_as::<_, Authentication>(
            "SELECT * FROM authentications WHERE provider = ? AND uid = ?",
        )
        .bind(provider)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(authentication)
    }

    /// Insert an authentication
    ///
    /// # Errors
    /// Returns a validation error if `(provider, uid)` is already linked
    /// or the owning user does not exist.
    pub async fn insert_authentication(
        &self,
        authentication: &Authentication,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO authentications (id, provider, uid, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&authentication.id)
        .bind(&authentication.provider)
        .bind(&authentication.uid)
        .bind(&authentication.user_id)
        .bind(authentication.created_at)
        .bind(authentication.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Validation("uid has already been taken".to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::Validation("user must exist".to_string())
            }
            _ => AppError::from(e),
        })?;

        Ok(())
    }

    /// Get all authentications owned by a user, oldest first
    pub async fn get_authentications_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Authentication>, AppError> {
        let authentications = sqlx::query_as::<_, Authentication>(
            "SELECT * FROM authentications WHERE user_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(authentications)
    }

    /// Count all authentications
    pub async fn count_authentications(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM authentications")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
