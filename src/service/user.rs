//! User service
//!
//! Resolves the local account behind a provider login.

use std::sync::Arc;

use crate::data::{Database, User};
use crate::error::AppError;
use crate::provider::AuthInfo;

/// User service
pub struct UserService {
    db: Arc<Database>,
}

impl UserService {
    /// Create new user service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get a user by id
    pub async fn get_user(&self, id: &str) -> Result<User, AppError> {
        self.db.get_user(id).await?.ok_or(AppError::NotFound)
    }

    /// Find the user filed under the payload's display name, creating it
    /// on first sight.
    ///
    /// The display name is `info.name` when non-blank, else `info.email`.
    ///
    /// # Errors
    /// Returns a validation error if neither name nor email is usable.
    pub async fn find_or_create_from_info(&self, info: &AuthInfo) -> Result<User, AppError> {
        let name = info.display_name().ok_or_else(|| {
            AppError::Validation("auth info must include a name or an email".to_string())
        })?;

        if let Some(user) = self.db.get_user_by_name(name).await? {
            return Ok(user);
        }

        let candidate = User::new(name);
        if self.db.insert_user_if_absent(&candidate).await? {
            crate::metrics::USERS_CREATED_TOTAL.inc();
            tracing::info!(user_id = %candidate.id, name = %candidate.name, "User created");
            return Ok(candidate);
        }

        // Lost a race with a concurrent insert of the same name.
        self.db
            .get_user_by_name(name)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("user {name:?} vanished after insert"))
            })
    }
}
