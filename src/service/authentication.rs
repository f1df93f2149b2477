//! Authentication service
//!
//! Links provider identities to local users.

use std::sync::Arc;

use super::UserService;
use crate::data::{Authentication, Database, User};
use crate::error::AppError;
use crate::provider::AuthPayload;

/// Authentication service
pub struct AuthenticationService {
    db: Arc<Database>,
    users: UserService,
}

impl AuthenticationService {
    /// Create new authentication service
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            users: UserService::new(db.clone()),
            db,
        }
    }

    /// Find the authentication for a payload's `(provider, uid)` or link a
    /// new one to the payload's user.
    ///
    /// # Steps
    /// 1. Look up an existing authentication by `(provider, uid)`
    /// 2. Return it unchanged if found
    /// 3. Otherwise find or create the owning user from `info`
    /// 4. Create and persist the authentication
    ///
    /// # Errors
    /// Returns a validation error if provider or uid is blank, if the
    /// payload carries neither name nor email, or if a concurrent callback
    /// linked the same pair first.
    pub async fn find_or_create_from_payload(
        &self,
        payload: &AuthPayload,
    ) -> Result<Authentication, AppError> {
        require_present("provider", &payload.provider)?;
        require_present("uid", &payload.uid)?;

        if let Some(existing) = self
            .db
            .get_authentication_by_provider_uid(&payload.provider, &payload.uid)
            .await?
        {
            return Ok(existing);
        }

        let user = self.users.find_or_create_from_info(&payload.info).await?;
        self.create(&user, &payload.provider, &payload.uid).await
    }

    /// Link `(provider, uid)` to `user`
    ///
    /// # Errors
    /// Returns a validation error if a field is blank or the pair is
    /// already linked to any user.
    pub async fn create(
        &self,
        user: &User,
        provider: &str,
        uid: &str,
    ) -> Result<Authentication, AppError> {
        require_present("user_id", &user.id)?;
        require_present("provider", provider)?;
        require_present("uid", uid)?;

        if self
            .db
            .get_authentication_by_provider_uid(provider, uid)
            .await?
            .is_some()
        {
            return Err(AppError::Validation("uid has already been taken".to_string()));
        }

        // The unique index still backs the check above against races.
        let authentication = Authentication::new(provider, uid, &user.id);
        self.db.insert_authentication(&authentication).await?;

        crate::metrics::AUTHENTICATIONS_CREATED_TOTAL
            .with_label_values(&[provider])
            .inc();
        tracing::info!(
            authentication_id = %authentication.id,
            user_id = %user.id,
            provider,
            "Provider identity linked"
        );

        Ok(authentication)
    }

    /// Get the user owning an authentication
    pub async fn user_for(&self, authentication: &Authentication) -> Result<User, AppError> {
        self.users.get_user(&authentication.user_id).await
    }
}

fn require_present(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} can't be blank")));
    }
    Ok(())
}
