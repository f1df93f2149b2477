//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// User
// =============================================================================

/// A local account
///
/// Created on the first login of a provider identity whose display
/// name has not been seen before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    /// Display name; also the find-or-create lookup key
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build an unsaved user with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new().0,
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Authentication
// =============================================================================

/// A provider identity linked to exactly one user
///
/// `(provider, uid)` is unique across all rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Authentication {
    pub id: String,
    /// Provider name, e.g. "github"
    pub provider: String,
    /// The provider's user id, always stored as a string
    pub uid: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Authentication {
    /// Build an unsaved authentication owned by `user_id`
    pub fn new(
        provider: impl Into<String>,
        uid: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new().0,
            provider: provider.into(),
            uid: uid.into(),
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
