//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Entity models (users and their provider identities)

mod database;
mod models;

pub use database::Database;
pub use models::*;
