//! Session authentication
//!
//! Handles:
//! - Signed cookie sessions
//! - The request-scoped session context (current user, flash notices)
//! - Authentication middleware

mod context;
mod middleware;
pub mod session;

pub use context::{FLASH_COOKIE, SESSION_COOKIE, SessionContext};
pub use middleware::require_login;
pub use session::{Session, create_session_token, verify_session_token};
