//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the find-or-create flows behind a login.

mod authentication;
mod user;

pub use authentication::AuthenticationService;
pub use user::UserService;
