//! Authentication middleware
//!
//! Protects routes that require a logged-in user.

use axum::{extract::Request, middleware::Next, response::Response};

use super::context::SessionContext;
use crate::error::AppError;

/// Middleware to require a logged-in user
///
/// Adds the current `User` to request extensions if present.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/metrics", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_login));
/// ```
pub async fn require_login(
    mut session: SessionContext,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = session
        .current_user()
        .await?
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
