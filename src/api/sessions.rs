//! Session controller
//!
//! Login chooser, provider callback, logout and failure pages.

use std::collections::HashMap;

use axum::{
    Extension, Router,
    extract::{Query, State},
    middleware,
    response::{Html, IntoResponse, Redirect},
    routing::get,
};

use crate::AppState;
use crate::auth::SessionContext;
use crate::error::AppError;
use crate::provider::{self, AuthPayload};
use crate::service::AuthenticationService;

pub const LOGGED_IN_NOTICE: &str = "Logged in successfully.";
pub const SIGNED_OUT_NOTICE: &str = "Signed out!";
pub const ACCESS_DENIED_NOTICE: &str = "Access was not granted, you are not logged in.";

/// Create session router
///
/// Routes:
/// - GET / - Login chooser
/// - GET/POST /auth/:provider/callback - Complete login
/// - GET /auth/failure - Login denied upstream
/// - GET /logout - Clear session
///
/// `/sessions/new`, `/sessions/destroy` and `/sessions/failure` are
/// kept as aliases.
pub fn sessions_router(state: AppState) -> Router<AppState> {
    let callback = Router::new()
        .route("/auth/:provider/callback", get(create).post(create))
        .route_layer(middleware::from_fn_with_state(state, provider::callback_phase));

    Router::new()
        .route("/", get(new))
        .route("/sessions/new", get(new))
        .route("/auth/failure", get(failure))
        .route("/sessions/failure", get(failure))
        .route("/logout", get(destroy))
        .route("/sessions/destroy", get(destroy))
        .merge(callback)
}

// =============================================================================
// Login chooser
// =============================================================================

/// GET /
///
/// Shows the pending notice, the logged-in user, and a link per
/// enabled provider.
async fn new(
    State(state): State<AppState>,
    mut session: SessionContext,
) -> Result<impl IntoResponse, AppError> {
    let notice = session.take_notice();
    let user = session.current_user().await?;
    let providers = provider::enabled_providers(&state.config);

    let page = super::pages::login_chooser(notice.as_deref(), user.as_ref(), &providers);
    Ok((session, Html(page)))
}

// =============================================================================
// Callback
// =============================================================================

/// GET/POST /auth/:provider/callback
///
/// The provider integration has already validated the login and left the
/// payload in the request extensions.
async fn create(
    State(state): State<AppState>,
    Extension(payload): Extension<AuthPayload>,
    mut session: SessionContext,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!(?payload, "Auth payload received");

    let authentications = AuthenticationService::new(state.db.clone());
    let result = async {
        let authentication = authentications.find_or_create_from_payload(&payload).await?;
        authentications.user_for(&authentication).await
    }
    .await;

    let user = match result {
        Ok(user) => user,
        Err(error) => {
            crate::metrics::observe_login(&payload.provider, "error");
            return Err(error);
        }
    };
    crate::metrics::observe_login(&payload.provider, "success");

    tracing::info!(
        user_id = %user.id,
        provider = %payload.provider,
        "User logged in"
    );

    session.set_current_user(Some(user))?;
    session.set_notice(LOGGED_IN_NOTICE)?;
    Ok((session, Redirect::to("/")))
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Clears the session whether or not anyone was logged in.
async fn destroy(mut session: SessionContext) -> Result<impl IntoResponse, AppError> {
    if let Some(user_id) = session.user_id() {
        tracing::info!(user_id = %user_id, "User logged out");
    }
    crate::metrics::LOGOUTS_TOTAL.inc();

    session.set_current_user(None)?;
    session.set_notice(SIGNED_OUT_NOTICE)?;
    Ok((session, Redirect::to("/")))
}

// =============================================================================
// Failure
// =============================================================================

/// GET /auth/failure
///
/// Leaves the session alone and shows a notice on the next page.
/// Repeated or unknown query parameters are tolerated.
async fn failure(
    Query(params): Query<HashMap<String, String>>,
    mut session: SessionContext,
) -> Result<impl IntoResponse, AppError> {
    let param = |key: &str| params.get(key).map(String::as_str).unwrap_or("unknown");
    tracing::info!(
        message = param("message"),
        strategy = param("strategy"),
        "Access was not granted"
    );

    session.set_notice(ACCESS_DENIED_NOTICE)?;
    Ok((session, Redirect::to("/")))
}
