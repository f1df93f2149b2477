//! Identity-provider integration
//!
//! Performs the provider handshake in front of the session controller:
//! - `/auth/:provider` starts the login (request phase)
//! - `/auth/:provider/callback` is wrapped by [`callback_phase`], which
//!   turns the provider's answer into an [`AuthPayload`] request extension
//!   or redirects to `/auth/failure`
//!
//! Strategies:
//! - `developer`: a plain form, for local use only
//! - `github`: OAuth 2.0 authorization code flow

mod developer;
mod github;
mod payload;

use std::collections::HashMap;

use axum::{
    Router,
    body::Body,
    extract::{Path, Request, State},
    http::{Method, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;

pub use payload::{AuthCredentials, AuthInfo, AuthPayload};

use crate::AppState;
use crate::config::AppConfig;
use crate::error::AppError;

pub const DEVELOPER: &str = "developer";
pub const GITHUB: &str = "github";

/// Largest callback form body accepted
const MAX_CALLBACK_BODY_BYTES: usize = 16 * 1024;

/// Why a strategy gave up on a callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyFailure {
    /// The provider reported an error, e.g. the user declined
    Denied(String),
    /// The returned state does not match the one we issued
    CsrfDetected,
    /// The provider rejected the authorization code
    InvalidCredentials,
    /// The provider could not be reached
    FailedToConnect,
}

impl StrategyFailure {
    /// Value of the `message` parameter passed to `/auth/failure`
    pub fn message(&self) -> &str {
        match self {
            Self::Denied(message) => message,
            Self::CsrfDetected => "csrf_detected",
            Self::InvalidCredentials => "invalid_credentials",
            Self::FailedToConnect => "failed_to_connect",
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Denied(_) => "denied",
            Self::CsrfDetected => "csrf_detected",
            Self::InvalidCredentials => "invalid_credentials",
            Self::FailedToConnect => "failed_to_connect",
        }
    }
}

/// Providers enabled by configuration, in display order
pub fn enabled_providers(config: &AppConfig) -> Vec<&'static str> {
    let mut providers = Vec::new();
    if config.auth.github.is_some() {
        providers.push(GITHUB);
    }
    if config.auth.developer.enabled {
        providers.push(DEVELOPER);
    }
    providers
}

/// Create the request-phase router
///
/// Routes:
/// - GET/POST /auth/:provider - Start the provider handshake
pub fn provider_router() -> Router<AppState> {
    Router::new().route("/auth/:provider", get(request_phase).post(request_phase))
}

/// GET /auth/:provider
///
/// Sends the browser to the provider (or, for `developer`, renders the
/// login form).
async fn request_phase(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    match provider.as_str() {
        DEVELOPER if state.config.auth.developer.enabled => {
            Ok(developer::request_phase().into_response())
        }
        GITHUB => {
            let github_config = state.config.auth.github.as_ref().ok_or(AppError::NotFound)?;
            Ok(github::request_phase(&state.config, github_config, jar)?.into_response())
        }
        _ => Err(AppError::NotFound),
    }
}

/// Callback middleware for `/auth/:provider/callback`
///
/// On success the downstream handler finds the [`AuthPayload`] in the
/// request extensions. Upstream errors never reach it; they are sent to
/// `/auth/failure?message=..&strategy=..` instead.
pub async fn callback_phase(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let params = callback_params(&parts, body).await?;
    let mut jar = CookieJar::from_headers(&parts.headers);

    let outcome = match provider.as_str() {
        DEVELOPER if state.config.auth.developer.enabled => match upstream_error(&params) {
            Some(failure) => Err(failure),
            None => Ok(developer::callback_phase(&params)),
        },
        GITHUB => {
            let github_config = state.config.auth.github.as_ref().ok_or(AppError::NotFound)?;
            let outcome = match upstream_error(&params) {
                Some(failure) => Err(failure),
                None => {
                    github::callback_phase(
                        &state.http_client,
                        &state.config,
                        github_config,
                        &params,
                        &jar,
                    )
                    .await
                }
            };
            jar = github::clear_state(jar);
            outcome
        }
        _ => return Err(AppError::NotFound),
    };

    let response = match outcome {
        Ok(payload) => {
            let mut request = Request::from_parts(parts, Body::empty());
            request.extensions_mut().insert(payload);
            next.run(request).await
        }
        Err(failure) => failure_redirect(&provider, &failure).into_response(),
    };

    Ok((jar, response).into_response())
}

/// Query parameters merged with a urlencoded POST body (body wins)
async fn callback_params(parts: &Parts, body: Body) -> Result<HashMap<String, String>, AppError> {
    let mut params: HashMap<String, String> = parts
        .uri
        .query()
        .map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    if parts.method == Method::POST {
        let bytes = axum::body::to_bytes(body, MAX_CALLBACK_BODY_BYTES)
            .await
            .map_err(|e| AppError::Validation(format!("unreadable callback body: {e}")))?;
        params.extend(url::form_urlencoded::parse(&bytes).into_owned());
    }

    Ok(params)
}

fn upstream_error(params: &HashMap<String, String>) -> Option<StrategyFailure> {
    params
        .get("error")
        .filter(|error| !error.trim().is_empty())
        .map(|error| StrategyFailure::Denied(error.clone()))
}

fn failure_redirect(provider: &str, failure: &StrategyFailure) -> Redirect {
    crate::metrics::LOGIN_FAILURES_TOTAL
        .with_label_values(&[provider, failure.kind()])
        .inc();
    tracing::warn!(
        strategy = %provider,
        message = %failure.message(),
        "Provider login failed"
    );

    Redirect::to(&format!(
        "/auth/failure?message={}&strategy={}",
        urlencoding::encode(failure.message()),
        urlencoding::encode(provider)
    ))
}
