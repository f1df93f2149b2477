//! Omnilogin - third-party login for a small web application
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Session controller (chooser, callback, logout, failure)  │
//! │  - Provider integration (developer, GitHub)                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Authentication find-or-create                            │
//! │  - User find-or-create                                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `provider`: Identity-provider handshakes and the auth payload
//! - `service`: Business logic layer
//! - `data`: Database layer
//! - `auth`: Signed cookie sessions
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the database pool and HTTP client.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// HTTP client for provider handshakes
    pub http_client: Arc<reqwest::Client>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Build the outbound HTTP client
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!("Database connected");

        let http_client = reqwest::Client::builder()
            .user_agent("Omnilogin/0.1.0")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        tracing::info!(
            providers = ?provider::enabled_providers(&config),
            "Application state initialized successfully"
        );

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            http_client: Arc::new(http_client),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    };

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::sessions_router(state.clone()))
        .merge(provider::provider_router())
        .merge(api::metrics_router(state.clone()))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
