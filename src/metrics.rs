//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Login Metrics
    pub static ref LOGINS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("omnilogin_logins_total", "Total number of completed provider callbacks"),
        &["provider", "outcome"]
    ).expect("metric can be created");
    pub static ref LOGOUTS_TOTAL: IntCounter = IntCounter::new(
        "omnilogin_logouts_total",
        "Total number of logout requests"
    ).expect("metric can be created");
    pub static ref LOGIN_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("omnilogin_login_failures_total", "Total number of logins denied upstream"),
        &["strategy", "message"]
    ).expect("metric can be created");

    // Store Metrics
    pub static ref USERS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "omnilogin_users_created_total",
        "Total number of users created on first login"
    ).expect("metric can be created");
    pub static ref AUTHENTICATIONS_CREATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("omnilogin_authentications_created_total", "Total number of provider identities linked"),
        &["provider"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("omnilogin_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(LOGINS_TOTAL.clone()))
            .expect("LOGINS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(LOGOUTS_TOTAL.clone()))
            .expect("LOGOUTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(LOGIN_FAILURES_TOTAL.clone()))
            .expect("LOGIN_FAILURES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(USERS_CREATED_TOTAL.clone()))
            .expect("USERS_CREATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(AUTHENTICATIONS_CREATED_TOTAL.clone()))
            .expect("AUTHENTICATIONS_CREATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Record the outcome of a provider callback.
pub fn observe_login(provider: &str, outcome: &str) {
    LOGINS_TOTAL.with_label_values(&[provider, outcome]).inc();
}
