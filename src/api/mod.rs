//! API layer
//!
//! HTTP handlers for:
//! - Session controller (login chooser, callback, logout, failure)
//! - Metrics (Prometheus)

pub mod metrics;
mod pages;
mod sessions;

pub use metrics::metrics_router;
pub use sessions::{ACCESS_DENIED_NOTICE, LOGGED_IN_NOTICE, SIGNED_OUT_NOTICE, sessions_router};
