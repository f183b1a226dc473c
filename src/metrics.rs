//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gatekeeper_http_requests_total", "Total number of HTTP requests"),
        &["method", "status"]
    ).expect("metric can be created");

    // Auth Metrics
    pub static ref AUTH_GATE_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gatekeeper_auth_gate_decisions_total", "Auth gate decisions by outcome"),
        &["decision"]
    ).expect("metric can be created");
    pub static ref OAUTH_CALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gatekeeper_oauth_callbacks_total", "OAuth callbacks by outcome"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref LOGOUTS_TOTAL: IntCounter = IntCounter::new(
        "gatekeeper_logouts_total",
        "Total number of explicit logouts"
    ).expect("metric can be created");

    // Session Metrics
    pub static ref SESSIONS_ACTIVE: IntGauge = IntGauge::new(
        "gatekeeper_sessions_active",
        "Current number of stored sessions"
    ).expect("metric can be created");
    pub static ref SESSIONS_EXPIRED_TOTAL: IntCounter = IntCounter::new(
        "gatekeeper_sessions_expired_total",
        "Total number of sessions removed by expiry"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gatekeeper_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("HTTP_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(AUTH_GATE_DECISIONS_TOTAL.clone()))
            .expect("AUTH_GATE_DECISIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(OAUTH_CALLBACKS_TOTAL.clone()))
            .expect("OAUTH_CALLBACKS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(LOGOUTS_TOTAL.clone()))
            .expect("LOGOUTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SESSIONS_ACTIVE.clone()))
            .expect("SESSIONS_ACTIVE can be registered");
        REGISTRY
            .register(Box::new(SESSIONS_EXPIRED_TOTAL.clone()))
            .expect("SESSIONS_EXPIRED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
