//! Health and metrics endpoints.
//!
//! Provides:
//! - `/health` - Liveness probe (always returns 200 if the server is running)
//! - `/ready` - Readiness probe (returns 200 while serving admission requests)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;

/// Labels for admission decision metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct DecisionLabels {
    pub allowed: bool,
    pub reason: String,
}

impl EncodeLabelSet for DecisionLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        let allowed = if self.allowed { "true" } else { "false" };
        ("allowed", allowed).encode(encoder.encode_label())?;
        ("reason", self.reason.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for change lookup metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct BackendLabels {
    pub backend: String,
}

impl EncodeLabelSet for BackendLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("backend", self.backend.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Admission decisions by outcome
    pub admission_decisions_total: Family<DecisionLabels, Counter>,
    /// Reviews rejected before reaching the decision engine
    pub malformed_reviews_total: Counter,
    /// Change lookup latency by backend
    pub lookup_duration_seconds: Family<BackendLabels, Histogram>,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_decisions_total = Family::<DecisionLabels, Counter>::default();
        registry.register(
            "change_gate_admission_decisions",
            "Total number of admission decisions",
            admission_decisions_total.clone(),
        );

        let malformed_reviews_total = Counter::default();
        registry.register(
            "change_gate_malformed_reviews",
            "Total number of unreadable AdmissionReview bodies",
            malformed_reviews_total.clone(),
        );

        let lookup_duration_seconds =
            Family::<BackendLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 15))
            });
        registry.register(
            "change_gate_lookup_duration_seconds",
            "Duration of change ticket lookups in seconds",
            lookup_duration_seconds.clone(),
        );

        Self {
            admission_decisions_total,
            malformed_reviews_total,
            lookup_duration_seconds,
            registry,
        }
    }

    /// Record an admission decision
    pub fn record_decision(&self, allowed: bool, reason: &str) {
        let labels = DecisionLabels {
            allowed,
            reason: reason.to_string(),
        };
        self.admission_decisions_total.get_or_create(&labels).inc();
    }

    /// Record a review that could not be decoded
    pub fn record_malformed_review(&self) {
        self.malformed_reviews_total.inc();
    }

    /// Record the duration of a change lookup
    pub fn record_lookup(&self, backend: &str, duration_secs: f64) {
        let labels = BackendLabels {
            backend: backend.to_string(),
        };
        self.lookup_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health endpoints
pub struct HealthState {
    /// Whether the webhook is accepting admission requests
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the webhook as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the webhook is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
///
/// If we can respond, we're alive.
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable during startup and shutdown.
async fn ready(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
