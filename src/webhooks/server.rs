//! Admission webhook server.
//!
//! Serves the decision endpoint together with the health endpoints on a single
//! TLS listener:
//! - `POST /admit` - ValidatingWebhookConfiguration target
//! - `GET /health`, `GET /ready`, `GET /metrics`
//!
//! The API server calls `/admit` synchronously. If it gives up on a request the
//! connection is dropped, which drops the handler future and any in-flight
//! change lookup with it.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::health::{self, HealthState};
use crate::webhooks::decision::DecisionEngine;
use crate::webhooks::review::{
    AdmissionRequest, AdmissionReview, decode_review, encode_review, into_response,
};

/// Path of the decision endpoint
pub const ADMIT_PATH: &str = "/admit";

/// Largest accepted AdmissionReview body (object plus envelope)
pub const MAX_REVIEW_BYTES: usize = 8 * 1024 * 1024;

/// Shared state for webhook handlers
pub struct WebhookState {
    pub engine: DecisionEngine,
    pub health_state: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(engine: DecisionEngine, health_state: Arc<HealthState>) -> Self {
        Self {
            engine,
            health_state,
        }
    }
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Certificate or key could not be loaded
    #[error("TLS configuration error: {0}")]
    TlsConfig(#[source] std::io::Error),

    /// Listener failed to bind or serve
    #[error("Webhook server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Create the webhook router, health endpoints included
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    let health_state = state.health_state.clone();
    Router::new()
        .route(ADMIT_PATH, post(admit))
        .layer(DefaultBodyLimit::max(MAX_REVIEW_BYTES))
        .with_state(state)
        .merge(health::create_router(health_state))
}

/// Decision endpoint handler
async fn admit(State(state): State<Arc<WebhookState>>, body: Bytes) -> Response {
    let (review, request) = match decode_review(&body) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "Rejecting unreadable admission review");
            state.health_state.metrics.record_malformed_review();
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let span = info_span!(
        "admission",
        uid = %request.uid,
        kind = %request.kind_name(),
        namespace = request.namespace.as_deref().unwrap_or(""),
        name = request.name.as_deref().unwrap_or(""),
        operation = request.operation.as_deref().unwrap_or(""),
    );

    review_admission(&state, review, request).instrument(span).await
}

async fn review_admission(
    state: &WebhookState,
    review: AdmissionReview,
    request: AdmissionRequest,
) -> Response {
    info!("Processing admission request");
    let decision = state.engine.decide(request.object_bytes()).await;

    debug!(
        allowed = decision.allowed,
        reason = %decision.reason,
        "Admission decision reached"
    );

    let response = into_response(review, request.uid, decision.allowed, decision.message);

    match encode_review(&response) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode admission response");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:`port` and serves until `handle` is told to shut down.
/// Readiness is reported once the listener is bound, and withdrawn when serving
/// stops.
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    port: u16,
    cert_path: &Path,
    key_path: &Path,
    handle: Handle,
) -> Result<(), WebhookError> {
    let health_state = state.health_state.clone();
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(WebhookError::TlsConfig)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(
        port,
        cert_path = %cert_path.display(),
        key_path = %key_path.display(),
        "Starting webhook server with TLS"
    );

    let listening = handle.clone();
    let ready_state = health_state.clone();
    let readiness = tokio::spawn(async move {
        if let Some(bound) = listening.listening().await {
            info!(address = %bound, "Webhook server listening");
            ready_state.set_ready(true).await;
        }
    });

    let result = axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(WebhookError::Server);

    readiness.abort();
    let _ = readiness.await;
    health_state.set_ready(false).await;
    result
}
