//! change-gate - admission webhook that gates changes on approved change tickets.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration from the environment
//! - Selects the change validation backend
//! - Serves the webhook over TLS until SIGTERM/SIGINT

use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use tokio::signal;
use tracing::{error, info};

use change_gate::webhooks::WebhookState;
use change_gate::{Config, DecisionEngine, HealthState, run_webhook_server, validator_from_config};

/// Time allowed for in-flight admission requests to finish during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("change_gate=info".parse()?),
        )
        .json()
        .init();

    // reqwest and axum-server both pull in rustls; pin the process-wide provider
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        error!(error = ?e, "Failed to install rustls crypto provider");
        return Err("failed to install rustls crypto provider".into());
    }

    info!("Starting change-gate");

    let config = Config::from_env()?;
    info!(
        port = config.port,
        tls_cert_path = %config.tls_cert_path.display(),
        tls_key_path = %config.tls_key_path.display(),
        "Loaded configuration"
    );

    let health_state = Arc::new(HealthState::new());
    let validator = validator_from_config(&config)?;
    let engine = DecisionEngine::new(validator).with_health_state(health_state.clone());
    let state = Arc::new(WebhookState::new(engine, health_state.clone()));

    let handle = Handle::new();
    let server = run_webhook_server(
        state,
        config.port,
        &config.tls_cert_path,
        &config.tls_key_path,
        handle.clone(),
    );
    tokio::pin!(server);

    let shutdown_requested = tokio::select! {
        result = &mut server => {
            if let Err(e) = result {
                error!(error = %e, "Webhook server failed");
                return Err(e.into());
            }
            false
        }
        _ = shutdown_signal() => true,
    };

    if shutdown_requested {
        info!("Received shutdown signal, initiating graceful shutdown...");
        health_state.set_ready(false).await;
        handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)));
        if let Err(e) = server.await {
            error!(error = %e, "Webhook server failed during shutdown");
            return Err(e.into());
        }
    }

    info!("change-gate stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
