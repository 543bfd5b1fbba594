//! Change-ticket validation backends.
//!
//! A [`ChangeValidator`] answers one question: does this change ticket exist,
//! and is it approved? Two backends are provided:
//! - [`StubValidator`]: deterministic, in-memory, used when no change service is configured
//! - [`RemoteValidator`]: HTTP client for an external change-management service
//!
//! The backend is selected once at startup by [`validator_from_config`] and shared
//! by every admission request.

pub mod remote;
pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{Config, ConfigError};

pub use remote::{LOOKUP_TIMEOUT, RemoteValidator};
pub use stub::StubValidator;

/// A change ticket as reported by a validation backend.
///
/// `approved` is authoritative. `status` is informational and never gates a decision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Ticket identifier
    #[serde(default)]
    pub id: String,
    /// Workflow status tag, e.g. "approved" or "pending"
    #[serde(default)]
    pub status: String,
    /// Whether the change may be admitted
    pub approved: bool,
    /// Short description of the change
    #[serde(default)]
    pub title: String,
    /// Who requested the change
    #[serde(default)]
    pub requester: String,
    /// When the ticket was created (RFC 3339)
    #[serde(default)]
    pub created_at: String,
}

/// Errors returned by a change lookup.
///
/// Every variant results in a denied admission.
#[derive(Error, Debug)]
pub enum ChangeError {
    /// The backend does not know this ticket
    #[error("change record not found")]
    NotFound,

    /// The backend was unreachable, timed out, or answered with garbage
    #[error("{0}")]
    Transport(String),

    /// The identifier is not shaped like a change ticket
    #[error("invalid change ID format")]
    InvalidFormat,
}

impl ChangeError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeError::NotFound => "NotFound",
            ChangeError::Transport(_) => "Transport",
            ChangeError::InvalidFormat => "InvalidFormat",
        }
    }
}

/// Looks up change tickets by identifier.
#[async_trait]
pub trait ChangeValidator: Send + Sync {
    /// Name of the backend, used as a metrics label
    fn backend(&self) -> &'static str;

    /// Fetch the change record for `change_id`.
    async fn lookup(&self, change_id: &str) -> Result<ChangeRecord, ChangeError>;
}

/// Build the validator selected by configuration.
///
/// An external service URL selects [`RemoteValidator`]; otherwise the
/// deterministic [`StubValidator`] is used.
pub fn validator_from_config(config: &Config) -> Result<Arc<dyn ChangeValidator>, ConfigError> {
    match &config.external_service_url {
        Some(url) => {
            info!(
                url = %url,
                api_key_set = config.external_service_api_key.is_some(),
                "Using HTTP change service"
            );
            let validator =
                RemoteValidator::new(url.clone(), config.external_service_api_key.clone())?;
            Ok(Arc::new(validator))
        }
        None => {
            info!("Using stub change service");
            Ok(Arc::new(StubValidator::new()))
        }
    }
}
