//! Admission decision for a single object.
//!
//! Single pass, fail-closed:
//! - no change ticket annotation: allowed
//! - lookup error of any kind: denied
//! - ticket found but not approved: denied
//! - ticket approved: allowed
//!
//! `ChangeRecord::approved` is the only field that can allow a change; the
//! status string is reported but never consulted.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::change::{ChangeError, ChangeValidator};
use crate::health::HealthState;

use super::annotations::extract_change_id;

/// Message returned when the object carries no change ticket
pub const NO_CHANGE_ID_MESSAGE: &str = "No change ID annotation found";

/// Why a decision was reached
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    /// Object is not under change management
    NoChangeId,
    /// Ticket is approved
    Approved,
    /// Ticket exists but is not approved
    NotApproved,
    /// Ticket is unknown to the backend
    NotFound,
    /// Backend unreachable, timed out, or returned an error
    Transport,
    /// Identifier rejected by the backend
    InvalidFormat,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::NoChangeId => "NoChangeId",
            DecisionReason::Approved => "Approved",
            DecisionReason::NotApproved => "NotApproved",
            DecisionReason::NotFound => "NotFound",
            DecisionReason::Transport => "Transport",
            DecisionReason::InvalidFormat => "InvalidFormat",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ChangeError> for DecisionReason {
    fn from(err: &ChangeError) -> Self {
        match err {
            ChangeError::NotFound => DecisionReason::NotFound,
            ChangeError::Transport(_) => DecisionReason::Transport,
            ChangeError::InvalidFormat => DecisionReason::InvalidFormat,
        }
    }
}

/// Outcome of an admission decision
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    /// Whether the object may be admitted
    pub allowed: bool,
    /// Human-readable explanation, surfaced to whoever applied the change
    pub message: String,
    /// Machine-readable reason
    pub reason: DecisionReason,
}

impl Decision {
    fn allow(reason: DecisionReason, message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            message: message.into(),
            reason,
        }
    }

    fn deny(reason: DecisionReason, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: message.into(),
            reason,
        }
    }
}

/// Combines identifier extraction and change validation into a verdict.
#[derive(Clone)]
pub struct DecisionEngine {
    validator: Arc<dyn ChangeValidator>,
    /// Optional health state for metrics
    health_state: Option<Arc<HealthState>>,
}

impl DecisionEngine {
    /// Create an engine around the configured validator
    pub fn new(validator: Arc<dyn ChangeValidator>) -> Self {
        Self {
            validator,
            health_state: None,
        }
    }

    /// Record decisions and lookup latency in `health_state`
    pub fn with_health_state(mut self, health_state: Arc<HealthState>) -> Self {
        self.health_state = Some(health_state);
        self
    }

    /// Name of the validator backend in use
    pub fn backend(&self) -> &'static str {
        self.validator.backend()
    }

    /// Decide whether the raw admitted object may be persisted.
    pub async fn decide(&self, raw_object: &[u8]) -> Decision {
        let decision = self.evaluate(raw_object).await;
        if let Some(state) = &self.health_state {
            state
                .metrics
                .record_decision(decision.allowed, decision.reason.as_str());
        }
        decision
    }

    async fn evaluate(&self, raw_object: &[u8]) -> Decision {
        let Some(change_id) = extract_change_id(raw_object) else {
            info!("No change ID found, allowing request");
            return Decision::allow(DecisionReason::NoChangeId, NO_CHANGE_ID_MESSAGE);
        };

        info!(change_id = %change_id, "Found change ID");

        let started = Instant::now();
        let lookup = self.validator.lookup(&change_id).await;
        if let Some(state) = &self.health_state {
            state
                .metrics
                .record_lookup(self.validator.backend(), started.elapsed().as_secs_f64());
        }

        let record = match lookup {
            Ok(record) => record,
            Err(e) => {
                error!(
                    change_id = %change_id,
                    error = %e,
                    kind = e.kind(),
                    "Change validation failed"
                );
                return Decision::deny(
                    DecisionReason::from(&e),
                    format!("Change {} validation failed: {}", change_id, e),
                );
            }
        };

        if !record.approved {
            warn!(
                change_id = %change_id,
                status = %record.status,
                "Change is not approved"
            );
            return Decision::deny(
                DecisionReason::NotApproved,
                format!(
                    "Change {} is not approved (status: {})",
                    change_id, record.status
                ),
            );
        }

        info!(
            change_id = %change_id,
            requester = %record.requester,
            "Change is approved, allowing request"
        );
        Decision::allow(
            DecisionReason::Approved,
            format!("Change {} approved by {}", change_id, record.requester),
        )
    }
}
