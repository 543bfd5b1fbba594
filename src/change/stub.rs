//! Deterministic in-memory change validator.
//!
//! Used when no external change service is configured. Rules, first match wins:
//! 1. `CHG-2025-001`, `CHG-2025-002`, `CHG-2025-003` are approved
//! 2. `CHG-2025-999` is pending
//! 3. `CHG-2025-000` does not exist
//! 4. Anything else starting with `CHG-` is auto-approved
//! 5. Everything else has an invalid format

use async_trait::async_trait;

use super::{ChangeError, ChangeRecord, ChangeValidator};

/// Tickets that are always approved
pub const APPROVED_CHANGE_IDS: [&str; 3] = ["CHG-2025-001", "CHG-2025-002", "CHG-2025-003"];
/// Ticket that exists but is still pending approval
pub const PENDING_CHANGE_ID: &str = "CHG-2025-999";
/// Ticket that the stub reports as not found
pub const MISSING_CHANGE_ID: &str = "CHG-2025-000";
/// Prefix of identifiers the stub auto-approves
pub const CHANGE_ID_PREFIX: &str = "CHG-";

/// Stub backend with fixed answers.
#[derive(Clone, Debug, Default)]
pub struct StubValidator;

impl StubValidator {
    pub fn new() -> Self {
        Self
    }

    fn resolve(change_id: &str) -> Result<ChangeRecord, ChangeError> {
        if APPROVED_CHANGE_IDS.contains(&change_id) {
            return Ok(record(
                change_id,
                "approved",
                true,
                "Deploy demo application update",
                "sam.correa@company.com",
            ));
        }

        if change_id == PENDING_CHANGE_ID {
            return Ok(record(
                change_id,
                "pending",
                false,
                "Pending change request",
                "john.doe@company.com",
            ));
        }

        if change_id == MISSING_CHANGE_ID {
            return Err(ChangeError::NotFound);
        }

        match change_id.strip_prefix(CHANGE_ID_PREFIX) {
            Some(rest) if !rest.is_empty() => Ok(record(
                change_id,
                "approved",
                true,
                "Auto-approved change",
                "system@company.com",
            )),
            _ => Err(ChangeError::InvalidFormat),
        }
    }
}

fn record(id: &str, status: &str, approved: bool, title: &str, requester: &str) -> ChangeRecord {
    ChangeRecord {
        id: id.to_string(),
        status: status.to_string(),
        approved,
        title: title.to_string(),
        requester: requester.to_string(),
        created_at: jiff::Timestamp::now().to_string(),
    }
}

#[async_trait]
impl ChangeValidator for StubValidator {
    fn backend(&self) -> &'static str {
        "stub"
    }

    async fn lookup(&self, change_id: &str) -> Result<ChangeRecord, ChangeError> {
        Self::resolve(change_id)
    }
}
