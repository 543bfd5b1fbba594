//! change-gate library crate
//!
//! A validating admission webhook that only admits objects whose change
//! ticket annotation refers to an approved change.

pub mod change;
pub mod config;
pub mod health;
pub mod webhooks;

pub use change::{ChangeError, ChangeRecord, ChangeValidator, validator_from_config};
pub use config::{Config, ConfigError};
pub use health::HealthState;
pub use webhooks::{
    DecisionEngine, WebhookError, WebhookState, create_webhook_router, run_webhook_server,
};
