//! Change-gating admission webhook.
//!
//! Request flow:
//! 1. [`review`] decodes the `AdmissionReview`
//! 2. [`annotations`] pulls the change ticket off the admitted object
//! 3. [`decision`] looks the ticket up and reaches a fail-closed verdict
//! 4. [`review`] encodes the response envelope

pub mod annotations;
pub mod decision;
pub mod review;
mod server;

pub use annotations::{CHANGE_ID_ANNOTATIONS, extract_change_id};
pub use decision::{Decision, DecisionEngine, DecisionReason, NO_CHANGE_ID_MESSAGE};
pub use review::{AdmissionRequest, AdmissionResponse, AdmissionReview, ReviewError};
pub use server::{
    ADMIT_PATH, MAX_REVIEW_BYTES, WebhookError, WebhookState, create_webhook_router,
    run_webhook_server,
};
