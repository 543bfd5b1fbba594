//! `AdmissionReview` wire format.
//!
//! Only the fields the webhook reads or writes are modelled; unknown fields are
//! ignored on input. The admitted object is kept as raw JSON and handed to the
//! decision engine untouched.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

/// Errors produced while decoding or encoding an `AdmissionReview`
#[derive(Error, Debug)]
pub enum ReviewError {
    /// The body is not a readable `AdmissionReview`
    #[error("malformed AdmissionReview: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The review has no `request`
    #[error("malformed AdmissionReview: missing request")]
    MissingRequest,

    /// The response could not be serialized
    #[error("failed to encode AdmissionReview: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Group/version/kind of the admitted resource
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

/// Inbound admission request
#[derive(Debug, Serialize, Deserialize)]
pub struct AdmissionRequest {
    /// Correlation token, echoed back in the response
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<GroupVersionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Raw JSON of the object being admitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Box<RawValue>>,
}

impl AdmissionRequest {
    /// Raw bytes of the admitted object; empty when the request carries none
    pub fn object_bytes(&self) -> &[u8] {
        self.object
            .as_deref()
            .map(|raw| raw.get().as_bytes())
            .unwrap_or_default()
    }

    /// Kind of the admitted resource, for logging
    pub fn kind_name(&self) -> &str {
        self.kind.as_ref().map(|k| k.kind.as_str()).unwrap_or("")
    }
}

/// `status` block of an admission response
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub message: String,
}

/// Outbound admission response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    pub status: ResponseStatus,
}

/// The envelope exchanged with the API server
#[derive(Debug, Serialize, Deserialize)]
pub struct AdmissionReview {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

fn default_api_version() -> String {
    ADMISSION_API_VERSION.to_string()
}

fn default_kind() -> String {
    ADMISSION_REVIEW_KIND.to_string()
}

/// Decode an inbound review.
///
/// The request is taken out of the envelope and returned alongside it. Fails when
/// the body is not JSON, does not match the envelope, or has no request.
pub fn decode_review(body: &[u8]) -> Result<(AdmissionReview, AdmissionRequest), ReviewError> {
    let mut review: AdmissionReview =
        serde_json::from_slice(body).map_err(ReviewError::Malformed)?;
    let request = review.request.take().ok_or(ReviewError::MissingRequest)?;
    Ok((review, request))
}

/// Turn a decoded review into its response for the request `uid`.
///
/// The envelope no longer carries the request, so the admitted object is not
/// echoed back.
pub fn into_response(
    mut review: AdmissionReview,
    uid: String,
    allowed: bool,
    message: impl Into<String>,
) -> AdmissionReview {
    review.request = None;
    review.response = Some(AdmissionResponse {
        uid,
        allowed,
        status: ResponseStatus {
            message: message.into(),
        },
    });
    review
}

/// Serialize a review to bytes
pub fn encode_review(review: &AdmissionReview) -> Result<Vec<u8>, ReviewError> {
    serde_json::to_vec(review).map_err(ReviewError::Encode)
}
