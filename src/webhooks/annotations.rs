//! Change-ticket identifier lookup on the admitted object.
//!
//! The object is only inspected for `metadata.annotations`. Anything that
//! cannot be read as a string annotation is treated as "no identifier".

use serde_json::Value;

/// Annotation keys carrying a change ticket, in priority order.
///
/// The generic key wins over tool-specific keys when several are present.
pub const CHANGE_ID_ANNOTATIONS: [&str; 3] = [
    "change.company.com/id",
    "argocd.argoproj.io/change-id",
    "deployment.company.com/change-id",
];

/// Extract the change-ticket identifier from a raw JSON object.
///
/// The first recognised key holding a string value decides. Values of any other
/// type are skipped. Returns `None` when the payload is not JSON, lacks metadata
/// or annotations, carries no recognised string value, or that value is empty.
pub fn extract_change_id(raw_object: &[u8]) -> Option<String> {
    let object: Value = serde_json::from_slice(raw_object).ok()?;
    let annotations = object.get("metadata")?.get("annotations")?.as_object()?;

    CHANGE_ID_ANNOTATIONS
        .iter()
        .find_map(|key| annotations.get(*key).and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
