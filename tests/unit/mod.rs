// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for change-gate.
//!
//! These tests run without a cluster, TLS, or a change service and exercise
//! the admission pipeline end to end through the public API.

use std::sync::Arc;

use serde_json::{Value, json};

use change_gate::change::StubValidator;
use change_gate::webhooks::{DecisionEngine, WebhookState, create_webhook_router};
use change_gate::HealthState;

fn stub_engine() -> DecisionEngine {
    DecisionEngine::new(Arc::new(StubValidator::new()))
}

fn deployment(annotations: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": "demo-app",
            "namespace": "demo",
            "annotations": annotations,
        },
        "spec": {"replicas": 2},
    }))
    .unwrap()
}

fn review(uid: &str, object: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": uid,
            "kind": {"group": "apps", "version": "v1", "kind": "Deployment"},
            "resource": {"group": "apps", "version": "v1", "resource": "deployments"},
            "name": "demo-app",
            "namespace": "demo",
            "operation": "UPDATE",
            "object": object,
        }
    }))
    .unwrap()
}

mod decision_tests {
    use super::*;
    use change_gate::webhooks::{DecisionReason, NO_CHANGE_ID_MESSAGE};

    #[tokio::test]
    async fn test_unmanaged_object_is_allowed() {
        let decision = stub_engine()
            .decide(&deployment(json!({"team": "payments"})))
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.message, NO_CHANGE_ID_MESSAGE);
    }

    #[tokio::test]
    async fn test_fixed_approved_tickets() {
        let engine = stub_engine();
        for id in ["CHG-2025-001", "CHG-2025-002", "CHG-2025-003"] {
            let decision = engine
                .decide(&deployment(json!({"change.company.com/id": id})))
                .await;
            assert!(decision.allowed, "{} should be allowed", id);
            assert!(decision.message.contains("sam.correa@company.com"));
            assert!(decision.message.contains(id));
        }
    }

    #[tokio::test]
    async fn test_tool_specific_keys_are_honoured() {
        let engine = stub_engine();

        let decision = engine
            .decide(&deployment(
                json!({"argocd.argoproj.io/change-id": "CHG-2025-999"}),
            ))
            .await;
        assert!(!decision.allowed);
        assert!(decision.message.contains("pending"));

        let decision = engine
            .decide(&deployment(
                json!({"deployment.company.com/change-id": "CHG-2025-000"}),
            ))
            .await;
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::NotFound);
    }

    #[tokio::test]
    async fn test_generic_key_wins() {
        // Generic key says pending, tool key points at an approved ticket
        let decision = stub_engine()
            .decide(&deployment(json!({
                "argocd.argoproj.io/change-id": "CHG-2025-001",
                "change.company.com/id": "CHG-2025-999",
            })))
            .await;
        assert!(!decision.allowed);
        assert!(decision.message.contains("CHG-2025-999"));
    }

    #[tokio::test]
    async fn test_auto_approved_prefix() {
        let decision = stub_engine()
            .decide(&deployment(json!({"change.company.com/id": "CHG-7781"})))
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.message, "Change CHG-7781 approved by system@company.com");
    }

    #[tokio::test]
    async fn test_unknown_format_is_denied() {
        let decision = stub_engine()
            .decide(&deployment(json!({"change.company.com/id": "INC0012345"})))
            .await;
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::InvalidFormat);
        assert_eq!(
            decision.message,
            "Change INC0012345 validation failed: invalid change ID format"
        );
    }
}

mod remote_tests {
    use super::*;
    use std::time::{Duration, Instant};

    use change_gate::change::RemoteValidator;
    use change_gate::webhooks::DecisionReason;
    use reqwest::Url;

    #[tokio::test]
    async fn test_unresponsive_backend_denies_without_hanging() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let url = Url::parse(&format!("http://{}", addr)).unwrap();
        let validator =
            RemoteValidator::with_timeout(url, None, Duration::from_millis(250)).unwrap();
        let engine = DecisionEngine::new(Arc::new(validator));

        let started = Instant::now();
        let decision = engine
            .decide(&deployment(json!({"change.company.com/id": "CHG-2025-001"})))
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::Transport);
        assert!(decision.message.contains("CHG-2025-001"));
    }
}

mod server_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn post_review(body: Vec<u8>) -> (StatusCode, Vec<u8>) {
        let health_state = Arc::new(HealthState::new());
        let state = Arc::new(WebhookState::new(stub_engine(), health_state));
        let router = create_webhook_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/admit")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_uid_round_trip_and_object_stripped() {
        let uid = "2b6e6a8f-1c4d-4b0e-9a53-7f2d1e0c9b11";
        let object: Value = serde_json::from_slice(&deployment(
            json!({"change.company.com/id": "CHG-2025-002"}),
        ))
        .unwrap();

        let (status, body) = post_review(review(uid, object)).await;
        assert_eq!(status, StatusCode::OK);

        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["response"]["uid"], uid);
        assert_eq!(value["response"]["allowed"], true);
        assert_eq!(
            value["response"]["status"]["message"],
            "Change CHG-2025-002 approved by sam.correa@company.com"
        );
        assert!(value.get("request").is_none());

        let text = String::from_utf8(body).unwrap();
        assert!(!text.contains("\"replicas\""));
        assert!(!text.contains("deployments"));
    }

    #[tokio::test]
    async fn test_review_without_object_is_allowed() {
        let body = serde_json::to_vec(&json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {"uid": "no-object"}
        }))
        .unwrap();

        let (status, body) = post_review(body).await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["response"]["uid"], "no-object");
        assert_eq!(value["response"]["allowed"], true);
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_client_error() {
        let (status, _) = post_review(b"<AdmissionReview/>".to_vec()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unparseable_object_is_allowed() {
        // A string object is valid envelope JSON but carries no metadata
        let (status, body) = post_review(review("odd", json!("not an object"))).await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["response"]["allowed"], true);
    }
}

mod error_tests {
    use change_gate::{ChangeError, ConfigError, WebhookError};

    #[test]
    fn test_change_error_messages() {
        assert_eq!(ChangeError::NotFound.to_string(), "change record not found");
        assert_eq!(
            ChangeError::InvalidFormat.to_string(),
            "invalid change ID format"
        );
        assert_eq!(
            ChangeError::Transport("external service returned status 500".into()).to_string(),
            "external service returned status 500"
        );
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::InvalidPort("abc".to_string());
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_webhook_error_messages() {
        let err = WebhookError::TlsConfig(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "tls.crt",
        ));
        assert!(err.to_string().starts_with("TLS configuration error"));
    }
}
