//! HTTP API behavior through the warp test harness.

mod common;

use common::{sample_document_bytes, TestPki};
use medsign::adapters::http::{routes, AppState};
use medsign::infra::config::ServiceConfiguration;
use medsign::{CertificateClass, PrincipalId, UnlockSecret};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const PASSWORD: &str = "clinic secret";

struct TestServer {
    state: Arc<AppState>,
    _data: TempDir,
}

/// Full stack on a temp data dir with one registered practitioner
/// certificate and one rendered prescription (id 123).
fn test_server() -> TestServer {
    let data = TempDir::new().expect("Should create temp dir");
    let config = ServiceConfiguration {
        data_dir: data.path().to_path_buf(),
        public_base_url: "http://localhost:8470".to_string(),
        official_validator_url: Some("https://validator.example.org".to_string()),
        ..ServiceConfiguration::default()
    };

    let components = medsign::bootstrap(&config).expect("Should bootstrap");

    let pki = TestPki::new();
    components
        .certificates
        .register(
            PrincipalId::new("dr-ana").expect("Should accept principal id"),
            &pki.container(PASSWORD),
            CertificateClass::A1,
            &UnlockSecret::new(PASSWORD).expect("Should accept secret"),
        )
        .expect("Should register certificate");

    fs::write(
        data.path().join("rendered").join("PRESCRIPTION-123"),
        sample_document_bytes("rx-123"),
    )
    .expect("Should write rendered document");

    let state = Arc::new(AppState::new(
        components.workflow,
        components.verification,
        config.public_base_url.clone(),
        config.official_validator_url.clone(),
    ));
    TestServer { state, _data: data }
}

fn sign_body(secret: &str) -> Value {
    json!({
        "unlock_secret": secret,
        "reason": "Prescription issuance",
    })
}

async fn sign_prescription(server: &TestServer) -> Value {
    let response = warp::test::request()
        .method("POST")
        .path("/documents/prescription/123/sign")
        .header("x-principal-id", "dr-ana")
        .header("x-principal-name", "Dr. Ana Souza")
        .json(&sign_body(PASSWORD))
        .reply(&routes(server.state.clone()))
        .await;
    assert_eq!(response.status(), 200, "body: {:?}", response.body());
    serde_json::from_slice(response.body()).expect("Should parse response")
}

#[tokio::test]
async fn test_sign_returns_verification_handle() {
    let server = test_server();
    let body = sign_prescription(&server).await;

    let hash = body["signature_hash"].as_str().expect("Should have hash");
    assert_eq!(hash.len(), 64);
    assert_eq!(
        body["verification_url"].as_str().expect("Should have url"),
        format!("http://localhost:8470/verify/{hash}")
    );
}

#[tokio::test]
async fn test_verify_known_hash() {
    let server = test_server();
    let signed = sign_prescription(&server).await;
    let hash = signed["signature_hash"].as_str().expect("Should have hash");

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/verify/{hash}"))
        .reply(&routes(server.state.clone()))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = serde_json::from_slice(response.body()).expect("Should parse");
    assert_eq!(body["found"], true);
    assert_eq!(body["document_type"], "PRESCRIPTION");
    assert_eq!(body["signer_display_name"], "Dr. Ana Souza");
    assert_eq!(body["valid_at_signing"], true);
}

#[tokio::test]
async fn test_verify_unknown_hash_says_only_not_found() {
    let server = test_server();

    for path in [
        &format!("/verify/{}", "ab".repeat(32)),
        "/verify/not-a-real-handle",
    ] {
        let response = warp::test::request()
            .method("GET")
            .path(path)
            .reply(&routes(server.state.clone()))
            .await;
        assert_eq!(response.status(), 404);
        assert_eq!(response.body().as_ref(), br#"{"found":false}"#);
    }
}

#[tokio::test]
async fn test_second_sign_conflicts() {
    let server = test_server();
    sign_prescription(&server).await;

    let response = warp::test::request()
        .method("POST")
        .path("/documents/prescription/123/sign")
        .header("x-principal-id", "dr-ana")
        .header("x-principal-name", "Dr. Ana Souza")
        .json(&sign_body(PASSWORD))
        .reply(&routes(server.state.clone()))
        .await;

    assert_eq!(response.status(), 409);
    let body: Value = serde_json::from_slice(response.body()).expect("Should parse");
    assert_eq!(body["error_code"], "ALREADY_SIGNED");
}

#[tokio::test]
async fn test_wrong_secret_is_unauthorized() {
    let server = test_server();

    let response = warp::test::request()
        .method("POST")
        .path("/documents/prescription/123/sign")
        .header("x-principal-id", "dr-ana")
        .header("x-principal-name", "Dr. Ana Souza")
        .json(&sign_body("wrong"))
        .reply(&routes(server.state.clone()))
        .await;

    assert_eq!(response.status(), 401);
    let body: Value = serde_json::from_slice(response.body()).expect("Should parse");
    assert_eq!(body["error_code"], "WRONG_SECRET");
}

#[tokio::test]
async fn test_missing_principal_headers_rejected() {
    let server = test_server();

    let response = warp::test::request()
        .method("POST")
        .path("/documents/prescription/123/sign")
        .json(&sign_body(PASSWORD))
        .reply(&routes(server.state.clone()))
        .await;

    assert_eq!(response.status(), 400);
    let body: Value = serde_json::from_slice(response.body()).expect("Should parse");
    assert_eq!(body["error_code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_document_kind_is_not_found() {
    let server = test_server();

    let response = warp::test::request()
        .method("POST")
        .path("/documents/invoice/123/sign")
        .header("x-principal-id", "dr-ana")
        .header("x-principal-name", "Dr. Ana Souza")
        .json(&sign_body(PASSWORD))
        .reply(&routes(server.state.clone()))
        .await;

    assert_eq!(response.status(), 404);
    let body: Value = serde_json::from_slice(response.body()).expect("Should parse");
    assert_eq!(body["error_code"], "DOCUMENT_NOT_FOUND");
}

#[tokio::test]
async fn test_unrendered_document_is_not_found() {
    let server = test_server();

    let response = warp::test::request()
        .method("POST")
        .path("/documents/referral/999/sign")
        .header("x-principal-id", "dr-ana")
        .header("x-principal-name", "Dr. Ana Souza")
        .json(&sign_body(PASSWORD))
        .reply(&routes(server.state.clone()))
        .await;

    assert_eq!(response.status(), 404);
    let body: Value = serde_json::from_slice(response.body()).expect("Should parse");
    assert_eq!(body["error_code"], "DOCUMENT_NOT_FOUND");
}

#[tokio::test]
async fn test_verification_page_shows_facts_not_content() {
    let server = test_server();
    let signed = sign_prescription(&server).await;
    let hash = signed["signature_hash"].as_str().expect("Should have hash");

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/verify/{hash}/page"))
        .reply(&routes(server.state.clone()))
        .await;

    assert_eq!(response.status(), 200);
    let page = String::from_utf8(response.body().to_vec()).expect("Should be UTF-8");
    assert!(page.contains("Signature found"));
    assert!(page.contains("Dr. Ana Souza"));
    assert!(page.contains("https://validator.example.org"));
    assert!(
        !page.contains("rx-123"),
        "page must not leak rendered content"
    );
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = test_server();

    let response = warp::test::request()
        .method("GET")
        .path("/healthz")
        .reply(&routes(server.state.clone()))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = serde_json::from_slice(response.body()).expect("Should parse");
    assert_eq!(body["status"], "ok");
}
