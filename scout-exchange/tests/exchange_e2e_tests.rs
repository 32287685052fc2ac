//! End-to-end tests for the ID.me to Firebase token exchange.
//!
//! The exchange runs with the real HTTP clients against wiremock stand-ins for
//! ID.me, the Google OAuth2 token endpoint and the Firebase Auth (Identity
//! Toolkit) admin API.
//!
//! Flows:
//! 1. New verified user: lookup misses, account created, claims set, token issued
//! 2. Existing verified user: lookup hits, no account created
//! 3. Unverified user: permission denied before Firebase is touched
//! 4. Upstream failures: ID.me and Identity Toolkit errors surface as INTERNAL
//! 5. Callable HTTP surface over the same stack

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header as http_header, Request, StatusCode};
use scout_auth::{CustomTokenSigner, ServiceAccountKey, SignerConfig, VerificationClaims};
use scout_clients::{IdentityToolkitClient, IdmeClient, ServiceConfig, ServiceEndpoint};
use scout_exchange::{
    router, CallableErrorKind, ExchangeRequest, TokenExchange, VerificationPolicy, CALLABLE_PATH,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT_ID: &str = "scout-test";
const CLIENT_EMAIL: &str = "firebase-adminsdk@scout-test.iam.gserviceaccount.com";
const IDME_TOKEN: &str = "idme-access-token";
const ACCESS_TOKEN: &str = "ya29.test-access-token";

/// Test fixture providing mock servers for every upstream service.
struct TestFixture {
    /// Mock ID.me API.
    idme_server: MockServer,
    /// Mock Identity Toolkit API.
    toolkit_server: MockServer,
    /// Mock OAuth2 token endpoint.
    oauth_server: MockServer,
    /// Test service configuration.
    config: ServiceConfig,
}

impl TestFixture {
    async fn new() -> Self {
        let idme_server = MockServer::start().await;
        let toolkit_server = MockServer::start().await;
        let oauth_server = MockServer::start().await;

        let config = ServiceConfig {
            idme: ServiceEndpoint::new(idme_server.uri()),
            identity_toolkit: ServiceEndpoint::new(toolkit_server.uri()),
            project_id: Some(PROJECT_ID.to_string()),
            credentials_path: None,
            emulator_host: None,
            default_timeout_secs: 10,
        };

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": ACCESS_TOKEN,
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .mount(&oauth_server)
            .await;

        Self {
            idme_server,
            toolkit_server,
            oauth_server,
            config,
        }
    }

    fn service_account(&self) -> ServiceAccountKey {
        ServiceAccountKey::from_json(
            &json!({
                "type": "service_account",
                "project_id": PROJECT_ID,
                "private_key_id": "test-key-id",
                "private_key": include_str!("../../testdata/test_rsa_private.pem"),
                "client_email": CLIENT_EMAIL,
                "token_uri": format!("{}/token", self.oauth_server.uri()),
            })
            .to_string(),
        )
        .unwrap()
    }

    fn exchange(&self) -> TokenExchange {
        self.exchange_with_idme(self.config.idme.clone())
    }

    fn exchange_with_idme(&self, idme_endpoint: ServiceEndpoint) -> TokenExchange {
        let idme = IdmeClient::new(idme_endpoint, self.config.timeout()).unwrap();
        let users = IdentityToolkitClient::from_service_account(
            self.config.identity_toolkit.clone(),
            PROJECT_ID,
            &self.service_account(),
            self.config.timeout(),
        )
        .unwrap();

        TokenExchange::new(Arc::new(idme), Arc::new(users), VerificationPolicy::default())
    }

    async fn mock_idme(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path("/api/public/v3/attributes.json"))
            .and(header("Authorization", format!("Bearer {}", IDME_TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&self.idme_server)
            .await;
    }

    async fn mock_lookup(&self, users: Value, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(project_path("accounts:lookup")))
            .and(header("Authorization", format!("Bearer {}", ACCESS_TOKEN).as_str()))
            .and(body_partial_json(json!({ "email": ["jane@example.com"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(users))
            .expect(expected_calls)
            .mount(&self.toolkit_server)
            .await;
    }

    async fn mock_create(&self, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(project_path("accounts")))
            .and(body_partial_json(json!({
                "email": "jane@example.com",
                "emailVerified": true,
                "displayName": "Jane Doe"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "identitytoolkit#SignupNewUserResponse",
                "localId": "new-uid-1"
            })))
            .expect(expected_calls)
            .mount(&self.toolkit_server)
            .await;
    }

    async fn mock_update(&self, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(project_path("accounts:update")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "identitytoolkit#SetAccountInfoResponse"
            })))
            .expect(expected_calls)
            .mount(&self.toolkit_server)
            .await;
    }

    /// Custom claims sent with the last `accounts:update` call.
    async fn claims_sent(&self) -> VerificationClaims {
        let requests = self.toolkit_server.received_requests().await.unwrap();
        let update = requests
            .iter()
            .rev()
            .find(|r| r.url.path() == project_path("accounts:update"))
            .expect("no accounts:update request");

        let body: Value = serde_json::from_slice(&update.body).unwrap();
        let attributes: Value =
            serde_json::from_str(body["customAttributes"].as_str().unwrap()).unwrap();
        serde_json::from_value(attributes).unwrap()
    }
}

fn project_path(operation: &str) -> String {
    format!("/v1/projects/{}/{}", PROJECT_ID, operation)
}

fn verifying_signer() -> CustomTokenSigner {
    CustomTokenSigner::new(SignerConfig {
        private_key: Some(include_str!("../../testdata/test_rsa_private.pem").to_string()),
        public_key: Some(include_str!("../../testdata/test_rsa_public.pem").to_string()),
        issuer: CLIENT_EMAIL.to_string(),
        ..Default::default()
    })
    .unwrap()
}

fn verified_profile() -> Value {
    json!({
        "attributes": [
            { "handle": "email", "name": "Email", "value": "jane@example.com" },
            { "handle": "fname", "name": "First Name", "value": "Jane" },
            { "handle": "lname", "name": "Last Name", "value": "Doe" }
        ],
        "status": [
            { "group": "military", "subgroups": ["Veteran"], "verified": true }
        ]
    })
}

// =============================================================================
// Flow 1: new verified user
// =============================================================================

#[tokio::test]
async fn test_new_verified_user_workflow() {
    let fixture = TestFixture::new().await;
    fixture.mock_idme(verified_profile()).await;
    fixture.mock_lookup(json!({ "kind": "identitytoolkit#GetAccountInfoResponse" }), 1).await;
    fixture.mock_create(1).await;
    fixture.mock_update(1).await;

    let response = fixture
        .exchange()
        .verify_and_issue_token(ExchangeRequest::new(IDME_TOKEN))
        .await
        .unwrap();

    let claims = verifying_signer()
        .verify_custom_token(&response.custom_token)
        .unwrap();
    assert_eq!(claims.uid, "new-uid-1");
    assert_eq!(claims.iss, CLIENT_EMAIL);
    assert_eq!(claims.sub, CLIENT_EMAIL);
    assert_eq!(claims.verification(), Some(VerificationClaims::verified("military")));

    assert_eq!(fixture.claims_sent().await, VerificationClaims::verified("military"));
}

// =============================================================================
// Flow 2: existing verified user
// =============================================================================

#[tokio::test]
async fn test_existing_user_workflow() {
    let fixture = TestFixture::new().await;
    fixture.mock_idme(verified_profile()).await;
    fixture
        .mock_lookup(
            json!({
                "users": [{
                    "localId": "existing-uid",
                    "email": "jane@example.com",
                    "emailVerified": true,
                    "customAttributes": "{\"idmeVerified\":false}"
                }]
            }),
            1,
        )
        .await;
    fixture.mock_create(0).await;
    fixture.mock_update(1).await;

    let response = fixture
        .exchange()
        .verify_and_issue_token(ExchangeRequest::new(IDME_TOKEN))
        .await
        .unwrap();

    let claims = verifying_signer()
        .verify_custom_token(&response.custom_token)
        .unwrap();
    assert_eq!(claims.uid, "existing-uid");
    assert_eq!(fixture.claims_sent().await, VerificationClaims::verified("military"));
}

#[tokio::test]
async fn test_access_token_reused_across_exchanges() {
    let fixture = TestFixture::new().await;
    Mock::given(method("GET"))
        .and(path("/api/public/v3/attributes.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(verified_profile()))
        .mount(&fixture.idme_server)
        .await;
    fixture
        .mock_lookup(json!({ "users": [{ "localId": "existing-uid", "email": "jane@example.com" }] }), 2)
        .await;
    fixture.mock_update(2).await;

    let exchange = fixture.exchange();
    for _ in 0..2 {
        exchange
            .verify_and_issue_token(ExchangeRequest::new(IDME_TOKEN))
            .await
            .unwrap();
    }

    let token_requests = fixture.oauth_server.received_requests().await.unwrap();
    assert_eq!(token_requests.len(), 1);
}

// =============================================================================
// Flow 3: unverified user
// =============================================================================

#[tokio::test]
async fn test_unverified_user_is_denied() {
    let fixture = TestFixture::new().await;
    fixture
        .mock_idme(json!({
            "attributes": [{ "handle": "email", "value": "jane@example.com" }],
            "status": [{ "group": "military", "subgroups": [], "verified": false }]
        }))
        .await;
    fixture.mock_lookup(json!({}), 0).await;
    fixture.mock_create(0).await;
    fixture.mock_update(0).await;

    let err = fixture
        .exchange()
        .verify_and_issue_token(ExchangeRequest::new(IDME_TOKEN))
        .await
        .unwrap_err();

    assert_eq!(err.kind, CallableErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_missing_email_is_internal() {
    let fixture = TestFixture::new().await;
    fixture
        .mock_idme(json!({
            "attributes": [{ "handle": "fname", "value": "Jane" }],
            "status": [{ "group": "military", "verified": true }]
        }))
        .await;
    fixture.mock_lookup(json!({}), 0).await;

    let err = fixture
        .exchange()
        .verify_and_issue_token(ExchangeRequest::new(IDME_TOKEN))
        .await
        .unwrap_err();

    assert_eq!(err.kind, CallableErrorKind::Internal);
    assert_eq!(err.message, "No email found in ID.me response");
}

#[tokio::test]
async fn test_null_status_is_denied() {
    let fixture = TestFixture::new().await;
    fixture
        .mock_idme(json!({
            "attributes": [
                { "handle": "email", "value": "jane@example.com" },
                { "handle": "zip", "value": 12345 }
            ],
            "status": null
        }))
        .await;
    fixture.mock_lookup(json!({}), 0).await;
    fixture.mock_create(0).await;

    let err = fixture
        .exchange()
        .verify_and_issue_token(ExchangeRequest::new(IDME_TOKEN))
        .await
        .unwrap_err();

    assert_eq!(err.kind, CallableErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_null_subgroups_still_verified() {
    let fixture = TestFixture::new().await;
    fixture
        .mock_idme(json!({
            "attributes": [{ "handle": "email", "value": "jane@example.com" }],
            "status": [{ "group": "military", "subgroups": null, "verified": true }]
        }))
        .await;
    fixture
        .mock_lookup(json!({ "users": [{ "localId": "existing-uid", "email": "jane@example.com" }] }), 1)
        .await;
    fixture.mock_update(1).await;

    let response = fixture
        .exchange()
        .verify_and_issue_token(ExchangeRequest::new(IDME_TOKEN))
        .await
        .unwrap();

    let claims = verifying_signer()
        .verify_custom_token(&response.custom_token)
        .unwrap();
    assert_eq!(claims.uid, "existing-uid");
}

// =============================================================================
// Flow 4: upstream failures
// =============================================================================

#[tokio::test]
async fn test_idme_rejection_carries_upstream_response() {
    let fixture = TestFixture::new().await;
    Mock::given(method("GET"))
        .and(path("/api/public/v3/attributes.json"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\":\"invalid_token\"}"))
        .expect(1)
        .mount(&fixture.idme_server)
        .await;

    let err = fixture
        .exchange()
        .verify_and_issue_token(ExchangeRequest::new(IDME_TOKEN))
        .await
        .unwrap_err();

    assert_eq!(err.kind, CallableErrorKind::Internal);
    assert_eq!(
        err.details,
        Some(json!({ "upstreamStatus": 401, "upstreamBody": "{\"error\":\"invalid_token\"}" }))
    );
}

#[tokio::test]
async fn test_idme_unreachable_is_internal_without_details() {
    let fixture = TestFixture::new().await;
    let unbound = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    fixture.mock_lookup(json!({}), 0).await;

    let err = fixture
        .exchange_with_idme(ServiceEndpoint::new(unbound))
        .verify_and_issue_token(ExchangeRequest::new(IDME_TOKEN))
        .await
        .unwrap_err();

    assert_eq!(err.kind, CallableErrorKind::Internal);
    assert!(err.details.is_none());
}

#[tokio::test]
async fn test_lookup_failure_is_internal() {
    let fixture = TestFixture::new().await;
    fixture.mock_idme(verified_profile()).await;
    Mock::given(method("POST"))
        .and(path(project_path("accounts:lookup")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": 500, "message": "INTERNAL_ERROR" }
        })))
        .expect(1)
        .mount(&fixture.toolkit_server)
        .await;
    fixture.mock_create(0).await;
    fixture.mock_update(0).await;

    let err = fixture
        .exchange()
        .verify_and_issue_token(ExchangeRequest::new(IDME_TOKEN))
        .await
        .unwrap_err();

    assert_eq!(err.kind, CallableErrorKind::Internal);
    assert!(err.message.contains("INTERNAL_ERROR"));
}

#[tokio::test]
async fn test_toolkit_failure_is_internal() {
    let fixture = TestFixture::new().await;
    fixture.mock_idme(verified_profile()).await;
    fixture.mock_lookup(json!({}), 1).await;
    Mock::given(method("POST"))
        .and(path(project_path("accounts")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "EMAIL_EXISTS" }
        })))
        .expect(1)
        .mount(&fixture.toolkit_server)
        .await;
    fixture.mock_update(0).await;

    let err = fixture
        .exchange()
        .verify_and_issue_token(ExchangeRequest::new(IDME_TOKEN))
        .await
        .unwrap_err();

    assert_eq!(err.kind, CallableErrorKind::Internal);
    assert!(err.message.contains("EMAIL_EXISTS"));
}

// =============================================================================
// Flow 5: callable HTTP surface
// =============================================================================

#[tokio::test]
async fn test_callable_endpoint_workflow() {
    let fixture = TestFixture::new().await;
    fixture.mock_idme(verified_profile()).await;
    fixture.mock_lookup(json!({}), 1).await;
    fixture.mock_create(1).await;
    fixture.mock_update(1).await;

    let app = router(Arc::new(fixture.exchange()));
    let response = app
        .oneshot(
            Request::post(CALLABLE_PATH)
                .header(http_header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "data": { "idmeToken": IDME_TOKEN } }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    let token = body["result"]["customToken"].as_str().unwrap();
    let claims = verifying_signer().verify_custom_token(token).unwrap();
    assert_eq!(claims.uid, "new-uid-1");
}

#[tokio::test]
async fn test_callable_endpoint_denied() {
    let fixture = TestFixture::new().await;
    fixture
        .mock_idme(json!({
            "attributes": [{ "handle": "email", "value": "jane@example.com" }],
            "status": []
        }))
        .await;

    let app = router(Arc::new(fixture.exchange()));
    let response = app
        .oneshot(
            Request::post(CALLABLE_PATH)
                .header(http_header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "data": { "idmeToken": IDME_TOKEN } }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["status"], "PERMISSION_DENIED");
}
