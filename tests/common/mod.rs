// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, Response};
use deckvault_auth::config::Config;
use deckvault_auth::db::{FirestoreDb, MemoryDb};
use deckvault_auth::routes::create_router;
use deckvault_auth::services::{
    GoogleIdentityVerifier, MigrationCoordinator, SessionApi, SessionTokenService, UserDirectory,
};
use deckvault_auth::AppState;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;

pub const TEST_KID: &str = "test-kid";
pub const PROVIDER_PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/provider_private.pem");
pub const PROVIDER_PUBLIC_PEM: &[u8] = include_bytes!("../fixtures/provider_public.pem");
#[allow(dead_code)]
pub const ROGUE_PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/rogue_private.pem");

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Test app backed by an in-memory store and a static provider key.
/// Returns the router, the shared state and the store for inspection.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, MemoryDb) {
    let config = Config::test_default();
    let db = MemoryDb::new();

    let verifier = GoogleIdentityVerifier::new_with_static_key(
        &config,
        TEST_KID,
        DecodingKey::from_rsa_pem(PROVIDER_PUBLIC_PEM).expect("fixture public key"),
    )
    .expect("static verifier");

    let session = SessionApi::new(
        Arc::new(verifier),
        UserDirectory::new(Arc::new(db.clone())),
        MigrationCoordinator::new(Arc::new(db.clone())),
        SessionTokenService::from_config(&config),
    );

    let state = Arc::new(AppState { config, session });

    (create_router(state.clone()), state, db)
}

/// Claims of a well-formed Google ID token for `sub`.
#[allow(dead_code)]
pub fn assertion_claims(sub: &str) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "iss": "https://accounts.google.com",
        "aud": Config::test_default().google_client_id,
        "sub": sub,
        "email": format!("{sub}@example.com"),
        "email_verified": true,
        "name": format!("Player {sub}"),
        "iat": now,
        "exp": now + 3600,
    })
}

/// RS256-sign arbitrary claims with the given private key.
#[allow(dead_code)]
pub fn sign_assertion_with(claims: &Value, private_pem: &[u8]) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(private_pem).unwrap(),
    )
    .unwrap()
}

/// A valid identity assertion for `sub`.
#[allow(dead_code)]
pub fn sign_assertion(sub: &str) -> String {
    sign_assertion_with(&assertion_claims(sub), PROVIDER_PRIVATE_PEM)
}

/// Eight-card deck as sent by an anonymous client.
#[allow(dead_code)]
pub fn deck_json(name: &str) -> Value {
    let cards: Vec<Value> = (1..=8)
        .map(|id| json!({"id": 26000000 + id, "elixir_cost": 3}))
        .collect();
    json!({"name": name, "cards": cards, "evolution_slots": []})
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn authed_request(method: &str, uri: &str, token: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Log `sub` in through the router and return the response body.
#[allow(dead_code)]
pub async fn login(app: &axum::Router, sub: &str, decks: Option<Vec<Value>>) -> Value {
    use tower::ServiceExt;

    let mut body = json!({"id_token": sign_assertion(sub)});
    if let Some(decks) = decks {
        body["migration_data"] = json!({"decks": decks});
    }

    let response = app
        .clone()
        .oneshot(json_request("POST", "/auth/google", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    body_json(response).await
}
