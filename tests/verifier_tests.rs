//! Integration tests for session verification with the liveness check.
//!
//! Sessions are seeded into a `MemoryStore`, requests carry HS256 session
//! tokens, and the platform's GraphQL endpoint is a wiremock server.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use vat_exempt::clients::{PlatformClient, HEADER_ACCESS_TOKEN};
use vat_exempt::{
    AccessMode, ApiKey, ApiSecretKey, AppConfig, CallerKind, HostUrl, MemoryStore,
    ProtectedRequest, Session, SessionStore, SessionVerifier, ShopDomain, VerifyError,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHOP: &str = "vat-demo.myshopify.com";
const API_KEY: &str = "client-id";
const SECRET: &str = "verifier-secret";

#[derive(Serialize)]
struct Claims {
    iss: String,
    dest: String,
    aud: String,
    sub: String,
    exp: u64,
    nbf: u64,
    iat: u64,
}

fn session_token(shop: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        iss: format!("https://{shop}/admin"),
        dest: format!("https://{shop}"),
        aud: API_KEY.to_string(),
        sub: "42".to_string(),
        exp: now + 60,
        nbf: now - 5,
        iat: now,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn verifier(server: &MockServer, store: &Arc<MemoryStore>) -> SessionVerifier {
    let config = Arc::new(
        AppConfig::builder()
            .api_key(ApiKey::new(API_KEY).unwrap())
            .api_secret_key(ApiSecretKey::new(SECRET).unwrap())
            .platform_base_url(HostUrl::new(server.uri()).unwrap())
            .platform_timeout(Duration::from_millis(200))
            .liveness_check(true)
            .build()
            .unwrap(),
    );
    let platform = PlatformClient::new(Arc::clone(&config)).unwrap();
    SessionVerifier::new(config, store.clone(), platform)
}

async fn seed(store: &MemoryStore) -> Session {
    let session = Session::new(
        ShopDomain::new(SHOP).unwrap(),
        "shpat_stored",
        "write_orders".parse().unwrap(),
        AccessMode::Offline,
        None,
    );
    store.put(&session).await.unwrap();
    session
}

fn request() -> ProtectedRequest {
    ProtectedRequest::new()
        .shop(SHOP)
        .authorization(format!("Bearer {}", session_token(SHOP)))
        .caller(CallerKind::Programmatic)
}

fn graphql_path() -> String {
    format!("/admin/api/{}/graphql.json", vat_exempt::ApiVersion::latest())
}

#[tokio::test]
async fn test_live_token_passes_verification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(graphql_path()))
        .and(header(HEADER_ACCESS_TOKEN, "shpat_stored"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "data": { "shop": { "name": "VAT Demo" } } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let session = seed(&store).await;

    let verified = verifier(&server, &store).verify(&request()).await.unwrap();
    assert_eq!(verified.session.id, session.id);
    assert_eq!(verified.shop().as_ref(), SHOP);
}

#[tokio::test]
async fn test_revoked_token_deletes_session_and_reauthorizes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(graphql_path()))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key or access token"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let session = seed(&store).await;

    let result = verifier(&server, &store).verify(&request()).await;

    match result {
        Err(VerifyError::Reauthorize(signal)) => {
            assert_eq!(signal.shop.as_ref(), SHOP);
            assert_eq!(signal.url, format!("/api/auth?shop={SHOP}"));
            let response = signal.to_response();
            assert_eq!(response.status, 403);
        }
        other => panic!("expected reauthorization, got {other:?}"),
    }
    assert!(store.get(&session.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unreachable_platform_reauthorizes_without_deleting() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(graphql_path()))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let session = seed(&store).await;

    let result = verifier(&server, &store).verify(&request()).await;

    assert!(matches!(result, Err(VerifyError::Reauthorize(_))));
    assert!(store.get(&session.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_expired_session_is_deleted_without_platform_call() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    let session = Session::new(
        ShopDomain::new(SHOP).unwrap(),
        "shpat_stale",
        "write_orders".parse().unwrap(),
        AccessMode::Offline,
        Some(Utc::now() - chrono::Duration::minutes(1)),
    );
    store.put(&session).await.unwrap();

    let result = verifier(&server, &store).verify(&request()).await;

    assert!(matches!(result, Err(VerifyError::Reauthorize(_))));
    assert!(store.get(&session.id).await.unwrap().is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_token_for_other_shop_is_not_served() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    seed(&store).await;

    let request = ProtectedRequest::new()
        .shop("other-shop.myshopify.com")
        .authorization(format!("Bearer {}", session_token(SHOP)));

    let result = verifier(&server, &store).verify(&request).await;

    match result {
        Err(VerifyError::Reauthorize(signal)) => {
            assert_eq!(signal.shop.as_ref(), "other-shop.myshopify.com");
            assert_eq!(signal.caller, CallerKind::Browser);
        }
        other => panic!("expected reauthorization, got {other:?}"),
    }
    // The other tenant's session is untouched.
    assert_eq!(store.session_count(), 1);
}

#[tokio::test]
async fn test_missing_shop_and_token_is_bad_request() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    let result = verifier(&server, &store).verify(&ProtectedRequest::new()).await;

    let error = result.unwrap_err();
    assert!(matches!(error, VerifyError::MissingShop));
    assert_eq!(error.status(), 400);
}
