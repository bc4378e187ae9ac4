//! End-to-end tests through the `App` handlers: handshake, protected VAT
//! validation, settings and cart updates, signed proxy validation and
//! compliance webhooks.
//!
//! One wiremock server stands in for both the platform and the VIES service.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use vat_exempt::auth::oauth::hmac::{compute_signature, compute_signature_base64};
use vat_exempt::proxy::canonical_string;
use vat_exempt::validation::VatClientOptions;
use vat_exempt::webhooks::{ComplianceTopic, WebhookRequest};
use vat_exempt::clients::HEADER_ACCESS_TOKEN;
use vat_exempt::{
    AccessMode, ApiKey, ApiSecretKey, ApiVersion, App, AppConfig, AuthQuery, CallerKind,
    HostUrl, MemoryStore, ProtectedRequest, QueryParams, Session, SessionStore, ShopDomain,
    SESSION_COOKIE,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHOP: &str = "vat-demo.myshopify.com";
const API_KEY: &str = "client-id";
const SECRET: &str = "app-secret";
const VIES_PATH: &str = "/vies/checkVatService";

const VALID_ANSWER: &str = r#"<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/"><env:Body><ns2:checkVatResponse xmlns:ns2="urn:ec.europa.eu:taxud:vies:services:checkVat:types"><ns2:countryCode>NL</ns2:countryCode><ns2:vatNumber>853274B01</ns2:vatNumber><ns2:valid>true</ns2:valid></ns2:checkVatResponse></env:Body></env:Envelope>"#;

async fn setup() -> (App, MockServer, Arc<MemoryStore>) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/admin/oauth/access_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "shpat_app", "scope": "write_orders" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(VIES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(VALID_ANSWER))
        .mount(&server)
        .await;

    let config = AppConfig::builder()
        .api_key(ApiKey::new(API_KEY).unwrap())
        .api_secret_key(ApiSecretKey::new(SECRET).unwrap())
        .host(HostUrl::new("https://vat.example.com").unwrap())
        .platform_base_url(HostUrl::new(server.uri()).unwrap())
        .liveness_check(false)
        .build()
        .unwrap();
    let options = VatClientOptions {
        endpoint: format!("{}{VIES_PATH}", server.uri()),
        retry_wait: Duration::from_millis(10),
        ..VatClientOptions::default()
    };

    let store = Arc::new(MemoryStore::new());
    let app = App::new(config, store.clone(), store.clone(), options).unwrap();
    (app, server, store)
}

fn session_token(shop: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = json!({
        "iss": format!("https://{shop}/admin"),
        "dest": format!("https://{shop}"),
        "aud": API_KEY,
        "sub": "7",
        "exp": now + 60,
        "nbf": now - 5,
    });
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// Runs the handshake and returns the session cookie value.
async fn install(app: &App) -> String {
    let begin = app.handle_begin(&format!("shop={SHOP}")).await;
    assert_eq!(begin.status, 302);
    let location = begin.header("Location").unwrap();
    let state = QueryParams::parse(location.split_once('?').unwrap().1)
        .get("state")
        .unwrap()
        .to_string();

    let unsigned = QueryParams::from_pairs([
        ("code", "code-1"),
        ("host", "aG9zdA"),
        ("shop", SHOP),
        ("state", state.as_str()),
        ("timestamp", "1700000000"),
    ]);
    let hmac = compute_signature(&AuthQuery::from(unsigned.clone()).to_signable_string(), SECRET);
    let callback = app
        .handle_callback(&unsigned.with("hmac", hmac).to_query_string())
        .await;

    assert_eq!(callback.status, 302);
    assert_eq!(
        callback.header("Location"),
        Some(format!("/?shop={SHOP}&host=aG9zdA").as_str())
    );

    let cookie = callback.header("Set-Cookie").unwrap();
    assert!(cookie.contains("HttpOnly"));
    let (pair, _) = cookie.split_once(';').unwrap();
    pair.strip_prefix(&format!("{SESSION_COOKIE}="))
        .unwrap()
        .to_string()
}

fn admin_path(resource: &str) -> String {
    format!("/admin/api/{}/{resource}.json", ApiVersion::latest())
}

async fn seed(store: &MemoryStore, shop: &str, token: &str) {
    let session = Session::new(
        ShopDomain::new(shop).unwrap(),
        token,
        "write_orders".parse().unwrap(),
        AccessMode::Offline,
        None,
    );
    store.put(&session).await.unwrap();
}

#[tokio::test]
async fn test_installed_shop_can_validate_vat_number() {
    let (app, _server, store) = setup().await;
    install(&app).await;
    assert_eq!(store.session_count(), 1);

    let request = ProtectedRequest::new()
        .shop(SHOP)
        .authorization(format!("Bearer {}", session_token(SHOP)))
        .caller(CallerKind::Programmatic);
    let response = app
        .handle_validate(&request, r#"{"vatNumber":"NL 853274 B01"}"#)
        .await;

    assert_eq!(response.status, 200);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["vatNumber"], "NL853274B01");
    assert_eq!(body["isValid"], true);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_uninstalled_shop_gets_reauthorize_challenge() {
    let (app, _server, _store) = setup().await;

    let request = ProtectedRequest::new()
        .shop(SHOP)
        .authorization(format!("Bearer {}", session_token(SHOP)))
        .caller(CallerKind::Programmatic);
    let response = app
        .handle_validate(&request, r#"{"vatNumber":"NL853274B01"}"#)
        .await;

    assert_eq!(response.status, 403);
    assert_eq!(
        response.header("X-Shopify-API-Request-Failure-Reauthorize"),
        Some("1")
    );
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["reauthorize"], true);
    assert_eq!(body["url"], format!("/api/auth?shop={SHOP}"));
}

#[tokio::test]
async fn test_malformed_vat_number_is_bad_request() {
    let (app, server, _store) = setup().await;
    install(&app).await;
    let before = server.received_requests().await.unwrap().len();

    let request = ProtectedRequest::new()
        .shop(SHOP)
        .authorization(format!("Bearer {}", session_token(SHOP)));
    let response = app.handle_validate(&request, r#"{"vatNumber":"12"}"#).await;

    assert_eq!(response.status, 400);
    assert_eq!(server.received_requests().await.unwrap().len(), before);

    let missing = app.handle_validate(&request, "{}").await;
    assert_eq!(missing.status, 400);
}

#[tokio::test]
async fn test_signed_proxy_request_is_validated_without_session() {
    let (app, _server, store) = setup().await;

    let query = QueryParams::from_pairs([
        ("shop", SHOP),
        ("logged_in_customer_id", "1001"),
        ("path_prefix", "/apps/vat"),
        ("timestamp", "1700000000"),
    ]);
    let signature = compute_signature(&canonical_string(&query), SECRET);
    let raw_query = query.with("signature", signature).to_query_string();

    let response = app
        .handle_proxy_validate(&raw_query, r#"{"vatNumber":"NL853274B01"}"#)
        .await;

    assert_eq!(response.status, 200);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["isValid"], true);
    assert_eq!(store.session_count(), 0);
}

#[tokio::test]
async fn test_proxy_request_with_repeated_keys() {
    let (app, _server, _store) = setup().await;

    let query = QueryParams::parse("shop=vat-demo.myshopify.com&extra=1&extra=2&timestamp=1");
    assert_eq!(
        canonical_string(&query),
        "extra=1,2shop=vat-demo.myshopify.comtimestamp=1"
    );
    let signature = compute_signature(&canonical_string(&query), SECRET);
    let raw_query = query.with("signature", signature).to_query_string();

    let response = app
        .handle_proxy_validate(&raw_query, r#"{"vatNumber":"NL853274B01"}"#)
        .await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_tampered_proxy_request_is_unauthorized() {
    let (app, server, _store) = setup().await;

    let query = QueryParams::from_pairs([("shop", SHOP), ("timestamp", "1700000000")]);
    let signature = compute_signature(&canonical_string(&query), SECRET);
    let raw_query = format!(
        "shop=other.myshopify.com&timestamp=1700000000&signature={signature}"
    );

    let response = app
        .handle_proxy_validate(&raw_query, r#"{"vatNumber":"NL853274B01"}"#)
        .await;

    assert_eq!(response.status, 401);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body, json!({ "error": "Invalid signature" }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_compliance_webhooks_are_acknowledged() {
    let (app, _server, _store) = setup().await;

    for topic in ComplianceTopic::ALL {
        let body = json!({ "shop_domain": SHOP, "shop_id": 1 }).to_string();
        let request = WebhookRequest::new(
            body.clone().into_bytes(),
            compute_signature_base64(body.as_bytes(), SECRET),
        )
        .with_topic(topic.as_str())
        .with_shop_domain(SHOP);

        let response = app.handle_compliance_webhook(&request);
        assert_eq!(response.status, 200, "{topic}");
    }
}

#[tokio::test]
async fn test_forged_compliance_webhook_is_unauthorized() {
    let (app, _server, _store) = setup().await;

    let body = br#"{"shop_domain":"vat-demo.myshopify.com"}"#;
    let request = WebhookRequest::new(body.to_vec(), compute_signature_base64(body, "wrong"))
        .with_topic(ComplianceTopic::CustomersRedact.as_str());

    let response = app.handle_compliance_webhook(&request);
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn test_session_cookie_authorizes_settings_read() {
    let (app, server, _store) = setup().await;
    Mock::given(method("GET"))
        .and(path(admin_path("metafields")))
        .and(header(HEADER_ACCESS_TOKEN, "shpat_app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "metafields": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let reference = install(&app).await;
    let request = ProtectedRequest::new().shop(SHOP).session_reference(reference);
    let response = app.handle_get_settings(&request).await;

    assert_eq!(response.status, 200);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(
        body,
        json!({
            "enabled": true,
            "vatFieldLabel": "VAT Number",
            "validationMessage": "VAT number is valid",
            "errorMessage": "Invalid VAT number"
        })
    );
}

#[tokio::test]
async fn test_guessed_session_reference_is_refused() {
    let (app, server, store) = setup().await;
    seed(&store, SHOP, "shpat_victim").await;

    let request = ProtectedRequest::new()
        .shop(SHOP)
        .session_reference(format!("offline_{SHOP}"))
        .caller(CallerKind::Programmatic);
    let response = app.handle_get_settings(&request).await;

    assert_eq!(response.status, 403);
    assert!(!response.body.contains("shpat_victim"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_saved_settings_are_written_with_shop_token() {
    let (app, server, store) = setup().await;
    seed(&store, SHOP, "shpat_settings").await;
    Mock::given(method("POST"))
        .and(path(admin_path("metafields")))
        .and(header(HEADER_ACCESS_TOKEN, "shpat_settings"))
        .and(body_partial_json(json!({
            "metafield": { "namespace": "vat_exempt", "key": "settings", "type": "json" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "metafield": { "id": 9 } })))
        .expect(1)
        .mount(&server)
        .await;

    let request = ProtectedRequest::new()
        .shop(SHOP)
        .authorization(format!("Bearer {}", session_token(SHOP)));
    let response = app
        .handle_save_settings(&request, r#"{"enabled":false,"vatFieldLabel":"BTW-nummer"}"#)
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, r#"{"success":true}"#);

    let requests = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let value: Value =
        serde_json::from_str(sent["metafield"]["value"].as_str().unwrap()).unwrap();
    assert_eq!(value["enabled"], false);
    assert_eq!(value["vatFieldLabel"], "BTW-nummer");
    assert_eq!(value["errorMessage"], "Invalid VAT number");

    let invalid = app.handle_save_settings(&request, r#"{"enabled":"yes"}"#).await;
    assert_eq!(invalid.status, 400);
}

#[tokio::test]
async fn test_one_shops_token_is_never_sent_for_another() {
    let (app, server, store) = setup().await;
    let other = "other-shop.myshopify.com";
    seed(&store, SHOP, "shpat_first").await;
    seed(&store, other, "shpat_second").await;
    Mock::given(method("GET"))
        .and(path(admin_path("metafields")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metafields": [{ "value": r#"{"enabled":false}"# }]
        })))
        .mount(&server)
        .await;

    let request = ProtectedRequest::new()
        .shop(other)
        .authorization(format!("Bearer {}", session_token(other)));
    let response = app.handle_get_settings(&request).await;
    assert_eq!(response.status, 200);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["enabled"], false);

    // a token for the first shop cannot read the second shop's settings
    let crossed = ProtectedRequest::new()
        .shop(other)
        .authorization(format!("Bearer {}", session_token(SHOP)))
        .caller(CallerKind::Programmatic);
    assert_eq!(app.handle_get_settings(&crossed).await.status, 403);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let tokens: Vec<String> = requests
        .iter()
        .flat_map(|r| r.headers.iter())
        .filter(|(name, _)| name.as_str().eq_ignore_ascii_case(HEADER_ACCESS_TOKEN))
        .map(|(_, values)| values.last().as_str().to_string())
        .collect();
    assert_eq!(tokens, vec!["shpat_second".to_string()]);
}

#[tokio::test]
async fn test_cart_update_records_vat_attributes() {
    let (app, server, store) = setup().await;
    seed(&store, SHOP, "shpat_cart").await;
    Mock::given(method("POST"))
        .and(path(admin_path("cart/update")))
        .and(header(HEADER_ACCESS_TOKEN, "shpat_cart"))
        .and(body_partial_json(json!({
            "token": "cart-7",
            "attributes": { "VAT_ID": "NL853274B01", "VAT_Validated": "Yes" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let request = ProtectedRequest::new()
        .shop(SHOP)
        .authorization(format!("Bearer {}", session_token(SHOP)));
    let response = app
        .handle_update_cart(
            &request,
            r#"{"cartToken":"cart-7","vatNumber":"NL853274B01","isValid":true}"#,
        )
        .await;
    assert_eq!(response.status, 200);

    let missing = app.handle_update_cart(&request, r#"{"cartToken":""}"#).await;
    assert_eq!(missing.status, 400);
}

#[tokio::test]
async fn test_settings_failure_is_generic() {
    let (app, server, store) = setup().await;
    seed(&store, SHOP, "shpat_broken").await;
    Mock::given(method("GET"))
        .and(path(admin_path("metafields")))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream detail"))
        .mount(&server)
        .await;

    let request = ProtectedRequest::new()
        .shop(SHOP)
        .authorization(format!("Bearer {}", session_token(SHOP)));
    let response = app.handle_get_settings(&request).await;

    assert_eq!(response.status, 500);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body, json!({ "error": "Failed to fetch settings" }));
}
