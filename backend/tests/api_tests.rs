//! HTTP API tests
//!
//! Drives the router with the in-memory store and signed tokens.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use stock_ledger::middleware::Claims;
use stock_ledger::{create_app, AppState, Config, MemoryLedgerStore};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "api-test-secret";

/// Decimals are serialized as strings
fn decimal(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().unwrap()).unwrap()
}

struct TestApp {
    router: Router,
    company_id: Uuid,
}

impl TestApp {
    fn new() -> Self {
        let state = AppState {
            store: Arc::new(MemoryLedgerStore::new()),
            config: Arc::new(Config::in_memory(SECRET)),
        };
        Self {
            router: create_app(state),
            company_id: Uuid::new_v4(),
        }
    }

    fn token(&self, permissions: &[&str]) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            company_id: self.company_id.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            exp: now + 3600,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    fn full_token(&self) -> String {
        self.token(&["stock:read", "stock:write", "stock:confirm"])
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create(&self, uri: &str, body: Value) -> Value {
        let token = self.full_token();
        let (status, value) = self.send(Method::POST, uri, Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{} -> {}", uri, value);
        value
    }
}

// ============================================================================
// Public endpoints and auth
// ============================================================================

#[tokio::test]
async fn test_health_reports_store() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "connected");
}

#[tokio::test]
async fn test_protected_routes_need_token() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/products", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = app
        .send(Method::GET, "/api/v1/products", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_confirm_needs_confirm_permission() {
    let app = TestApp::new();
    let journal = app
        .create("/api/v1/journals", json!({ "journal_type": "transfer" }))
        .await;
    let id = journal["id"].as_str().unwrap();

    let writer = app.token(&["stock:read", "stock:write"]);
    let (status, body) = app
        .send(Method::POST, &format!("/api/v1/journals/{}/confirm", id), Some(&writer), None)
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_PERMISSIONS");
}

// ============================================================================
// Journal flow
// ============================================================================

#[tokio::test]
async fn test_journal_lifecycle_over_http() {
    let app = TestApp::new();
    let token = app.full_token();

    let main = app
        .create("/api/v1/godowns", json!({ "name": "Main", "code": "MAIN", "is_default": true }))
        .await;
    let branch = app
        .create("/api/v1/godowns", json!({ "name": "Branch", "code": "BR" }))
        .await;
    let product = app
        .create(
            "/api/v1/products",
            json!({ "sku": "GB-001", "name": "Green beans", "unit": "kg", "standard_cost": "80" }),
        )
        .await;
    let product_id = product["id"].as_str().unwrap();

    let entry = app
        .create(
            "/api/v1/movements/in",
            json!({
                "product_id": product_id,
                "godown_id": main["id"],
                "quantity": "100",
                "rate": "80",
                "movement_kind": "purchase",
                "reference_type": "purchase_invoice",
                "reference_number": "PI-1"
            }),
        )
        .await;
    assert_eq!(entry["movement_kind"], "purchase");

    let journal = app
        .create(
            "/api/v1/journals",
            json!({
                "journal_type": "transfer",
                "source_godown_id": main["id"],
                "destination_godown_id": branch["id"],
                "source_items": [{ "product_id": product_id, "quantity": "30" }],
                "destination_items": [{ "product_id": product_id, "quantity": "30" }]
            }),
        )
        .await;
    assert_eq!(journal["status"], "draft");
    let id = journal["id"].as_str().unwrap().to_string();

    let (status, confirmed) = app
        .send(Method::POST, &format!("/api/v1/journals/{}/confirm", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", confirmed);
    assert_eq!(confirmed["status"], "confirmed");

    let (status, again) = app
        .send(Method::POST, &format!("/api/v1/journals/{}/confirm", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["error"]["code"], "INVALID_STATE");

    let (status, cancelled) = app
        .send(
            Method::POST,
            &format!("/api/v1/journals/{}/cancel", id),
            Some(&token),
            Some(json!({ "reason": "Sent to wrong branch" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", cancelled);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, ledger) = app
        .send(
            Method::GET,
            &format!("/api/v1/reports/ledger?product_id={}", product_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger["entries"].as_array().unwrap().len(), 5);
    assert_eq!(decimal(&ledger["closing_balance"]), Decimal::from(100));

    let (status, rows) = app
        .send(Method::GET, "/api/v1/reports/reconciliation", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(decimal(&rows[0]["discrepancy"]).is_zero());
}

#[tokio::test]
async fn test_insufficient_stock_is_unprocessable() {
    let app = TestApp::new();
    let token = app.full_token();

    app.create("/api/v1/godowns", json!({ "name": "Main", "is_default": true }))
        .await;
    let product = app
        .create("/api/v1/products", json!({ "sku": "Q-1", "name": "Q", "unit": "pcs" }))
        .await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/journals",
            Some(&token),
            Some(json!({
                "journal_type": "adjustment",
                "source_items": [{ "product_id": product["id"], "quantity": "6" }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap();

    let (status, body) = app
        .send(Method::POST, &format!("/api/v1/journals/{}/confirm", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
}

#[tokio::test]
async fn test_validation_errors_name_the_field() {
    let app = TestApp::new();
    let token = app.full_token();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/products",
            Some(&token),
            Some(json!({ "sku": "bad sku!", "name": "X", "unit": "kg" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["field"], "sku");
}

#[tokio::test]
async fn test_bom_expand_over_http() {
    let app = TestApp::new();
    let token = app.full_token();

    let finished = app
        .create("/api/v1/products", json!({ "sku": "FIN", "name": "Finished", "unit": "box" }))
        .await;
    let part = app
        .create("/api/v1/products", json!({ "sku": "PART", "name": "Part", "unit": "pcs" }))
        .await;
    let bom = app
        .create(
            "/api/v1/boms",
            json!({
                "name": "Box of parts",
                "finished_product_id": finished["id"],
                "output_quantity": "1",
                "components": [{ "product_id": part["id"], "quantity": "12", "waste_percent": "10" }]
            }),
        )
        .await;
    let bom_id = bom["id"].as_str().unwrap();

    let (status, expansion) = app
        .send(
            Method::GET,
            &format!("/api/v1/boms/{}/expand?output_quantity=5", bom_id),
            Some(&token),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", expansion);
    assert_eq!(decimal(&expansion["components"][0]["base_quantity"]), Decimal::from(60));
    assert_eq!(decimal(&expansion["components"][0]["required_quantity"]), Decimal::from(66));
}

#[tokio::test]
async fn test_retired_component_blocks_expansion() {
    let app = TestApp::new();
    let token = app.full_token();

    let finished = app
        .create("/api/v1/products", json!({ "sku": "FIN", "name": "Finished", "unit": "box" }))
        .await;
    let part = app
        .create("/api/v1/products", json!({ "sku": "PART", "name": "Part", "unit": "pcs" }))
        .await;
    let bom = app
        .create(
            "/api/v1/boms",
            json!({
                "name": "Box of parts",
                "finished_product_id": finished["id"],
                "output_quantity": "1",
                "components": [{ "product_id": part["id"], "quantity": "12" }]
            }),
        )
        .await;
    let bom_id = bom["id"].as_str().unwrap();
    let part_id = part["id"].as_str().unwrap();

    let (status, retired) = app
        .send(
            Method::PUT,
            &format!("/api/v1/products/{}/status", part_id),
            Some(&token),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", retired);
    assert_eq!(retired["is_active"], false);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/boms/{}/expand?output_quantity=2", bom_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_BOM");

    let reader = app.token(&["stock:read"]);
    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/v1/boms/{}/status", bom_id),
            Some(&reader),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
