//! Router-level tests that never reach the database: the pool connects lazily to an unused port.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use gymhub::tenant::TenantEntry;
use gymhub::{app, catalog, resolve, AppState, SchemaName, TenantRegistry};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

fn test_app() -> Router {
    let config = catalog::load().expect("catalogue loads");
    let resolved = resolve(&config).expect("catalogue resolves");
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://gymhub@127.0.0.1:1/gymhub")
        .expect("lazy pool");
    let mut registry = TenantRegistry::new();
    registry.insert(TenantEntry {
        gym_id: uuid::Uuid::new_v4(),
        slug: "iron".into(),
        schema: SchemaName::for_slug("iron").expect("valid slug"),
    });
    app(AppState::new(pool, config, resolved, registry))
}

async fn send(app: Router, method: &str, uri: &str, tenant: Option<&str>, body: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = tenant {
        req = req.header("X-Tenant-ID", t);
    }
    let req = match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(Body::from(b.to_string())),
        None => req.body(Body::empty()),
    }
    .expect("failed to build request");
    let resp = app.oneshot(req).await.expect("request failed");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    (status, bytes.to_vec())
}

async fn send_json(app: Router, method: &str, uri: &str, tenant: Option<&str>, body: Option<&str>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, tenant, body).await;
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = send_json(test_app(), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn unknown_entity_is_not_found() {
    let (status, body) = send_json(test_app(), "GET", "/api/v1/widgets", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "not_found");
    assert!(body["data"].is_null());

    // Tenant entities are not reachable on the public prefix.
    let (status, _) = send_json(test_app(), "GET", "/api/v1/users", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tenant_routes_require_header() {
    let (status, body) = send_json(test_app(), "GET", "/api/v1/tenant/users", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "X-Tenant-ID header is required");
}

#[tokio::test]
async fn malformed_tenant_slug_is_rejected_before_sql() {
    let (status, body) =
        send_json(test_app(), "GET", "/api/v1/tenant/users", Some("x\"; DROP SCHEMA public"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn malformed_id_is_bad_request() {
    let (status, body) = send_json(test_app(), "GET", "/api/v1/equipment/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid id: not-a-uuid");
}

#[tokio::test]
async fn validation_failures_are_bad_request() {
    let (status, body) = send_json(
        test_app(),
        "POST",
        "/api/v1/equipment",
        None,
        Some(r#"{"name": "  ", "category": "cardio"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "name is required");

    let (status, body) = send_json(
        test_app(),
        "POST",
        "/api/v1/equipment",
        None,
        Some(r#"{"name": "Rower", "category": "swimming"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("category must be one of"));
}

#[tokio::test]
async fn values_must_match_column_types() {
    let (status, body) = send_json(
        test_app(),
        "POST",
        "/api/v1/template-blocks",
        None,
        Some(r#"{"template_id": "00000000-0000-0000-0000-000000000001", "block_order": 1.5, "sets": 2.7}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "block_order must be an integer");

    let (status, body) = send_json(
        test_app(),
        "POST",
        "/api/v1/equipment",
        None,
        Some(r#"{"name": 42, "category": "cardio", "description": true}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "name must be a string");

    let (status, body) = send_json(
        test_app(),
        "PATCH",
        "/api/v1/template-blocks/00000000-0000-0000-0000-000000000002",
        None,
        Some(r#"{"sets": "3"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "sets must be an integer");
}

#[tokio::test]
async fn invalid_json_gets_an_envelope() {
    let (status, body) = send_json(test_app(), "POST", "/api/v1/equipment", None, Some("not-json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = send_json(test_app(), "POST", "/api/v1/equipment", None, Some("[1, 2]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "body must be a JSON object");
}

#[tokio::test]
async fn unsupported_operation_is_rejected() {
    let uri = format!("/api/v1/exercise-equipment/{}", uuid::Uuid::new_v4());
    let (status, body) = send_json(test_app(), "PATCH", &uri, None, Some("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "update is not supported for exercise-equipment");
}

#[tokio::test]
async fn registered_tenant_reaches_validation() {
    let (status, body) = send_json(
        test_app(),
        "POST",
        "/api/v1/tenant/users",
        Some("iron"),
        Some(r#"{"email": "ana@iron.test", "first_name": "Ana", "last_name": "Lima", "password": "short"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "password must be at least 8 characters");
}

#[tokio::test]
async fn gym_slug_is_validated_before_provisioning() {
    let (status, body) = send_json(
        test_app(),
        "POST",
        "/api/v1/gyms",
        None,
        Some(r#"{"name": "Iron Temple", "slug": "Iron Temple"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn swagger_documents_entity_routes() {
    let (status, bytes) = send(test_app(), "GET", "/swagger", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let yaml = String::from_utf8(bytes).expect("utf8");
    assert!(yaml.contains("/api/v1/equipment"));
    assert!(yaml.contains("/api/v1/tenant/member-workouts/{id}"));

    let (status, doc) = send_json(test_app(), "GET", "/swagger.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/v1/gyms"]["post"].is_object());
}
