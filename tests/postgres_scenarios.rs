//! End-to-end scenarios against a real PostgreSQL. Set `TEST_DATABASE_URL` to run them;
//! without it every test returns early.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use gymhub::tenant::{drop_tenant_schema, SchemaName};
use gymhub::{app, apply_migrations, catalog, load_registry_from_pool, resolve, store, AppState};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

const MIGRATION_LOCK: i64 = 0x6779_6d68;

async fn setup() -> Option<(Router, PgPool)> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect TEST_DATABASE_URL");
    let config = catalog::load().expect("catalogue");

    // Tests run in parallel; serialize the idempotent DDL.
    let mut lock = pool.acquire().await.expect("lock connection");
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK)
        .execute(&mut *lock)
        .await
        .expect("advisory lock");
    apply_migrations(&pool, &config).await.expect("migrate");
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK)
        .execute(&mut *lock)
        .await
        .expect("advisory unlock");
    drop(lock);

    let resolved = resolve(&config).expect("resolve");
    let registry = load_registry_from_pool(&pool).await.expect("registry");
    Some((app(AppState::new(pool.clone(), config, resolved, registry)), pool))
}

fn unique(prefix: &str) -> String {
    format!("{}{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

async fn call(app: &Router, method: &str, uri: &str, tenant: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
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
    let resp = app.clone().oneshot(req).await.expect("request failed");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

fn id_of(body: &Value) -> String {
    body["data"]["id"].as_str().expect("row id").to_string()
}

#[tokio::test]
async fn duplicate_equipment_name_conflicts() {
    let Some((app, _pool)) = setup().await else { return };
    let name = unique("Treadmill ");
    let payload = json!({"name": name, "category": "cardio"});

    let (status, body) = call(&app, "POST", "/api/v1/equipment", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(uuid::Uuid::parse_str(&id_of(&body)).is_ok());
    assert!(body["data"]["created_at"].is_string());

    let (status, body) = call(&app, "POST", "/api/v1/equipment", None, Some(payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let uri = format!("/api/v1/equipment?name={}", name.replace(' ', "%20"));
    let (status, body) = call(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);
}

#[tokio::test]
async fn uuid_shaped_text_is_stored_as_sent() {
    let Some((app, _pool)) = setup().await else { return };
    let upper = uuid::Uuid::new_v4().to_string().to_uppercase();
    let braced = format!("{{{}}}", uuid::Uuid::new_v4());
    let simple = uuid::Uuid::new_v4().simple().to_string();
    for name in [upper, braced, simple] {
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/equipment",
            None,
            Some(json!({"name": name, "category": "cardio"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["data"]["name"], name);

        let (_, read) = call(&app, "GET", &format!("/api/v1/equipment/{}", id_of(&body)), None, None).await;
        assert_eq!(read["data"]["name"], name);
    }
}

#[tokio::test]
async fn template_block_order_is_unique_per_template() {
    let Some((app, _pool)) = setup().await else { return };
    let (status, template) = call(
        &app,
        "POST",
        "/api/v1/workout-templates",
        None,
        Some(json!({"name": unique("Full body "), "level": "beginner"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let template_id = id_of(&template);

    let block = json!({"template_id": template_id, "block_order": 1, "sets": 3, "reps": 10});
    let (status, _) = call(&app, "POST", "/api/v1/template-blocks", None, Some(block.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = call(&app, "POST", "/api/v1/template-blocks", None, Some(block)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let missing = json!({"template_id": uuid::Uuid::new_v4().to_string(), "block_order": 1});
    let (status, _) = call(&app, "POST", "/api/v1/template-blocks", None, Some(missing)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blocks_of_a_deleted_template_stay_readable_but_frozen() {
    let Some((app, _pool)) = setup().await else { return };
    let (_, template) = call(
        &app,
        "POST",
        "/api/v1/workout-templates",
        None,
        Some(json!({"name": unique("Push ")})),
    )
    .await;
    let template_id = id_of(&template);
    let (status, block) = call(
        &app,
        "POST",
        "/api/v1/template-blocks",
        None,
        Some(json!({"template_id": template_id, "block_order": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(&app, "DELETE", &format!("/api/v1/workout-templates/{}", template_id), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let block_uri = format!("/api/v1/template-blocks/{}", id_of(&block));
    let (status, read) = call(&app, "GET", &block_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["data"]["template_id"], template_id.as_str());

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/template-blocks",
        None,
        Some(json!({"template_id": template_id, "block_order": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn soft_deleted_exercise_disappears_and_frees_its_name() {
    let Some((app, _pool)) = setup().await else { return };
    let name = unique("Squat ");
    let (status, body) = call(&app, "POST", "/api/v1/exercises", None, Some(json!({"name": name}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = id_of(&body);
    let uri = format!("/api/v1/exercises/{}", id);

    let (status, body) = call(&app, "DELETE", &uri, None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = call(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "PATCH", &uri, None, Some(json!({"description": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "DELETE", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A block cannot point at a deleted exercise even though the foreign key still holds.
    let (_, template) = call(
        &app,
        "POST",
        "/api/v1/workout-templates",
        None,
        Some(json!({"name": unique("Legs ")})),
    )
    .await;
    let block = json!({"template_id": id_of(&template), "block_order": 1, "exercise_id": id});
    let (status, _) = call(&app, "POST", "/api/v1/template-blocks", None, Some(block)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "POST", "/api/v1/exercises", None, Some(json!({"name": name}))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn empty_update_only_refreshes_updated_at() {
    let Some((app, _pool)) = setup().await else { return };
    let name = unique("Bench ");
    let (_, created) = call(
        &app,
        "POST",
        "/api/v1/equipment",
        None,
        Some(json!({"name": name, "category": "strength"})),
    )
    .await;
    let uri = format!("/api/v1/equipment/{}", id_of(&created));
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let (status, updated) = call(&app, "PUT", &uri, None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["name"], created["data"]["name"]);
    assert_eq!(updated["data"]["category"], "strength");
    assert_eq!(updated["data"]["created_at"], created["data"]["created_at"]);
    assert_ne!(updated["data"]["updated_at"], created["data"]["updated_at"]);

    let missing = format!("/api/v1/equipment/{}", uuid::Uuid::new_v4());
    let (status, _) = call(&app, "GET", &missing, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gym_registration_provisions_a_working_tenant() {
    let Some((app, pool)) = setup().await else { return };
    let slug = unique("t");
    let (status, gym) = call(
        &app,
        "POST",
        "/api/v1/gyms",
        None,
        Some(json!({"name": unique("Gym "), "slug": slug})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{gym}");
    assert_eq!(gym["data"]["schema_name"], format!("gym_{}", slug));
    let tenant = Some(slug.as_str());

    let (status, _) = call(&app, "GET", "/api/v1/tenant/users", Some("nosuchgym"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, user) = call(
        &app,
        "POST",
        "/api/v1/tenant/users",
        tenant,
        Some(json!({"email": "coach@gym.test", "first_name": "Ana", "last_name": "Lima", "password": "s3cret-pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(user["data"].get("password_hash").is_none());

    let (_, own_equipment) = call(
        &app,
        "POST",
        "/api/v1/tenant/custom-equipment",
        tenant,
        Some(json!({"name": "Sled", "category": "functional"})),
    )
    .await;
    let (_, global_equipment) = call(
        &app,
        "POST",
        "/api/v1/equipment",
        None,
        Some(json!({"name": unique("Kettlebell "), "category": "free_weights"})),
    )
    .await;
    let (status, exercise) = call(
        &app,
        "POST",
        "/api/v1/tenant/custom-exercises",
        tenant,
        Some(json!({"name": "Sled push", "created_by": id_of(&user)})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let exercise_id = id_of(&exercise);

    for equipment in [&own_equipment, &global_equipment] {
        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/tenant/custom-exercise-equipment",
            tenant,
            Some(json!({"custom_exercise_id": exercise_id, "equipment_id": id_of(equipment)})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/tenant/custom-exercise-equipment",
        tenant,
        Some(json!({"custom_exercise_id": exercise_id, "equipment_id": uuid::Uuid::new_v4().to_string()})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/v1/tenant/custom-exercises?equipment_id={}", id_of(&global_equipment));
    let (_, listed) = call(&app, "GET", &uri, tenant, None).await;
    assert_eq!(listed["meta"]["count"], 1);

    let (_, template) = call(
        &app,
        "POST",
        "/api/v1/tenant/custom-workout-templates",
        tenant,
        Some(json!({"name": "Conditioning"})),
    )
    .await;
    let mismatch = json!({
        "workout_template_id": id_of(&template),
        "exercise_source": "public",
        "gym_exercise_id": exercise_id,
        "exercise_order": 1
    });
    let (status, body) = call(&app, "POST", "/api/v1/tenant/custom-workout-exercises", tenant, Some(mismatch)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let line = json!({
        "workout_template_id": id_of(&template),
        "exercise_source": "gym",
        "gym_exercise_id": exercise_id,
        "exercise_order": 1
    });
    let (status, created_line) = call(&app, "POST", "/api/v1/tenant/custom-workout-exercises", tenant, Some(line)).await;
    assert_eq!(status, StatusCode::CREATED);

    // Switching source on update is checked against the stored row.
    let line_uri = format!("/api/v1/tenant/custom-workout-exercises/{}", id_of(&created_line));
    let (status, _) = call(&app, "PATCH", &line_uri, tenant, Some(json!({"exercise_source": "public"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let gym_uri = format!("/api/v1/gyms/{}", id_of(&gym));
    let (status, _) = call(&app, "DELETE", &gym_uri, None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "GET", "/api/v1/tenant/users", tenant, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut tx = pool.begin().await.expect("tx");
    drop_tenant_schema(&mut tx, &SchemaName::for_slug(&slug).expect("slug"))
        .await
        .expect("drop schema");
    let gym_id = uuid::Uuid::parse_str(&id_of(&gym)).expect("gym id");
    assert!(store::delete_gym_row(&mut tx, gym_id).await.expect("delete gym"));
    tx.commit().await.expect("commit");
}
