use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::{Pool, Postgres};
use tokio::sync::Mutex;
use tower::ServiceExt;

use server::cache::Cache;
use server::db::AppState;
use shared_types::{Organization, Project, User};

/// Global mutex ensuring tests run sequentially against the shared
/// database. Held for the duration of each test.
static TEST_MUTEX: std::sync::LazyLock<Mutex<()>> = std::sync::LazyLock::new(|| Mutex::new(()));

pub struct Seed {
    pub admin: User,
    pub admin_token: String,
    pub org: Organization,
    pub project: Project,
    pub api_key: String,
}

pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    pub pool: Pool<Postgres>,
    pub seed: Seed,
    pub _guard: tokio::sync::MutexGuard<'static, ()>,
}

/// Build a test app backed by a real Postgres pool, or None when no
/// database is configured (the caller skips the test).
pub async fn test_app() -> Option<TestContext> {
    let guard = TEST_MUTEX.lock().await;

    let _ = dotenvy::dotenv();
    let database_url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query(
        "TRUNCATE logs, spans, traces, sessions, user_identities, oidc_states, notifications, \
         alert_history, alert_rules, sigma_rules, api_keys, projects, organization_members, \
         organizations, system_settings, auth_providers, users CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to truncate");

    let state = AppState::new(pool.clone(), Cache::disabled());
    server::bootstrap::run(&state).await.expect("Bootstrap failed");

    let seed = seed_tenant(&state).await;
    let app = server::rest::api_router(state.clone());

    Some(TestContext {
        app,
        state,
        pool,
        seed,
        _guard: guard,
    })
}

async fn seed_tenant(state: &AppState) -> Seed {
    let password_hash = server::auth::password::hash_password("hunter2-hunter2").unwrap();
    let admin = server::repo::users::create(
        &state.pool,
        "admin@example.com",
        "Admin",
        Some(&password_hash),
        true,
    )
    .await
    .expect("Failed to seed admin user");

    // Local identity so the admin has at least one authentication method.
    let local = server::repo::providers::find_by_slug(&state.pool, "local")
        .await
        .unwrap()
        .unwrap();
    server::repo::identities::create(&state.pool, admin.id, local.id, &admin.id.to_string())
        .await
        .expect("Failed to seed identity");

    let org = server::repo::organizations::create(&state.pool, "Acme", "acme", admin.id)
        .await
        .expect("Failed to seed organization");
    let project = server::repo::projects::create(&state.pool, org.id, "production")
        .await
        .expect("Failed to seed project");

    let api_key = "test-ingest-key-0123456789abcdef".to_string();
    server::repo::api_keys::create(&state.pool, project.id, "ingest", &api_key)
        .await
        .expect("Failed to seed API key");

    let session = server::repo::sessions::create(&state.pool, admin.id)
        .await
        .expect("Failed to seed session");

    Seed {
        admin,
        admin_token: session.token,
        org,
        project,
        api_key,
    }
}

/// Fire one request through the router and parse the JSON response.
pub async fn request(
    app: &Router,
    method: &str,
    path: &str,
    body: Option<&Value>,
    bearer: Option<&str>,
    extra_headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub async fn get(app: &Router, path: &str, bearer: Option<&str>) -> (StatusCode, Value) {
    request(app, "GET", path, None, bearer, &[]).await
}

pub async fn post_json(
    app: &Router,
    path: &str,
    body: &Value,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    request(app, "POST", path, Some(body), bearer, &[]).await
}

/// POST a raw body (for OTLP payloads) with arbitrary headers.
pub async fn post_raw(
    app: &Router,
    path: &str,
    body: Vec<u8>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("POST").uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Skip boilerplate: returns the context or early-returns from the test.
#[macro_export]
macro_rules! require_db {
    () => {
        match $crate::common::test_app().await {
            Some(ctx) => ctx,
            None => {
                eprintln!("skipping: TEST_DATABASE_URL / DATABASE_URL not set");
                return;
            }
        }
    };
}
