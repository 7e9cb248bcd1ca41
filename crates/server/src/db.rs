use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use crate::cache::Cache;
use crate::jobs::JobQueue;
use crate::live_tail::LiveTailBus;
use crate::rate_limit::RateLimitState;
use crate::settings::SettingsService;

/// Shared application state passed to Axum handlers via `State`.
/// Derives `FromRef` so handlers can extract `State<PgPool>` (or any other
/// field) directly.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub cache: Cache,
    pub bus: LiveTailBus,
    pub jobs: JobQueue,
    pub settings: SettingsService,
    pub login_limiter: RateLimitState,
    pub http: reqwest::Client,
}

impl AppState {
    /// Assemble the application state from an existing pool and cache.
    pub fn new(pool: Pool<Postgres>, cache: Cache) -> Self {
        let bus = LiveTailBus::new(cache.clone());
        let jobs = JobQueue::new(cache.clone());
        let settings = SettingsService::new(pool.clone(), cache.clone());
        let login_limiter = RateLimitState::new(
            crate::config::login_rate_limit_max(),
            std::time::Duration::from_secs(crate::config::login_rate_limit_window_secs()),
        );
        Self {
            pool,
            cache,
            bus,
            jobs,
            settings,
            login_limiter,
            http: reqwest::Client::new(),
        }
    }
}

/// Create a new database connection pool from environment variables.
/// Uses `connect_lazy` so no connections open until the first query.
pub fn create_pool() -> Pool<Postgres> {
    // Load .env file if present (ignored in production where env vars are set directly).
    let _ = dotenvy::dotenv();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect_lazy(&database_url)
        .expect("Failed to create database pool")
}

/// Run database migrations against the given pool.
pub async fn run_migrations(pool: &Pool<Postgres>) {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .expect("Failed to run database migrations");
}
