use std::net::SocketAddr;

use server::cache::Cache;
use server::db::AppState;

#[tokio::main]
async fn main() {
    server::telemetry::init_telemetry();
    server::health::record_start_time();

    let pool = server::db::create_pool();
    server::db::run_migrations(&pool).await;

    let cache = Cache::connect().await;
    let state = AppState::new(pool, cache);

    if let Err(e) = server::bootstrap::run(&state).await {
        tracing::error!(error = %e, "Bootstrap failed");
    }

    // Background machinery: the live-tail bridge, the queue workers, and
    // the periodic alert evaluator.
    let mut background = Vec::new();
    background.push(tokio::spawn(state.bus.clone().run_redis_bridge()));
    background.extend(server::jobs::spawn_workers(state.clone()));
    background.push(tokio::spawn(server::alerts::evaluator::run_loop(
        state.clone(),
    )));

    let app = server::rest::api_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], server::config::port()));
    tracing::info!(addr = %addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    for handle in background {
        handle.abort();
    }
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
