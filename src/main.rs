mod config;
mod db;
mod frame;
mod graph;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env().expect("configuration invalid");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");
    let repo = Arc::new(services::persistence::PgGraphRepository::new(pool));

    let port = config.port;
    tracing::info!(
        history_limit = config.history_limit,
        client_channel_capacity = config.client_channel_capacity,
        shape = config.tool.shape_type.as_str(),
        "configuration loaded"
    );
    let state = state::AppState::new(repo, config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "mindboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
