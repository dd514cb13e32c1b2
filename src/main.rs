use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use frontdesk::config::AppConfig;
use frontdesk::db;
use frontdesk::handlers;
use frontdesk::services::backend::sqlite::SqliteBackend;
use frontdesk::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));
    let backend = SqliteBackend::new(Arc::clone(&db), &config);

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        backend: Box::new(backend),
        sessions: Mutex::new(HashMap::new()),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/turn", post(handlers::turn::post_turn))
        .route("/api/session/:id", delete(handlers::turn::delete_session))
        .route(
            "/api/admin/appointments",
            get(handlers::admin::get_appointments),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
