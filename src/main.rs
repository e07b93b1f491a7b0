use std::sync::Arc;

use axum::Router;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use medialist_api::config;
use medialist_api::database;
use medialist_api::dispatch::{self, AppState, Dispatcher};
use medialist_api::handlers::{
    GenreHandler, MediaHandler, RatingHandler, SessionHandler, StatusHandler, UserHandler,
};
use medialist_api::session::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting Medialist API in {:?} mode", config.environment);

    let pool = database::connect(&config.database)?;
    if let Err(err) = database::ensure_schema(&pool).await {
        // The server still serves (and /health reports degraded) while the
        // database is unreachable.
        tracing::warn!("schema bootstrap skipped: {}", err);
    }

    let sessions = Arc::new(SessionStore::new(chrono::Duration::hours(
        config.session.expiry_hours as i64,
    )));

    // Registration order is the dispatch order. None of these prefixes
    // overlap; the chain would reject duplicates at startup.
    let mut dispatcher = Dispatcher::new(sessions.clone());
    dispatcher.register(Arc::new(StatusHandler::new(pool.clone())))?;
    dispatcher.register(Arc::new(SessionHandler::new(pool.clone(), sessions)))?;
    dispatcher.register(Arc::new(UserHandler::new(pool.clone())))?;
    dispatcher.register(Arc::new(MediaHandler::new(pool.clone())))?;
    dispatcher.register(Arc::new(GenreHandler::new(pool.clone())))?;
    dispatcher.register(Arc::new(RatingHandler::new(pool)))?;

    let state = AppState {
        dispatcher: Arc::new(dispatcher),
    };

    // axum is only the listener; every request falls through to the chain.
    let app = Router::new()
        .fallback(dispatch::entry)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Medialist API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
