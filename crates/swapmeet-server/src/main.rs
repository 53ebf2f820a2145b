mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use swapmeet_api::state::AppStateInner;
use swapmeet_chat::{ChatService, EventBus};
use swapmeet_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swapmeet=debug,tower_http=debug".into()),
        )
        .init();

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    // Shared state
    let events = EventBus::default();
    spawn_analytics_sink(&events);
    let chat = ChatService::with_database(db, events, config.aggregation_timeout);
    let state = AppStateInner::new(chat, config.jwt_secret.clone());

    let app = Router::new()
        .merge(swapmeet_api::router(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Swapmeet chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Logs every chat event for the analytics pipeline, which tails the
/// `swapmeet::analytics` target.
fn spawn_analytics_sink(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(target: "swapmeet::analytics", room = ?event.room_id(), "{}", json),
                    Err(e) => warn!("Failed to serialize chat event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Analytics sink lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
