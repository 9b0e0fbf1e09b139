use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::HeaderValue,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::auth::JwtGate;
use crate::config::{AppConfig, StoreBackend};
use crate::database::DatabaseManager;
use crate::handlers::{protected, public, AppState};
use crate::services::InventoryService;
use crate::store::{AggregateStore, MemoryStore, PgStore};

/// Wire the configured store and the JWT gate into the router state
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn AggregateStore> = match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => {
            let database = DatabaseManager::connect(&config.database)
                .await
                .context("connecting to PostgreSQL")?;
            if config.store.apply_schema_on_start {
                database.apply_schema().await.context("applying inventory schema")?;
            }
            Arc::new(PgStore::new(&database, config.database.slow_query_threshold_ms))
        }
    };

    if config.security.jwt_secret.is_empty() {
        warn!("No JWT secret configured; every mutating request will be rejected");
    }
    let gate = Arc::new(JwtGate::from_config(&config.security));

    Ok(AppState::new(InventoryService::new(store, gate)))
}

pub fn app(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(building_routes())
        .merge(room_routes())
        .with_state(state)
        // Global middleware
        .layer(RequestBodyLimitLayer::new(config.api.max_request_size_bytes))
        .layer(cors_layer(&config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn building_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/buildings",
            get(public::buildings_list).post(protected::building_create),
        )
        .route(
            "/api/buildings/:id",
            get(public::building_get)
                .put(protected::building_update)
                .delete(protected::building_delete),
        )
}

fn room_routes() -> Router<AppState> {
    use axum::routing::post;

    Router::new()
        .route("/api/rooms", post(protected::room_create))
        .route("/api/rooms/search", get(public::rooms_search))
        .route("/api/rooms/building/:id", get(public::rooms_by_building))
        .route(
            "/api/rooms/:id",
            get(public::room_get)
                .put(protected::room_update)
                .delete(protected::room_delete),
        )
}

/// Permissive when no origins are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
