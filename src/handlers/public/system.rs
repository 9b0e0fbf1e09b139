use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::handlers::AppState;

/// GET / - service description
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Room Inventory API",
            "version": version,
            "description": "Buildings, rooms and their doors, windows, walls, floors and lamps",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "buildings": "/api/buildings[/:id] (GET public, POST/PUT/DELETE bearer)",
                "rooms": "/api/rooms[/:id] (GET public, POST/PUT/DELETE bearer)",
                "rooms_by_building": "/api/rooms/building/:id (public)",
                "search": "/api/rooms/search?search= (public)",
            }
        }
    }))
}

/// GET /health - pings the store
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.service.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": true,
                    "message": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
