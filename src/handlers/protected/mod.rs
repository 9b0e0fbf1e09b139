// handlers/protected/mod.rs - Protected handlers (bearer JWT required)
//
// Every handler forwards the raw Authorization header to the inventory service,
// which runs the access gate before validating input or touching the store.

pub mod buildings;
pub mod rooms;

pub use buildings::{building_create, building_delete, building_update};
pub use rooms::{room_create, room_delete, room_update};

use axum::{extract::rejection::JsonRejection, Json};
use serde_json::Value;

use crate::error::ApiError;
use crate::middleware::Credential;
use crate::services::InventoryService;

/// Unwrap a JSON body. An unreadable body is reported only after the gate passed.
pub(crate) fn read_body(
    service: &InventoryService,
    credential: &Credential,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Value, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            service.authorize(credential.as_deref())?;
            tracing::debug!("Rejected request body: {}", rejection.body_text());
            Err(ApiError::invalid_json(rejection.body_text()))
        }
    }
}
