// handlers/mod.rs - two handler tiers
//
// Public (no auth) → reads, search, health
// Protected (bearer JWT checked by the access gate) → every mutation
//
// Handlers only adapt HTTP to the inventory service; gate, validation and store
// calls all happen inside the service.
pub mod protected;
pub mod public;

use crate::services::InventoryService;

/// Shared router state
#[derive(Clone)]
pub struct AppState {
    pub service: InventoryService,
}

impl AppState {
    pub fn new(service: InventoryService) -> Self {
        Self { service }
    }
}
