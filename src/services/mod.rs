pub mod inventory_service;
pub mod validation;

pub use inventory_service::InventoryService;
