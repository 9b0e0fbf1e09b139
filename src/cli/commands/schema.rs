use serde_json::json;

use crate::cli::{utils::output_success, OutputFormat};
use crate::config;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let database_config = &config::config().database;
    let database = DatabaseManager::connect(database_config).await?;

    database.apply_schema().await?;
    database.close().await;

    output_success(
        &output_format,
        "Inventory schema is in place",
        Some(json!({ "database": database_config.redacted_url() })),
    )
}
