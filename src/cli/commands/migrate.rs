use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let db = DatabaseManager::connect().await?;
    let root_name = &config().tree.root_name;
    db.migrate(root_name).await?;
    db.close().await;

    output_success(
        &output_format,
        "Schema is up to date",
        Some(json!({ "root_name": root_name })),
    )
}
