use serde_json::json;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;
use crate::tree::{PgTreeStore, TreeStore};

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let db = DatabaseManager::connect().await?;
    let store = PgTreeStore::new(db.pool().clone());
    let result = store.verify().await;
    db.close().await;

    match result {
        Ok(count) => output_success(
            &output_format,
            &format!("Structure is consistent ({} elements)", count),
            Some(json!({ "elements": count })),
        ),
        Err(e) => {
            output_error(&output_format, &e.to_string())?;
            Err(e.into())
        }
    }
}
