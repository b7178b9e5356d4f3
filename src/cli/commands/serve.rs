use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::{info, warn};

use crate::config::{config, TreeBackend};
use crate::database::DatabaseManager;
use crate::tree::{MemoryTreeStore, PgTreeStore, TreeStore};
use crate::AppState;

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, help = "Keep the structure in process memory instead of Postgres")]
    pub memory: bool,

    #[arg(long, help = "Port to listen on (defaults to PORT / api.port)")]
    pub port: Option<u16>,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let settings = config();
    let backend = if args.memory {
        TreeBackend::Memory
    } else {
        settings.tree.backend
    };

    let store: Arc<dyn TreeStore> = match backend {
        TreeBackend::Memory => {
            if crate::is_production!() {
                warn!("Serving from memory in production: changes are lost on restart");
            }
            Arc::new(MemoryTreeStore::new(&settings.tree.root_name))
        }
        TreeBackend::Postgres => {
            let db = DatabaseManager::connect().await?;
            Arc::new(PgTreeStore::new(db.pool().clone()))
        }
    };

    let port = args.port.unwrap_or(settings.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!(
        "Organizational structure API listening on http://{} ({} backend, {:?} mode)",
        bind_addr,
        store.backend(),
        settings.environment
    );
    crate::serve(listener, AppState::new(store)).await?;
    Ok(())
}
