use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{connect_with_retry, PgStore, Store};
use crate::storage::{self, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    /// Connects to PostgreSQL (waiting for it if needed), applies migrations and
    /// sets up image storage.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let pool = connect_with_retry(&config.database).await?;
        let store = PgStore::new(pool);
        store.migrate().await?;

        let storage = storage::from_config(&config.storage).await?;

        Ok(Self::from_parts(Arc::new(store), config, storage))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            store,
            config,
            storage,
        }
    }
}
