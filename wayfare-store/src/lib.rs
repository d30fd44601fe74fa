pub mod app_config;
pub mod events;
pub mod memory;
pub mod redis_repo;

use std::sync::Arc;
use tracing::info;
use wayfare_core::{StoreError, TicketStore};

pub use events::EventProducer;
pub use memory::InMemoryTicketStore;
pub use redis_repo::RedisTicketStore;

/// Builds the ticket store selected by `store.backend`.
pub async fn connect_store(
    store: &app_config::StoreConfig,
    redis: &app_config::RedisConfig,
) -> Result<Arc<dyn TicketStore>, StoreError> {
    match store.backend {
        app_config::StoreBackend::Redis => {
            let client = RedisTicketStore::new(&redis.url)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            info!("Ticket store backed by Redis");
            Ok(Arc::new(client))
        }
        app_config::StoreBackend::Memory => {
            info!("Ticket store running in memory; records do not survive restarts");
            Ok(Arc::new(InMemoryTicketStore::new()))
        }
    }
}
