use anyhow::Context;
use log::info;
use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};
use crate::tickets::{InMemoryGateway, PostgrestGateway, TableGateway, TicketStore, TICKET_COLUMNS};

/// Process-wide state, built once at startup and shared by every handler.
pub struct AppState {
    pub config: AppConfig,
    pub store: TicketStore,
}

impl AppState {
    pub fn new(config: AppConfig, store: TicketStore) -> Self {
        Self { config, store }
    }

    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let gateway: Arc<dyn TableGateway> = match config.store.backend {
            StoreBackend::Postgrest => {
                info!("Using table store at {}", config.store.url);
                Arc::new(
                    PostgrestGateway::new(
                        &config.store.url,
                        &config.store.api_key,
                        config.store.timeout(),
                    )
                    .context("Failed to build table store client")?,
                )
            }
            StoreBackend::Memory => {
                info!("Using in-memory ticket table");
                Arc::new(InMemoryGateway::with_columns(&TICKET_COLUMNS))
            }
        };
        let store = TicketStore::new(gateway, config.store.table.clone());
        Ok(Self::new(config, store))
    }

    pub fn in_memory() -> Self {
        let store = TicketStore::new(
            Arc::new(InMemoryGateway::with_columns(&TICKET_COLUMNS)),
            crate::tickets::TICKETS_TABLE,
        );
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Memory;
        Self::new(config, store)
    }
}
