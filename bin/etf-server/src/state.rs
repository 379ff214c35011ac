//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::services::ai::{Advisor, HttpAdvisor};
use crate::services::email::Mailer;
use crate::services::notification::Notifier;

/// State shared across all HTTP handlers and the scheduler.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    /// AI analysis service.
    pub advisor: Arc<dyn Advisor>,
    pub notifier: Notifier,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Assemble the state around an already opened store.
    pub fn new(
        config: Config,
        store: SqliteStore,
        advisor: Arc<dyn Advisor>,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(store);
        let mailer = Arc::new(Mailer::new(&config)?);
        Ok(Self {
            config: Arc::new(config),
            notifier: Notifier::new(Arc::clone(&store), mailer),
            store,
            advisor,
        })
    }

    /// Production wiring: the HTTP advisor pointed at `ETF_AI_SERVICE_URL`.
    pub fn with_http_advisor(config: Config, store: SqliteStore) -> anyhow::Result<Self> {
        let advisor = Arc::new(HttpAdvisor::new(&config)?);
        Self::new(config, store, advisor)
    }
}
