use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use voipbill_analytics::report::BillingReporter;
use voipbill_analytics::store::{AnalyticStore, InMemoryAnalyticStore};
use voipbill_core::error::Result;
use voipbill_rates::client::RateApiClient;
use voipbill_rates::engine::RateBook;

use crate::config::AppConfig;
use crate::server::auth::UserDirectory;
use crate::server::session::SessionStore;

/// Shared application state, passed to all handlers via `axum::extract::State`.
pub struct AppState {
    pub config: AppConfig,
    pub users: UserDirectory,
    /// Rate book served by the rate API and used by the simulator
    pub rate_book: RateBook,
    pub rate_client: RateApiClient,
    pub reporter: BillingReporter,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        users: UserDirectory,
        rate_book: RateBook,
        store: Arc<dyn AnalyticStore>,
        rate_api_base: &str,
    ) -> Result<Arc<Self>> {
        let rate_client = RateApiClient::new(rate_api_base, config.http_timeout)?;
        let reporter =
            BillingReporter::new(store, config.collection.clone(), config.timezone.clone());
        let sessions = SessionStore::with_limits(config.session_ttl, config.max_sessions);

        Ok(Arc::new(Self {
            config,
            users,
            rate_book,
            rate_client,
            reporter,
            sessions,
        }))
    }

    /// Load users, rate book and analytic documents named by the config.
    ///
    /// `local_addr` is where the server listens; the rate API defaults to it.
    pub async fn from_config(config: AppConfig, local_addr: SocketAddr) -> Result<Arc<Self>> {
        let users = UserDirectory::load(&config.users_path)?;

        let rate_book = match &config.rate_book_path {
            Some(path) => RateBook::load(path)?,
            None => RateBook::default(),
        };

        let store = Arc::new(InMemoryAnalyticStore::new());
        if let Some(path) = &config.analytic_data {
            store.load_jsonl(&config.collection, path).await?;
        }

        let rate_api_base = config.rate_api_base(&local_addr);
        info!("Rate API at {}", rate_api_base);
        Self::new(config, users, rate_book, store, &rate_api_base)
    }
}
