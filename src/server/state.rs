//! Shared application state.

use std::sync::Arc;

use super::rate_limit::IpRateLimiter;
use crate::config::Config;
use crate::service::PaperService;
use crate::sources::SourceError;
use crate::utils::{MemoryStore, ResponseStore};

/// State handed to every handler and middleware
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: PaperService,
    /// `None` when caching is disabled
    pub cache: Option<Arc<dyn ResponseStore>>,
    pub limiter: Arc<IpRateLimiter>,
    pub production: bool,
}

impl AppState {
    /// Build the state around an existing service
    pub fn new(service: PaperService, config: &Config) -> Self {
        let cache: Option<Arc<dyn ResponseStore>> = if config.cache.enabled {
            tracing::info!(
                "Response cache enabled (ttl {}s, {} entries, {} MB)",
                config.cache.ttl_seconds,
                config.cache.max_entries,
                config.cache.max_total_mb
            );
            Some(Arc::new(MemoryStore::from_config(&config.cache)))
        } else {
            None
        };

        Self {
            service,
            cache,
            limiter: Arc::new(IpRateLimiter::from_config(&config.rate_limit)),
            production: config.is_production(),
        }
    }

    /// Build the production service and state from configuration
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        Ok(Self::new(PaperService::from_config(config)?, config))
    }

    /// Replace the cache store
    pub fn with_cache(mut self, store: Arc<dyn ResponseStore>) -> Self {
        self.cache = Some(store);
        self
    }
}
