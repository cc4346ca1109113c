use crate::error::GatewayError;
use crate::schema::CatalogOption;
use crate::services::cache::OptionCache;
use crate::services::gateway::Gateway;
use std::sync::Arc;

/// Cache-first catalog lookups.
#[derive(Clone)]
pub struct CatalogService {
    gateway: Arc<dyn Gateway>,
    cache: Arc<OptionCache>,
}

impl CatalogService {
    pub fn new(gateway: Arc<dyn Gateway>, cache: Arc<OptionCache>) -> Self {
        Self { gateway, cache }
    }

    pub fn get_catalog(
        &self,
        endpoint: &str,
        cache_key: Option<&str>,
    ) -> Result<Vec<CatalogOption>, GatewayError> {
        if let Some(key) = cache_key {
            if let Some(hit) = self.cache.get(key).filter(|v| !v.is_empty()) {
                tracing::debug!(endpoint, cache_key = key, "catalog served from cache");
                return Ok(hit);
            }
        }
        let options = self.gateway.fetch_list(endpoint)?;
        if let Some(key) = cache_key {
            if !options.is_empty() {
                self.cache.put(key, &options);
            }
        }
        Ok(options)
    }

    pub fn invalidate(&self, cache_key: &str) {
        self.cache.invalidate(cache_key);
    }
}
