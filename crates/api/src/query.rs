//! Shared query parameter types for API handlers.

use rwa_core::market::Market;
use rwa_core::types::Identity;
use serde::Deserialize;

/// Default page size for history endpoints.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Generic pagination parameters (`?limit=&offset=`).
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PaginationParams {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// Registry selector (`?registry=`). Absent means the primary registry.
#[derive(Debug, Default, Deserialize)]
pub struct RegistryParams {
    pub registry: Option<Identity>,
}

impl RegistryParams {
    pub fn resolve(self, market: &Market) -> Identity {
        self.registry
            .unwrap_or_else(|| market.primary_address().clone())
    }
}
