//! Shared application state for all routes.

use crate::config::{FullConfig, ResolvedCatalog};
use crate::tenant::{TenantEntry, TenantRegistry};
use sqlx::PgPool;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub catalog: Arc<ResolvedCatalog>,
    /// Raw catalogue, kept for rendering tenant DDL when a gym is registered.
    pub config: Arc<FullConfig>,
    /// Guards are only taken in short sync sections, never across an `.await`.
    pub tenants: Arc<RwLock<TenantRegistry>>,
}

impl AppState {
    pub fn new(pool: PgPool, config: FullConfig, catalog: ResolvedCatalog, tenants: TenantRegistry) -> Self {
        AppState {
            pool,
            catalog: Arc::new(catalog),
            config: Arc::new(config),
            tenants: Arc::new(RwLock::new(tenants)),
        }
    }

    pub fn tenant(&self, slug: &str) -> Option<TenantEntry> {
        self.tenants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(slug)
            .cloned()
    }

    pub fn register_tenant(&self, entry: TenantEntry) {
        tracing::info!(slug = %entry.slug, schema = %entry.schema, "tenant registered");
        self.tenants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry);
    }

    pub fn deregister_gym(&self, gym_id: uuid::Uuid) {
        let removed = self
            .tenants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_gym(gym_id);
        if let Some(entry) = removed {
            tracing::info!(slug = %entry.slug, "tenant deregistered");
        }
    }
}
