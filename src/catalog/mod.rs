//! Entity catalogue shipped with the binary: one JSON document per scope.

use crate::config::{parse_catalog, FullConfig};
use crate::error::ConfigError;

const PUBLIC_CATALOG: &str = include_str!("public.json");
const TENANT_CATALOG: &str = include_str!("tenant.json");

/// Parse both embedded catalogues.
pub fn load() -> Result<FullConfig, ConfigError> {
    Ok(FullConfig {
        public: parse_catalog(PUBLIC_CATALOG)?,
        tenant: parse_catalog(TENANT_CATALOG)?,
    })
}
