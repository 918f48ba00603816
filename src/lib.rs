//! GymHub: multi-tenant gym REST backend. Global catalogue in `public`, one schema per gym,
//! every entity served by a generic CRUD layer driven by an embedded catalogue.

pub mod catalog;
pub mod config;
pub mod docs;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod logging;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;
pub mod tenant;

pub use config::{resolve, FullConfig, ResolvedCatalog, ResolvedEntity};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use routes::app;
pub use settings::Settings;
pub use state::AppState;
pub use store::ensure_database_exists;
pub use tenant::{load_registry_from_pool, SchemaName, TenantRegistry};
