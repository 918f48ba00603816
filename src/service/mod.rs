//! Entity services: generic CRUD plus the validation, password and reference hooks around it.

mod crud;
mod entity;
mod gym;
mod password;
mod references;
mod validation;
pub use crud::{CrudService, ListParams, DEFAULT_LIMIT};
pub use entity::EntityService;
pub use gym::GymService;
pub use password::{apply_password_hook, hash_password};
pub use references::ReferenceGuard;
pub use validation::RequestValidator;
