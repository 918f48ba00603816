//! Password hook: turns a plain `password` body field into a bcrypt hash column.

use crate::config::{PasswordSpec, ResolvedEntity};
use crate::error::AppError;
use serde_json::Value;
use std::collections::HashMap;

/// Hash a password on the blocking pool.
pub async fn hash_password(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(plain, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

/// Replace the input field with its hash. The hash column itself is never accepted from clients.
/// On create a password is required when the hash column is NOT NULL.
pub async fn apply_password_hook(
    entity: &ResolvedEntity,
    body: &mut HashMap<String, Value>,
    creating: bool,
) -> Result<(), AppError> {
    let Some(spec) = &entity.password else {
        return Ok(());
    };
    if body.contains_key(&spec.column) {
        return Err(AppError::Validation(format!("{} cannot be set directly", spec.column)));
    }
    match body.remove(&spec.input) {
        Some(Value::String(plain)) => {
            check_length(spec, &plain)?;
            let hash = hash_password(plain).await?;
            body.insert(spec.column.clone(), Value::String(hash));
        }
        Some(Value::Null) | None => {
            let required = entity.column(&spec.column).map(|c| !c.nullable).unwrap_or(false);
            if creating && required {
                return Err(AppError::Validation(format!("{} is required", spec.input)));
            }
        }
        Some(_) => {
            return Err(AppError::Validation(format!("{} must be a string", spec.input)));
        }
    }
    Ok(())
}

fn check_length(spec: &PasswordSpec, plain: &str) -> Result<(), AppError> {
    if plain.chars().count() < spec.min_length as usize {
        return Err(AppError::Validation(format!(
            "{} must be at least {} characters",
            spec.input, spec.min_length
        )));
    }
    Ok(())
}
