//! Request validation from catalogue rules.

use crate::config::{ResolvedEntity, ValidationRule, CREATED_AT, DELETED_AT, UPDATED_AT};
use crate::error::AppError;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body. Required fields must be present, non-null and, for strings, non-blank.
    pub fn validate(
        body: &HashMap<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), AppError> {
        for (col, rule) in sorted(rules) {
            let val = body.get(col);
            if rule.required == Some(true) && is_missing(val) {
                return Err(AppError::Validation(format!("{} is required", col)));
            }
            if let Some(v) = val {
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (PUT/PATCH). A required field may be omitted
    /// but not cleared.
    pub fn validate_partial(
        body: &HashMap<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), AppError> {
        for (col, rule) in sorted(rules) {
            let Some(v) = body.get(col) else { continue };
            if rule.required == Some(true) && is_missing(Some(v)) {
                return Err(AppError::Validation(format!("{} cannot be empty", col)));
            }
            validate_field(col, v, rule)?;
        }
        Ok(())
    }

    /// Every non-null body value must have the JSON shape of its column type.
    /// Runs before binding so nothing is rounded or stringified by a cast.
    pub fn check_types(body: &HashMap<String, Value>, entity: &ResolvedEntity) -> Result<(), AppError> {
        for c in &entity.columns {
            if [CREATED_AT, UPDATED_AT, DELETED_AT].contains(&c.name.as_str()) {
                continue;
            }
            let (Some(v), Some(pg_type)) = (body.get(&c.name), c.pg_type.as_deref()) else {
                continue;
            };
            if v.is_null() {
                continue;
            }
            let expected = match pg_type {
                "int2" | "int4" | "int8" if v.as_i64().is_none() => Some("an integer"),
                "float4" | "float8" | "numeric" if !v.is_number() => Some("a number"),
                "bool" if !v.is_boolean() => Some("a boolean"),
                "text" | "varchar" | "uuid" | "date" | "timestamp" | "timestamptz" if !v.is_string() => {
                    Some("a string")
                }
                _ => None,
            };
            if let Some(expected) = expected {
                return Err(AppError::Validation(format!("{} must be {}", c.name, expected)));
            }
        }
        Ok(())
    }
}

// Stable order so the first reported error does not depend on hashing.
fn sorted(rules: &HashMap<String, ValidationRule>) -> Vec<(&String, &ValidationRule)> {
    let mut v: Vec<_> = rules.iter().collect();
    v.sort_by(|a, b| a.0.cmp(b.0));
    v
}

fn is_missing(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.trim().chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern)
            .map_err(|_| AppError::Internal(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            let options: Vec<String> = allowed
                .iter()
                .map(|a| a.as_str().map(str::to_string).unwrap_or_else(|| a.to_string()))
                .collect();
            return Err(AppError::Validation(format!(
                "{} must be one of: {}",
                col,
                options.join(", ")
            )));
        }
    }
    if rule.minimum.is_some() || rule.maximum.is_some() {
        let n = v
            .as_f64()
            .ok_or_else(|| AppError::Validation(format!("{} must be a number", col)))?;
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    let Some(s) = v.as_str() else {
        return Err(AppError::Validation(format!("{} must be a string", col)));
    };
    match format.to_lowercase().as_str() {
        "email" => {
            let valid = s
                .split_once('@')
                .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
                .unwrap_or(false);
            if !valid {
                return Err(AppError::Validation(format!("{} must be a valid email", col)));
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                return Err(AppError::Validation(format!("{} must be a valid UUID", col)));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(v: Value) -> HashMap<String, ValidationRule> {
        serde_json::from_value(v).unwrap()
    }

    fn body(v: Value) -> HashMap<String, Value> {
        serde_json::from_value(v).unwrap()
    }

    fn equipment_rules() -> HashMap<String, ValidationRule> {
        rules(json!({
            "name": { "required": true, "min_length": 1, "max_length": 10 },
            "category": { "required": true, "allowed": ["cardio", "strength"] }
        }))
    }

    #[test]
    fn blank_required_string_is_rejected() {
        let err = RequestValidator::validate(&body(json!({"name": "   ", "category": "cardio"})), &equipment_rules())
            .unwrap_err();
        assert_eq!(err.to_string(), "validation: name is required");
    }

    #[test]
    fn create_accepts_valid_body() {
        RequestValidator::validate(&body(json!({"name": "Rower", "category": "cardio"})), &equipment_rules()).unwrap();
    }

    #[test]
    fn allowed_values_are_listed() {
        let err = RequestValidator::validate(&body(json!({"name": "Rower", "category": "yoga"})), &equipment_rules())
            .unwrap_err();
        assert_eq!(err.to_string(), "validation: category must be one of: cardio, strength");
    }

    #[test]
    fn length_counts_characters() {
        let ok = body(json!({"name": "ÉÉÉÉÉÉÉÉÉÉ", "category": "cardio"}));
        RequestValidator::validate(&ok, &equipment_rules()).unwrap();
        let long = body(json!({"name": "abcdefghijk", "category": "cardio"}));
        assert!(RequestValidator::validate(&long, &equipment_rules()).is_err());
    }

    #[test]
    fn partial_skips_missing_required_but_not_cleared_ones() {
        RequestValidator::validate_partial(&body(json!({})), &equipment_rules()).unwrap();
        RequestValidator::validate_partial(&body(json!({"category": "strength"})), &equipment_rules()).unwrap();
        let err = RequestValidator::validate_partial(&body(json!({"name": ""})), &equipment_rules()).unwrap_err();
        assert_eq!(err.to_string(), "validation: name cannot be empty");
    }

    #[test]
    fn numeric_ranges() {
        let r = rules(json!({"sets": {"minimum": 1, "maximum": 100}}));
        RequestValidator::validate(&body(json!({"sets": 5})), &r).unwrap();
        assert!(RequestValidator::validate(&body(json!({"sets": 0})), &r).is_err());
        assert!(RequestValidator::validate(&body(json!({"sets": 101})), &r).is_err());
        let err = RequestValidator::validate(&body(json!({"sets": "five"})), &r).unwrap_err();
        assert_eq!(err.to_string(), "validation: sets must be a number");
    }

    #[test]
    fn formats_and_patterns() {
        let r = rules(json!({
            "email": {"format": "email"},
            "ref": {"format": "uuid"},
            "slug": {"pattern": "^[a-z][a-z0-9_]{2,39}$"}
        }));
        RequestValidator::validate(
            &body(json!({"email": "a@b.co", "ref": uuid::Uuid::new_v4().to_string(), "slug": "iron_temple"})),
            &r,
        )
        .unwrap();
        assert!(RequestValidator::validate(&body(json!({"email": "nope"})), &r).is_err());
        assert!(RequestValidator::validate(&body(json!({"ref": "123"})), &r).is_err());
        assert!(RequestValidator::validate(&body(json!({"slug": "Iron"})), &r).is_err());
    }

    fn entity(segment: &str) -> crate::config::ResolvedEntity {
        let cat = crate::config::resolve(&crate::catalog::load().unwrap()).unwrap();
        cat.public.entity_by_path(segment).unwrap().clone()
    }

    #[test]
    fn fractional_number_for_integer_column_is_rejected() {
        let blocks = entity("template-blocks");
        let err = RequestValidator::check_types(&body(json!({"block_order": 1.5, "sets": 2.7})), &blocks).unwrap_err();
        assert_eq!(err.to_string(), "validation: block_order must be an integer");
        RequestValidator::check_types(&body(json!({"block_order": 1, "sets": null})), &blocks).unwrap();
    }

    #[test]
    fn text_and_bool_columns_need_matching_json() {
        let equipment = entity("equipment");
        let err = RequestValidator::check_types(&body(json!({"name": 42})), &equipment).unwrap_err();
        assert_eq!(err.to_string(), "validation: name must be a string");
        let err = RequestValidator::check_types(&body(json!({"name": "Rower", "description": true})), &equipment)
            .unwrap_err();
        assert_eq!(err.to_string(), "validation: description must be a string");
        let gyms = entity("gyms");
        let err = RequestValidator::check_types(&body(json!({"active": "yes"})), &gyms).unwrap_err();
        assert_eq!(err.to_string(), "validation: active must be a boolean");
    }

    #[test]
    fn ignored_timestamps_and_unknown_keys_are_not_type_checked() {
        let equipment = entity("equipment");
        RequestValidator::check_types(&body(json!({"name": "Rower", "created_at": 1, "nope": 2})), &equipment).unwrap();
    }
}
