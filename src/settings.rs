//! Runtime settings from environment variables (a `.env` file is loaded by the binaries).

use crate::error::ConfigError;

const DEFAULT_PG_PORT: u16 = 5432;
const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub pg_host: String,
    pub pg_port: u16,
    pub pg_user: String,
    pub pg_password: String,
    pub pg_database: String,
    /// Full connection string; when set it replaces the `PG_*` parts.
    pub dsn: Option<String>,
    pub http_port: u16,
    pub max_connections: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(db_type) = get("DB_TYPE") {
            if !matches!(db_type.to_lowercase().as_str(), "postgres" | "postgresql") {
                return Err(ConfigError::Validation(format!(
                    "unsupported DB_TYPE {:?}, only postgres is supported",
                    db_type
                )));
            }
        }
        let dsn = get("DB_DSN");
        let required = |k: &str| {
            get(k).ok_or_else(|| ConfigError::Validation(format!("{} must be set (or DB_DSN)", k)))
        };
        let (pg_host, pg_user, pg_database) = if dsn.is_some() {
            (
                get("PG_HOSTNAME").unwrap_or_default(),
                get("PG_USERNAME").unwrap_or_default(),
                get("PG_DATABASE").unwrap_or_default(),
            )
        } else {
            (required("PG_HOSTNAME")?, required("PG_USERNAME")?, required("PG_DATABASE")?)
        };

        Ok(Settings {
            pg_host,
            pg_port: parse_or("PG_PORT", get("PG_PORT"), DEFAULT_PG_PORT)?,
            pg_user,
            pg_password: get("PG_PASSWORD").unwrap_or_default(),
            pg_database,
            dsn,
            http_port: parse_or("PORT", get("PORT"), DEFAULT_HTTP_PORT)?,
            max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), DEFAULT_MAX_CONNECTIONS)?,
        })
    }

    pub fn database_url(&self) -> String {
        if let Some(dsn) = &self.dsn {
            return dsn.clone();
        }
        let auth = if self.pg_password.is_empty() {
            encode(&self.pg_user)
        } else {
            format!("{}:{}", encode(&self.pg_user), encode(&self.pg_password))
        };
        format!(
            "postgres://{}@{}:{}/{}",
            auth, self.pg_host, self.pg_port, self.pg_database
        )
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError::Validation(format!("{} is not a valid number: {:?}", key, v))),
    }
}

// Percent-encode userinfo characters that would break the URL.
fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn builds_url_from_parts_with_defaults() {
        let s = settings(&[
            ("PG_HOSTNAME", "db"),
            ("PG_USERNAME", "gym"),
            ("PG_PASSWORD", "p@ss:word"),
            ("PG_DATABASE", "gymhub"),
        ])
        .unwrap();
        assert_eq!(s.http_port, 8080);
        assert_eq!(s.database_url(), "postgres://gym:p%40ss%3Aword@db:5432/gymhub");
    }

    #[test]
    fn dsn_overrides_parts() {
        let s = settings(&[("DB_DSN", "postgres://u@h/x"), ("PORT", "9000"), ("DB_TYPE", "PostgreSQL")]).unwrap();
        assert_eq!(s.database_url(), "postgres://u@h/x");
        assert_eq!(s.http_port, 9000);
    }

    #[test]
    fn rejects_other_databases_and_bad_numbers() {
        assert!(settings(&[("DB_TYPE", "mysql"), ("DB_DSN", "x")]).is_err());
        assert!(settings(&[("DB_DSN", "x"), ("PG_PORT", "abc")]).is_err());
        let err = settings(&[("PG_HOSTNAME", "db")]).unwrap_err();
        assert_eq!(err.to_string(), "validation: PG_USERNAME must be set (or DB_DSN)");
    }
}
