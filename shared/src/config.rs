//! Process settings, read once from the environment at cold start.

use tasklist_atoms::tasks::ConnectionConfig;
use thiserror::Error;

pub const DATABASE_PATH_VAR: &str = "TASKS_DATABASE_PATH";
pub const POOL_SIZE_VAR: &str = "TASKS_DB_POOL_SIZE";
pub const BUSY_TIMEOUT_VAR: &str = "TASKS_DB_BUSY_TIMEOUT_MS";
pub const CORS_ORIGIN_VAR: &str = "CORS_ALLOW_ORIGIN";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite file for the durable backend. `None` selects the in-memory fallback.
    pub database_path: Option<String>,
    pub connection: ConnectionConfig,
    /// Value sent in `Access-Control-Allow-Origin`.
    pub cors_allow_origin: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            connection: ConnectionConfig::default(),
            cors_allow_origin: "*".to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let pool_size = match get(POOL_SIZE_VAR) {
            Some(raw) => positive(POOL_SIZE_VAR, &raw)?,
            None => defaults.connection.pool_size,
        };
        let busy_timeout_ms = match get(BUSY_TIMEOUT_VAR) {
            Some(raw) => positive(BUSY_TIMEOUT_VAR, &raw)?,
            None => defaults.connection.busy_timeout_ms,
        };

        Ok(Self {
            database_path: get(DATABASE_PATH_VAR),
            connection: ConnectionConfig {
                pool_size,
                busy_timeout_ms,
            },
            cors_allow_origin: get(CORS_ORIGIN_VAR).unwrap_or(defaults.cors_allow_origin),
        })
    }
}

fn positive(name: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            name,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database_path, None);
        assert_eq!(s.connection.pool_size, 4);
        assert_eq!(s.connection.busy_timeout_ms, 5_000);
        assert_eq!(s.cors_allow_origin, "*");
    }

    #[test]
    fn blank_database_path_means_in_memory() {
        let s = settings(&[(DATABASE_PATH_VAR, "   ")]).unwrap();
        assert_eq!(s.database_path, None);
    }

    #[test]
    fn reads_every_variable() {
        let s = settings(&[
            (DATABASE_PATH_VAR, "/tmp/tasks.db"),
            (POOL_SIZE_VAR, "8"),
            (BUSY_TIMEOUT_VAR, "250"),
            (CORS_ORIGIN_VAR, "https://todo.example"),
        ])
        .unwrap();
        assert_eq!(s.database_path.as_deref(), Some("/tmp/tasks.db"));
        assert_eq!(s.connection.pool_size, 8);
        assert_eq!(s.connection.busy_timeout_ms, 250);
        assert_eq!(s.cors_allow_origin, "https://todo.example");
    }

    #[test]
    fn rejects_bad_numbers() {
        assert_eq!(
            settings(&[(POOL_SIZE_VAR, "0")]).unwrap_err(),
            ConfigError::InvalidNumber {
                name: POOL_SIZE_VAR,
                value: "0".into()
            }
        );
        assert!(settings(&[(BUSY_TIMEOUT_VAR, "soon")]).is_err());
    }
}
