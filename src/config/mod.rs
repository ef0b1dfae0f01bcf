use std::{env, net::SocketAddr};

use chrono::Duration;
use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24 * 7;
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("DATABASE_URL must be set when STORAGE_BACKEND is postgres")]
    MissingDatabaseUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub token_ttl: Duration,
    /// `RUST_ENV=production`, enables HSTS
    pub production: bool,
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, which keeps tests away from
    /// the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let storage_backend = match lookup("STORAGE_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("postgres") => StorageBackend::Postgres,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let max_connections =
            parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let bind_addr = parse_or(
            &lookup,
            "BIND_ADDR",
            SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        )?;
        let ttl_hours: i64 = parse_or(&lookup, "TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_HOURS",
                value: ttl_hours.to_string(),
            });
        }

        let production = lookup("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        let cors_allowed_origins =
            lookup("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string());

        Ok(Self {
            storage_backend,
            database_url,
            max_connections,
            bind_addr,
            token_ttl: Duration::hours(ttl_hours),
            production,
            cors_allowed_origins,
        })
    }

    /// In-memory settings for tests and local demos.
    pub fn in_memory() -> Self {
        Self {
            storage_backend: StorageBackend::Memory,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            bind_addr: ([127, 0, 0, 1], 0).into(),
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            production: false,
            cors_allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_string(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUrl));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[(
            "DATABASE_URL",
            "postgres://localhost/stagepass",
        )]))
        .unwrap();

        assert_eq!(config.storage_backend, StorageBackend::Postgres);
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.token_ttl, Duration::hours(168));
        assert!(!config.production);
        assert_eq!(config.cors_allowed_origins, DEFAULT_ALLOWED_ORIGINS);
    }

    #[test]
    fn test_memory_backend_and_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "memory"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("TOKEN_TTL_HOURS", "2"),
            ("RUST_ENV", "Production"),
        ]))
        .unwrap();

        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.token_ttl, Duration::hours(2));
        assert!(config.production);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = Config::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "memory"),
            ("TOKEN_TTL_HOURS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "TOKEN_TTL_HOURS",
                ..
            }
        ));

        let err = Config::from_lookup(lookup(&[("STORAGE_BACKEND", "redis")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "STORAGE_BACKEND", .. }));
    }
}
