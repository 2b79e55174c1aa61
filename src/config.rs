//! Process configuration (§6 environment variables), loaded once at
//! startup from the environment (and a `.env` file in development, via
//! `dotenvy`, matching `flow-persistence`'s convention).

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid HTTP_BIND_ADDR '{0}': {1}")]
    InvalidBindAddr(String, std::net::AddrParseError),
    #[error("invalid SCHEDULER_ENABLED '{0}', expected true/false")]
    InvalidBool(String),
}

/// Everything read from the environment at startup. Fields correspond
/// 1:1 to `spec.md §6`'s environment variable list, plus the two this
/// binary adds to stand up an HTTP surface and a scheduler loop
/// (`HTTP_BIND_ADDR`, `SCHEDULER_ENABLED`).
#[derive(Debug, Clone)]
pub struct Config {
    pub auth_server: Option<String>,
    pub database_url: String,
    pub verbosity: String,
    pub events_elasticsearch_host: Option<String>,
    pub datasets_index_name: String,
    pub pkgstore_bucket: Option<String>,
    pub http_bind_addr: SocketAddr,
    pub http_prefix: String,
    pub scheduler_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "flowmanager.sqlite".to_string());
        let verbosity = std::env::var("FLOWMANAGER_VERBOSITY").unwrap_or_else(|_| "info".to_string());
        let datasets_index_name = std::env::var("DATASETS_INDEX_NAME").unwrap_or_else(|_| "datasets".to_string());
        let http_bind_addr_str = std::env::var("HTTP_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let http_bind_addr = http_bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidBindAddr(http_bind_addr_str, e))?;
        let http_prefix = std::env::var("HTTP_PREFIX").unwrap_or_default();
        let scheduler_enabled = match std::env::var("SCHEDULER_ENABLED") {
            Ok(raw) => raw.parse::<bool>().map_err(|_| ConfigError::InvalidBool(raw))?,
            Err(_) => true,
        };

        Ok(Self {
            auth_server: std::env::var("AUTH_SERVER").ok(),
            database_url,
            verbosity,
            events_elasticsearch_host: std::env::var("EVENTS_ELASTICSEARCH_HOST").ok(),
            datasets_index_name,
            pkgstore_bucket: std::env::var("PKGSTORE_BUCKET").ok(),
            http_bind_addr,
            http_prefix,
            scheduler_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparseable_bind_addr() {
        std::env::set_var("HTTP_BIND_ADDR", "not-an-addr");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBindAddr(_, _)));
        std::env::remove_var("HTTP_BIND_ADDR");
    }
}
