//! Ledger configuration.

use std::str::FromStr;

use crate::error::LedgerError;

/// Where job records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerBackend {
    #[default]
    Redis,
    Memory,
}

impl FromStr for LedgerBackend {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(LedgerBackend::Redis),
            "memory" => Ok(LedgerBackend::Memory),
            other => Err(LedgerError::config(format!("unknown ledger backend '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    /// Redis connection URL
    pub redis_url: String,
    /// Prefix for every key the ledger writes
    pub key_prefix: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "reel".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, LedgerError> {
        let backend = match std::env::var("LEDGER_BACKEND") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => LedgerBackend::Redis,
        };
        Ok(Self {
            backend,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("LEDGER_KEY_PREFIX").unwrap_or_else(|_| "reel".to_string()),
        })
    }

    pub fn memory() -> Self {
        Self {
            backend: LedgerBackend::Memory,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("redis".parse::<LedgerBackend>().unwrap(), LedgerBackend::Redis);
        assert_eq!(" Memory ".parse::<LedgerBackend>().unwrap(), LedgerBackend::Memory);
        assert!("postgres".parse::<LedgerBackend>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.backend, LedgerBackend::Redis);
        assert_eq!(config.key_prefix, "reel");
        assert_eq!(LedgerConfig::memory().backend, LedgerBackend::Memory);
    }
}
