use transflow_core::request_identifier::{IdentifierSettings, DEFAULT_IDENTIFIER_CODE};

/// Default size of the connection pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Admin tool configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub identifiers: IdentifierSettings,
}

impl AdminConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `DATABASE_URL`               | required |
    /// | `DB_MAX_CONNECTIONS`         | `5`     |
    /// | `VENDOR_IDENTIFIER_CODE`     | `WEB`   |
    /// | `VENDOR_IDENTIFIER_SEQUENCE` | unset   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = non_blank("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let max_connections = match non_blank("DB_MAX_CONNECTIONS") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "DB_MAX_CONNECTIONS",
                        expected: "a positive integer",
                        value,
                    })
                }
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let identifiers = IdentifierSettings {
            code: non_blank("VENDOR_IDENTIFIER_CODE")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| DEFAULT_IDENTIFIER_CODE.to_string()),
            sequence: non_blank("VENDOR_IDENTIFIER_SEQUENCE").map(|v| v.trim().to_string()),
        };

        Ok(Self {
            database_url,
            max_connections,
            identifiers,
        })
    }
}
