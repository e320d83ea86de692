use thiserror::Error;

#[cfg(feature = "postgres")]
use tokio_postgres;

#[derive(Debug, Error)]
pub enum SyrxDbError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Missing alias, missing command setting, or malformed settings.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The driver rejected the connection string.
    #[error("Driver error: {0}")]
    DriverError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl SyrxDbError {
    /// True for errors raised by alias or settings resolution.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }
}
