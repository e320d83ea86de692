//! Engine-agnostic connector.
//!
//! A [`Connector`] turns a [`CommandSetting`] into an unopened connection by
//! resolving its alias against the settings and handing the connection string
//! to a [`ConnectionFactory`]. Engines differ only in the factory they plug in.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SyrxDbError;
use crate::results::ResultSet;
use crate::settings::{CommandSetting, CommanderSettings};
use crate::types::{ConnectionState, DatabaseType, RowValues};

/// A database session handle.
///
/// Handles start `Closed`; `open` performs the network handshake.
#[async_trait]
pub trait DatabaseConnection: Send + fmt::Debug {
    fn state(&self) -> ConnectionState;

    fn database_type(&self) -> DatabaseType;

    /// # Errors
    /// Returns the driver's error if the server cannot be reached or rejects the login.
    async fn open(&mut self) -> Result<(), SyrxDbError>;

    /// Close the session. Closing a closed handle is a no-op.
    ///
    /// # Errors
    /// Returns an error if the driver fails while shutting the session down.
    async fn close(&mut self) -> Result<(), SyrxDbError>;

    /// Run a non-query command in a transaction and return the affected row count.
    ///
    /// # Errors
    /// Returns `SyrxDbError::ConnectionError` when the handle is not open, or the
    /// driver's error; the transaction is rolled back on failure.
    async fn execute(
        &mut self,
        setting: &CommandSetting,
        params: &[RowValues],
    ) -> Result<u64, SyrxDbError>;

    /// # Errors
    /// Returns `SyrxDbError::ConnectionError` when the handle is not open, or the driver's error.
    async fn query(
        &mut self,
        setting: &CommandSetting,
        params: &[RowValues],
    ) -> Result<ResultSet, SyrxDbError>;

    /// Run several statements in one round trip inside a transaction.
    ///
    /// # Errors
    /// Returns `SyrxDbError::ConnectionError` when the handle is not open, or the driver's error.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), SyrxDbError>;
}

/// Engine-specific driver binding.
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: DatabaseConnection + 'static;

    fn database_type(&self) -> DatabaseType;

    /// Build an unopened connection. Must not perform I/O.
    ///
    /// # Errors
    /// Returns `SyrxDbError::DriverError` if the connection string is rejected.
    fn create_connection(&self, connection_string: &str)
    -> Result<Self::Connection, SyrxDbError>;
}

/// Capability used by engine-agnostic code to obtain connections.
pub trait DatabaseConnector: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    /// # Errors
    /// Returns `SyrxDbError::ConfigError` if the setting's alias is not configured,
    /// or `SyrxDbError::DriverError` if the driver rejects the connection string.
    fn create_connection(
        &self,
        setting: &CommandSetting,
    ) -> Result<Box<dyn DatabaseConnection>, SyrxDbError>;
}

/// Resolves aliases against shared settings and delegates to a factory.
pub struct Connector<F> {
    settings: Arc<CommanderSettings>,
    factory: F,
}

impl<F: ConnectionFactory> Connector<F> {
    #[must_use]
    pub fn new(settings: Arc<CommanderSettings>, factory: F) -> Self {
        Self { settings, factory }
    }

    #[must_use]
    pub fn settings(&self) -> &Arc<CommanderSettings> {
        &self.settings
    }

    /// # Errors
    /// Returns `SyrxDbError::ConfigError` if the alias is not configured.
    pub fn resolve_connection_string(&self, alias: &str) -> Result<&str, SyrxDbError> {
        self.settings.connection_string(alias).ok_or_else(|| {
            SyrxDbError::ConfigError(format!(
                "no connection string registered for alias '{alias}'"
            ))
        })
    }

    /// Typed counterpart of [`DatabaseConnector::create_connection`].
    ///
    /// # Errors
    /// See [`DatabaseConnector::create_connection`].
    pub fn new_connection(&self, setting: &CommandSetting) -> Result<F::Connection, SyrxDbError> {
        let connection_string = self.resolve_connection_string(&setting.connection_alias)?;
        let connection = self.factory.create_connection(connection_string)?;
        tracing::debug!(
            alias = %setting.connection_alias,
            engine = ?self.factory.database_type(),
            "created connection"
        );
        Ok(connection)
    }
}

impl<F: ConnectionFactory> DatabaseConnector for Connector<F> {
    fn database_type(&self) -> DatabaseType {
        self.factory.database_type()
    }

    fn create_connection(
        &self,
        setting: &CommandSetting,
    ) -> Result<Box<dyn DatabaseConnection>, SyrxDbError> {
        let connection = self.new_connection(setting)?;
        Ok(Box::new(connection))
    }
}

impl<F: fmt::Debug> fmt::Debug for Connector<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Connection strings carry credentials; list aliases only.
        let aliases: Vec<&str> = self
            .settings
            .connections()
            .iter()
            .map(|c| c.alias.as_str())
            .collect();
        f.debug_struct("Connector")
            .field("factory", &self.factory)
            .field("aliases", &aliases)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::settings::CommanderSettingsBuilder;

    #[derive(Debug)]
    struct StubConnection {
        connection_string: String,
        state: ConnectionState,
    }

    #[async_trait]
    impl DatabaseConnection for StubConnection {
        fn state(&self) -> ConnectionState {
            self.state
        }

        fn database_type(&self) -> DatabaseType {
            DatabaseType::Postgres
        }

        async fn open(&mut self) -> Result<(), SyrxDbError> {
            self.state = ConnectionState::Open;
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SyrxDbError> {
            self.state = ConnectionState::Closed;
            Ok(())
        }

        async fn execute(&mut self, _: &CommandSetting, _: &[RowValues]) -> Result<u64, SyrxDbError> {
            Ok(0)
        }

        async fn query(&mut self, _: &CommandSetting, _: &[RowValues]) -> Result<ResultSet, SyrxDbError> {
            Ok(ResultSet::default())
        }

        async fn execute_batch(&mut self, _: &str) -> Result<(), SyrxDbError> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct CountingFactory {
        calls: AtomicUsize,
    }

    impl ConnectionFactory for Arc<CountingFactory> {
        type Connection = StubConnection;

        fn database_type(&self) -> DatabaseType {
            DatabaseType::Postgres
        }

        fn create_connection(&self, connection_string: &str) -> Result<StubConnection, SyrxDbError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if connection_string.is_empty() {
                return Err(SyrxDbError::DriverError("empty connection string".into()));
            }
            Ok(StubConnection {
                connection_string: connection_string.to_string(),
                state: ConnectionState::Closed,
            })
        }
    }

    fn settings() -> Arc<CommanderSettings> {
        let settings = CommanderSettingsBuilder::build(|b| {
            b.add_connection_string("test-alias", "Host=localhost;Database=syrx")
                .add_connection_string("blank", "")
        })
        .unwrap();
        Arc::new(settings)
    }

    #[test]
    fn resolves_alias_and_returns_closed_connection() {
        let factory = Arc::new(CountingFactory::default());
        let connector = Connector::new(settings(), Arc::clone(&factory));
        let setting = CommandSetting::new("select 1", "test-alias").unwrap();

        let first = connector.new_connection(&setting).unwrap();
        let second = connector.new_connection(&setting).unwrap();

        assert_eq!(first.state, ConnectionState::Closed);
        assert_eq!(first.connection_string, "Host=localhost;Database=syrx");
        assert_eq!(first.connection_string, second.connection_string);
        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_alias_fails_before_factory_is_called() {
        let factory = Arc::new(CountingFactory::default());
        let connector = Connector::new(settings(), Arc::clone(&factory));
        let setting = CommandSetting::new("select 1", "missing").unwrap();

        let err = connector.create_connection(&setting).unwrap_err();

        assert!(err.is_config_error());
        assert_eq!(factory.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn driver_rejection_is_surfaced() {
        let connector = Connector::new(settings(), Arc::new(CountingFactory::default()));
        let setting = CommandSetting::new("select 1", "blank").unwrap();

        let err = connector.create_connection(&setting).unwrap_err();
        assert!(matches!(err, SyrxDbError::DriverError(_)));
    }

    #[test]
    fn debug_output_omits_connection_strings() {
        let connector = Connector::new(settings(), Arc::new(CountingFactory::default()));
        let rendered = format!("{connector:?}");
        assert!(rendered.contains("test-alias"));
        assert!(!rendered.contains("Database=syrx"));
    }
}
