//! Minimal command executor.
//!
//! Resolves the setting for a caller type and method, asks the connector for a
//! connection, opens it, runs the command and closes it again.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::connector::{DatabaseConnection, DatabaseConnector};
use crate::error::SyrxDbError;
use crate::results::ResultSet;
use crate::settings::{CommandSetting, SettingsReader, type_key};
use crate::types::RowValues;

/// Runs commands on behalf of any caller type.
#[derive(Clone)]
pub struct DatabaseCommander {
    reader: Arc<dyn SettingsReader>,
    connector: Arc<dyn DatabaseConnector>,
}

impl DatabaseCommander {
    #[must_use]
    pub fn new(reader: Arc<dyn SettingsReader>, connector: Arc<dyn DatabaseConnector>) -> Self {
        Self { reader, connector }
    }

    #[must_use]
    pub fn connector(&self) -> &Arc<dyn DatabaseConnector> {
        &self.connector
    }

    /// Bind this commander to the caller type `T`.
    #[must_use]
    pub fn commander<T: ?Sized>(&self) -> Commander<T> {
        Commander {
            inner: self.clone(),
            _caller: PhantomData,
        }
    }

    /// # Errors
    /// Returns `SyrxDbError::ConfigError` if no command is registered for the key.
    pub fn resolve(
        &self,
        namespace: &str,
        type_name: &str,
        method: &str,
    ) -> Result<CommandSetting, SyrxDbError> {
        self.reader
            .command_setting(namespace, type_name, method)
            .cloned()
    }

    async fn open(&self, setting: &CommandSetting) -> Result<Box<dyn DatabaseConnection>, SyrxDbError> {
        let mut connection = self.connector.create_connection(setting)?;
        connection.open().await?;
        Ok(connection)
    }

    /// Run a non-query command; returns the affected row count.
    ///
    /// # Errors
    /// Returns `SyrxDbError::ConfigError` for unknown commands or aliases, or the
    /// driver's error. The connection is closed either way; a statement error
    /// takes precedence over a close error.
    pub async fn execute(
        &self,
        setting: &CommandSetting,
        params: &[RowValues],
    ) -> Result<u64, SyrxDbError> {
        let mut connection = self.open(setting).await?;
        let result = connection.execute(setting, params).await;
        finish(result, connection.close().await)
    }

    /// # Errors
    /// As [`DatabaseCommander::execute`].
    pub async fn query(
        &self,
        setting: &CommandSetting,
        params: &[RowValues],
    ) -> Result<ResultSet, SyrxDbError> {
        let mut connection = self.open(setting).await?;
        let result = connection.query(setting, params).await;
        finish(result, connection.close().await)
    }
}

/// Combine a statement result with the outcome of closing its connection.
fn finish<T>(result: Result<T, SyrxDbError>, closed: Result<(), SyrxDbError>) -> Result<T, SyrxDbError> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            tracing::warn!(error = %close_err, "failed to close connection after a failed command");
            Err(e)
        }
    }
}

impl fmt::Debug for DatabaseCommander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCommander")
            .field("engine", &self.connector.database_type())
            .finish_non_exhaustive()
    }
}

/// A [`DatabaseCommander`] bound to the caller type `T`.
///
/// Commands are looked up under `T`'s module path and type name.
pub struct Commander<T: ?Sized> {
    inner: DatabaseCommander,
    _caller: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> Commander<T> {
    /// # Errors
    /// Returns `SyrxDbError::ConfigError` if `T` has no command named `method`.
    pub fn setting(&self, method: &str) -> Result<CommandSetting, SyrxDbError> {
        let (namespace, type_name) = type_key::<T>();
        self.inner.resolve(namespace, type_name, method)
    }

    /// # Errors
    /// See [`DatabaseCommander::execute`].
    pub async fn execute(&self, method: &str, params: &[RowValues]) -> Result<u64, SyrxDbError> {
        let setting = self.setting(method)?;
        self.inner.execute(&setting, params).await
    }

    /// # Errors
    /// See [`DatabaseCommander::query`].
    pub async fn query(&self, method: &str, params: &[RowValues]) -> Result<ResultSet, SyrxDbError> {
        let setting = self.setting(method)?;
        self.inner.query(&setting, params).await
    }
}

impl<T: ?Sized> Clone for Commander<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _caller: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Commander<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commander")
            .field("caller", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}
