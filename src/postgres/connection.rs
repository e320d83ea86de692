use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{CancelToken, Client, Config, IsolationLevel as PgIsolationLevel, NoTls};

use crate::connector::{ConnectionFactory, Connector, DatabaseConnection};
use crate::error::SyrxDbError;
use crate::results::ResultSet;
use crate::settings::{CommandSetting, CommandType, IsolationLevel};
use crate::types::{ConnectionState, DatabaseType, RowValues};

use super::connection_string::parse_connection_string;
use super::params::Params;
use super::query::build_result_set;

/// Connector bound to tokio-postgres.
pub type PostgresConnector = Connector<PostgresFactory>;

/// Driver factory for `PostgreSQL`. Zero-sized; every connector shares the same behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresFactory;

impl ConnectionFactory for PostgresFactory {
    type Connection = PostgresConnection;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn create_connection(&self, connection_string: &str) -> Result<PostgresConnection, SyrxDbError> {
        let config = parse_connection_string(connection_string)?;
        Ok(PostgresConnection::new(config))
    }
}

/// A `PostgreSQL` session. Created closed; `open` connects and spawns the driver task.
pub struct PostgresConnection {
    config: Config,
    client: Option<Client>,
    cancel: Option<CancelToken>,
    driver: Option<JoinHandle<()>>,
}

impl PostgresConnection {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: None,
            cancel: None,
            driver: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying client, when open.
    #[must_use]
    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref().filter(|client| !client.is_closed())
    }

    fn client_mut(&mut self) -> Result<&mut Client, SyrxDbError> {
        match self.client.as_mut() {
            Some(client) if !client.is_closed() => Ok(client),
            _ => Err(SyrxDbError::ConnectionError(
                "connection is not open".to_string(),
            )),
        }
    }
}

impl fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("hosts", &self.config.get_hosts())
            .field("dbname", &self.config.get_dbname())
            .field("user", &self.config.get_user())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    fn state(&self) -> ConnectionState {
        if self.client().is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    async fn open(&mut self) -> Result<(), SyrxDbError> {
        if self.state() == ConnectionState::Open {
            return Ok(());
        }
        let (client, connection) = self.config.connect(NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "postgres connection task ended with an error");
            }
        });
        self.cancel = Some(client.cancel_token());
        self.client = Some(client);
        self.driver = Some(driver);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SyrxDbError> {
        // Dropping the client lets the driver task finish on its own.
        drop(self.client.take());
        self.cancel = None;
        if let Some(driver) = self.driver.take() {
            driver.await.map_err(|e| {
                SyrxDbError::ConnectionError(format!("postgres driver task failed: {e}"))
            })?;
        }
        Ok(())
    }

    async fn execute(
        &mut self,
        setting: &CommandSetting,
        params: &[RowValues],
    ) -> Result<u64, SyrxDbError> {
        let sql = command_text(setting, params.len());
        let isolation = isolation_level(setting.options.isolation_level);
        let cancel = self.cancel.clone();
        let client = self.client_mut()?;

        with_timeout(setting, cancel, async move {
            let tx = client
                .build_transaction()
                .isolation_level(isolation)
                .start()
                .await?;
            let converted = Params::convert(params);
            let rows = tx.execute(&*sql, converted.as_refs()).await?;
            tx.commit().await?;
            Ok(rows)
        })
        .await
    }

    async fn query(
        &mut self,
        setting: &CommandSetting,
        params: &[RowValues],
    ) -> Result<ResultSet, SyrxDbError> {
        let sql = command_text(setting, params.len());
        let cancel = self.cancel.clone();
        let client = self.client_mut()?;

        with_timeout(setting, cancel, async move {
            let stmt = client.prepare(&*sql).await?;
            let converted = Params::convert(params);
            let rows = client.query(&stmt, converted.as_refs()).await?;
            build_result_set(&stmt, &rows)
        })
        .await
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), SyrxDbError> {
        let client = self.client_mut()?;
        let tx = client.transaction().await?;
        tx.batch_execute(sql).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// SQL to send for a setting. Stored procedures are invoked with `CALL`.
fn command_text(setting: &CommandSetting, param_count: usize) -> Cow<'_, str> {
    match setting.options.command_type {
        CommandType::Text => Cow::Borrowed(setting.command_text.as_str()),
        CommandType::StoredProcedure => {
            let placeholders: Vec<String> = (1..=param_count).map(|i| format!("${i}")).collect();
            Cow::Owned(format!(
                "CALL {}({})",
                setting.command_text.trim(),
                placeholders.join(", ")
            ))
        }
    }
}

fn isolation_level(level: IsolationLevel) -> PgIsolationLevel {
    match level {
        IsolationLevel::ReadUncommitted => PgIsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted => PgIsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead => PgIsolationLevel::RepeatableRead,
        IsolationLevel::Serializable => PgIsolationLevel::Serializable,
    }
}

/// Bound `fut` by the setting's command timeout; 0 means no limit.
///
/// On expiry the statement is cancelled on the server as well, so the session
/// is free again and any transaction it held is rolled back.
async fn with_timeout<T, F>(
    setting: &CommandSetting,
    cancel: Option<CancelToken>,
    fut: F,
) -> Result<T, SyrxDbError>
where
    F: Future<Output = Result<T, SyrxDbError>>,
{
    let seconds = setting.options.command_timeout;
    if seconds == 0 {
        return fut.await;
    }
    match tokio::time::timeout(Duration::from_secs(u64::from(seconds)), fut).await {
        Ok(result) => result,
        Err(_) => {
            if let Some(cancel) = cancel {
                if let Err(e) = cancel.cancel_query(NoTls).await {
                    tracing::warn!(error = %e, "failed to cancel timed-out statement");
                }
            }
            Err(SyrxDbError::Timeout(format!(
                "command did not complete within {seconds}s"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::connector::DatabaseConnector;
    use crate::settings::CommanderSettingsBuilder;

    fn connector() -> PostgresConnector {
        let settings = CommanderSettingsBuilder::build(|b| {
            b.add_connection_string(
                "test-alias",
                "Host=localhost;Database=syrx;Username=syrx_user;Password=YourStrong!Passw0rd",
            )
            .add_connection_string("broken", "Host=localhost;Colour=blue")
        })
        .unwrap();
        Connector::new(Arc::new(settings), PostgresFactory)
    }

    #[test]
    fn returns_closed_connection_without_io() {
        let connector = connector();
        let setting = CommandSetting::new("select 1", "test-alias").unwrap();

        let connection = connector.create_connection(&setting).unwrap();

        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(connection.database_type(), DatabaseType::Postgres);
        assert_eq!(connector.database_type(), DatabaseType::Postgres);
    }

    #[test]
    fn connections_are_independent_but_share_configuration() {
        let connector = connector();
        let setting = CommandSetting::new("select 1", "test-alias").unwrap();

        let first = connector.new_connection(&setting).unwrap();
        let second = connector.new_connection(&setting).unwrap();

        assert_eq!(first.config().get_dbname(), second.config().get_dbname());
        assert_eq!(first.config().get_user(), Some("syrx_user"));
        assert!(first.client().is_none() && second.client().is_none());
    }

    #[test]
    fn missing_alias_is_a_config_error() {
        let setting = CommandSetting::new("select 1", "missing").unwrap();
        let err = connector().create_connection(&setting).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn malformed_connection_string_is_a_driver_error() {
        let setting = CommandSetting::new("select 1", "broken").unwrap();
        let err = connector().create_connection(&setting).unwrap_err();
        assert!(matches!(err, SyrxDbError::DriverError(_)));
    }

    #[test]
    fn debug_output_hides_password() {
        let setting = CommandSetting::new("select 1", "test-alias").unwrap();
        let connection = connector().new_connection(&setting).unwrap();
        assert!(!format!("{connection:?}").contains("Passw0rd"));
    }

    #[test]
    fn commands_on_closed_connection_fail() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let setting = CommandSetting::new("select 1", "test-alias").unwrap();
            let mut connection = connector().new_connection(&setting).unwrap();

            let err = connection.execute(&setting, &[]).await.unwrap_err();
            assert!(matches!(err, SyrxDbError::ConnectionError(_)));
            let err = connection.query(&setting, &[]).await.unwrap_err();
            assert!(matches!(err, SyrxDbError::ConnectionError(_)));
            let err = connection.execute_batch("select 1").await.unwrap_err();
            assert!(matches!(err, SyrxDbError::ConnectionError(_)));

            // closing a never-opened handle is a no-op
            connection.close().await.unwrap();
            assert_eq!(connection.state(), ConnectionState::Closed);
        });
    }

    #[test]
    fn stored_procedures_are_called() {
        let mut setting = CommandSetting::new(" archive_users ", "test-alias").unwrap();
        setting.options.command_type = CommandType::StoredProcedure;
        assert_eq!(command_text(&setting, 2), "CALL archive_users($1, $2)");
        assert_eq!(command_text(&setting, 0), "CALL archive_users()");

        setting.options.command_type = CommandType::Text;
        assert!(matches!(command_text(&setting, 2), Cow::Borrowed(_)));
    }
}
