//! Convenient imports for common functionality.

pub use crate::commander::{Commander, DatabaseCommander};
pub use crate::connector::{ConnectionFactory, Connector, DatabaseConnection, DatabaseConnector};
pub use crate::error::SyrxDbError;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::settings::{
    CommandOptions, CommandSetting, CommandType, CommanderSettings, CommanderSettingsBuilder,
    IsolationLevel, SettingsReader,
};
pub use crate::types::{ConnectionState, DatabaseType, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresConnection, PostgresConnector, PostgresFactory};
pub use crate::registration::{
    ServiceCollection, ServiceLifetime, ServiceProvider, ServiceScope, SyrxBuilder,
};
