//! `PostgreSQL` connector for the Syrx command model.
//!
//! A [`Connector`] turns a command's connection alias into an unopened
//! connection; [`ServiceCollection::use_syrx`] wires the connector, the
//! settings and a [`DatabaseCommander`] into a small service registry.

pub mod commander;
pub mod connector;
pub mod error;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod prelude;
pub mod registration;
pub mod results;
pub mod settings;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use commander::{Commander, DatabaseCommander};
pub use connector::{ConnectionFactory, Connector, DatabaseConnection, DatabaseConnector};
pub use error::SyrxDbError;
#[cfg(feature = "postgres")]
pub use postgres::{PostgresConnection, PostgresConnector, PostgresFactory};
pub use registration::{ServiceCollection, ServiceLifetime, ServiceProvider, ServiceScope, SyrxBuilder};
pub use results::{CustomDbRow, ResultSet};
pub use settings::{CommandSetting, CommanderSettings, CommanderSettingsBuilder};
pub use types::{ConnectionState, DatabaseType, RowValues};
