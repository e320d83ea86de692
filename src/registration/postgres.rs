use std::sync::Arc;

use crate::connector::DatabaseConnector;
use crate::postgres::{PostgresConnector, PostgresFactory};
use crate::settings::{CommanderSettings, CommanderSettingsBuilder};

use super::services::{ServiceCollection, ServiceLifetime};
use super::syrx::SyrxBuilder;

impl SyrxBuilder {
    /// Register the `PostgreSQL` connector with singleton lifetime.
    pub fn use_postgres(
        self,
        configure: impl FnOnce(CommanderSettingsBuilder) -> CommanderSettingsBuilder,
    ) -> Self {
        self.use_postgres_with_lifetime(configure, ServiceLifetime::Singleton)
    }

    /// Build settings from `configure`, register them, then register the reader,
    /// the `PostgreSQL` connector and the commander under `lifetime`.
    ///
    /// Aliases are not checked here; a missing alias surfaces on first use.
    pub fn use_postgres_with_lifetime(
        mut self,
        configure: impl FnOnce(CommanderSettingsBuilder) -> CommanderSettingsBuilder,
        lifetime: ServiceLifetime,
    ) -> Self {
        let settings = CommanderSettingsBuilder::build(configure);
        self.services()
            .add_commander_settings(settings)
            .add_reader(lifetime)
            .add_postgres(lifetime)
            .add_database_commander(lifetime);
        tracing::info!(?lifetime, "registered postgres connector");
        self
    }
}

impl ServiceCollection {
    /// Register [`PostgresConnector`] as the `dyn DatabaseConnector` unless a
    /// connector is already registered.
    pub fn add_postgres(&mut self, lifetime: ServiceLifetime) -> &mut Self {
        self.try_add::<dyn DatabaseConnector, _>(lifetime, |scope| {
            let settings = scope.get::<CommanderSettings>()?;
            Ok(Arc::new(PostgresConnector::new(settings, PostgresFactory)) as Arc<dyn DatabaseConnector>)
        })
    }
}
