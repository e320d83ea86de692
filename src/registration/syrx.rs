use std::sync::Arc;

use crate::commander::{Commander, DatabaseCommander};
use crate::connector::DatabaseConnector;
use crate::error::SyrxDbError;
use crate::settings::{CommanderSettings, CommanderSettingsReader, SettingsReader};

use super::services::{ServiceCollection, ServiceLifetime, ServiceScope};

/// Entry point handed to [`ServiceCollection::use_syrx`]; engine crates add
/// their `use_*` methods to it.
#[derive(Debug, Default)]
#[must_use]
pub struct SyrxBuilder {
    services: ServiceCollection,
}

impl SyrxBuilder {
    pub fn services(&mut self) -> &mut ServiceCollection {
        &mut self.services
    }
}

impl ServiceCollection {
    /// Configure Syrx services on this collection.
    ///
    /// ```rust
    /// use syrx_postgres::prelude::*;
    ///
    /// let provider = ServiceCollection::new()
    ///     .use_syrx(|syrx| {
    ///         syrx.use_postgres(|b| b.add_connection_string("primary", "Host=localhost;Database=syrx"))
    ///     })
    ///     .build_service_provider();
    /// let connector = provider.get::<dyn DatabaseConnector>().unwrap();
    /// assert_eq!(connector.database_type(), DatabaseType::Postgres);
    /// ```
    pub fn use_syrx(&mut self, configure: impl FnOnce(SyrxBuilder) -> SyrxBuilder) -> &mut Self {
        let builder = SyrxBuilder {
            services: std::mem::take(self),
        };
        *self = configure(builder).services;
        self
    }

    /// Register settings as a singleton, replacing earlier settings.
    ///
    /// A failed build is registered too; resolving it returns the build error
    /// so that registration itself never fails.
    pub fn add_commander_settings(
        &mut self,
        settings: Result<CommanderSettings, SyrxDbError>,
    ) -> &mut Self {
        match settings {
            Ok(settings) => {
                tracing::info!(
                    connections = settings.connections().len(),
                    commands = settings.commands().count(),
                    "registered commander settings"
                );
                self.add_instance(Arc::new(settings))
            }
            Err(e) => {
                let message = match e {
                    SyrxDbError::ConfigError(message) => message,
                    other => other.to_string(),
                };
                tracing::warn!(error = %message, "commander settings failed to build");
                self.add::<CommanderSettings, _>(ServiceLifetime::Singleton, move |_| {
                    Err(SyrxDbError::ConfigError(message.clone()))
                })
            }
        }
    }

    pub fn add_reader(&mut self, lifetime: ServiceLifetime) -> &mut Self {
        self.try_add::<dyn SettingsReader, _>(lifetime, |scope| {
            let settings = scope.get::<CommanderSettings>()?;
            Ok(Arc::new(CommanderSettingsReader::new(settings)) as Arc<dyn SettingsReader>)
        })
    }

    pub fn add_database_commander(&mut self, lifetime: ServiceLifetime) -> &mut Self {
        self.try_add::<DatabaseCommander, _>(lifetime, |scope| {
            let reader = scope.get::<dyn SettingsReader>()?;
            let connector = scope.get::<dyn DatabaseConnector>()?;
            Ok(Arc::new(DatabaseCommander::new(reader, connector)))
        })
    }
}

impl ServiceScope {
    /// Resolve the commander bound to caller type `T`.
    ///
    /// # Errors
    /// Returns the error raised while resolving [`DatabaseCommander`] or its dependencies.
    pub fn commander<T: ?Sized>(&self) -> Result<Commander<T>, SyrxDbError> {
        Ok(self.get::<DatabaseCommander>()?.commander::<T>())
    }
}
