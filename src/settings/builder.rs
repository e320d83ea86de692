use std::collections::HashMap;

use crate::error::SyrxDbError;

use super::{
    CommandOptions, CommandSetting, CommandType, CommanderSettings, ConnectionStringSetting,
    IsolationLevel, NamespaceSetting, TypeSetting, type_key,
};

/// Fluent builder for [`CommanderSettings`].
///
/// ```rust
/// use syrx_postgres::settings::CommanderSettingsBuilder;
///
/// struct UserRepository;
///
/// let settings = CommanderSettingsBuilder::build(|b| {
///     b.add_connection_string("primary", "Host=localhost;Database=syrx")
///         .add_command(|c| {
///             c.for_type::<UserRepository>(|t| {
///                 t.for_method("all", |m| {
///                     m.use_command_text("select * from users")
///                         .use_connection_alias("primary")
///                 })
///             })
///         })
/// })
/// .unwrap();
/// assert_eq!(settings.connection_string("primary"), Some("Host=localhost;Database=syrx"));
/// ```
#[derive(Debug, Default)]
#[must_use]
pub struct CommanderSettingsBuilder {
    connections: Vec<ConnectionStringSetting>,
    commands: CommandsBuilder,
}

impl CommanderSettingsBuilder {
    /// Run `configure` against an empty builder and finish it.
    ///
    /// # Errors
    /// Returns `SyrxDbError::ConfigError` if any command is incomplete or a key
    /// or alias is duplicated.
    pub fn build(
        configure: impl FnOnce(CommanderSettingsBuilder) -> CommanderSettingsBuilder,
    ) -> Result<CommanderSettings, SyrxDbError> {
        configure(CommanderSettingsBuilder::default()).finish()
    }

    pub fn add_connection_string(
        mut self,
        alias: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        self.connections.push(ConnectionStringSetting {
            alias: alias.into(),
            connection_string: connection_string.into(),
        });
        self
    }

    pub fn add_command(mut self, configure: impl FnOnce(CommandsBuilder) -> CommandsBuilder) -> Self {
        self.commands = configure(self.commands);
        self
    }

    /// # Errors
    /// See [`CommanderSettingsBuilder::build`].
    pub fn finish(self) -> Result<CommanderSettings, SyrxDbError> {
        let namespaces = self.commands.into_namespaces()?;
        CommanderSettings::new(namespaces, self.connections)
    }
}

/// Collects commands for any number of types.
#[derive(Debug, Default)]
#[must_use]
pub struct CommandsBuilder {
    types: Vec<TypeSettingBuilder>,
}

impl CommandsBuilder {
    /// Register commands for `T`, keyed by its module path and type name.
    pub fn for_type<T: ?Sized>(
        self,
        configure: impl FnOnce(TypeSettingBuilder) -> TypeSettingBuilder,
    ) -> Self {
        let (namespace, name) = type_key::<T>();
        self.for_type_name(namespace, name, configure)
    }

    /// Register commands under an explicit namespace and type name.
    pub fn for_type_name(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        configure: impl FnOnce(TypeSettingBuilder) -> TypeSettingBuilder,
    ) -> Self {
        let builder = TypeSettingBuilder {
            namespace: namespace.into(),
            name: name.into(),
            methods: Vec::new(),
        };
        self.types.push(configure(builder));
        self
    }

    fn into_namespaces(self) -> Result<Vec<NamespaceSetting>, SyrxDbError> {
        let mut namespaces: Vec<NamespaceSetting> = Vec::new();
        for type_builder in self.types {
            let namespace_idx = match namespaces
                .iter()
                .position(|ns| ns.namespace == type_builder.namespace)
            {
                Some(idx) => idx,
                None => {
                    namespaces.push(NamespaceSetting {
                        namespace: type_builder.namespace.clone(),
                        types: Vec::new(),
                    });
                    namespaces.len() - 1
                }
            };
            let types = &mut namespaces[namespace_idx].types;
            let type_idx = match types.iter().position(|t| t.name == type_builder.name) {
                Some(idx) => idx,
                None => {
                    types.push(TypeSetting {
                        name: type_builder.name.clone(),
                        commands: HashMap::new(),
                    });
                    types.len() - 1
                }
            };

            for (method, command) in type_builder.methods {
                let setting = command.finish().map_err(|e| {
                    SyrxDbError::ConfigError(format!(
                        "{}.{}.{method}: {e}",
                        type_builder.namespace, type_builder.name
                    ))
                })?;
                if types[type_idx]
                    .commands
                    .insert(method.clone(), setting)
                    .is_some()
                {
                    return Err(SyrxDbError::ConfigError(format!(
                        "duplicate command '{}.{}.{method}'",
                        type_builder.namespace, type_builder.name
                    )));
                }
            }
        }
        Ok(namespaces)
    }
}

/// Commands for a single type.
#[derive(Debug)]
#[must_use]
pub struct TypeSettingBuilder {
    namespace: String,
    name: String,
    methods: Vec<(String, CommandSettingBuilder)>,
}

impl TypeSettingBuilder {
    pub fn for_method(
        mut self,
        method: impl Into<String>,
        configure: impl FnOnce(CommandSettingBuilder) -> CommandSettingBuilder,
    ) -> Self {
        self.methods
            .push((method.into(), configure(CommandSettingBuilder::default())));
        self
    }
}

#[derive(Debug, Default)]
#[must_use]
pub struct CommandSettingBuilder {
    command_text: Option<String>,
    connection_alias: Option<String>,
    options: CommandOptions,
}

impl CommandSettingBuilder {
    pub fn use_command_text(mut self, command_text: impl Into<String>) -> Self {
        self.command_text = Some(command_text.into());
        self
    }

    pub fn use_connection_alias(mut self, alias: impl Into<String>) -> Self {
        self.connection_alias = Some(alias.into());
        self
    }

    /// Seconds; 0 disables the limit.
    pub fn use_command_timeout(mut self, seconds: u32) -> Self {
        self.options.command_timeout = seconds;
        self
    }

    pub fn use_command_type(mut self, command_type: CommandType) -> Self {
        self.options.command_type = command_type;
        self
    }

    pub fn use_isolation_level(mut self, isolation_level: IsolationLevel) -> Self {
        self.options.isolation_level = isolation_level;
        self
    }

    pub fn split_on(mut self, columns: impl Into<String>) -> Self {
        self.options.split_on = Some(columns.into());
        self
    }

    fn finish(self) -> Result<CommandSetting, SyrxDbError> {
        let command_text = self.command_text.ok_or_else(|| {
            SyrxDbError::ConfigError("command text is required".to_string())
        })?;
        let connection_alias = self.connection_alias.ok_or_else(|| {
            SyrxDbError::ConfigError("connection alias is required".to_string())
        })?;
        Ok(CommandSetting::new(command_text, connection_alias)?.with_options(self.options))
    }
}
