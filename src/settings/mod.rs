//! Command and connection settings.
//!
//! `CommanderSettings` is built once (from JSON or through
//! [`CommanderSettingsBuilder`]) and is read-only afterwards. Connectors and
//! readers hold it behind an `Arc` and never lock it.

pub mod builder;
pub mod reader;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SyrxDbError;

pub use builder::{
    CommandSettingBuilder, CommanderSettingsBuilder, CommandsBuilder, TypeSettingBuilder,
};
pub use reader::{CommanderSettingsReader, SettingsReader};

const DEFAULT_COMMAND_TIMEOUT_SECS: u32 = 30;

/// How the command text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommandType {
    /// Plain SQL.
    #[default]
    Text,
    /// The command text names a routine that is invoked with `CALL`.
    StoredProcedure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Per-command options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommandOptions {
    /// Seconds; 0 disables the limit.
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u32,
    #[serde(default)]
    pub command_type: CommandType,
    #[serde(default)]
    pub isolation_level: IsolationLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_on: Option<String>,
}

fn default_command_timeout() -> u32 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT_SECS,
            command_type: CommandType::Text,
            isolation_level: IsolationLevel::ReadCommitted,
            split_on: None,
        }
    }
}

/// A stored command: SQL text, the alias of the connection it runs on, and options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommandSetting {
    pub command_text: String,
    pub connection_alias: String,
    #[serde(flatten)]
    pub options: CommandOptions,
}

impl CommandSetting {
    /// # Errors
    /// Returns `SyrxDbError::ConfigError` if the command text or alias is empty.
    pub fn new(
        command_text: impl Into<String>,
        connection_alias: impl Into<String>,
    ) -> Result<Self, SyrxDbError> {
        let setting = Self {
            command_text: command_text.into(),
            connection_alias: connection_alias.into(),
            options: CommandOptions::default(),
        };
        setting.validate()?;
        Ok(setting)
    }

    #[must_use]
    pub fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    fn validate(&self) -> Result<(), SyrxDbError> {
        if self.command_text.trim().is_empty() {
            return Err(SyrxDbError::ConfigError(
                "command text is required".to_string(),
            ));
        }
        if self.connection_alias.is_empty() {
            return Err(SyrxDbError::ConfigError(
                "connection alias is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectionStringSetting {
    pub alias: String,
    pub connection_string: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TypeSetting {
    pub name: String,
    #[serde(default)]
    pub commands: HashMap<String, CommandSetting>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NamespaceSetting {
    pub namespace: String,
    #[serde(default)]
    pub types: Vec<TypeSetting>,
}

/// Settings document as it appears on disk, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCommanderSettings {
    #[serde(default)]
    namespaces: Vec<NamespaceSetting>,
    #[serde(default)]
    connections: Vec<ConnectionStringSetting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CommandKey {
    namespace: String,
    type_name: String,
    method: String,
}

/// Immutable lookup of command settings and connection strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawCommanderSettings", into = "RawCommanderSettings")]
pub struct CommanderSettings {
    namespaces: Vec<NamespaceSetting>,
    connections: Vec<ConnectionStringSetting>,
    commands: HashMap<CommandKey, CommandSetting>,
    aliases: HashMap<String, String>,
}

impl TryFrom<RawCommanderSettings> for CommanderSettings {
    type Error = SyrxDbError;

    fn try_from(raw: RawCommanderSettings) -> Result<Self, Self::Error> {
        Self::new(raw.namespaces, raw.connections)
    }
}

impl From<CommanderSettings> for RawCommanderSettings {
    fn from(settings: CommanderSettings) -> Self {
        RawCommanderSettings {
            namespaces: settings.namespaces,
            connections: settings.connections,
        }
    }
}

impl CommanderSettings {
    /// Build and index settings.
    ///
    /// # Errors
    /// Returns `SyrxDbError::ConfigError` for empty names, empty aliases, empty
    /// command text, duplicate command keys or duplicate aliases.
    pub fn new(
        namespaces: Vec<NamespaceSetting>,
        connections: Vec<ConnectionStringSetting>,
    ) -> Result<Self, SyrxDbError> {
        let mut aliases = HashMap::with_capacity(connections.len());
        for connection in &connections {
            if connection.alias.is_empty() {
                return Err(SyrxDbError::ConfigError(
                    "connection alias is required".to_string(),
                ));
            }
            if aliases
                .insert(connection.alias.clone(), connection.connection_string.clone())
                .is_some()
            {
                return Err(SyrxDbError::ConfigError(format!(
                    "duplicate connection alias '{}'",
                    connection.alias
                )));
            }
        }

        let mut commands = HashMap::new();
        for namespace in &namespaces {
            for type_setting in &namespace.types {
                if type_setting.name.is_empty() {
                    return Err(SyrxDbError::ConfigError(format!(
                        "type name is required in namespace '{}'",
                        namespace.namespace
                    )));
                }
                for (method, setting) in &type_setting.commands {
                    if method.is_empty() {
                        return Err(SyrxDbError::ConfigError(format!(
                            "method name is required on type '{}'",
                            type_setting.name
                        )));
                    }
                    setting.validate().map_err(|e| {
                        SyrxDbError::ConfigError(format!(
                            "{}.{}.{method}: {e}",
                            namespace.namespace, type_setting.name
                        ))
                    })?;
                    let key = CommandKey {
                        namespace: namespace.namespace.clone(),
                        type_name: type_setting.name.clone(),
                        method: method.clone(),
                    };
                    if commands.insert(key, setting.clone()).is_some() {
                        return Err(SyrxDbError::ConfigError(format!(
                            "duplicate command '{}.{}.{method}'",
                            namespace.namespace, type_setting.name
                        )));
                    }
                }
            }
        }

        Ok(Self {
            namespaces,
            connections,
            commands,
            aliases,
        })
    }

    /// Parse a JSON settings document.
    ///
    /// # Errors
    /// Returns `SyrxDbError::ConfigError` when the document does not parse or
    /// fails validation.
    pub fn from_json_str(json: &str) -> Result<Self, SyrxDbError> {
        serde_json::from_str(json)
            .map_err(|e| SyrxDbError::ConfigError(format!("invalid settings document: {e}")))
    }

    /// Read and parse a JSON settings file.
    ///
    /// # Errors
    /// Returns `SyrxDbError::Io` if the file cannot be read, otherwise as
    /// [`CommanderSettings::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SyrxDbError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Look up the connection string for an alias. Exact, case-sensitive match.
    #[must_use]
    pub fn connection_string(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    #[must_use]
    pub fn command(&self, namespace: &str, type_name: &str, method: &str) -> Option<&CommandSetting> {
        self.commands.get(&CommandKey {
            namespace: namespace.to_string(),
            type_name: type_name.to_string(),
            method: method.to_string(),
        })
    }

    #[must_use]
    pub fn namespaces(&self) -> &[NamespaceSetting] {
        &self.namespaces
    }

    #[must_use]
    pub fn connections(&self) -> &[ConnectionStringSetting] {
        &self.connections
    }

    /// Iterate every command as `(namespace, type_name, method, setting)`.
    pub fn commands(&self) -> impl Iterator<Item = (&str, &str, &str, &CommandSetting)> {
        self.commands.iter().map(|(key, setting)| {
            (
                key.namespace.as_str(),
                key.type_name.as_str(),
                key.method.as_str(),
                setting,
            )
        })
    }

    /// Aliases referenced by commands that have no connection string.
    ///
    /// Connectors only check aliases on use; call this to fail early at startup.
    #[must_use]
    pub fn unresolved_aliases(&self) -> Vec<&str> {
        let mut missing: Vec<&str> = self
            .commands
            .values()
            .map(|setting| setting.connection_alias.as_str())
            .filter(|alias| !self.aliases.contains_key(*alias))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }
}

/// Split `T`'s type path into the `(namespace, type name)` pair used as a settings key.
///
/// Generic arguments are ignored: `app::repo::Users<u8>` maps to `("app::repo", "Users")`.
#[must_use]
pub fn type_key<T: ?Sized>() -> (&'static str, &'static str) {
    split_type_path(std::any::type_name::<T>())
}

pub(crate) fn split_type_path(path: &str) -> (&str, &str) {
    let base = path.split_once('<').map_or(path, |(base, _)| base);
    base.rsplit_once("::").unwrap_or(("", base))
}
