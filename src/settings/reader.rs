use std::sync::Arc;

use crate::error::SyrxDbError;

use super::{CommandSetting, CommanderSettings};

/// Resolves the command setting for a caller type and method.
pub trait SettingsReader: Send + Sync {
    /// # Errors
    /// Returns `SyrxDbError::ConfigError` when no command is registered for the key.
    fn command_setting(
        &self,
        namespace: &str,
        type_name: &str,
        method: &str,
    ) -> Result<&CommandSetting, SyrxDbError>;
}

/// [`SettingsReader`] backed by an in-memory [`CommanderSettings`].
#[derive(Debug, Clone)]
pub struct CommanderSettingsReader {
    settings: Arc<CommanderSettings>,
}

impl CommanderSettingsReader {
    #[must_use]
    pub fn new(settings: Arc<CommanderSettings>) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &CommanderSettings {
        &self.settings
    }
}

impl SettingsReader for CommanderSettingsReader {
    fn command_setting(
        &self,
        namespace: &str,
        type_name: &str,
        method: &str,
    ) -> Result<&CommandSetting, SyrxDbError> {
        self.settings
            .command(namespace, type_name, method)
            .ok_or_else(|| {
                let qualified = if namespace.is_empty() {
                    type_name.to_string()
                } else {
                    format!("{namespace}::{type_name}")
                };
                SyrxDbError::ConfigError(format!(
                    "no command setting for method '{method}' on type '{qualified}'"
                ))
            })
    }
}
