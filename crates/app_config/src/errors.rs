use crate::field::Field;
use certificate::{CertificateError, InspectError};
use settings::{ConfigScope, SettingError};

/// Errors surfaced by the configuration facade.
///
/// `Unavailable` is the only fatal one; everything else leaves the loaded
/// configuration usable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "configuration unavailable: neither the system settings ({system}) nor the user settings ({user}) can be written"
    )]
    Unavailable { system: String, user: String },

    #[error("invalid {field}: {message}")]
    Validation { field: Field, message: String },

    /// Lock conflicts and read-only stores are refused alike.
    #[error("{field} is locked by the administrator")]
    FieldLocked { field: Field },

    #[error("{field} cannot be changed: {scope} settings are read-only")]
    ReadOnly { field: Field, scope: ConfigScope },

    #[error("configuration has not been loaded")]
    NotLoaded,

    #[error("before-sync hook failed: {0}")]
    Hook(String),

    #[error(transparent)]
    Settings(SettingError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Inspect(#[from] InspectError),
}

impl ConfigError {
    /// Startup must halt on this one.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConfigError::Unavailable { .. })
    }

    pub fn is_write_refused(&self) -> bool {
        matches!(
            self,
            ConfigError::FieldLocked { .. } | ConfigError::ReadOnly { .. }
        )
    }
}

impl From<SettingError> for ConfigError {
    fn from(err: SettingError) -> Self {
        match err {
            SettingError::Unavailable { system, user } => ConfigError::Unavailable { system, user },
            other => ConfigError::Settings(other),
        }
    }
}
