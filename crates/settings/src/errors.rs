use paths::ConfigScope;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml error: {0}")]
    TomlEdit(#[from] toml_edit::TomlError),

    /// Write attempted against a store that reported `is_writable() == false`.
    #[error("{0} settings are read-only")]
    StoreReadOnly(ConfigScope),

    /// Neither store can be written; nothing may be loaded or shown.
    #[error("no settings exist and settings are not writable (system: {system}, user: {user})")]
    Unavailable { system: String, user: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),
}
