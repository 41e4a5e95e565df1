use crate::errors::SettingError;
use crate::key_path::KeyPath;
use paths::ConfigScope;
use std::collections::BTreeSet;
use toml_edit::Value;
use tracing::warn;

/// Top-level key holding the administrator's list of locked field names.
pub const LOCKED_SETTINGS_KEY: &str = "lockedSettings";

/// Key/value backing store for one configuration scope.
///
/// Implementations must refuse `set`/`remove`/`clear` with
/// [`SettingError::StoreReadOnly`] when `is_writable()` is false. Callers are
/// expected to check writability first; the refusal is a last line, not a
/// recovery path.
pub trait SettingsStore: Send + Sync {
    fn scope(&self) -> ConfigScope;

    fn is_writable(&self) -> bool;

    /// Whether the backing file currently exists.
    fn exists(&self) -> bool;

    /// Human readable location, shown in tooltips and diagnostics.
    fn file_identity(&self) -> String;

    /// Load (or reload) the internal representation from backing storage.
    fn load(&mut self) -> Result<(), SettingError>;

    fn get(&self, key: &KeyPath) -> Result<Option<Value>, SettingError>;

    fn set(&mut self, key: &KeyPath, value: Value) -> Result<(), SettingError>;

    fn remove(&mut self, key: &KeyPath) -> Result<(), SettingError>;

    /// Drop every key, including the locked list.
    fn clear(&mut self) -> Result<(), SettingError>;

    /// Persist the loaded representation to the backing store.
    fn persist(&self) -> Result<(), SettingError>;

    /// A store that neither exists nor can be created is unavailable.
    fn is_available(&self) -> bool {
        self.exists() || self.is_writable()
    }

    /// Field names listed under [`LOCKED_SETTINGS_KEY`].
    ///
    /// A malformed entry is logged and ignored rather than failing the whole
    /// configuration.
    fn locked_fields(&self) -> BTreeSet<String> {
        let key = KeyPath::from_slice(&[LOCKED_SETTINGS_KEY]);
        match self.get(&key) {
            Ok(Some(Value::Array(items))) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Ok(Some(Value::String(s))) => s
                .value()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Ok(Some(other)) => {
                warn!(
                    store = %self.file_identity(),
                    "ignoring malformed {LOCKED_SETTINGS_KEY}: {other}"
                );
                BTreeSet::new()
            }
            Ok(None) => BTreeSet::new(),
            Err(err) => {
                warn!(store = %self.file_identity(), "cannot read {LOCKED_SETTINGS_KEY}: {err}");
                BTreeSet::new()
            }
        }
    }
}
