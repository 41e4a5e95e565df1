//! Per-scope settings stores and the scope/lock policy on top of them.

pub mod errors;
pub mod file_toml_store;
pub mod in_memory;
pub mod key_path;
pub mod scope;
pub mod store;

pub use errors::SettingError;
pub use file_toml_store::FileTomlStore;
pub use in_memory::InMemoryStore;
pub use key_path::KeyPath;
pub use paths::ConfigScope;
pub use scope::ScopeResolver;
pub use store::{LOCKED_SETTINGS_KEY, SettingsStore};
pub use toml_edit::Value;
