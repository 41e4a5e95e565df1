//! Application configuration: the field catalogue, the snapshot type and the
//! facade that merges the system and user scopes.

pub mod errors;
pub mod facade;
pub mod field;
pub mod model;
pub mod startup;
pub mod validate;

pub use errors::ConfigError;
pub use facade::{ConfigurationFacade, SCOPE_PREFERENCE_KEY, ScopeLabel};
pub use field::{ElevateMode, Field, FieldKind, FieldValue, LogLevel};
pub use model::{AppConfiguration, ConfigValues, DEFAULT_PORT};
pub use startup::StartupOptions;
pub use validate::{validate, validate_screen_name};

use paths::ScopeDirs;
use settings::{ConfigScope, FileTomlStore};

/// Open the TOML stores of both scopes below `dirs`.
///
/// The system store is opened writable when the filesystem allows it; the
/// facade decides per field what may actually be written.
pub fn open_file_stores(dirs: &ScopeDirs) -> Result<(FileTomlStore, FileTomlStore), ConfigError> {
    let system = FileTomlStore::open(
        dirs.settings_file(ConfigScope::System),
        ConfigScope::System,
        true,
    )?;
    let user = FileTomlStore::open(dirs.settings_file(ConfigScope::User), ConfigScope::User, true)?;
    Ok((system, user))
}
