//! Scope-aware configuration directories and TLS certificate path resolution.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application identifier used for directory and file names.
pub const APP_ID: &str = "tether";

/// Subdirectory (below a scope's config dir) holding TLS material.
/// Installers create this directory too, so the name must not change.
pub const SSL_DIR: &str = "SSL";

/// File name of the certificate when no custom path is configured.
pub const DEFAULT_CERT_FILE: &str = "tether.pem";

/// Which configuration store is being read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigScope {
    /// Machine-wide settings, usually administered by root / an admin.
    System,
    /// Settings of the current user.
    User,
}

impl ConfigScope {
    pub fn is_system(self) -> bool {
        matches!(self, ConfigScope::System)
    }

    pub fn from_system_flag(is_system: bool) -> Self {
        if is_system {
            ConfigScope::System
        } else {
            ConfigScope::User
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigScope::System => f.write_str("system"),
            ConfigScope::User => f.write_str("user"),
        }
    }
}

/// Config directories for both scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDirs {
    system: Arc<Path>,
    user: Arc<Path>,
}

impl ScopeDirs {
    /// Platform defaults: `/etc/<app>` (unix) or `%ProgramData%\<app>` (Windows)
    /// for the system scope, `dirs::config_dir()/<app>` for the user scope.
    pub fn platform() -> Self {
        let user = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_ID);
        Self {
            system: system_config_root().join(APP_ID).into(),
            user: user.into(),
        }
    }

    /// Explicit directories (tests, packaging, portable installs).
    pub fn new(system: impl Into<PathBuf>, user: impl Into<PathBuf>) -> Self {
        Self {
            system: system.into().into(),
            user: user.into().into(),
        }
    }

    /// Both scopes below one base directory: `<base>/system` and `<base>/user`.
    pub fn with_base_path(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self::new(base.join("system"), base.join("user"))
    }

    pub fn system_dir(&self) -> &Path {
        &self.system
    }

    pub fn user_dir(&self) -> &Path {
        &self.user
    }

    pub fn config_dir(&self, scope: ConfigScope) -> &Path {
        match scope {
            ConfigScope::System => &self.system,
            ConfigScope::User => &self.user,
        }
    }

    /// Settings file of a scope: `<scope-dir>/<app>.toml`
    pub fn settings_file(&self, scope: ConfigScope) -> PathBuf {
        self.config_dir(scope).join(format!("{APP_ID}.toml"))
    }

    /// TLS directory of a scope: `<scope-dir>/SSL`
    pub fn tls_dir(&self, scope: ConfigScope) -> PathBuf {
        self.config_dir(scope).join(SSL_DIR)
    }

    /// Resolves the certificate location.
    ///
    /// A non-empty `custom_path` is returned verbatim; otherwise the default
    /// `<scope-dir>/SSL/<default-cert>` is used. Never touches the filesystem.
    pub fn tls_file_path(&self, custom_path: &str, is_system_scope: bool) -> PathBuf {
        if !custom_path.is_empty() {
            return PathBuf::from(custom_path);
        }
        self.tls_dir(ConfigScope::from_system_flag(is_system_scope))
            .join(DEFAULT_CERT_FILE)
    }
}

impl Default for ScopeDirs {
    fn default() -> Self {
        Self::platform()
    }
}

#[cfg(windows)]
fn system_config_root() -> PathBuf {
    std::env::var_os("ProgramData")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"))
}

#[cfg(not(windows))]
fn system_config_root() -> PathBuf {
    PathBuf::from("/etc")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_dirs_structure() {
        let dirs = ScopeDirs::with_base_path("/test/base");

        assert_eq!(dirs.system_dir(), Path::new("/test/base/system"));
        assert_eq!(dirs.user_dir(), Path::new("/test/base/user"));
        assert_eq!(
            dirs.settings_file(ConfigScope::User),
            PathBuf::from("/test/base/user/tether.toml")
        );
    }

    #[test]
    fn test_default_cert_path_per_scope() {
        let dirs = ScopeDirs::new("/etc/app", "/home/me/.config/app");

        assert_eq!(
            dirs.tls_file_path("", true),
            PathBuf::from("/etc/app/SSL/tether.pem")
        );
        assert_eq!(
            dirs.tls_file_path("", false),
            PathBuf::from("/home/me/.config/app/SSL/tether.pem")
        );
    }

    #[test]
    fn test_custom_path_wins() {
        let dirs = ScopeDirs::new("/etc/app", "/home/me/.config/app");

        for system in [true, false] {
            assert_eq!(
                dirs.tls_file_path("/custom/cert.pem", system),
                PathBuf::from("/custom/cert.pem")
            );
        }
        // Relative and odd paths are not normalised.
        assert_eq!(
            dirs.tls_file_path("../x//y.pem", true),
            PathBuf::from("../x//y.pem")
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let dirs = ScopeDirs::with_base_path("/base");
        let inputs = ["", "a.pem", "/abs/b.pem"];
        for input in inputs {
            for system in [true, false] {
                assert_eq!(
                    dirs.tls_file_path(input, system),
                    dirs.tls_file_path(input, system)
                );
            }
        }
    }

    #[test]
    fn test_scope_helpers() {
        assert!(ConfigScope::System.is_system());
        assert!(!ConfigScope::User.is_system());
        assert_eq!(ConfigScope::from_system_flag(true), ConfigScope::System);
        assert_eq!(ConfigScope::User.to_string(), "user");
    }
}
