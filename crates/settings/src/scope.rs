//! Active scope selection and per-field writability.
//!
//! Locks are read from the system store only. A user store may carry its own
//! `lockedSettings` list, but it never has any effect: users must not be able
//! to lock (or unlock) anything for themselves.

use crate::errors::SettingError;
use crate::store::SettingsStore;
use paths::ConfigScope;
use std::collections::BTreeSet;
use tracing::debug;

/// Snapshot of scope and lock state taken from both stores.
///
/// Rebuilt whenever the stores are (re)loaded; it holds no reference to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeResolver {
    requested: ConfigScope,
    active: ConfigScope,
    system_writable: bool,
    user_writable: bool,
    locked: BTreeSet<String>,
}

impl ScopeResolver {
    /// Decide the active scope for `requested`.
    ///
    /// - System requested but not writable: forced to User.
    /// - Neither store writable: [`SettingError::Unavailable`].
    pub fn resolve(
        requested: ConfigScope,
        system: &dyn SettingsStore,
        user: &dyn SettingsStore,
    ) -> Result<Self, SettingError> {
        let system_writable = system.is_writable();
        let user_writable = user.is_writable();

        if !system_writable && !user_writable {
            return Err(SettingError::Unavailable {
                system: system.file_identity(),
                user: user.file_identity(),
            });
        }

        let active = match requested {
            ConfigScope::System if !system_writable => {
                debug!("system settings not writable, using user scope");
                ConfigScope::User
            }
            scope => scope,
        };

        Ok(Self {
            requested,
            active,
            system_writable,
            user_writable,
            locked: system.locked_fields(),
        })
    }

    pub fn active_scope(&self) -> ConfigScope {
        self.active
    }

    /// The scope the caller asked for, before availability was applied.
    pub fn requested_scope(&self) -> ConfigScope {
        self.requested
    }

    pub fn is_scope_writable(&self, scope: ConfigScope) -> bool {
        match scope {
            ConfigScope::System => self.system_writable,
            ConfigScope::User => self.user_writable,
        }
    }

    /// Whether the active store accepts writes at all.
    pub fn is_writable(&self) -> bool {
        self.is_scope_writable(self.active)
    }

    pub fn is_field_locked(&self, field: &str) -> bool {
        self.locked.contains(field)
    }

    /// Lock always overrides writability, never the reverse.
    pub fn is_field_writable(&self, field: &str) -> bool {
        self.is_writable() && !self.is_field_locked(field)
    }

    pub fn locked_fields(&self) -> &BTreeSet<String> {
        &self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;

    fn stores(system_writable: bool, user_writable: bool) -> (InMemoryStore, InMemoryStore) {
        (
            InMemoryStore::new(ConfigScope::System, system_writable),
            InMemoryStore::new(ConfigScope::User, user_writable),
        )
    }

    #[test]
    fn system_unwritable_forces_user_scope() {
        let (system, user) = stores(false, true);
        let resolver = ScopeResolver::resolve(ConfigScope::System, &system, &user).expect("resolve");

        assert_eq!(resolver.requested_scope(), ConfigScope::System);
        assert_eq!(resolver.active_scope(), ConfigScope::User);
        assert!(resolver.is_writable());
        assert!(resolver.is_field_writable("port"));
    }

    #[test]
    fn neither_writable_is_unavailable() {
        let (system, user) = stores(false, false);
        for requested in [ConfigScope::System, ConfigScope::User] {
            let err = ScopeResolver::resolve(requested, &system, &user).unwrap_err();
            assert!(matches!(err, SettingError::Unavailable { .. }));
        }
    }

    #[test]
    fn lock_overrides_writable_store() {
        let system = InMemoryStore::new(ConfigScope::System, true).with_locked(&["tlsKeyLength"]);
        let user = InMemoryStore::new(ConfigScope::User, true);
        let resolver = ScopeResolver::resolve(ConfigScope::User, &system, &user).expect("resolve");

        assert!(resolver.is_writable());
        assert!(resolver.is_field_locked("tlsKeyLength"));
        assert!(!resolver.is_field_writable("tlsKeyLength"));
        assert!(resolver.is_field_writable("port"));
    }

    #[test]
    fn locks_come_only_from_system_store() {
        let fields = ["port", "tlsCertPath", "cryptoEnabled", "screenName"];
        for system_locks in [&[][..], &["port"][..], &["port", "cryptoEnabled"][..]] {
            for user_locks in [&[][..], &["tlsCertPath"][..], &["port", "screenName"][..]] {
                for requested in [ConfigScope::System, ConfigScope::User] {
                    let system =
                        InMemoryStore::new(ConfigScope::System, true).with_locked(system_locks);
                    let user = InMemoryStore::new(ConfigScope::User, true).with_locked(user_locks);
                    let resolver =
                        ScopeResolver::resolve(requested, &system, &user).expect("resolve");

                    for field in fields {
                        assert_eq!(
                            resolver.is_field_locked(field),
                            system_locks.contains(&field),
                            "field {field} system={system_locks:?} user={user_locks:?} scope={requested}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn read_only_user_scope_keeps_fields_read_only() {
        let (system, user) = stores(true, false);
        let resolver = ScopeResolver::resolve(ConfigScope::User, &system, &user).expect("resolve");

        assert_eq!(resolver.active_scope(), ConfigScope::User);
        assert!(!resolver.is_writable());
        assert!(!resolver.is_field_writable("port"));
    }
}
