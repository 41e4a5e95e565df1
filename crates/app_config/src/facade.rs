//! The one entry point the rest of the application uses for settings.
//!
//! Reads merge both scope stores; writes go to the active store only and
//! only through [`ConfigurationFacade::commit`] and
//! [`ConfigurationFacade::sync`]. Certificate work is delegated to the
//! [`CertificateManager`] with paths resolved from the loaded values.

use crate::errors::ConfigError;
use crate::field::{Field, FieldValue};
use crate::model::{AppConfiguration, ConfigValues};
use crate::startup::StartupOptions;
use crate::validate::validate;
use certificate::{
    CancelToken, CertificateCodec, CertificateGenerationRequest, CertificateManager, Fingerprint,
    GeneratedCertificate, InspectError, ProvisionOutcome, TlsCertificateDescriptor, X509Codec,
};
use paths::ScopeDirs;
use settings::{ConfigScope, KeyPath, ScopeResolver, SettingError, SettingsStore, Value};
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

/// User-store key remembering which scope to open next time.
pub const SCOPE_PREFERENCE_KEY: &str = "loadFromSystemScope";

type BeforeSyncHook = Box<dyn FnMut(&AppConfiguration) -> Result<(), String> + Send>;

/// Label data for a scope selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeLabel {
    pub scope: ConfigScope,
    /// "All users" / "Current user", with " (read-only)" appended when the
    /// store cannot be written.
    pub label: String,
    /// Backing file identity.
    pub tooltip: String,
    pub writable: bool,
    /// Switching scopes is only offered when the system store is writable.
    pub selectable: bool,
}

pub struct ConfigurationFacade<C = X509Codec> {
    system: Box<dyn SettingsStore>,
    user: Box<dyn SettingsStore>,
    certificates: CertificateManager<C>,
    dirs: ScopeDirs,
    requested: ConfigScope,
    current: Option<AppConfiguration>,
    other_screens: Vec<String>,
    before_sync: Vec<BeforeSyncHook>,
    dirty_system: bool,
    dirty_user: bool,
}

impl<C: CertificateCodec> ConfigurationFacade<C> {
    /// Wire the stores and certificate manager together.
    ///
    /// A requested reset wipes every writable store here, before anything
    /// is loaded. Nothing is read until [`Self::load`].
    pub fn open(
        system: Box<dyn SettingsStore>,
        user: Box<dyn SettingsStore>,
        certificates: CertificateManager<C>,
        dirs: ScopeDirs,
        startup: StartupOptions,
    ) -> Result<Self, ConfigError> {
        let mut facade = Self {
            system,
            user,
            certificates,
            dirs,
            requested: ConfigScope::User,
            current: None,
            other_screens: Vec::new(),
            before_sync: Vec::new(),
            dirty_system: false,
            dirty_user: false,
        };

        if startup.should_reset() {
            facade.reset_all()?;
        } else if startup.reset_requested {
            debug!("settings reset requested but suppressed");
        }

        facade.requested = facade.preferred_scope()?;
        Ok(facade)
    }

    fn reset_all(&mut self) -> Result<(), ConfigError> {
        for store in [self.system.as_mut(), self.user.as_mut()] {
            if !store.is_writable() {
                debug!(scope = %store.scope(), "skipping reset of read-only settings");
                continue;
            }
            store.clear()?;
            store.persist()?;
            info!(scope = %store.scope(), file = %store.file_identity(), "settings reset");
        }
        Ok(())
    }

    fn preferred_scope(&self) -> Result<ConfigScope, ConfigError> {
        let key = KeyPath::from_slice(&[SCOPE_PREFERENCE_KEY]);
        let is_system = self
            .user
            .get(&key)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(ConfigScope::from_system_flag(is_system))
    }

    pub fn store(&self, scope: ConfigScope) -> &dyn SettingsStore {
        match scope {
            ConfigScope::System => self.system.as_ref(),
            ConfigScope::User => self.user.as_ref(),
        }
    }

    fn store_mut(&mut self, scope: ConfigScope) -> &mut dyn SettingsStore {
        match scope {
            ConfigScope::System => self.system.as_mut(),
            ConfigScope::User => self.user.as_mut(),
        }
    }

    fn mark_dirty(&mut self, scope: ConfigScope) {
        match scope {
            ConfigScope::System => self.dirty_system = true,
            ConfigScope::User => self.dirty_user = true,
        }
    }

    pub fn certificates(&self) -> &CertificateManager<C> {
        &self.certificates
    }

    pub fn dirs(&self) -> &ScopeDirs {
        &self.dirs
    }

    /// The scope asked for (persisted preference or [`Self::set_scope`]).
    pub fn requested_scope(&self) -> ConfigScope {
        self.requested
    }

    /// Last loaded or committed snapshot.
    pub fn current(&self) -> Option<&AppConfiguration> {
        self.current.as_ref()
    }

    /// Screen names already used elsewhere; the own name must differ.
    pub fn set_other_screen_names(&mut self, names: Vec<String>) {
        self.other_screens = names;
    }

    /// Run `hook` at the start of every [`Self::sync`], before anything is
    /// written. A failing hook aborts the sync.
    pub fn add_before_sync_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&AppConfiguration) -> Result<(), String> + Send + 'static,
    {
        self.before_sync.push(Box::new(hook));
    }

    /// (Re)load both stores and build a fresh snapshot.
    ///
    /// Unsynced commits are discarded. When a certificate exists at the
    /// resolved path its key length replaces the stored preference.
    pub fn load(&mut self) -> Result<AppConfiguration, ConfigError> {
        if self.dirty_system || self.dirty_user {
            warn!("reloading settings with unsynced changes, they are discarded");
            self.dirty_system = false;
            self.dirty_user = false;
        }
        self.system.load()?;
        self.user.load()?;

        let resolver =
            ScopeResolver::resolve(self.requested, self.system.as_ref(), self.user.as_ref())?;

        let mut values = ConfigValues::default();
        for field in Field::iter() {
            if resolver.is_field_locked(field.lock_name()) {
                debug!("locking {field}");
            }
            let Some(value) = self.read_field(field, &resolver)? else {
                continue;
            };
            if let Err(err) = values.set(field, value) {
                warn!(error = %err, "ignoring stored value");
            }
        }

        let path = self.resolve_path(&values, resolver.active_scope());
        let certificate = self.reconcile_key_length(&mut values, &resolver, path)?;

        let config = AppConfiguration {
            values,
            resolver,
            certificate,
        };
        debug!(
            scope = %config.active_scope(),
            writable = config.is_writable(),
            "configuration loaded"
        );
        self.current = Some(config.clone());
        Ok(config)
    }

    /// First store holding a value wins.
    ///
    /// Locked fields prefer the system store. The system scope ignores user
    /// values; the user scope falls back to system values.
    fn read_field(
        &self,
        field: Field,
        resolver: &ScopeResolver,
    ) -> Result<Option<FieldValue>, ConfigError> {
        let sources: [Option<&dyn SettingsStore>; 2] =
            if resolver.is_field_locked(field.lock_name()) {
                [
                    Some(self.system.as_ref()),
                    Some(self.store(resolver.active_scope())),
                ]
            } else if resolver.active_scope().is_system() {
                [Some(self.system.as_ref()), None]
            } else {
                [Some(self.user.as_ref()), Some(self.system.as_ref())]
            };

        let key = field.storage_key();
        for store in sources.into_iter().flatten() {
            let Some(raw) = store.get(&key)? else {
                continue;
            };
            match FieldValue::from_toml(&raw) {
                Some(value) => return Ok(Some(value)),
                None => warn!(scope = %store.scope(), key = %key, "unsupported value type"),
            }
        }
        Ok(None)
    }

    fn resolve_path(&self, values: &ConfigValues, scope: ConfigScope) -> PathBuf {
        self.dirs
            .tls_file_path(&values.tls_cert_path, scope.is_system())
    }

    /// The certificate on disk is authoritative for the key length.
    fn reconcile_key_length(
        &mut self,
        values: &mut ConfigValues,
        resolver: &ScopeResolver,
        path: PathBuf,
    ) -> Result<TlsCertificateDescriptor, ConfigError> {
        match self.certificates.inspect(&path) {
            Ok(bits) => {
                if bits != values.tls_key_length {
                    info!(
                        path = %path.display(),
                        stored = values.tls_key_length,
                        on_file = bits,
                        "using key length of existing tls certificate"
                    );
                    values.tls_key_length = bits;
                    if resolver.is_field_writable(Field::TlsKeyLength.lock_name()) {
                        let store = self.store_mut(resolver.active_scope());
                        store.set(
                            &Field::TlsKeyLength.storage_key(),
                            Value::from(i64::from(bits)),
                        )?;
                        store.persist()?;
                    }
                }
                Ok(TlsCertificateDescriptor {
                    path,
                    key_length: Some(bits),
                    exists: true,
                })
            }
            Err(InspectError::NotFound(_)) => {
                debug!(path = %path.display(), "no tls certificate file");
                Ok(TlsCertificateDescriptor {
                    path,
                    key_length: None,
                    exists: false,
                })
            }
            Err(err) => {
                warn!(error = %err, "keeping stored tls key length");
                let exists = path.exists();
                Ok(TlsCertificateDescriptor {
                    path,
                    key_length: None,
                    exists,
                })
            }
        }
    }

    /// Validate `snapshot` and apply its changes to the active store.
    ///
    /// Nothing is applied unless every field validates and every changed
    /// field is writable. Returns the changed fields; call [`Self::sync`] to
    /// write them out. TLS changes refresh the certificate descriptor only:
    /// provisioning stays an explicit [`Self::persist_certificate_if_absent`].
    pub fn commit(&mut self, snapshot: &AppConfiguration) -> Result<Vec<Field>, ConfigError> {
        let current = self.current.as_ref().ok_or(ConfigError::NotLoaded)?;
        validate(&snapshot.values, &current.values, &self.other_screens)?;

        let changed: Vec<Field> = Field::iter()
            .filter(|field| current.values.get(*field) != snapshot.values.get(*field))
            .collect();
        for field in &changed {
            current.ensure_writable(*field)?;
        }
        if changed.is_empty() {
            return Ok(changed);
        }

        let mut updated = current.clone();
        updated.values = snapshot.values.clone();
        let scope = updated.active_scope();

        let store = self.store_mut(scope);
        let mut applied = Vec::with_capacity(changed.len());
        for field in &changed {
            let key = field.storage_key();
            let previous = store.get(&key)?;
            if let Err(err) = store.set(&key, snapshot.values.get(*field).to_toml()) {
                restore_keys(store, applied)?;
                return Err(err.into());
            }
            applied.push((key, previous));
        }
        self.mark_dirty(scope);

        if changed.iter().any(|field| field.is_tls()) {
            let path = self.resolve_path(&updated.values, scope);
            updated.certificate = self.certificates.describe(&path);
        }
        info!(scope = %scope, fields = ?changed, "configuration committed");
        self.current = Some(updated);
        Ok(changed)
    }

    /// Run before-sync hooks, then persist every store with committed
    /// changes.
    pub fn sync(&mut self) -> Result<(), ConfigError> {
        let current = self.current.as_ref().ok_or(ConfigError::NotLoaded)?;
        for hook in &mut self.before_sync {
            hook(current).map_err(ConfigError::Hook)?;
        }

        if self.dirty_system {
            self.system.persist()?;
            self.dirty_system = false;
        }
        if self.dirty_user {
            self.user.persist()?;
            self.dirty_user = false;
        }
        debug!("configuration synced");
        Ok(())
    }

    /// Switch scopes, remember the choice in the user store and reload.
    pub fn set_scope(&mut self, scope: ConfigScope) -> Result<AppConfiguration, ConfigError> {
        self.requested = scope;
        if self.user.is_writable() {
            self.user.set(
                &KeyPath::from_slice(&[SCOPE_PREFERENCE_KEY]),
                Value::from(scope.is_system()),
            )?;
            self.user.persist()?;
        }
        self.load()
    }

    pub fn scope_labels(&self) -> [ScopeLabel; 2] {
        let selectable = self.system.is_writable();
        let label = |store: &dyn SettingsStore, name: &str| {
            let writable = store.is_writable();
            ScopeLabel {
                scope: store.scope(),
                label: if writable {
                    name.to_string()
                } else {
                    format!("{name} (read-only)")
                },
                tooltip: store.file_identity(),
                writable,
                selectable,
            }
        };
        [
            label(self.system.as_ref(), "All users"),
            label(self.user.as_ref(), "Current user"),
        ]
    }

    fn generation_request(&self, config: &AppConfiguration) -> CertificateGenerationRequest {
        CertificateGenerationRequest {
            path: self.resolve_path(&config.values, config.active_scope()),
            key_length: config.values.tls_key_length,
            scope: config.active_scope(),
            tls_enabled: config.values.tls_enabled,
        }
    }

    /// Explicit regeneration, replacing any existing certificate.
    ///
    /// `key_length` overrides the loaded value, which after [`Self::load`]
    /// is the length of the certificate being replaced. The new length is
    /// committed like any other change; call [`Self::sync`] to keep it.
    /// Every peer has to trust the new fingerprint afterwards.
    pub fn regenerate_certificate(
        &mut self,
        key_length: Option<u32>,
        cancel: &CancelToken,
    ) -> Result<GeneratedCertificate, ConfigError> {
        let current = self.current.as_ref().ok_or(ConfigError::NotLoaded)?;
        current.ensure_writable(Field::TlsCertPath)?;

        let mut request = self.generation_request(current);
        if let Some(bits) = key_length.filter(|bits| *bits != request.key_length) {
            current.ensure_writable(Field::TlsKeyLength)?;
            request.key_length = bits;
        }
        let generated = self.certificates.generate_cancellable(&request, cancel)?;
        warn!(
            fingerprint = %generated.fingerprint,
            "tls certificate regenerated, every peer must trust the new fingerprint"
        );
        self.record_key_length(generated.key_length)?;
        self.refresh_certificate(&request.path);
        Ok(generated)
    }

    fn record_key_length(&mut self, bits: u32) -> Result<(), ConfigError> {
        let Some(current) = self.current.as_mut() else {
            return Ok(());
        };
        if current.values.tls_key_length == bits {
            return Ok(());
        }
        current.values.tls_key_length = bits;
        if !current.is_field_writable(Field::TlsKeyLength) {
            return Ok(());
        }
        let scope = current.active_scope();
        self.store_mut(scope).set(
            &Field::TlsKeyLength.storage_key(),
            Value::from(i64::from(bits)),
        )?;
        self.mark_dirty(scope);
        Ok(())
    }

    /// Provision a certificate only when none exists at the resolved path.
    pub fn persist_certificate_if_absent(&mut self) -> Result<ProvisionOutcome, ConfigError> {
        let current = self.current.as_ref().ok_or(ConfigError::NotLoaded)?;
        let request = self.generation_request(current);
        let outcome = self.certificates.persist_if_absent(&request)?;
        if let ProvisionOutcome::Generated(generated) = &outcome {
            info!(fingerprint = %generated.fingerprint, "tls certificate created");
        }
        self.refresh_certificate(&request.path);
        Ok(outcome)
    }

    fn refresh_certificate(&mut self, path: &Path) {
        let descriptor = self.certificates.describe(path);
        if let Some(current) = self.current.as_mut() {
            current.certificate = descriptor;
        }
    }

    /// Freshly inspected certificate state; the file may change out of band.
    pub fn certificate_descriptor(&self) -> Result<TlsCertificateDescriptor, ConfigError> {
        let current = self.current.as_ref().ok_or(ConfigError::NotLoaded)?;
        let path = self.resolve_path(&current.values, current.active_scope());
        Ok(self.certificates.describe(&path))
    }

    pub fn certificate_fingerprint(&self) -> Result<Fingerprint, ConfigError> {
        let current = self.current.as_ref().ok_or(ConfigError::NotLoaded)?;
        let path = self.resolve_path(&current.values, current.active_scope());
        Ok(self.certificates.fingerprint(&path)?)
    }
}

/// Put back the keys of a partially applied commit, newest first.
fn restore_keys(
    store: &mut dyn SettingsStore,
    applied: Vec<(KeyPath, Option<Value>)>,
) -> Result<(), SettingError> {
    for (key, previous) in applied.into_iter().rev() {
        match previous {
            Some(value) => store.set(&key, value)?,
            None => store.remove(&key)?,
        }
    }
    Ok(())
}
