//! The configuration snapshot handed to callers.

use crate::errors::ConfigError;
use crate::field::{ElevateMode, Field, FieldValue, LogLevel};
use certificate::{DEFAULT_KEY_LENGTH, TlsCertificateDescriptor};
use serde::{Deserialize, Serialize};
use settings::{ConfigScope, ScopeResolver};
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 24800;

/// Plain field values, independent of where they were read from.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigValues {
    pub screen_name: String,
    pub port: u16,
    pub network_interface: String,
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_filename: String,
    pub elevate_mode: ElevateMode,
    pub auto_hide: bool,
    pub prevent_sleep: bool,
    pub tls_cert_path: String,
    pub tls_key_length: u32,
    pub tls_enabled: bool,
    pub language_sync: bool,
    pub invert_scroll_direction: bool,
    pub enable_service: bool,
    pub close_to_tray: bool,
    pub invert_connection: bool,
    pub enable_drag_and_drop: bool,
    pub enable_libei: bool,
}

impl Default for ConfigValues {
    fn default() -> Self {
        Self {
            screen_name: default_screen_name(),
            port: DEFAULT_PORT,
            network_interface: String::new(),
            log_level: LogLevel::default(),
            log_to_file: false,
            log_filename: String::new(),
            elevate_mode: ElevateMode::default(),
            auto_hide: false,
            prevent_sleep: false,
            tls_cert_path: String::new(),
            tls_key_length: DEFAULT_KEY_LENGTH,
            tls_enabled: true,
            language_sync: false,
            invert_scroll_direction: false,
            enable_service: false,
            close_to_tray: true,
            invert_connection: false,
            enable_drag_and_drop: false,
            enable_libei: false,
        }
    }
}

impl ConfigValues {
    pub fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::ScreenName => FieldValue::Text(self.screen_name.clone()),
            Field::Port => FieldValue::Integer(i64::from(self.port)),
            Field::NetworkInterface => FieldValue::Text(self.network_interface.clone()),
            Field::LogLevel => FieldValue::Text(self.log_level.to_string()),
            Field::LogToFile => FieldValue::Bool(self.log_to_file),
            Field::LogFilename => FieldValue::Text(self.log_filename.clone()),
            Field::ElevateMode => FieldValue::Text(self.elevate_mode.to_string()),
            Field::AutoHide => FieldValue::Bool(self.auto_hide),
            Field::PreventSleep => FieldValue::Bool(self.prevent_sleep),
            Field::TlsCertPath => FieldValue::Text(self.tls_cert_path.clone()),
            Field::TlsKeyLength => FieldValue::Integer(i64::from(self.tls_key_length)),
            Field::TlsEnabled => FieldValue::Bool(self.tls_enabled),
            Field::LanguageSync => FieldValue::Bool(self.language_sync),
            Field::InvertScrollDirection => FieldValue::Bool(self.invert_scroll_direction),
            Field::EnableService => FieldValue::Bool(self.enable_service),
            Field::CloseToTray => FieldValue::Bool(self.close_to_tray),
            Field::InvertConnection => FieldValue::Bool(self.invert_connection),
            Field::EnableDragAndDrop => FieldValue::Bool(self.enable_drag_and_drop),
            Field::EnableLibei => FieldValue::Bool(self.enable_libei),
        }
    }

    /// Type-checked assignment. Domain rules are checked at commit.
    pub fn set(&mut self, field: Field, value: FieldValue) -> Result<(), ConfigError> {
        let mismatch = |value: &FieldValue| ConfigError::Validation {
            field,
            message: format!("unexpected value {value:?}"),
        };
        match (field, value) {
            (Field::ScreenName, FieldValue::Text(s)) => self.screen_name = s,
            (Field::NetworkInterface, FieldValue::Text(s)) => self.network_interface = s,
            (Field::LogFilename, FieldValue::Text(s)) => self.log_filename = s,
            (Field::TlsCertPath, FieldValue::Text(s)) => self.tls_cert_path = s,
            (Field::LogLevel, FieldValue::Text(s)) => {
                self.log_level = LogLevel::from_str(&s).map_err(|_| ConfigError::Validation {
                    field,
                    message: format!("unknown log level {s:?}"),
                })?;
            }
            (Field::ElevateMode, FieldValue::Text(s)) => {
                self.elevate_mode =
                    ElevateMode::from_str(&s).map_err(|_| ConfigError::Validation {
                        field,
                        message: format!("unknown elevate mode {s:?}"),
                    })?;
            }
            (Field::Port, FieldValue::Integer(i)) => {
                self.port = u16::try_from(i).map_err(|_| ConfigError::Validation {
                    field,
                    message: format!("port {i} is outside 1-65535"),
                })?;
            }
            (Field::TlsKeyLength, FieldValue::Integer(i)) => {
                self.tls_key_length = u32::try_from(i).map_err(|_| ConfigError::Validation {
                    field,
                    message: format!("key length {i} is out of range"),
                })?;
            }
            (Field::LogToFile, FieldValue::Bool(b)) => self.log_to_file = b,
            (Field::AutoHide, FieldValue::Bool(b)) => self.auto_hide = b,
            (Field::PreventSleep, FieldValue::Bool(b)) => self.prevent_sleep = b,
            (Field::TlsEnabled, FieldValue::Bool(b)) => self.tls_enabled = b,
            (Field::LanguageSync, FieldValue::Bool(b)) => self.language_sync = b,
            (Field::InvertScrollDirection, FieldValue::Bool(b)) => self.invert_scroll_direction = b,
            (Field::EnableService, FieldValue::Bool(b)) => self.enable_service = b,
            (Field::CloseToTray, FieldValue::Bool(b)) => self.close_to_tray = b,
            (Field::InvertConnection, FieldValue::Bool(b)) => self.invert_connection = b,
            (Field::EnableDragAndDrop, FieldValue::Bool(b)) => self.enable_drag_and_drop = b,
            (Field::EnableLibei, FieldValue::Bool(b)) => self.enable_libei = b,
            (_, other) => return Err(mismatch(&other)),
        }
        Ok(())
    }
}

/// Host name as the default screen name, reduced to characters the screen
/// name validator accepts.
fn default_screen_name() -> String {
    let raw = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_default();
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(crate::validate::MAX_SCREEN_NAME_LEN)
        .collect();
    if name.is_empty() {
        "localhost".to_string()
    } else {
        name
    }
}

/// Snapshot produced by `ConfigurationFacade::load`.
///
/// Values can be edited freely; writability is enforced by [`Self::set`]
/// and again when the snapshot is committed.
#[derive(Clone, Debug)]
pub struct AppConfiguration {
    pub values: ConfigValues,
    pub(crate) resolver: ScopeResolver,
    pub(crate) certificate: TlsCertificateDescriptor,
}

impl AppConfiguration {
    pub fn active_scope(&self) -> ConfigScope {
        self.resolver.active_scope()
    }

    pub fn is_system_scope(&self) -> bool {
        self.active_scope().is_system()
    }

    /// Whether the active store accepts writes.
    pub fn is_writable(&self) -> bool {
        self.resolver.is_writable()
    }

    pub fn is_field_locked(&self, field: Field) -> bool {
        self.resolver.is_field_locked(field.lock_name())
    }

    pub fn is_field_writable(&self, field: Field) -> bool {
        self.resolver.is_field_writable(field.lock_name())
    }

    /// Resolved certificate state as of the last load or certificate action.
    pub fn certificate(&self) -> &TlsCertificateDescriptor {
        &self.certificate
    }

    pub fn certificate_path(&self) -> &Path {
        &self.certificate.path
    }

    pub fn get(&self, field: Field) -> FieldValue {
        self.values.get(field)
    }

    /// Edit one field, refused when it is locked or the store is read-only.
    pub fn set(&mut self, field: Field, value: FieldValue) -> Result<(), ConfigError> {
        self.ensure_writable(field)?;
        self.values.set(field, value)
    }

    pub(crate) fn ensure_writable(&self, field: Field) -> Result<(), ConfigError> {
        if self.is_field_locked(field) {
            Err(ConfigError::FieldLocked { field })
        } else if !self.is_writable() {
            Err(ConfigError::ReadOnly {
                field,
                scope: self.active_scope(),
            })
        } else {
            Ok(())
        }
    }

    /// Whether a control for `field` should accept input.
    ///
    /// `client_mode` is true while the core runs as a client.
    pub fn is_field_enabled(&self, field: Field, client_mode: bool) -> bool {
        if !self.is_field_writable(field) {
            return false;
        }
        let v = &self.values;
        match field {
            Field::TlsKeyLength | Field::TlsCertPath => v.tls_enabled && !client_mode,
            Field::EnableService => service_available(),
            Field::ElevateMode => service_available() && v.enable_service,
            Field::LogFilename => v.log_to_file,
            Field::LanguageSync | Field::InvertScrollDirection => client_mode,
            Field::EnableDragAndDrop => !cfg!(target_os = "linux"),
            Field::EnableLibei => cfg!(target_os = "linux"),
            _ => true,
        }
    }

    /// Regenerating is tied to the certificate path lock.
    pub fn regenerate_allowed(&self) -> bool {
        self.is_writable() && !self.is_field_locked(Field::TlsCertPath)
    }
}

/// The background service only exists on Windows.
fn service_available() -> bool {
    cfg!(windows)
}
