//! Field catalogue: lock names, storage keys and value kinds.

use serde::{Deserialize, Serialize};
use settings::{KeyPath, Value};
use std::fmt;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Every configuration field.
///
/// The strum name is the lock name administrators list under
/// `lockedSettings` in the system file.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum Field {
    ScreenName,
    Port,
    NetworkInterface,
    LogLevel,
    LogToFile,
    LogFilename,
    ElevateMode,
    AutoHide,
    PreventSleep,
    TlsCertPath,
    TlsKeyLength,
    /// TLS enabled. The lock name predates the TLS wording.
    #[strum(serialize = "cryptoEnabled")]
    #[serde(rename = "cryptoEnabled")]
    TlsEnabled,
    LanguageSync,
    InvertScrollDirection,
    EnableService,
    CloseToTray,
    InvertConnection,
    EnableDragAndDrop,
    EnableLibei,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Bool,
    /// One of a fixed set of names (log level, elevate mode).
    Choice,
}

impl Field {
    pub fn lock_name(self) -> &'static str {
        self.into()
    }

    /// Location in the per-scope TOML file.
    pub fn storage_key(self) -> KeyPath {
        let (table, key) = match self {
            Field::ScreenName => ("core", "screen_name"),
            Field::Port => ("core", "port"),
            Field::NetworkInterface => ("core", "interface"),
            Field::LogLevel => ("log", "level"),
            Field::LogToFile => ("log", "to_file"),
            Field::LogFilename => ("log", "filename"),
            Field::ElevateMode => ("service", "elevate_mode"),
            Field::EnableService => ("service", "enabled"),
            Field::TlsCertPath => ("tls", "cert_path"),
            Field::TlsKeyLength => ("tls", "key_length"),
            Field::TlsEnabled => ("tls", "enabled"),
            Field::AutoHide => ("gui", "auto_hide"),
            Field::PreventSleep => ("core", "prevent_sleep"),
            Field::LanguageSync => ("core", "language_sync"),
            Field::InvertScrollDirection => ("core", "invert_scroll"),
            Field::CloseToTray => ("gui", "close_to_tray"),
            Field::InvertConnection => ("core", "invert_connection"),
            Field::EnableDragAndDrop => ("core", "drag_and_drop"),
            Field::EnableLibei => ("core", "libei"),
        };
        KeyPath::from_slice(&[table, key])
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::ScreenName | Field::NetworkInterface | Field::LogFilename | Field::TlsCertPath => {
                FieldKind::Text
            }
            Field::Port | Field::TlsKeyLength => FieldKind::Integer,
            Field::LogLevel | Field::ElevateMode => FieldKind::Choice,
            _ => FieldKind::Bool,
        }
    }

    /// Fields whose change affects the certificate on disk.
    pub fn is_tls(self) -> bool {
        matches!(
            self,
            Field::TlsEnabled | Field::TlsCertPath | Field::TlsKeyLength
        )
    }
}

/// Comparable, format-independent field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl FieldValue {
    /// Parse operator input (CLI, environment) for `field`.
    pub fn parse(field: Field, input: &str) -> Result<Self, String> {
        let input = input.trim();
        match field.kind() {
            FieldKind::Text | FieldKind::Choice => Ok(FieldValue::Text(input.to_string())),
            FieldKind::Integer => input
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| format!("expected a number, got {input:?}")),
            FieldKind::Bool => match input.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(FieldValue::Bool(true)),
                "0" | "false" | "no" | "off" => Ok(FieldValue::Bool(false)),
                _ => Err(format!("expected true or false, got {input:?}")),
            },
        }
    }

    pub fn from_toml(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(FieldValue::Text(s.value().clone())),
            Value::Integer(i) => Some(FieldValue::Integer(*i.value())),
            Value::Boolean(b) => Some(FieldValue::Bool(*b.value())),
            _ => None,
        }
    }

    pub fn to_toml(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::from(s.as_str()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Bool(b) => Value::from(*b),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Fatal,
    Error,
    Warning,
    Note,
    #[default]
    Info,
    Debug,
    Debug1,
    Debug2,
}

/// When the background service elevates the core process.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
#[serde(rename_all = "camelCase")]
pub enum ElevateMode {
    #[default]
    OnlyIfNeeded,
    Always,
    Never,
}
