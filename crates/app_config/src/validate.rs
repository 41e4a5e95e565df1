//! Domain rules checked before a snapshot is committed.

use crate::errors::ConfigError;
use crate::field::Field;
use crate::model::ConfigValues;
use certificate::is_supported_key_length;
use regex::Regex;
use std::sync::LazyLock;

pub const MAX_SCREEN_NAME_LEN: usize = 255;

/// Screen names travel in the protocol and in config files of peers.
static SCREEN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("SCREEN_NAME pattern failed"));

pub fn validate_screen_name(name: &str, other_screens: &[String]) -> Result<(), String> {
    if name.is_empty() {
        return Err("screen name cannot be empty".to_string());
    }
    if name.chars().count() > MAX_SCREEN_NAME_LEN {
        return Err(format!(
            "screen name cannot be longer than {MAX_SCREEN_NAME_LEN} characters"
        ));
    }
    if !SCREEN_NAME.is_match(name) {
        return Err("screen name may only contain letters, digits, '.', '_' and '-'".to_string());
    }
    if other_screens.iter().any(|other| other == name) {
        return Err(format!("a screen named {name:?} already exists"));
    }
    Ok(())
}

/// First failing rule wins; fields are checked in catalogue order.
///
/// The key length only has to be one the generator supports when it differs
/// from `previous`. An unchanged value may come from a certificate on disk
/// (1024 bit RSA, an EC curve) and is accepted as is.
pub fn validate(
    values: &ConfigValues,
    previous: &ConfigValues,
    other_screens: &[String],
) -> Result<(), ConfigError> {
    let fail = |field: Field, message: String| Err(ConfigError::Validation { field, message });

    if let Err(message) = validate_screen_name(&values.screen_name, other_screens) {
        return fail(Field::ScreenName, message);
    }
    if values.port == 0 {
        return fail(Field::Port, "port must be between 1 and 65535".to_string());
    }
    if values.log_to_file && values.log_filename.trim().is_empty() {
        return fail(
            Field::LogFilename,
            "a log file name is required when logging to file".to_string(),
        );
    }
    let key_length_changed = values.tls_key_length != previous.tls_key_length;
    if key_length_changed && !is_supported_key_length(values.tls_key_length) {
        return fail(
            Field::TlsKeyLength,
            format!(
                "key length {} is not supported (2048, 3072 or 4096)",
                values.tls_key_length
            ),
        );
    }
    Ok(())
}
