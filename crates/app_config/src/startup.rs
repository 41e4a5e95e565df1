/// Process-start options handed to `ConfigurationFacade::open`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupOptions {
    /// Wipe all persisted settings before the first load.
    pub reset_requested: bool,
    /// Overrides `reset_requested`.
    pub no_reset: bool,
}

impl StartupOptions {
    /// Environment variable a launcher sets to request a reset.
    pub const RESET_ENV_VAR: &'static str = "RESET_ALL";

    /// Build from the raw value of [`Self::RESET_ENV_VAR`] and the
    /// `--no-reset` flag.
    pub fn from_env_value(reset: Option<&str>, no_reset: bool) -> Self {
        Self {
            reset_requested: reset.is_some_and(is_truthy),
            no_reset,
        }
    }

    pub fn should_reset(&self) -> bool {
        self.reset_requested && !self.no_reset
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
