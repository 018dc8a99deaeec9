#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! Defaults are usable as-is. [`ObjectConfig::from_env`] layers the
//! `PROPEL_*` environment variables on top:
//!
//! | Variable             | Values                  | Default |
//! |----------------------|-------------------------|---------|
//! | `PROPEL_STORE`       | `hash`, `linear`        | `hash`  |
//! | `PROPEL_LOG_CHANGES` | `1`/`true`, `0`/`false` | `false` |
//!
//! Unparseable values are reported with a `warn` event and ignored.

use std::borrow::Cow;
use std::env;

use crate::error::ConfigError;
use crate::store::StoreKind;

/// Environment variable selecting the default store.
pub const ENV_STORE: &str = "PROPEL_STORE";
/// Environment variable enabling per-commit debug events.
pub const ENV_LOG_CHANGES: &str = "PROPEL_LOG_CHANGES";

/// Settings for a new [`ReactiveObject`](crate::ReactiveObject).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectConfig {
    /// Store backing the object's property values.
    pub store: StoreKind,
    /// Emit a `debug` event for every committed change instead of `trace`.
    pub log_changes: bool,
}

impl ObjectConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose the store kind.
    #[must_use]
    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    /// Enable or disable per-commit debug events.
    #[must_use]
    pub fn with_log_changes(mut self, enabled: bool) -> Self {
        self.log_changes = enabled;
        self
    }

    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, which maps a variable name to its
    /// value.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(val) = lookup(ENV_STORE) {
            match val.parse() {
                Ok(store) => config.store = store,
                Err(err) => tracing::warn!(%err, "ignoring {ENV_STORE}"),
            }
        }
        if let Some(val) = lookup(ENV_LOG_CHANGES) {
            match parse_bool(ENV_LOG_CHANGES, &val) {
                Ok(enabled) => config.log_changes = enabled,
                Err(err) => tracing::warn!(%err, "ignoring {ENV_LOG_CHANGES}"),
            }
        }
        config
    }
}

/// Settings for an [`AsyncCommand`](crate::AsyncCommand).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    /// Let invocations overlap instead of disabling the command while one
    /// is running.
    pub allow_concurrent: bool,
    /// Name recorded on the command's tracing spans.
    pub label: Cow<'static, str>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            allow_concurrent: false,
            label: Cow::Borrowed("command"),
        }
    }
}

impl CommandConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow overlapping invocations.
    #[must_use]
    pub fn with_allow_concurrent(mut self, allow: bool) -> Self {
        self.allow_concurrent = allow;
        self
    }

    /// Set the span label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }
}

pub(crate) fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" => Ok(true),
        "0" | "" => Ok(false),
        v if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => Ok(true),
        v if v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("no") => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_owned(),
        }),
    }
}
