#![forbid(unsafe_code)]

//! Logging bootstrap.
//!
//! Library code only emits `tracing` events. Hosts that want them on stderr
//! call [`init`] once at startup; the filter comes from `FORMKIT_LOG`
//! (default `info`) and `FORMKIT_LOG_FORMAT=json` selects JSON lines when the
//! `tracing-json` feature is enabled.

use std::env;

use tracing_subscriber::EnvFilter;

pub use tracing::{debug, error, info, trace, warn};

pub const ENV_LOG: &str = "FORMKIT_LOG";
pub const ENV_LOG_FORMAT: &str = "FORMKIT_LOG_FORMAT";
pub const DEFAULT_FILTER: &str = "info";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LogSettings {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    /// Read settings from an arbitrary key lookup.
    pub fn from_env_with<F>(mut get: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(filter) = get(ENV_LOG)
            && !filter.trim().is_empty()
        {
            settings.filter = filter.trim().to_string();
        }
        if let Some(format) = get(ENV_LOG_FORMAT) {
            settings.format = LogFormat::parse(&format);
        }
        settings
    }
}

/// Install the global subscriber from the environment.
///
/// Returns `false` when a subscriber was already installed; the existing one
/// is left in place.
pub fn init() -> bool {
    init_with(&LogSettings::from_env())
}

/// Install the global subscriber with explicit settings.
pub fn init_with(settings: &LogSettings) -> bool {
    let filter = EnvFilter::try_new(&settings.filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match settings.format {
        #[cfg(feature = "tracing-json")]
        LogFormat::Json => builder.json().try_init().is_ok(),
        #[cfg(not(feature = "tracing-json"))]
        LogFormat::Json => builder.try_init().is_ok(),
        LogFormat::Text => builder.try_init().is_ok(),
    };
    if installed {
        tracing::debug!(filter = %settings.filter, format = ?settings.format, "logging installed");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_to_info_text() {
        let settings = LogSettings::from_env_with(|_| None);
        assert_eq!(settings, LogSettings::default());
    }

    #[test]
    fn settings_read_filter_and_format() {
        let settings = LogSettings::from_env_with(|key| match key {
            ENV_LOG => Some("formkit_tree=debug".into()),
            ENV_LOG_FORMAT => Some("JSON".into()),
            _ => None,
        });
        assert_eq!(settings.filter, "formkit_tree=debug");
        assert_eq!(settings.format, LogFormat::Json);
    }

    #[test]
    fn blank_filter_keeps_default() {
        let settings = LogSettings::from_env_with(|key| (key == ENV_LOG).then(|| "  ".into()));
        assert_eq!(settings.filter, DEFAULT_FILTER);
    }

    #[test]
    fn second_install_is_a_noop() {
        let settings = LogSettings::default();
        let _ = init_with(&settings);
        assert!(!init_with(&settings));
    }
}
