//! Runtime settings loaded via OrthoConfig.
//!
//! Values come from `COLLECTOR_*` environment variables and configuration
//! files; command-line flags are parsed separately by the CLI.

use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::domain::DEFAULT_UNDO_WINDOW;
use crate::outbound::supabase::{
    DEFAULT_COLLECTIONS_TABLE, DEFAULT_ITEMS_TABLE, DEFAULT_REQUEST_TIMEOUT, SupabaseEndpoint,
};

/// Problems turning settings into a backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("COLLECTOR_SUPABASE_URL is not set; set it or enable offline mode")]
    MissingUrl,
    #[error("COLLECTOR_ANON_KEY is not set")]
    MissingAnonKey,
    #[error("invalid backend URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },
}

/// Configuration for the collector client.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "COLLECTOR")]
pub struct CollectorSettings {
    /// Project URL of the hosted backend.
    pub supabase_url: Option<String>,
    /// Public anonymous API key sent with every request.
    pub anon_key: Option<String>,
    /// File the session is persisted to between runs.
    pub session_file: Option<PathBuf>,
    /// Table holding collections.
    pub collections_table: Option<String>,
    /// Table holding items.
    pub items_table: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// How long a deleted item can be restored, in seconds.
    pub undo_window_secs: Option<u64>,
    /// Emit JSON log lines instead of human readable ones.
    #[ortho_config(default = false)]
    pub log_json: bool,
    /// Use the in-process backend instead of the hosted one.
    #[ortho_config(default = false)]
    pub offline: bool,
}

impl CollectorSettings {
    /// Undo window, falling back to the default.
    pub fn undo_window(&self) -> Result<Duration, SettingsError> {
        seconds(self.undo_window_secs, DEFAULT_UNDO_WINDOW, "undo_window_secs")
    }

    /// Request timeout, falling back to the default.
    pub fn request_timeout(&self) -> Result<Duration, SettingsError> {
        seconds(
            self.request_timeout_secs,
            DEFAULT_REQUEST_TIMEOUT,
            "request_timeout_secs",
        )
    }

    /// Collections table name, falling back to the default.
    pub fn collections_table(&self) -> &str {
        non_blank(self.collections_table.as_deref()).unwrap_or(DEFAULT_COLLECTIONS_TABLE)
    }

    /// Items table name, falling back to the default.
    pub fn items_table(&self) -> &str {
        non_blank(self.items_table.as_deref()).unwrap_or(DEFAULT_ITEMS_TABLE)
    }

    /// Endpoint description for the hosted backend.
    pub fn supabase_endpoint(&self) -> Result<SupabaseEndpoint, SettingsError> {
        let raw = non_blank(self.supabase_url.as_deref()).ok_or(SettingsError::MissingUrl)?;
        let base_url = Url::parse(raw).map_err(|err| SettingsError::InvalidUrl {
            url: raw.to_owned(),
            reason: err.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(SettingsError::InvalidUrl {
                url: raw.to_owned(),
                reason: "scheme must be http or https".to_owned(),
            });
        }
        let anon_key = non_blank(self.anon_key.as_deref()).ok_or(SettingsError::MissingAnonKey)?;

        let mut endpoint = SupabaseEndpoint::new(base_url, anon_key);
        endpoint.timeout = self.request_timeout()?;
        endpoint.session_file.clone_from(&self.session_file);
        self.collections_table().clone_into(&mut endpoint.collections_table);
        self.items_table().clone_into(&mut endpoint.items_table);
        Ok(endpoint)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn seconds(
    value: Option<u64>,
    fallback: Duration,
    name: &'static str,
) -> Result<Duration, SettingsError> {
    match value {
        None => Ok(fallback),
        Some(0) => Err(SettingsError::ZeroDuration { name }),
        Some(secs) => Ok(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 9] = [
        "COLLECTOR_SUPABASE_URL",
        "COLLECTOR_ANON_KEY",
        "COLLECTOR_SESSION_FILE",
        "COLLECTOR_COLLECTIONS_TABLE",
        "COLLECTOR_ITEMS_TABLE",
        "COLLECTOR_REQUEST_TIMEOUT_SECS",
        "COLLECTOR_UNDO_WINDOW_SECS",
        "COLLECTOR_LOG_JSON",
        "COLLECTOR_OFFLINE",
    ];

    fn load_from_empty_args() -> CollectorSettings {
        CollectorSettings::load_from_iter([OsString::from("collector")])
            .expect("config should load")
    }

    fn env_with(overrides: &[(&str, &str)]) -> Vec<(&'static str, Option<String>)> {
        VARS.iter()
            .map(|name| {
                let value = overrides
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| (*value).to_owned());
                (*name, value)
            })
            .collect()
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(env_with(&[]));

        let settings = load_from_empty_args();
        assert!(!settings.offline);
        assert!(!settings.log_json);
        assert_eq!(settings.undo_window(), Ok(DEFAULT_UNDO_WINDOW));
        assert_eq!(settings.collections_table(), "lists");
        assert_eq!(settings.items_table(), "items");
        assert_eq!(settings.supabase_endpoint().err(), Some(SettingsError::MissingUrl));
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env(env_with(&[
            ("COLLECTOR_SUPABASE_URL", "https://demo.supabase.co"),
            ("COLLECTOR_ANON_KEY", "anon"),
            ("COLLECTOR_SESSION_FILE", "/tmp/collector/session.json"),
            ("COLLECTOR_ITEMS_TABLE", "entries"),
            ("COLLECTOR_REQUEST_TIMEOUT_SECS", "12"),
            ("COLLECTOR_UNDO_WINDOW_SECS", "9"),
            ("COLLECTOR_OFFLINE", "true"),
        ]));

        let settings = load_from_empty_args();
        assert!(settings.offline);
        assert_eq!(settings.undo_window(), Ok(Duration::from_secs(9)));

        let endpoint = settings.supabase_endpoint().expect("endpoint");
        assert_eq!(endpoint.base_url.as_str(), "https://demo.supabase.co/");
        assert_eq!(endpoint.anon_key, "anon");
        assert_eq!(endpoint.timeout, Duration::from_secs(12));
        assert_eq!(
            endpoint.session_file,
            Some(PathBuf::from("/tmp/collector/session.json"))
        );
        assert_eq!(endpoint.collections_table, "lists");
        assert_eq!(endpoint.items_table, "entries");
    }

    #[rstest]
    #[case(&[("COLLECTOR_SUPABASE_URL", "not a url"), ("COLLECTOR_ANON_KEY", "anon")], "invalid backend URL")]
    #[case(&[("COLLECTOR_SUPABASE_URL", "ftp://demo.example"), ("COLLECTOR_ANON_KEY", "anon")], "scheme must be http or https")]
    #[case(&[("COLLECTOR_SUPABASE_URL", "https://demo.supabase.co")], "COLLECTOR_ANON_KEY is not set")]
    #[case(&[("COLLECTOR_SUPABASE_URL", "https://demo.supabase.co"), ("COLLECTOR_ANON_KEY", "anon"), ("COLLECTOR_REQUEST_TIMEOUT_SECS", "0")], "request_timeout_secs must be greater than zero")]
    fn invalid_endpoint_settings_are_reported(
        #[case] overrides: &[(&str, &str)],
        #[case] expected: &str,
    ) {
        let _guard = lock_env(env_with(overrides));

        let err = load_from_empty_args()
            .supabase_endpoint()
            .expect_err("endpoint should be rejected");
        assert!(
            err.to_string().contains(expected),
            "unexpected error: {err}"
        );
    }
}
