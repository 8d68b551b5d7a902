//! Client configuration from environment variables.

use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use kaos_auth::DEFAULT_CHECK_TTL_MS;
use kaos_infra::{BackendConfig, JsonFileStore};
use kaos_observability::LogFormat;

use crate::navigation::NavigationConfig;

pub const AUTH_MODE: &str = "KAOS_AUTH_MODE";
pub const BACKEND_URL: &str = "KAOS_BACKEND_URL";
pub const BACKEND_KEY: &str = "KAOS_BACKEND_KEY";
pub const STORAGE_PATH: &str = "KAOS_STORAGE_PATH";
pub const NAV_COOLDOWN_MS: &str = "KAOS_NAV_COOLDOWN_MS";
pub const NAV_SETTLE_MS: &str = "KAOS_NAV_SETTLE_MS";
pub const NAV_MAX_SUPPRESSED: &str = "KAOS_NAV_MAX_SUPPRESSED";
pub const AUTH_CHECK_TTL_MS: &str = "KAOS_AUTH_CHECK_TTL_MS";
pub const LOG_FORMAT: &str = "KAOS_LOG_FORMAT";

/// Where identities come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// The hosted identity/profile backend.
    Remote,
    /// Fixed seed accounts; only available with the `demo` feature.
    Demo,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("KAOS_AUTH_MODE=demo requires a build with the `demo` feature")]
    DemoModeUnavailable,

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: `{value}`")]
    Invalid { key: &'static str, value: String },

    #[error("no data directory available; set KAOS_STORAGE_PATH")]
    NoStorageDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub auth_mode: AuthMode,
    /// Present in remote mode.
    pub backend: Option<BackendConfig>,
    pub storage_path: PathBuf,
    pub navigation: NavigationConfig,
    pub auth_check_ttl: Duration,
    pub log_format: LogFormat,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let auth_mode = match get(AUTH_MODE).as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("remote") => AuthMode::Remote,
            Some("demo") if cfg!(feature = "demo") => AuthMode::Demo,
            Some("demo") => return Err(ConfigError::DemoModeUnavailable),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: AUTH_MODE,
                    value: other.to_string(),
                });
            }
        };

        let backend = match auth_mode {
            AuthMode::Remote => Some(BackendConfig {
                base_url: get(BACKEND_URL).ok_or(ConfigError::Missing(BACKEND_URL))?,
                api_key: get(BACKEND_KEY).ok_or(ConfigError::Missing(BACKEND_KEY))?,
            }),
            AuthMode::Demo => None,
        };

        let storage_path = match get(STORAGE_PATH) {
            Some(path) => PathBuf::from(path),
            None => JsonFileStore::default_path().ok_or(ConfigError::NoStorageDir)?,
        };

        let defaults = NavigationConfig::default();
        let navigation = NavigationConfig {
            cooldown: millis(&get, NAV_COOLDOWN_MS)?.unwrap_or(defaults.cooldown),
            settle: millis(&get, NAV_SETTLE_MS)?.unwrap_or(defaults.settle),
            max_suppressed: parse::<u32>(&get, NAV_MAX_SUPPRESSED)?
                .unwrap_or(defaults.max_suppressed),
        };
        if navigation.max_suppressed == 0 {
            return Err(ConfigError::Invalid {
                key: NAV_MAX_SUPPRESSED,
                value: "0".to_string(),
            });
        }

        let auth_check_ttl = millis(&get, AUTH_CHECK_TTL_MS)?
            .unwrap_or_else(|| Duration::milliseconds(DEFAULT_CHECK_TTL_MS));

        let log_format = match get(LOG_FORMAT) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: LOG_FORMAT,
                value: raw,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            auth_mode,
            backend,
            storage_path,
            navigation,
            auth_check_ttl,
            log_format,
        })
    }
}

fn parse<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    get(key)
        .map(|raw| raw.parse::<T>().map_err(|_| ConfigError::Invalid { key, value: raw }))
        .transpose()
}

fn millis(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse::<u32>(get, key)?.map(|ms| Duration::milliseconds(i64::from(ms))))
}
