//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The password is read from TASKBOARD_PASSWORD or auth.password_file and is
//! never stored in the TOML itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{Secret, read_secret_file};
use serde::Deserialize;
use taskboard_auth::{DEFAULT_EXPIRY_SKEW_SECS, LOGIN_PATH, REFRESH_PATH};

pub const CONFIG_ENV: &str = "TASKBOARD_CONFIG";
pub const API_URL_ENV: &str = "TASKBOARD_API_URL";
pub const PASSWORD_ENV: &str = "TASKBOARD_PASSWORD";
pub const DEFAULT_CONFIG_PATH: &str = "taskboard.toml";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend location
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Token endpoints and credentials
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_expiry_skew")]
    pub expiry_skew_secs: u64,
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,
    /// Default login email when `--email` is not given
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password_file: Option<PathBuf>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
}

/// Where the session and timer are persisted. A relative path is resolved
/// against the config file's directory.
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            expiry_skew_secs: default_expiry_skew(),
            refresh_timeout_secs: default_refresh_timeout(),
            email: None,
            password_file: None,
            password: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_login_path() -> String {
    LOGIN_PATH.to_string()
}

fn default_refresh_path() -> String {
    REFRESH_PATH.to_string()
}

fn default_expiry_skew() -> u64 {
    DEFAULT_EXPIRY_SKEW_SECS
}

fn default_refresh_timeout() -> u64 {
    10
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("taskboard-session.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Password resolution order:
    /// 1. TASKBOARD_PASSWORD env var
    /// 2. password_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        // relative paths are relative to the config file
        let base = path.parent().unwrap_or(Path::new(""));
        if config.storage.path.is_relative() {
            config.storage.path = base.join(&config.storage.path);
        }
        if let Some(file) = config.auth.password_file.as_mut().filter(|f| f.is_relative()) {
            *file = base.join(&*file);
        }

        if let Some(url) = non_empty_env(API_URL_ENV) {
            config.api.base_url = url;
        }

        if !config.api.base_url.starts_with("http://")
            && !config.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api.base_url must start with http:// or https://, got: {}",
                config.api.base_url
            )));
        }

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        if config.auth.refresh_timeout_secs == 0 {
            return Err(common::Error::Config(
                "auth.refresh_timeout_secs must be greater than 0".into(),
            ));
        }

        if let Some(password) = non_empty_env(PASSWORD_ENV) {
            config.auth.password = Some(Secret::new(password));
        } else if let Some(ref file) = config.auth.password_file {
            config.auth.password = read_secret_file(file)?;
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or TASKBOARD_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Some(p) = non_empty_env(CONFIG_ENV) {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.refresh_timeout_secs)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
