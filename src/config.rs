//! Service configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_MOCK_DELAY_MS: u64 = 1500;
pub const DEFAULT_ADMIN_USER: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceEnvironment {
    Production,
    Development,
    Test,
}

impl ServiceEnvironment {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceEnvironment::Production => "production",
            ServiceEnvironment::Development => "development",
            ServiceEnvironment::Test => "test",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown EDUMIND_ENV: {0}")]
    UnknownEnvironment(String),
    #[error("invalid {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: ServiceEnvironment,
    pub data_dir: PathBuf,
    pub mock_delay: Duration,
    pub risk_dataset: Option<PathBuf>,
    pub admin_user: String,
    pub admin_password: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            environment: ServiceEnvironment::Production,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            mock_delay: Duration::from_millis(DEFAULT_MOCK_DELAY_MS),
            risk_dataset: None,
            admin_user: DEFAULT_ADMIN_USER.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `EDUMIND_HOST`: default `127.0.0.1`
    /// - `EDUMIND_PORT`: default 8080
    /// - `EDUMIND_ENV`: `production` (default), `development` or `test`
    /// - `EDUMIND_DATA_DIR`: where prediction stores are written, default `data`
    /// - `EDUMIND_MOCK_DELAY_MS`: artificial latency in test mode, default 1500
    /// - `EDUMIND_RISK_DATASET`: CSV to fit the risk model from; demo heuristic when absent
    /// - `EDUMIND_ADMIN_USER` / `EDUMIND_ADMIN_PASSWORD`: sign-in credentials, default admin/admin
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] but reads through `lookup`, so tests need not touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match lookup("EDUMIND_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { var: "EDUMIND_PORT", value: raw })?,
            None => defaults.port,
        };
        let mock_delay = match lookup("EDUMIND_MOCK_DELAY_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::Invalid { var: "EDUMIND_MOCK_DELAY_MS", value: raw })?,
            ),
            None => defaults.mock_delay,
        };

        Ok(Self {
            host: lookup("EDUMIND_HOST").unwrap_or(defaults.host),
            port,
            environment: parse_environment(lookup("EDUMIND_ENV").as_deref())?,
            data_dir: lookup("EDUMIND_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            mock_delay,
            risk_dataset: lookup("EDUMIND_RISK_DATASET")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            admin_user: lookup("EDUMIND_ADMIN_USER").unwrap_or(defaults.admin_user),
            admin_password: lookup("EDUMIND_ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
        })
    }
}

fn parse_environment(raw: Option<&str>) -> Result<ServiceEnvironment, ConfigError> {
    match raw.map(str::trim).unwrap_or("production") {
        "production" | "prod" => Ok(ServiceEnvironment::Production),
        "development" | "dev" => Ok(ServiceEnvironment::Development),
        "test" => Ok(ServiceEnvironment::Test),
        other => Err(ConfigError::UnknownEnvironment(other.to_string())),
    }
}
