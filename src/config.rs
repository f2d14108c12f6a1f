use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::domain::{Mode, DEFAULT_EVENT_ID};
use crate::error::{LoadgenError, Result};

pub const DEFAULT_BASE_URL: &str = "http://host.docker.internal:8080";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    pub load: LoadConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub base_url: String,
    pub mode: Mode,
    pub event_id: i64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            mode: Mode::Safe,
            event_id: DEFAULT_EVENT_ID,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub virtual_users: u32,
    pub iterations_per_user: u32,
    pub max_duration_seconds: u64,
    pub request_timeout_seconds: u64,
    /// 0 disables progress logging
    pub progress_interval_seconds: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            virtual_users: 50,
            iterations_per_user: 20,
            max_duration_seconds: 30,
            request_timeout_seconds: 10,
            progress_interval_seconds: 5,
        }
    }
}

impl LoadConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn progress_interval(&self) -> Option<Duration> {
        (self.progress_interval_seconds > 0)
            .then(|| Duration::from_secs(self.progress_interval_seconds))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Json => "json",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    pub format: ReportFormat,
    /// Snapshot the event inventory before and after the run
    pub audit_inventory: bool,
}

impl Config {
    /// Load from defaults, `config/default.toml`, `LOADGEN__*` and finally
    /// the plain `BASE_URL` / `MODE` variables.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("LOADGEN__").split("__"))
            .merge(Env::raw().filter_map(|key| match key.as_str() {
                "BASE_URL" => Some("target.base_url".into()),
                "MODE" => Some("target.mode".into()),
                _ => None,
            }))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = reqwest::Url::parse(&self.target.base_url).map_err(|e| {
            LoadgenError::InvalidConfig(format!(
                "base_url {:?} is not a valid URL: {e}",
                self.target.base_url
            ))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(LoadgenError::InvalidConfig(format!(
                "base_url must use http or https, got {}",
                base_url.scheme()
            )));
        }

        if self.load.virtual_users == 0 {
            return Err(LoadgenError::InvalidConfig(
                "virtual_users must be at least 1".to_string(),
            ));
        }

        if self.load.iterations_per_user == 0 {
            return Err(LoadgenError::InvalidConfig(
                "iterations_per_user must be at least 1".to_string(),
            ));
        }

        if self.load.max_duration_seconds == 0 {
            return Err(LoadgenError::InvalidConfig(
                "max_duration_seconds must be at least 1".to_string(),
            ));
        }

        if self.load.request_timeout_seconds == 0 {
            return Err(LoadgenError::InvalidConfig(
                "request_timeout_seconds must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Full URL of the booking route selected by `target.mode`
    pub fn booking_url(&self) -> String {
        format!(
            "{}{}",
            self.target.base_url.trim_end_matches('/'),
            self.target.mode.endpoint()
        )
    }
}
