use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use thiserror::Error;

use crate::domain::source::{resolve_sources, SourceConfigError, SourceDescriptor, SourceSettings};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Source(#[from] SourceConfigError),
    #[error("browser.min_delay_ms ({min}) is greater than browser.max_delay_ms ({max})")]
    DelayRange { min: u64, max: u64 },
    #[error("{0} is not a supported environment. Use either `local` or `production`.")]
    UnknownEnvironment(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub browser: BrowserSettings,
    pub store: StoreSettings,
    pub structuring: StructuringSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    pub sources: Vec<SourceSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    #[serde(default)]
    pub window_maximized: bool,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub min_delay_ms: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_delay_ms: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub heading_wait_secs: u64,
    pub overlay_id: String,
}

impl BrowserSettings {
    pub fn pacing(&self) -> Pacing {
        Pacing {
            min: Duration::from_millis(self.min_delay_ms),
            max: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn heading_wait(&self) -> Duration {
        Duration::from_secs(self.heading_wait_secs)
    }
}

/// Bounds of the random pause taken before page operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Pacing {
    pub const NONE: Pacing = Pacing {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructuringSettings {
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    pub model: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_tokens: u32,
    pub instruction: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuringFailurePolicy {
    /// Any structuring failure stops the whole run.
    #[default]
    AbortRun,
    /// A structuring failure only fails its own source; the run moves on.
    SkipSource,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub on_structuring_failure: StructuringFailurePolicy,
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = SettingsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            _ => Err(SettingsError::UnknownEnvironment(s)),
        }
    }
}

impl Settings {
    /// Checks everything that can be checked before a browser is started and
    /// returns the resolved source list.
    pub fn validate(&self) -> Result<Vec<SourceDescriptor>, SettingsError> {
        if self.browser.min_delay_ms > self.browser.max_delay_ms {
            return Err(SettingsError::DelayRange {
                min: self.browser.min_delay_ms,
                max: self.browser.max_delay_ms,
            });
        }

        Ok(resolve_sources(&self.sources)?)
    }
}

pub fn get_configuration() -> Result<Settings, SettingsError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Foreign(Box::new(e)))?
        .join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(base_path.join("base.yaml")))
        .add_source(config::File::from(base_path.join(environment_filename)).required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<Settings>()?)
}
