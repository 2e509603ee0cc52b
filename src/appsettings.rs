use std::time::Duration;

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AssistantSettings {
    pub default_city: String,
    pub default_country: String,
    pub wake_word: String,
    pub timezone: Tz,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ReminderSettings {
    pub path: String,
    pub check_interval_secs: u64,
}

impl ReminderSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ClassifierSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl ClassifierSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ApiKeySettings {
    pub api_key: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub assistant: AssistantSettings,
    pub reminders: ReminderSettings,
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub weather: ApiKeySettings,
    #[serde(default)]
    pub news: ApiKeySettings,
    pub services: ServiceSettings,
}

impl AppSettings {
    /// Reads `appsettings`, `appsettings.local` and `APP__`-prefixed
    /// environment variables on top of the built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("appsettings").required(false))
                .add_source(File::with_name("appsettings.local").required(false))
                .add_source(
                    Environment::with_prefix("APP")
                        .prefix_separator("__")
                        .separator("__"),
                ),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let settings = builder
            .set_default("assistant.default_city", "New York")?
            .set_default("assistant.default_country", "us")?
            .set_default("assistant.wake_word", "assistant")?
            .set_default("assistant.timezone", "UTC")?
            .set_default("reminders.path", "reminders.json")?
            .set_default("reminders.check_interval_secs", 30)?
            .set_default("classifier.model", "gemini-1.5-flash")?
            .set_default("classifier.timeout_secs", 10)?
            .set_default("services.timeout_secs", 10)?
            .build()?;

        settings.try_deserialize()
    }
}

/// Keys that are set but blank count as missing.
pub fn configured_key(key: &Option<String>) -> Option<&str> {
    key.as_deref().map(str::trim).filter(|key| !key.is_empty())
}
