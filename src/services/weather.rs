use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const OPEN_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub city: String,
    pub temperature: String,
    pub description: String,
    pub humidity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<String>,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch(&self, city: &str) -> anyhow::Result<WeatherReport>;

    /// Whether reports are canned sample data rather than live lookups.
    fn is_sample(&self) -> bool {
        false
    }
}

pub struct SampleWeatherProvider;

#[async_trait]
impl WeatherProvider for SampleWeatherProvider {
    async fn fetch(&self, city: &str) -> anyhow::Result<WeatherReport> {
        Ok(WeatherReport {
            city: city.to_string(),
            temperature: "72°F".to_string(),
            description: "partly cloudy".to_string(),
            humidity: "65%".to_string(),
            pressure: None,
            wind_speed: None,
        })
    }

    fn is_sample(&self) -> bool {
        true
    }
}

pub struct OpenWeatherProvider {
    client: reqwest::Client,
    api_key: String,
}

impl OpenWeatherProvider {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }
}

#[derive(Deserialize)]
struct OpenWeatherResponse {
    name: String,
    main: OpenWeatherMain,
    weather: Vec<OpenWeatherCondition>,
    wind: OpenWeatherWind,
}

#[derive(Deserialize)]
struct OpenWeatherMain {
    temp: f64,
    humidity: u32,
    pressure: u32,
}

#[derive(Deserialize)]
struct OpenWeatherCondition {
    description: String,
}

#[derive(Deserialize)]
struct OpenWeatherWind {
    speed: f64,
}

impl From<OpenWeatherResponse> for WeatherReport {
    fn from(value: OpenWeatherResponse) -> Self {
        let description = value
            .weather
            .into_iter()
            .next()
            .map(|condition| condition.description)
            .unwrap_or_default();

        Self {
            city: value.name,
            temperature: format!("{:.0}°F", value.main.temp),
            description,
            humidity: format!("{}%", value.main.humidity),
            pressure: Some(format!("{} hPa", value.main.pressure)),
            wind_speed: Some(format!("{} mph", value.wind.speed)),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch(&self, city: &str) -> anyhow::Result<WeatherReport> {
        let response: OpenWeatherResponse = self
            .client
            .get(OPEN_WEATHER_URL)
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "imperial")])
            .send()
            .await
            .context("Failed to get weather data")?
            .error_for_status()
            .context("Failed to get weather data")?
            .json()
            .await
            .context("Invalid weather data format")?;

        Ok(response.into())
    }
}
