use std::sync::Arc;

use anyhow::Context;
use hark::{
    appsettings::{AppSettings, configured_key},
    classifier::{AiClassifier, ChainedClassifier, GeminiClient, IntentClassifier, KeywordClassifier},
    common::{Clock, SystemClock},
    parsing::{CommandParser, TimeExpressionParser},
    processor::CommandProcessor,
    scheduling::{DueReminderChecker, LogDeliveryChannel},
    services::{
        NewsApiProvider, NewsProvider, OpenWeatherProvider, SampleNewsProvider,
        SampleWeatherProvider, WeatherProvider,
    },
    storage::{JsonFileReminderStorage, ReminderStorage},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

const SESSION: &str = "console";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = AppSettings::load().context("Could not load settings")?;
    let tz = settings.assistant.timezone;
    let parser = CommandParser::new(
        TimeExpressionParser::new(tz),
        settings.assistant.default_city.clone(),
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let storage: Arc<dyn ReminderStorage> = Arc::new(
        JsonFileReminderStorage::open(&settings.reminders.path)
            .await
            .with_context(|| format!("Could not open {}", settings.reminders.path))?,
    );

    let processor = CommandProcessor::new(
        classifier(&settings, parser),
        storage.clone(),
        weather_provider(&settings)?,
        news_provider(&settings)?,
        clock.clone(),
        tz,
    )
    .with_wake_word(&settings.assistant.wake_word);

    let cancellation_token = CancellationToken::new();
    let checker = DueReminderChecker::new(
        storage,
        Arc::new(LogDeliveryChannel),
        clock,
        settings.reminders.check_interval(),
    )
    .spawn(cancellation_token.clone());

    log::info!("Listening for commands on stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    let response = processor.process(SESSION, &line).await;
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                None => break,
            }
        }
    }

    cancellation_token.cancel();
    checker.await?;
    Ok(())
}

fn classifier(settings: &AppSettings, parser: CommandParser) -> ChainedClassifier {
    let fallback = KeywordClassifier::new(parser.clone());

    match configured_key(&settings.classifier.api_key) {
        Some(api_key) => {
            log::info!("Classifying commands with {}", settings.classifier.model);
            let model = GeminiClient::new(api_key, settings.classifier.model.clone());
            let primary: Box<dyn IntentClassifier> = Box::new(AiClassifier::new(model, parser));
            ChainedClassifier::new(Some(primary), fallback, settings.classifier.timeout())
        }
        None => {
            log::warn!("No classifier API key configured, using keyword rules only");
            ChainedClassifier::keyword_only(fallback)
        }
    }
}

fn weather_provider(settings: &AppSettings) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let timeout = std::time::Duration::from_secs(settings.services.timeout_secs);

    let provider: Arc<dyn WeatherProvider> = match configured_key(&settings.weather.api_key) {
        Some(api_key) => Arc::new(OpenWeatherProvider::new(api_key, timeout)?),
        None => {
            log::warn!("No weather API key configured, answering with sample data");
            Arc::new(SampleWeatherProvider)
        }
    };

    Ok(provider)
}

fn news_provider(settings: &AppSettings) -> anyhow::Result<Arc<dyn NewsProvider>> {
    let timeout = std::time::Duration::from_secs(settings.services.timeout_secs);

    let provider: Arc<dyn NewsProvider> = match configured_key(&settings.news.api_key) {
        Some(api_key) => Arc::new(NewsApiProvider::new(
            api_key,
            settings.assistant.default_country.clone(),
            timeout,
        )?),
        None => {
            log::warn!("No news API key configured, answering with sample headlines");
            Arc::new(SampleNewsProvider)
        }
    };

    Ok(provider)
}
