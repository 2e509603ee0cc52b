use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{TimeDelta, TimeZone};

use crate::{
    classifier::{AiClassifier, KeywordClassifier, LanguageModel},
    common::test_clock::FixedClock,
    parsing::{CommandParser, TimeExpressionParser},
    services::{SampleNewsProvider, SampleWeatherProvider, WeatherReport},
    storage::InMemoryReminderStorage,
};

use super::*;

const SESSION: &str = "kitchen";

struct ScriptedModel {
    reply: &'static str,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.reply.to_string())
    }
}

/// Yields before answering so overlapping commands interleave. Commands that
/// set a reminder are incomplete, everything else asks for the time.
struct YieldingModel;

#[async_trait]
impl LanguageModel for YieldingModel {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        tokio::task::yield_now().await;
        if prompt.contains("Command: \"set reminder") {
            Ok(INCOMPLETE_AT_12_43.to_string())
        } else {
            Ok(r#"{"intent": "time"}"#.to_string())
        }
    }
}

struct BrokenStorage;

#[async_trait]
impl ReminderStorage for BrokenStorage {
    async fn insert(&self, _reminder: NewReminder) -> Result<Reminder, StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk full")))
    }

    async fn update(&self, _reminder: UpdateReminder) -> Result<Reminder, StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk full")))
    }

    async fn delete(&self, _id: ReminderId) -> Result<Reminder, StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk full")))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk full")))
    }

    async fn get_all(&self) -> Result<Vec<Reminder>, StorageError> {
        Ok(Vec::new())
    }

    async fn get_upcoming(&self, _now: DateTime<Utc>) -> Result<Vec<Reminder>, StorageError> {
        Ok(Vec::new())
    }

    async fn take_due(&self, _now: DateTime<Utc>) -> Result<Vec<Reminder>, StorageError> {
        Ok(Vec::new())
    }
}

struct OfflineWeather;

#[async_trait]
impl WeatherProvider for OfflineWeather {
    async fn fetch(&self, _city: &str) -> anyhow::Result<WeatherReport> {
        anyhow::bail!("City not found")
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap()
}

fn parser(tz: Tz) -> CommandParser {
    CommandParser::new(TimeExpressionParser::new(tz), "New York")
}

struct TestContext {
    storage: Arc<InMemoryReminderStorage>,
    clock: Arc<FixedClock>,
    model_calls: Arc<AtomicUsize>,
    processor: CommandProcessor,
}

impl TestContext {
    fn keyword_only() -> Self {
        Self::build(ChainedClassifier::keyword_only(KeywordClassifier::new(parser(Tz::UTC))), Tz::UTC)
    }

    fn with_model(reply: &'static str) -> Self {
        let model_calls = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel {
            reply,
            calls: model_calls.clone(),
        };
        let classifier = ChainedClassifier::new(
            Some(Box::new(AiClassifier::new(model, parser(Tz::UTC)))),
            KeywordClassifier::new(parser(Tz::UTC)),
            std::time::Duration::from_secs(10),
        );

        Self {
            model_calls,
            ..Self::build(classifier, Tz::UTC)
        }
    }

    fn with_yielding_model() -> Self {
        let classifier = ChainedClassifier::new(
            Some(Box::new(AiClassifier::new(YieldingModel, parser(Tz::UTC)))),
            KeywordClassifier::new(parser(Tz::UTC)),
            std::time::Duration::from_secs(10),
        );

        Self::build(classifier, Tz::UTC)
    }

    fn build(classifier: ChainedClassifier, tz: Tz) -> Self {
        let storage = Arc::new(InMemoryReminderStorage::new());
        let clock = Arc::new(FixedClock::new(now()));
        let processor = CommandProcessor::new(
            classifier,
            storage.clone(),
            Arc::new(SampleWeatherProvider),
            Arc::new(SampleNewsProvider),
            clock.clone(),
            tz,
        );

        Self {
            storage,
            clock,
            model_calls: Arc::new(AtomicUsize::new(0)),
            processor,
        }
    }

    async fn process(&self, command: &str) -> CommandResponse {
        self.processor.process(SESSION, command).await
    }
}

const INCOMPLETE_AT_12_43: &str = r#"{"intent": "reminder_incomplete", "entities": {"time_expression": "at 12:43"}, "confidence": 0.9}"#;

#[tokio::test]
async fn reminder_with_relative_time_is_stored() {
    let ctx = TestContext::keyword_only();

    let response = ctx.process("remind me to call mom in 10 minutes").await;

    assert!(response.success);
    assert_eq!(response.action, "reminder_set");
    assert_eq!(response.response, "Setting reminder: call mom");
    assert_eq!(response.data["text"], "call mom");
    assert_eq!(response.data["time"], (now() + TimeDelta::minutes(10)).to_rfc3339());
    assert_eq!(response.data["formatted_time"], "12:10 PM on May 31");

    let stored = ctx.storage.get_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text, "call mom");
    assert_eq!(stored[0].created, now());
}

#[tokio::test]
async fn incomplete_reminder_waits_for_its_text() {
    let ctx = TestContext::with_model(INCOMPLETE_AT_12_43);
    let expected_time = Utc.with_ymd_and_hms(2025, 5, 31, 12, 43, 0).unwrap();

    let first = ctx.process("set reminder at 12:43").await;

    assert!(first.success);
    assert_eq!(first.action, "reminder_incomplete");
    assert_eq!(
        first.response,
        "Okay, I've set a reminder for 12:43 PM. What should I remind you about?"
    );
    assert_eq!(first.data["reminder_incomplete"], true);
    assert_eq!(first.data["formatted_time"], "12:43 PM on May 31");
    assert!(matches!(
        ctx.processor.dialogues().state(SESSION).await,
        DialogueState::AwaitingReminderText { .. }
    ));

    let second = ctx.process("call dad").await;

    assert!(second.success);
    assert_eq!(second.action, "reminder_set");
    assert_eq!(second.data["text"], "call dad");
    assert_eq!(second.data["time"], expected_time.to_rfc3339());
    assert_eq!(ctx.processor.dialogues().state(SESSION).await, DialogueState::Empty);
    assert_eq!(ctx.model_calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn text_while_awaiting_is_never_reclassified() {
    let ctx = TestContext::with_model(INCOMPLETE_AT_12_43);
    ctx.process("set reminder at 12:43").await;

    let response = ctx.process("weather in Paris").await;

    assert_eq!(response.action, "reminder_set");
    assert_eq!(response.data["text"], "weather in Paris");
    assert_eq!(ctx.model_calls.load(Ordering::Relaxed), 1);

    let after = ctx.process("weather in Paris").await;
    assert_eq!(after.action, "reminder_incomplete");
}

#[tokio::test]
async fn empty_text_while_awaiting_fails_and_resets() {
    let ctx = TestContext::with_model(INCOMPLETE_AT_12_43);
    ctx.process("set reminder at 12:43").await;

    let response = ctx.process("   ").await;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Could not complete reminder"));
    assert_eq!(ctx.processor.dialogues().state(SESSION).await, DialogueState::Empty);
    assert!(ctx.storage.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn pending_reminder_belongs_to_its_session() {
    let ctx = TestContext::with_model(INCOMPLETE_AT_12_43);
    ctx.process("set reminder at 12:43").await;

    let other = ctx.processor.process("bedroom", "set reminder at 12:43").await;

    assert_eq!(other.action, "reminder_incomplete");
    assert_eq!(ctx.model_calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn overlapping_commands_of_a_session_run_one_at_a_time() {
    let ctx = TestContext::with_yielding_model();

    let (first, second) = tokio::join!(
        ctx.process("set reminder at 12:43"),
        ctx.process("call dad")
    );

    assert_eq!(first.action, "reminder_incomplete");
    assert_eq!(second.action, "reminder_set");
    assert_eq!(second.data["text"], "call dad");
    assert_eq!(ctx.storage.get_all().await.unwrap().len(), 1);
    assert_eq!(ctx.processor.dialogues().state(SESSION).await, DialogueState::Empty);
}

#[tokio::test]
async fn pending_reminder_is_completed_by_one_of_overlapping_commands() {
    let ctx = TestContext::with_yielding_model();
    ctx.process("set reminder at 12:43").await;

    let (first, second) = tokio::join!(ctx.process("call dad"), ctx.process("what time is it"));

    let mut actions = vec![first.action.clone(), second.action.clone()];
    actions.sort();
    assert_eq!(actions, vec!["reminder_set", "time"]);

    let stored = ctx.storage.get_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].text == "call dad" || stored[0].text == "what time is it");
    assert_eq!(ctx.processor.dialogues().state(SESSION).await, DialogueState::Empty);
}

#[tokio::test]
async fn finished_dialogues_are_forgotten() {
    let ctx = TestContext::with_model(INCOMPLETE_AT_12_43);

    ctx.process("set reminder at 12:43").await;
    assert_eq!(ctx.processor.dialogues().session_count().await, 1);

    ctx.process("call dad").await;
    assert_eq!(ctx.processor.dialogues().session_count().await, 0);

    ctx.processor.add_reminder("bedroom", "what time is it").await;
    assert_eq!(ctx.processor.dialogues().session_count().await, 0);
}

#[tokio::test]
async fn reminder_without_text_is_rejected() {
    let ctx = TestContext::keyword_only();

    let response = ctx.process("set reminder at 12:43").await;

    assert!(!response.success);
    assert_eq!(response.action, "reminder_set");
    assert_eq!(response.error.as_deref(), Some("Missing reminder text"));
    assert!(ctx.storage.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn unparseable_incomplete_time_keeps_dialogue_empty() {
    let ctx = TestContext::with_model(
        r#"{"intent": "reminder_incomplete", "entities": {"time_expression": "later"}}"#,
    );

    let response = ctx.process("remind me later").await;

    assert!(!response.success);
    assert_eq!(response.action, "reminder_incomplete");
    assert_eq!(response.error.as_deref(), Some("Could not parse time"));
    assert_eq!(ctx.processor.dialogues().state(SESSION).await, DialogueState::Empty);
}

#[tokio::test]
async fn weather_and_news_use_sample_data() {
    let ctx = TestContext::keyword_only();

    let weather = ctx.process("weather in Mumbai").await;
    let same_city = ctx.process("mumbai weather").await;
    let news = ctx.process("tech news").await;

    assert!(weather.success);
    assert_eq!(weather.data["city"], "Mumbai");
    assert_eq!(weather.data["is_mock"], true);
    assert_eq!(
        weather.response,
        "The weather in Mumbai is 72°F with partly cloudy. (Sample data - please set up weather API)"
    );
    assert_eq!(same_city.data["city"], "Mumbai");

    assert_eq!(news.data["category"], "technology");
    assert_eq!(news.data["headlines"].as_array().unwrap().len(), 3);
    assert_eq!(news.response, "Here are some sample technology headlines");
}

#[tokio::test]
async fn weather_failure_is_reported() {
    let processor = CommandProcessor::new(
        ChainedClassifier::keyword_only(KeywordClassifier::new(parser(Tz::UTC))),
        Arc::new(InMemoryReminderStorage::new()),
        Arc::new(OfflineWeather),
        Arc::new(SampleNewsProvider),
        Arc::new(FixedClock::new(now())),
        Tz::UTC,
    );

    let response = processor.process(SESSION, "weather in Atlantis").await;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("City not found"));
}

#[tokio::test]
async fn unknown_command_gets_suggestion() {
    let ctx = TestContext::keyword_only();

    let response = ctx.process("tell me something").await;

    assert!(response.success);
    assert_eq!(response.action, "unknown");
    assert_eq!(response.data["suggestion"], UNKNOWN_SUGGESTION);
}

#[tokio::test]
async fn help_lists_commands() {
    let ctx = TestContext::keyword_only();

    let response = ctx.process("what can you do").await;

    assert_eq!(response.action, "help");
    assert_eq!(response.data["help"], true);
    assert_eq!(response.data["commands"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn time_is_told_in_configured_zone() {
    let ctx = TestContext::build(
        ChainedClassifier::keyword_only(KeywordClassifier::new(parser(Tz::Asia__Kolkata))),
        Tz::Asia__Kolkata,
    );

    let response = ctx.process("what time is it").await;

    assert_eq!(response.response, "The current time is 05:30 PM");
    assert_eq!(response.data["date"], "Saturday, May 31, 2025");
}

#[tokio::test]
async fn wake_word_is_removed_before_classification() {
    let ctx = TestContext::keyword_only();
    let processor = ctx.processor.with_wake_word("assistant");

    let response = processor
        .process(SESSION, "Assistant remind me to stretch in 5 minutes")
        .await;

    assert_eq!(response.data["text"], "stretch");
}

#[tokio::test]
async fn unparseable_reminder_time_is_reported() {
    let ctx = TestContext::keyword_only();

    let response = ctx.process("remind me to stretch in a while").await;

    assert!(!response.success);
    assert_eq!(response.action, "reminder_set");
    assert_eq!(response.error.as_deref(), Some("Could not parse time"));
}

#[tokio::test]
async fn failed_save_is_reported() {
    let processor = CommandProcessor::new(
        ChainedClassifier::keyword_only(KeywordClassifier::new(parser(Tz::UTC))),
        Arc::new(BrokenStorage),
        Arc::new(SampleWeatherProvider),
        Arc::new(SampleNewsProvider),
        Arc::new(FixedClock::new(now())),
        Tz::UTC,
    );

    let response = processor
        .process(SESSION, "remind me to call mom in 10 minutes")
        .await;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Failed to save reminder"));
    assert_eq!(response.response, "I couldn't set that reminder. Please try again.");
}

#[tokio::test]
async fn listing_is_ordered_and_repeatable() {
    let ctx = TestContext::keyword_only();
    ctx.process("remind me to water plants in 20 minutes").await;
    ctx.process("remind me to call mom in 10 minutes").await;

    let first = ctx.processor.list_reminders().await;
    let second = ctx.processor.list_reminders().await;

    assert_eq!(
        first.response,
        "You have 2 upcoming reminders:\n1. 'call mom' at 12:10 PM on May 31\n2. 'water plants' at 12:20 PM on May 31"
    );
    assert_eq!(first, second);
}

#[tokio::test]
async fn listing_through_a_command() {
    let ctx = TestContext::keyword_only();
    ctx.process("remind me to call mom in 10 minutes").await;

    let response = ctx.process("show my reminders").await;

    assert_eq!(response.action, "reminder_list");
    assert_eq!(
        response.response,
        "You have 1 upcoming reminder: 'call mom' at 12:10 PM on May 31"
    );
}

#[tokio::test]
async fn passed_reminders_are_not_upcoming() {
    let ctx = TestContext::keyword_only();
    ctx.process("remind me to call mom in 10 minutes").await;

    ctx.clock.advance(TimeDelta::minutes(11));
    let response = ctx.processor.list_reminders().await;

    assert_eq!(response.response, "You have no upcoming reminders");
}

#[tokio::test]
async fn clearing_leaves_nothing_upcoming() {
    let ctx = TestContext::keyword_only();
    ctx.process("remind me to call mom in 10 minutes").await;
    ctx.process("remind me to water plants in 20 minutes").await;

    let cleared = ctx.processor.clear_reminders().await;
    let listed = ctx.processor.list_reminders().await;

    assert!(cleared.success);
    assert_eq!(listed.response, "You have no upcoming reminders");
    assert_eq!(listed.data, json!([]));
}

#[tokio::test]
async fn add_reminder_rejects_other_intents() {
    let ctx = TestContext::keyword_only();

    let rejected = ctx.processor.add_reminder(SESSION, "what time is it").await;
    let accepted = ctx
        .processor
        .add_reminder(SESSION, "remind me to call mom at 3:30 pm")
        .await;

    assert!(!rejected.success);
    assert_eq!(rejected.error.as_deref(), Some("Could not parse reminder"));
    assert!(accepted.success);
    assert_eq!(accepted.data["formatted_time"], "03:30 PM on May 31");
    assert_eq!(ctx.storage.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_reminders_are_not_found() {
    let ctx = TestContext::keyword_only();

    let deleted = ctx.processor.delete_reminder(42).await;
    let updated = ctx.processor.update_reminder(42, "stretch", now()).await;

    assert_eq!(deleted.error.as_deref(), Some("Reminder not found"));
    assert_eq!(updated.error.as_deref(), Some("Reminder not found"));
}

#[tokio::test]
async fn update_changes_text_and_time() {
    let ctx = TestContext::keyword_only();
    ctx.process("remind me to call mom in 10 minutes").await;
    let later = now() + TimeDelta::hours(2);

    let blank = ctx.processor.update_reminder(1, "  ", later).await;
    let updated = ctx.processor.update_reminder(1, "call dad", later).await;

    assert_eq!(blank.error.as_deref(), Some("Missing text or time"));
    assert!(updated.success);
    assert_eq!(updated.data["text"], "call dad");
    assert_eq!(updated.data["formatted_time"], "02:00 PM on May 31");
}

#[tokio::test]
async fn delete_removes_reminder() {
    let ctx = TestContext::keyword_only();
    ctx.process("remind me to call mom in 10 minutes").await;

    let deleted = ctx.processor.delete_reminder(1).await;

    assert!(deleted.success);
    assert!(ctx.storage.get_all().await.unwrap().is_empty());
}

#[test]
fn error_field_is_omitted_on_success() {
    let response = CommandResponse::ok("help", "Hi", json!({}));

    let serialized = serde_json::to_value(&response).unwrap();

    assert_eq!(
        serialized,
        json!({"success": true, "action": "help", "response": "Hi", "data": {}})
    );
}
