use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    classifier::ChainedClassifier,
    common::Clock,
    dialogue::{DialogueState, DialogueStorage, SessionDialogue},
    intent::{Classification, Intent, NewsCategory},
    parsing::ParsedTime,
    reminder::{Reminder, ReminderId, ReminderTime},
    services::{NewsProvider, WeatherProvider},
    storage::{NewReminder, ReminderStorage, StorageError, UpdateReminder},
};

#[cfg(test)]
mod tests;

const HELP_TEXT: &str = "I can help you with:
• Time and date information
• Weather updates for any city worldwide
• Latest news headlines from various categories
• Setting and managing reminders

Commands you can try:
• \"What time is it?\"
• \"Weather in Mumbai\" / \"London weather\" / \"Temperature in Dubai\"
• \"Latest news\" / \"Technology news\"
• \"Remind me to call mom in 10 minutes\"
• \"Show my reminders\"";

const HELP_COMMANDS: [&str; 6] = ["time", "date", "weather", "news", "reminders", "help"];

const UNKNOWN_REPLY: &str =
    "I'm not sure how to help with that. Try asking about time, weather, news, or reminders.";
const UNKNOWN_SUGGESTION: &str =
    "Try commands like \"what time is it\", \"weather\", \"news\", or \"remind me to...\"";

const REMINDER_EXAMPLE: &str = "Try something like 'remind me to call mom in 10 minutes'";

/// Structured outcome of a single command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub action: String,
    pub response: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok(action: &str, response: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            action: action.to_string(),
            response: response.into(),
            data,
            error: None,
        }
    }

    pub fn failed(action: &str, response: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            action: action.to_string(),
            response: response.into(),
            data: json!({}),
            error: Some(error.into()),
        }
    }
}

/// Turns commands into actions, carrying reminder dialogues across commands of
/// the same session.
pub struct CommandProcessor {
    classifier: ChainedClassifier,
    storage: Arc<dyn ReminderStorage>,
    weather: Arc<dyn WeatherProvider>,
    news: Arc<dyn NewsProvider>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    dialogues: DialogueStorage,
    wake_word: Option<Regex>,
}

impl CommandProcessor {
    pub fn new(
        classifier: ChainedClassifier,
        storage: Arc<dyn ReminderStorage>,
        weather: Arc<dyn WeatherProvider>,
        news: Arc<dyn NewsProvider>,
        clock: Arc<dyn Clock>,
        tz: Tz,
    ) -> Self {
        Self {
            classifier,
            storage,
            weather,
            news,
            clock,
            tz,
            dialogues: DialogueStorage::new(),
            wake_word: None,
        }
    }

    pub fn with_wake_word(mut self, wake_word: &str) -> Self {
        let wake_word = wake_word.trim();
        self.wake_word = (!wake_word.is_empty()).then(|| {
            Regex::new(&format!("(?i){}", regex::escape(wake_word)))
                .expect("Escaped wake word is a valid pattern.")
        });
        self
    }

    #[cfg(test)]
    pub(crate) fn dialogues(&self) -> &DialogueStorage {
        &self.dialogues
    }

    pub async fn process(&self, session: &str, command: &str) -> CommandResponse {
        let (command, now, dialogue) = self.begin(session, command).await;
        let mut state = dialogue.lock().await;

        let response = match state.take() {
            DialogueState::AwaitingReminderText { pending_time } => {
                self.complete_reminder(&command, pending_time, now).await
            }
            DialogueState::Empty => {
                let classification = self.classify(&command, now).await;
                self.dispatch(classification, &mut state, now).await
            }
        };

        drop(state);
        self.dialogues.release(session, dialogue).await;
        response
    }

    /// Like [`CommandProcessor::process`], but anything other than a reminder
    /// is rejected instead of answered.
    pub async fn add_reminder(&self, session: &str, command: &str) -> CommandResponse {
        let (command, now, dialogue) = self.begin(session, command).await;
        let mut state = dialogue.lock().await;

        let response = match state.take() {
            DialogueState::AwaitingReminderText { pending_time } => {
                self.complete_reminder(&command, pending_time, now).await
            }
            DialogueState::Empty => {
                let classification = self.classify(&command, now).await;
                if matches!(
                    classification.intent,
                    Intent::ReminderSet { .. } | Intent::ReminderSetFailed { .. }
                ) {
                    self.dispatch(classification, &mut state, now).await
                } else {
                    CommandResponse::failed(
                        "reminder_set",
                        format!("I couldn't understand the reminder format. {REMINDER_EXAMPLE}"),
                        "Could not parse reminder",
                    )
                }
            }
        };

        drop(state);
        self.dialogues.release(session, dialogue).await;
        response
    }

    pub async fn list_reminders(&self) -> CommandResponse {
        let reminders = match self.storage.get_upcoming(self.clock.now()).await {
            Ok(reminders) => reminders,
            Err(err) => {
                log::error!("Could not read reminders: {}", err);
                return CommandResponse::failed(
                    "reminder_list",
                    format!("Error getting reminders: {err}"),
                    err.to_string(),
                );
            }
        };

        let response = match reminders.as_slice() {
            [] => "You have no upcoming reminders".to_string(),
            [reminder] => format!(
                "You have 1 upcoming reminder: '{}' at {}",
                reminder.text,
                reminder.time.formatted(self.tz)
            ),
            reminders => {
                let lines = reminders
                    .iter()
                    .enumerate()
                    .map(|(i, reminder)| {
                        format!("{}. '{}' at {}", i + 1, reminder.text, reminder.time.formatted(self.tz))
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("You have {} upcoming reminders:\n{}", reminders.len(), lines)
            }
        };

        let data = reminders
            .iter()
            .map(|reminder| self.reminder_view(reminder))
            .collect();
        CommandResponse::ok("reminder_list", response, Value::Array(data))
    }

    pub async fn delete_reminder(&self, id: ReminderId) -> CommandResponse {
        match self.storage.delete(id).await {
            Ok(reminder) => {
                log::info!("Deleted reminder {}", reminder.id);
                CommandResponse::ok(
                    "reminder_delete",
                    "Reminder deleted successfully",
                    self.reminder_view(&reminder),
                )
            }
            Err(StorageError::NotFound(_)) => CommandResponse::failed(
                "reminder_delete",
                "Could not find that reminder to delete",
                "Reminder not found",
            ),
            Err(err) => {
                log::error!("Could not delete reminder {}: {}", id, err);
                CommandResponse::failed(
                    "reminder_delete",
                    format!("Error deleting reminder: {err}"),
                    err.to_string(),
                )
            }
        }
    }

    pub async fn update_reminder(
        &self,
        id: ReminderId,
        text: &str,
        time: DateTime<Utc>,
    ) -> CommandResponse {
        let text = text.trim();
        if text.is_empty() {
            return CommandResponse::failed(
                "reminder_update",
                "Please provide both text and time for the reminder",
                "Missing text or time",
            );
        }

        let update = UpdateReminder {
            id,
            text: Some(text.to_string()),
            time: Some(ReminderTime::new(time)),
        };
        match self.storage.update(update).await {
            Ok(reminder) => {
                log::info!("Updated reminder {}", reminder.id);
                CommandResponse::ok(
                    "reminder_update",
                    "Reminder updated successfully",
                    self.reminder_view(&reminder),
                )
            }
            Err(StorageError::NotFound(_)) => CommandResponse::failed(
                "reminder_update",
                "Could not find that reminder to update",
                "Reminder not found",
            ),
            Err(err) => {
                log::error!("Could not update reminder {}: {}", id, err);
                CommandResponse::failed(
                    "reminder_update",
                    format!("Error updating reminder: {err}"),
                    err.to_string(),
                )
            }
        }
    }

    pub async fn clear_reminders(&self) -> CommandResponse {
        match self.storage.clear().await {
            Ok(()) => {
                log::info!("Cleared all reminders");
                CommandResponse::ok("reminder_clear", "All reminders cleared successfully", json!({}))
            }
            Err(err) => {
                log::error!("Could not clear reminders: {}", err);
                CommandResponse::failed(
                    "reminder_clear",
                    "Could not clear reminders",
                    "Failed to clear reminders",
                )
            }
        }
    }

    async fn begin(&self, session: &str, command: &str) -> (String, DateTime<Utc>, SessionDialogue) {
        let command = self.strip_wake_word(command);
        let dialogue = self.dialogues.dialogue(session).await;
        (command, self.clock.now(), dialogue)
    }

    async fn classify(&self, command: &str, now: DateTime<Utc>) -> Classification {
        let classification = self.classifier.classify(command, now).await;
        log::debug!(
            "Classified {:?} as {} ({:.2})",
            command,
            classification.intent.action(),
            classification.confidence
        );
        classification
    }

    fn strip_wake_word(&self, command: &str) -> String {
        match &self.wake_word {
            Some(wake_word) => wake_word.replace_all(command, "").trim().to_string(),
            None => command.trim().to_string(),
        }
    }

    async fn dispatch(
        &self,
        classification: Classification,
        state: &mut DialogueState,
        now: DateTime<Utc>,
    ) -> CommandResponse {
        let Classification { intent, reply, .. } = classification;

        match intent {
            Intent::Time => self.tell_time(reply, now),
            Intent::Weather { city } => self.weather(&city).await,
            Intent::News { category } => self.news(category).await,
            Intent::ReminderSet { text, .. } if text.trim().is_empty() => {
                log::debug!("Reminder has a time but nothing to remind about");
                CommandResponse::failed(
                    "reminder_set",
                    format!("I couldn't tell what to remind you about. {REMINDER_EXAMPLE}"),
                    "Missing reminder text",
                )
            }
            Intent::ReminderSet { text, time } => {
                let reply = reply.unwrap_or_else(|| format!("Setting reminder: {text}"));
                self.set_reminder(text, time, reply, now).await
            }
            Intent::ReminderSetFailed { error } => {
                log::debug!("Reminder time was not understood: {}", error);
                CommandResponse::failed(
                    "reminder_set",
                    format!("I couldn't understand when you want to be reminded. {REMINDER_EXAMPLE}"),
                    "Could not parse time",
                )
            }
            Intent::ReminderIncomplete { time } => {
                if let Some(replaced) = state.await_text(time) {
                    log::info!("Replacing pending reminder time {}", replaced.at);
                }

                let reminder_time = ReminderTime::new(time.at);
                let reply = reply.unwrap_or_else(|| {
                    format!(
                        "Okay, I've set a reminder for {}. What should I remind you about?",
                        time.at.with_timezone(&self.tz).format("%I:%M %p")
                    )
                });
                CommandResponse::ok(
                    "reminder_incomplete",
                    reply,
                    json!({
                        "reminder_incomplete": true,
                        "time": reminder_time.to_rfc3339(),
                        "formatted_time": reminder_time.formatted(self.tz),
                    }),
                )
            }
            Intent::ReminderIncompleteFailed { error } => {
                log::debug!("Reminder time was not understood: {}", error);
                CommandResponse::failed(
                    "reminder_incomplete",
                    "I couldn't understand the time. Please try again with a specific time like '12:43 PM' or 'in 10 minutes'.",
                    "Could not parse time",
                )
            }
            Intent::ReminderList => self.list_reminders().await,
            Intent::Help => CommandResponse::ok(
                "help",
                reply.unwrap_or_else(|| HELP_TEXT.to_string()),
                json!({ "help": true, "commands": HELP_COMMANDS }),
            ),
            Intent::Unknown => CommandResponse::ok(
                "unknown",
                reply.unwrap_or_else(|| UNKNOWN_REPLY.to_string()),
                json!({ "suggestion": UNKNOWN_SUGGESTION }),
            ),
        }
    }

    async fn complete_reminder(
        &self,
        command: &str,
        pending_time: ParsedTime,
        now: DateTime<Utc>,
    ) -> CommandResponse {
        let text = command.trim();
        if text.is_empty() {
            return CommandResponse::failed(
                "reminder_set",
                "Sorry, I couldn't complete your reminder. Please try again.",
                "Could not complete reminder",
            );
        }

        log::info!("Completing pending reminder with text {:?}", text);
        self.set_reminder(text.to_string(), pending_time, format!("Setting reminder: {text}"), now)
            .await
    }

    async fn set_reminder(
        &self,
        text: String,
        time: ParsedTime,
        reply: String,
        now: DateTime<Utc>,
    ) -> CommandResponse {
        let new_reminder = NewReminder {
            text,
            time: ReminderTime::new(time.at),
            created_at: now,
        };

        match self.storage.insert(new_reminder).await {
            Ok(reminder) => CommandResponse::ok("reminder_set", reply, self.reminder_view(&reminder)),
            Err(err) => {
                log::error!("Could not save reminder: {}", err);
                CommandResponse::failed(
                    "reminder_set",
                    "I couldn't set that reminder. Please try again.",
                    "Failed to save reminder",
                )
            }
        }
    }

    fn tell_time(&self, reply: Option<String>, now: DateTime<Utc>) -> CommandResponse {
        let local = now.with_timezone(&self.tz);
        let time = local.format("%I:%M %p").to_string();
        let date = local.format("%A, %B %d, %Y").to_string();

        CommandResponse::ok(
            "time",
            reply.unwrap_or_else(|| format!("The current time is {time}")),
            json!({ "time": time, "date": date }),
        )
    }

    async fn weather(&self, city: &str) -> CommandResponse {
        let report = match self.weather.fetch(city).await {
            Ok(report) => report,
            Err(err) => {
                log::error!("Weather lookup for {} failed: {:#}", city, err);
                return CommandResponse::failed(
                    "weather",
                    format!("Sorry, I couldn't get weather information: {err}"),
                    err.to_string(),
                );
            }
        };

        let is_mock = self.weather.is_sample();
        let generated = self
            .classifier
            .generate_natural_response(&json!({ "action": "weather", "success": true, "data": report }))
            .await;
        let response = generated.unwrap_or_else(|| {
            let summary = format!(
                "The weather in {} is {} with {}",
                report.city, report.temperature, report.description
            );
            if is_mock {
                format!("{summary}. (Sample data - please set up weather API)")
            } else {
                summary
            }
        });

        let mut data = json!(report);
        data["is_mock"] = json!(is_mock);
        CommandResponse::ok("weather", response, data)
    }

    async fn news(&self, category: NewsCategory) -> CommandResponse {
        let headlines = match self.news.fetch(category).await {
            Ok(headlines) => headlines,
            Err(err) => {
                log::error!("News lookup for {} failed: {:#}", category, err);
                return CommandResponse::failed(
                    "news",
                    format!("Sorry, I couldn't get news: {err}"),
                    err.to_string(),
                );
            }
        };

        let is_mock = self.news.is_sample();
        let generated = self
            .classifier
            .generate_natural_response(&json!({
                "action": "news",
                "success": true,
                "data": headlines,
                "category": category,
            }))
            .await;
        let response = generated.unwrap_or_else(|| {
            if is_mock {
                format!("Here are some sample {category} headlines")
            } else {
                format!("Here are the top {category} news headlines")
            }
        });

        CommandResponse::ok(
            "news",
            response,
            json!({ "category": category, "headlines": headlines, "is_mock": is_mock }),
        )
    }

    fn reminder_view(&self, reminder: &Reminder) -> Value {
        json!({
            "id": reminder.id,
            "text": reminder.text,
            "time": reminder.time.to_rfc3339(),
            "formatted_time": reminder.time.formatted(self.tz),
            "completed": reminder.completed,
        })
    }
}
