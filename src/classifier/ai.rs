use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    intent::{Classification, Intent, NewsCategory},
    parsing::CommandParser,
};

use super::{ClassifierError, IntentClassifier, LanguageModel};

const DEFAULT_CONFIDENCE: f32 = 0.8;

#[derive(Debug, Deserialize)]
struct ModelVerdict {
    intent: String,
    #[serde(default)]
    entities: HashMap<String, Value>,
    #[serde(default)]
    natural_response: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    DEFAULT_CONFIDENCE
}

impl ModelVerdict {
    fn entity(&self, key: &str) -> Option<&str> {
        self.entities
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Classifies commands by asking a [`LanguageModel`] for a JSON verdict.
pub struct AiClassifier<M> {
    model: M,
    parser: CommandParser,
}

impl<M: LanguageModel> AiClassifier<M> {
    pub fn new(model: M, parser: CommandParser) -> Self {
        Self { model, parser }
    }

    fn interpret(&self, verdict: ModelVerdict, command: &str, now: DateTime<Utc>) -> Classification {
        let intent = match verdict.intent.as_str() {
            "time" => Intent::Time,
            "weather" => Intent::Weather {
                city: verdict
                    .entity("city")
                    .map(str::to_string)
                    .unwrap_or_else(|| self.parser.extract_city(command)),
            },
            "news" => Intent::News {
                category: verdict
                    .entity("category")
                    .and_then(NewsCategory::from_label)
                    .unwrap_or(NewsCategory::General),
            },
            // Entities are advisory here, the command itself is parsed.
            "reminder_set" => match self.parser.parse_reminder_command(command, now) {
                Ok(draft) => Intent::ReminderSet {
                    text: draft.text,
                    time: draft.time,
                },
                Err(error) => Intent::ReminderSetFailed { error },
            },
            "reminder_incomplete" => {
                let expression = verdict.entity("time_expression").unwrap_or(command);
                match self.parser.time_parser().parse(expression, now) {
                    Ok(time) => Intent::ReminderIncomplete { time },
                    Err(error) => Intent::ReminderIncompleteFailed { error },
                }
            }
            "reminder_list" => Intent::ReminderList,
            "help" => Intent::Help,
            _ => Intent::Unknown,
        };

        let classification = Classification::new(intent, verdict.confidence.clamp(0.0, 1.0));
        match verdict.natural_response {
            Some(reply) if !reply.trim().is_empty() => classification.with_reply(reply.trim()),
            _ => classification,
        }
    }
}

#[async_trait]
impl<M: LanguageModel> IntentClassifier for AiClassifier<M> {
    async fn classify(
        &self,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<Classification, ClassifierError> {
        let reply = self
            .model
            .complete(&classification_prompt(command))
            .await
            .map_err(ClassifierError::Unavailable)?;
        let verdict = parse_verdict(&reply)?;

        log::debug!("Model classified {:?} as {}", command, verdict.intent);
        Ok(self.interpret(verdict, command, now))
    }

    async fn generate_natural_response(
        &self,
        context: &Value,
    ) -> Result<Option<String>, ClassifierError> {
        let Some(prompt) = response_prompt(context) else {
            return Ok(None);
        };

        let reply = self
            .model
            .complete(&prompt)
            .await
            .map_err(ClassifierError::Unavailable)?;
        Ok(Some(reply.trim().to_string()))
    }
}

fn parse_verdict(reply: &str) -> Result<ModelVerdict, ClassifierError> {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let unfenced = unfenced.strip_suffix("```").unwrap_or(unfenced).trim();

    serde_json::from_str(unfenced).map_err(|err| ClassifierError::MalformedResponse(err.to_string()))
}

fn classification_prompt(command: &str) -> String {
    format!(
        r#"You interpret commands given to a voice assistant.

Command: "{command}"

Answer with a single JSON object and nothing else, using these fields:
- "intent": one of "time", "weather", "news", "reminder_set", "reminder_incomplete", "reminder_list", "help", "unknown".
- "entities": an object whose keys depend on the intent:
  weather -> {{"city": "<city>"}}
  news -> {{"category": "general|technology|sports|business|health|science|entertainment"}}
  reminder_set -> {{"text": "<what to remember>", "time_expression": "<when>"}}
  reminder_incomplete -> {{"time_expression": "<when>"}} when a time is given but not what to remember
  anything else -> {{}}
- "natural_response": a short, friendly reply to the user. For reminder_incomplete, ask what the reminder is about.
- "confidence": a number from 0 to 1.

For example "Call mom in 10 minutes" is reminder_set with text "call mom" and time_expression "in 10 minutes",
"Set reminder at 12:43" is reminder_incomplete with time_expression "at 12:43",
and "Mumbai weather" is weather with city "Mumbai"."#
    )
}

fn response_prompt(context: &Value) -> Option<String> {
    let data = context.get("data")?;
    match context.get("action")?.as_str()? {
        "weather" => Some(format!(
            "Tell the user about the weather in a friendly, conversational sentence or two.\n\
             City: {}\nTemperature: {}\nConditions: {}\nHumidity: {}\nWind: {}",
            field(data, "city"),
            field(data, "temperature"),
            field(data, "description"),
            field(data, "humidity"),
            field(data, "wind_speed"),
        )),
        "news" => Some(format!(
            "Write a brief, friendly introduction to {} of the latest {} news headlines. Do not list them.",
            data.as_array().map(Vec::len).unwrap_or(0),
            context.get("category").and_then(Value::as_str).unwrap_or("general"),
        )),
        _ => None,
    }
}

fn field<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_reply_is_unwrapped() {
        let reply = "```json\n{\"intent\": \"time\", \"entities\": {}, \"natural_response\": \"Sure\", \"confidence\": 0.95}\n```";

        let verdict = parse_verdict(reply).unwrap();

        assert_eq!(verdict.intent, "time");
        assert_eq!(verdict.confidence, 0.95);
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let verdict = parse_verdict(r#"{"intent": "help"}"#).unwrap();

        assert!(verdict.entities.is_empty());
        assert_eq!(verdict.natural_response, None);
        assert_eq!(verdict.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn reply_without_intent_is_malformed() {
        let result = parse_verdict(r#"{"entities": {}}"#);

        assert!(matches!(result, Err(ClassifierError::MalformedResponse(_))));
    }

    #[test]
    fn prose_reply_is_malformed() {
        let result = parse_verdict("I think the user wants the weather.");

        assert!(matches!(result, Err(ClassifierError::MalformedResponse(_))));
    }

    #[test]
    fn response_prompt_only_covers_weather_and_news() {
        let weather = serde_json::json!({"action": "weather", "data": {"city": "Oslo"}});
        let time = serde_json::json!({"action": "time", "data": {}});

        assert!(response_prompt(&weather).unwrap().contains("City: Oslo"));
        assert!(response_prompt(&time).is_none());
    }
}
