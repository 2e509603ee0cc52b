use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::intent::NewsCategory;

use super::time_expression::{ParsedTime, TimeExpressionParser, TimeParseError};


// Longer phrases first where they share a prefix.
const TRIGGER_PHRASES: [&str; 4] = ["remind me to", "remind me", "set a reminder to", "set reminder"];

const CITY_STOPWORDS: [&str; 7] = ["the", "is", "what", "how", "current", "today", "now"];

static IN_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bin\b").expect("Keyword pattern is valid."));
static AT_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bat\b").expect("Keyword pattern is valid."));

static CITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"weather in ([a-zA-Z\s]+)",
        r"weather for ([a-zA-Z\s]+)",
        r"weather at ([a-zA-Z\s]+)",
        r"weather of ([a-zA-Z\s]+)",
        r"how is the weather in ([a-zA-Z\s]+)",
        r"what is the weather in ([a-zA-Z\s]+)",
        r"temperature in ([a-zA-Z\s]+)",
        r"temperature at ([a-zA-Z\s]+)",
        r"temperature of ([a-zA-Z\s]+)",
        r"([a-zA-Z\s]+) weather",
        r"([a-zA-Z\s]+) temperature",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("City pattern is valid."))
    .collect()
});

pub(crate) const NEWS_KEYWORDS: [(NewsCategory, &[&str]); 6] = [
    (NewsCategory::Technology, &["tech", "technology"]),
    (NewsCategory::Sports, &["sport", "sports"]),
    (NewsCategory::Business, &["business", "finance", "economy"]),
    (NewsCategory::Health, &["health", "medical", "healthcare"]),
    (NewsCategory::Science, &["science", "scientific"]),
    (NewsCategory::Entertainment, &["entertainment", "celebrity", "movies"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ReminderDraft {
    pub text: String,
    pub time: ParsedTime,
}

/// Pulls reminder text and time, cities and news categories out of free text.
#[derive(Debug, Clone)]
pub struct CommandParser {
    time: TimeExpressionParser,
    default_city: String,
}

impl CommandParser {
    pub fn new(time: TimeExpressionParser, default_city: impl Into<String>) -> Self {
        Self {
            time,
            default_city: default_city.into(),
        }
    }

    pub fn time_parser(&self) -> &TimeExpressionParser {
        &self.time
    }

    pub fn parse_reminder_command(
        &self,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<ReminderDraft, TimeParseError> {
        let command = command.trim().to_lowercase();
        let command = strip_trigger(&command);

        if let Some(keyword) = IN_KEYWORD.find(command) {
            let text = command[..keyword.start()].trim();
            let time = self.time.parse_duration(&command[keyword.end()..], now)?;
            return Ok(draft(text, time));
        }

        if let Some(keyword) = AT_KEYWORD.find(command) {
            let text = command[..keyword.start()].trim();
            let time = self.time.parse_clock(&command[keyword.end()..], now)?;
            return Ok(draft(text, time));
        }

        if command.contains("tomorrow") {
            let text = command.replace("tomorrow", "");
            let time = self.time.tomorrow_morning(now)?;
            return Ok(draft(&text, time));
        }

        Ok(draft(command, self.time.default_grace(now)))
    }

    pub fn extract_city(&self, command: &str) -> String {
        let command = command.to_lowercase();

        CITY_PATTERNS
            .iter()
            .filter_map(|pattern| pattern.captures(&command))
            .map(|captures| captures[1].trim().to_string())
            .find(|city| !city.is_empty() && !CITY_STOPWORDS.contains(&city.as_str()))
            .map(|city| title_case(&city))
            .unwrap_or_else(|| self.default_city.clone())
    }

    pub fn extract_news_category(&self, command: &str) -> NewsCategory {
        let command = command.to_lowercase();

        NEWS_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|keyword| command.contains(keyword)))
            .map(|(category, _)| *category)
            .unwrap_or(NewsCategory::General)
    }
}

fn strip_trigger(command: &str) -> &str {
    TRIGGER_PHRASES
        .iter()
        .find_map(|trigger| command.strip_prefix(trigger))
        .map(str::trim)
        .unwrap_or(command)
}

fn draft(text: &str, time: ParsedTime) -> ReminderDraft {
    ReminderDraft {
        text: text.split_whitespace().collect::<Vec<_>>().join(" "),
        time,
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
