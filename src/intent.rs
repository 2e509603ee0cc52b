use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parsing::{ParsedTime, TimeParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsCategory {
    General,
    Technology,
    Sports,
    Business,
    Health,
    Science,
    Entertainment,
}

impl NewsCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsCategory::General => "general",
            NewsCategory::Technology => "technology",
            NewsCategory::Sports => "sports",
            NewsCategory::Business => "business",
            NewsCategory::Health => "health",
            NewsCategory::Science => "science",
            NewsCategory::Entertainment => "entertainment",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "general" => Some(NewsCategory::General),
            "technology" => Some(NewsCategory::Technology),
            "sports" => Some(NewsCategory::Sports),
            "business" => Some(NewsCategory::Business),
            "health" => Some(NewsCategory::Health),
            "science" => Some(NewsCategory::Science),
            "entertainment" => Some(NewsCategory::Entertainment),
            _ => None,
        }
    }
}

impl fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized meaning of a single command.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Time,
    Weather { city: String },
    News { category: NewsCategory },
    ReminderSet { text: String, time: ParsedTime },
    /// A reminder was requested but its time could not be understood.
    ReminderSetFailed { error: TimeParseError },
    /// Only a time was given; the task text is expected in the next command.
    ReminderIncomplete { time: ParsedTime },
    ReminderIncompleteFailed { error: TimeParseError },
    ReminderList,
    Help,
    Unknown,
}

impl Intent {
    /// Name reported in the `action` field of a response.
    pub fn action(&self) -> &'static str {
        match self {
            Intent::Time => "time",
            Intent::Weather { .. } => "weather",
            Intent::News { .. } => "news",
            Intent::ReminderSet { .. } | Intent::ReminderSetFailed { .. } => "reminder_set",
            Intent::ReminderIncomplete { .. } | Intent::ReminderIncompleteFailed { .. } => {
                "reminder_incomplete"
            }
            Intent::ReminderList => "reminder_list",
            Intent::Help => "help",
            Intent::Unknown => "unknown",
        }
    }
}

/// Result of classifying a command, together with the reply the classifier
/// suggests and how sure it is.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub reply: Option<String>,
    pub confidence: f32,
}

impl Classification {
    pub fn new(intent: Intent, confidence: f32) -> Self {
        Self {
            intent,
            reply: None,
            confidence,
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }
}
