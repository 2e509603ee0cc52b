use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    intent::{Classification, Intent},
    parsing::CommandParser,
};

use super::{ClassifierError, IntentClassifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordRule {
    Time,
    Weather,
    News,
    Reminder,
    Help,
}

/// Evaluated top to bottom; the first rule with a keyword contained in the
/// lower-cased command wins.
pub const KEYWORD_RULES: [(KeywordRule, &[&str]); 5] = [
    (KeywordRule::Time, &["time", "clock"]),
    (KeywordRule::Weather, &["weather", "temperature"]),
    (KeywordRule::News, &["news", "headlines"]),
    (KeywordRule::Reminder, &["remind", "reminder"]),
    (KeywordRule::Help, &["help", "what can you do"]),
];

const LIST_KEYWORDS: [&str; 2] = ["list", "show"];

/// Deterministic classifier used whenever the language model cannot answer.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    parser: CommandParser,
}

impl KeywordClassifier {
    pub fn new(parser: CommandParser) -> Self {
        Self { parser }
    }

    pub fn match_rule(command: &str) -> Option<KeywordRule> {
        let command = command.to_lowercase();
        KEYWORD_RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|keyword| command.contains(keyword)))
            .map(|(rule, _)| *rule)
    }

    pub fn classify_keywords(&self, command: &str, now: DateTime<Utc>) -> Classification {
        let Some(rule) = Self::match_rule(command) else {
            return Classification::new(Intent::Unknown, 0.2);
        };

        match rule {
            KeywordRule::Time => Classification::new(Intent::Time, 0.9),
            KeywordRule::Weather => {
                let city = self.parser.extract_city(command);
                Classification::new(Intent::Weather { city }, 0.6)
            }
            KeywordRule::News => {
                let category = self.parser.extract_news_category(command);
                Classification::new(Intent::News { category }, 0.6)
            }
            KeywordRule::Reminder => self.classify_reminder(command, now),
            KeywordRule::Help => Classification::new(Intent::Help, 0.9),
        }
    }

    fn classify_reminder(&self, command: &str, now: DateTime<Utc>) -> Classification {
        let lowered = command.to_lowercase();
        if LIST_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
            return Classification::new(Intent::ReminderList, 0.7);
        }

        match self.parser.parse_reminder_command(command, now) {
            Ok(draft) => Classification::new(
                Intent::ReminderSet {
                    text: draft.text,
                    time: draft.time,
                },
                0.6,
            ),
            Err(error) => Classification::new(Intent::ReminderSetFailed { error }, 0.3),
        }
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(
        &self,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<Classification, ClassifierError> {
        Ok(self.classify_keywords(command, now))
    }
}
