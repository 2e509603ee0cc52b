mod ai;
mod keyword;
mod language_model;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::intent::Classification;

pub use ai::AiClassifier;
pub use keyword::{KEYWORD_RULES, KeywordClassifier, KeywordRule};
pub use language_model::{GeminiClient, LanguageModel};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier is unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
    #[error("Classifier did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Classifier returned an unexpected response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<Classification, ClassifierError>;

    /// Phrases a finished action result conversationally, when supported.
    async fn generate_natural_response(
        &self,
        _context: &serde_json::Value,
    ) -> Result<Option<String>, ClassifierError> {
        Ok(None)
    }
}

/// Asks the primary classifier first and falls back to keyword rules when it
/// fails, times out or answers with something unusable.
pub struct ChainedClassifier {
    primary: Option<Box<dyn IntentClassifier>>,
    fallback: KeywordClassifier,
    timeout: Duration,
}

impl ChainedClassifier {
    pub fn new(
        primary: Option<Box<dyn IntentClassifier>>,
        fallback: KeywordClassifier,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            timeout,
        }
    }

    pub fn keyword_only(fallback: KeywordClassifier) -> Self {
        Self::new(None, fallback, Duration::ZERO)
    }

    pub async fn classify(&self, command: &str, now: DateTime<Utc>) -> Classification {
        if let Some(primary) = &self.primary {
            let classified = tokio::time::timeout(self.timeout, primary.classify(command, now))
                .await
                .unwrap_or(Err(ClassifierError::Timeout(self.timeout)));

            match classified {
                Ok(classification) => return classification,
                Err(err) => log::warn!("Falling back to keyword classification: {}", err),
            }
        }

        self.fallback.classify_keywords(command, now)
    }

    pub async fn generate_natural_response(&self, context: &serde_json::Value) -> Option<String> {
        let primary = self.primary.as_ref()?;
        let generated =
            tokio::time::timeout(self.timeout, primary.generate_natural_response(context))
                .await
                .unwrap_or(Err(ClassifierError::Timeout(self.timeout)));

        match generated {
            Ok(response) => response.filter(|response| !response.trim().is_empty()),
            Err(err) => {
                log::warn!("Could not generate a natural response: {}", err);
                None
            }
        }
    }
}
