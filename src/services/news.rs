use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::intent::NewsCategory;

const NEWS_API_URL: &str = "https://newsapi.org/v2/top-headlines";
const PAGE_SIZE: &str = "5";

const SAMPLE_HEADLINES: [&str; 3] = [
    "Technology stocks rise amid AI developments",
    "Weather patterns show seasonal changes",
    "Local community events scheduled for weekend",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headline {
    pub title: String,
    pub description: String,
    pub source: String,
    pub url: String,
}

#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch(&self, category: NewsCategory) -> anyhow::Result<Vec<Headline>>;

    fn is_sample(&self) -> bool {
        false
    }
}

pub struct SampleNewsProvider;

#[async_trait]
impl NewsProvider for SampleNewsProvider {
    async fn fetch(&self, _category: NewsCategory) -> anyhow::Result<Vec<Headline>> {
        Ok(SAMPLE_HEADLINES
            .iter()
            .map(|title| Headline {
                title: title.to_string(),
                description: String::new(),
                source: String::new(),
                url: String::new(),
            })
            .collect())
    }

    fn is_sample(&self) -> bool {
        true
    }
}

pub struct NewsApiProvider {
    client: reqwest::Client,
    api_key: String,
    country: String,
}

impl NewsApiProvider {
    pub fn new(
        api_key: impl Into<String>,
        country: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            country: country.into(),
        })
    }
}

#[derive(Deserialize, Default)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Deserialize)]
struct NewsApiArticle {
    title: Option<String>,
    description: Option<String>,
    source: Option<NewsApiSource>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

impl From<NewsApiArticle> for Headline {
    fn from(value: NewsApiArticle) -> Self {
        Self {
            title: value.title.unwrap_or_default(),
            description: value.description.unwrap_or_default(),
            source: value.source.and_then(|source| source.name).unwrap_or_default(),
            url: value.url.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl NewsProvider for NewsApiProvider {
    async fn fetch(&self, category: NewsCategory) -> anyhow::Result<Vec<Headline>> {
        let response: NewsApiResponse = self
            .client
            .get(NEWS_API_URL)
            .query(&[
                ("country", self.country.as_str()),
                ("category", category.as_str()),
                ("apiKey", self.api_key.as_str()),
                ("pageSize", PAGE_SIZE),
            ])
            .send()
            .await
            .context("Failed to get news data")?
            .error_for_status()
            .context("Failed to get news data")?
            .json()
            .await
            .context("Invalid news data format")?;

        Ok(response.articles.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_article_fields_become_empty() {
        let payload = r#"{
            "status": "ok",
            "articles": [
                { "title": "Rust 2.0 announced", "source": { "id": null, "name": "Example" }, "url": "https://example.com" },
                { "title": null, "description": "no title", "source": null, "url": null }
            ]
        }"#;
        let response: NewsApiResponse = serde_json::from_str(payload).unwrap();

        let headlines: Vec<Headline> = response.articles.into_iter().map(Into::into).collect();

        assert_eq!(headlines[0].title, "Rust 2.0 announced");
        assert_eq!(headlines[0].source, "Example");
        assert_eq!(headlines[0].description, "");
        assert_eq!(headlines[1].title, "");
        assert_eq!(headlines[1].description, "no title");
    }

    #[tokio::test]
    async fn sample_provider_returns_fixed_headlines() {
        let headlines = SampleNewsProvider.fetch(NewsCategory::Sports).await.unwrap();

        assert_eq!(headlines.len(), 3);
        assert_eq!(headlines[0].title, SAMPLE_HEADLINES[0]);
    }
}
