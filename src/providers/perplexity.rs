//! Perplexity Sonar adapter.
//!
//! Perplexity is an answer engine rather than an index, so the lean
//! constraint goes into the native `search_domain_filter` and the article
//! list is read from the sources it cites, never from the generated answer.

use super::{SearchProvider, SearchRequest, Recency, Scope, accept_candidate, clean_topic, decode_json, send_with_retry};
use crate::config::{PerplexitySettings, RetrySettings};
use crate::error::ProviderError;
use crate::models::Article;
use crate::outlets::domains_for;
use crate::utils::{normalize_url, parse_published};
use async_trait::async_trait;
use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const NAME: &str = "perplexity";

const SYSTEM_PROMPT: &str = "You are a news research assistant. Find recent news articles \
about the user's topic and cite each article you use. Prefer original reporting.";

pub struct Perplexity {
    http: Client,
    api_key: String,
    settings: PerplexitySettings,
    retry: RetrySettings,
}

impl Perplexity {
    pub fn new(http: Client, api_key: String, settings: PerplexitySettings, retry: RetrySettings) -> Self {
        Self {
            http,
            api_key,
            settings,
            retry,
        }
    }
}

fn recency_filter(recency: Recency) -> Option<&'static str> {
    match recency {
        Recency::Week => Some("week"),
        Recency::Month => Some("month"),
        Recency::Year => Some("year"),
        Recency::Any => None,
    }
}

#[derive(Debug, Deserialize)]
struct SonarResponse {
    #[serde(default)]
    citations: Vec<String>,
    #[serde(default)]
    search_results: Vec<SonarSource>,
}

#[derive(Debug, Deserialize)]
struct SonarSource {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    date: Option<String>,
}

#[async_trait]
impl SearchProvider for Perplexity {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn query(&self, request: &SearchRequest<'_>) -> Result<Vec<Article>, ProviderError> {
        let topic = clean_topic(request.topic);
        let mut body = json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Latest news coverage of: {topic}") },
            ],
            "temperature": 0.2,
            "return_related_questions": false,
        });
        if request.scope == Scope::Constrained {
            let domains: Vec<&str> = domains_for(request.lean)
                .into_iter()
                .take(self.settings.max_domain_filter)
                .collect();
            body["search_domain_filter"] = json!(domains);
        }
        if let Some(r) = recency_filter(request.recency) {
            body["search_recency_filter"] = json!(r);
        }

        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        let response = send_with_retry(NAME, &self.retry, || {
            self.http.post(&url).bearer_auth(&self.api_key).json(&body)
        })
        .await?;
        let parsed: SonarResponse = decode_json(NAME, response).await?;
        debug!(
            sources = parsed.search_results.len(),
            citations = parsed.citations.len(),
            "Perplexity sources received"
        );

        // Structured sources carry titles; bare citations fill in whatever
        // they don't cover and get placeholder titles.
        let cited = parsed.citations.into_iter().map(|url| SonarSource {
            url,
            title: String::new(),
            snippet: String::new(),
            date: None,
        });
        Ok(parsed
            .search_results
            .into_iter()
            .chain(cited)
            .unique_by(|s| normalize_url(&s.url))
            .filter_map(|s| {
                let published = s.date.as_deref().and_then(parse_published);
                accept_candidate(&s.url, &s.title, &s.snippet, published, request.lean)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lean;
    use mockito::Matcher;

    fn provider(base_url: String) -> Perplexity {
        Perplexity::new(
            Client::new(),
            "pplx-key".to_string(),
            PerplexitySettings {
                base_url,
                ..Default::default()
            },
            RetrySettings::default(),
        )
    }

    #[tokio::test]
    async fn test_uses_domain_filter_and_reads_sources() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer pplx-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({
                    "model": "sonar",
                    "search_recency_filter": "week",
                })),
                Matcher::Regex(r#""search_domain_filter":\["foxnews.com","nypost.com""#.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "choices": [{"message": {"content": "Generated answer citing [1]."}}],
                    "citations": [
                        "https://www.foxnews.com/politics/senate-climate-vote",
                        "https://nypost.com/2025/05/06/us-news/climate-bill-passes/"
                    ],
                    "search_results": [
                        {"title": "Senate climate vote", "url": "https://www.foxnews.com/politics/senate-climate-vote", "date": "2025-05-06"}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let request = SearchRequest {
            topic: "climate bill",
            lean: Lean::Right,
            recency: Recency::Week,
            scope: Scope::Constrained,
        };
        let articles = provider(server.url()).query(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Senate climate vote");
        assert!(articles[0].published_at.is_some());
        assert_eq!(articles[1].title, "Article from New York Post");
    }

    #[tokio::test]
    async fn test_off_lean_citations_are_dropped() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"citations": ["https://www.cnn.com/2025/05/06/politics/story", "https://wikipedia.org/wiki/Climate"]}"#)
            .create_async()
            .await;

        let request = SearchRequest {
            topic: "climate",
            lean: Lean::Center,
            recency: Recency::Any,
            scope: Scope::Unconstrained,
        };
        assert!(provider(server.url()).query(&request).await.unwrap().is_empty());
    }
}
