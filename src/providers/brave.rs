//! Brave Search web API adapter.
//!
//! Lean constraint is embedded in the query as `site:` clauses; recency maps
//! onto Brave's `freshness` parameter. The free tier allows one request per
//! second, so the orchestrator is told to space per-lean calls out.

use super::{SearchProvider, SearchRequest, Recency, accept_candidate, decode_json, query_text, send_with_retry};
use crate::config::{BraveSettings, RetrySettings};
use crate::error::ProviderError;
use crate::models::Article;
use crate::utils::parse_published;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const NAME: &str = "brave";

pub struct Brave {
    http: Client,
    api_key: String,
    settings: BraveSettings,
    retry: RetrySettings,
}

impl Brave {
    pub fn new(http: Client, api_key: String, settings: BraveSettings, retry: RetrySettings) -> Self {
        Self {
            http,
            api_key,
            settings,
            retry,
        }
    }
}

fn freshness(recency: Recency) -> Option<&'static str> {
    match recency {
        Recency::Week => Some("pw"),
        Recency::Month => Some("pm"),
        Recency::Year => Some("py"),
        Recency::Any => None,
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    page_age: Option<String>,
}

#[async_trait]
impl SearchProvider for Brave {
    fn name(&self) -> &'static str {
        NAME
    }

    fn lean_delay(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.settings.lean_delay_ms))
    }

    async fn query(&self, request: &SearchRequest<'_>) -> Result<Vec<Article>, ProviderError> {
        let q = query_text(request, self.settings.max_site_clauses);
        let url = format!("{}/res/v1/web/search", self.settings.base_url.trim_end_matches('/'));

        let mut params: Vec<(&str, String)> = vec![
            ("q", q),
            ("count", self.settings.count.to_string()),
            ("text_decorations", "false".to_string()),
        ];
        if let Some(f) = freshness(request.recency) {
            params.push(("freshness", f.to_string()));
        }

        let response = send_with_retry(NAME, &self.retry, || {
            self.http
                .get(&url)
                .header("Accept", "application/json")
                .header("X-Subscription-Token", &self.api_key)
                .query(&params)
        })
        .await?;
        let body: BraveResponse = decode_json(NAME, response).await?;

        let results = body.web.map(|w| w.results).unwrap_or_default();
        debug!(raw = results.len(), "Brave results received");

        Ok(results
            .into_iter()
            .filter_map(|r| {
                let published = r.page_age.as_deref().and_then(parse_published);
                accept_candidate(&r.url, &r.title, &r.description, published, request.lean)
            })
            .collect())
    }
}
