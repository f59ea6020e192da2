//! Firecrawl adapter: web search with inline page scraping, plus the
//! single-page scrape used by metadata repair.
//!
//! Search results come back with the page's markdown, which gives far
//! better snippets than the search engine's description.

use super::{SearchProvider, SearchRequest, Recency, accept_candidate, decode_json, query_text, send_with_retry};
use crate::config::{FirecrawlSettings, RetrySettings};
use crate::error::ProviderError;
use crate::models::Article;
use crate::text::{clean_snippet, clean_text};
use crate::utils::parse_published;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

const NAME: &str = "firecrawl";

pub struct Firecrawl {
    http: Client,
    api_key: String,
    settings: FirecrawlSettings,
    retry: RetrySettings,
}

/// Title and description recovered from a single page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedPage {
    pub title: Option<String>,
    pub description: Option<String>,
}

fn tbs(recency: Recency) -> Option<&'static str> {
    match recency {
        Recency::Week => Some("qdr:w"),
        Recency::Month => Some("qdr:m"),
        Recency::Year => Some("qdr:y"),
        Recency::Any => None,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageMetadata {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    og_title: Option<String>,
    #[serde(default)]
    og_description: Option<String>,
    #[serde(default)]
    published_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    metadata: Option<PageMetadata>,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    data: Option<ScrapeData>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    metadata: Option<PageMetadata>,
}

/// Prefer the Open Graph value, then the plain one; blank counts as absent.
fn pick(primary: Option<String>, secondary: Option<String>) -> Option<String> {
    [primary, secondary]
        .into_iter()
        .flatten()
        .map(|s| clean_text(&s))
        .find(|s| !s.is_empty())
}

impl Firecrawl {
    pub fn new(http: Client, api_key: String, settings: FirecrawlSettings, retry: RetrySettings) -> Self {
        Self {
            http,
            api_key,
            settings,
            retry,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.settings.base_url.trim_end_matches('/'))
    }

    /// Fetch one page and report its title and description.
    ///
    /// Bounded by `scrape_timeout_ms` on both sides: Firecrawl is told the
    /// budget and the HTTP call itself is cut off at the same point.
    #[instrument(level = "debug", skip(self))]
    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage, ProviderError> {
        let timeout = Duration::from_millis(self.settings.scrape_timeout_ms);
        let body = json!({
            "url": url,
            "formats": ["markdown"],
            "onlyMainContent": true,
            "timeout": self.settings.scrape_timeout_ms,
        });

        let response = self
            .http
            .post(self.endpoint("scrape"))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: NAME,
                source,
            })?;
        if !response.status().is_success() {
            return Err(ProviderError::Status {
                provider: NAME,
                status: response.status().as_u16(),
                body: String::new(),
            });
        }

        let parsed: ScrapeResponse = decode_json(NAME, response).await?;
        let Some(data) = parsed.data else {
            return Ok(ScrapedPage::default());
        };
        let meta = data.metadata.unwrap_or_default();
        let title = pick(meta.og_title, meta.title);
        let description = pick(meta.og_description, meta.description).or_else(|| {
            let from_body = clean_snippet(data.markdown.as_deref().unwrap_or_default(), "", "");
            (!from_body.is_empty()).then_some(from_body)
        });
        Ok(ScrapedPage { title, description })
    }
}

#[async_trait]
impl SearchProvider for Firecrawl {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn query(&self, request: &SearchRequest<'_>) -> Result<Vec<Article>, ProviderError> {
        let mut body = json!({
            "query": query_text(request, self.settings.max_site_clauses),
            "limit": self.settings.limit,
            "lang": "en",
            "country": "us",
            "scrapeOptions": { "formats": ["markdown"], "onlyMainContent": true },
        });
        if let Some(t) = tbs(request.recency) {
            body["tbs"] = json!(t);
        }

        let url = self.endpoint("search");
        let response = send_with_retry(NAME, &self.retry, || {
            self.http.post(&url).bearer_auth(&self.api_key).json(&body)
        })
        .await?;
        let parsed: SearchResponse = decode_json(NAME, response).await?;
        debug!(raw = parsed.data.len(), "Firecrawl results received");

        Ok(parsed
            .data
            .into_iter()
            .filter_map(|hit| {
                let meta = hit.metadata.unwrap_or_default();
                let title = if hit.title.trim().is_empty() {
                    meta.og_title.or(meta.title).unwrap_or_default()
                } else {
                    hit.title
                };
                let snippet = clean_snippet(
                    hit.markdown.as_deref().unwrap_or_default(),
                    &hit.description,
                    "",
                );
                let published = meta.published_time.as_deref().and_then(parse_published);
                accept_candidate(&hit.url, &title, &snippet, published, request.lean)
            })
            .collect())
    }
}
