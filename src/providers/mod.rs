//! Search provider adapters.
//!
//! Each adapter turns `(topic, lean)` into a list of [`Article`]s from one
//! external backend. They all follow the same shape:
//!
//! 1. **Query**: Build a lean-constrained query, either with `site:` clauses
//!    embedded in the query text or with the provider's native domain filter
//! 2. **Call**: Issue the HTTP request, retrying transient connection
//!    failures a bounded number of times
//! 3. **Accept**: Run every returned URL through the outlet classifier and
//!    article-path filter via [`accept_candidate`]
//!
//! # Supported Providers
//!
//! | Provider | Module | Constraint | Recency |
//! |----------|--------|------------|---------|
//! | Brave Search | [`brave`] | `site:` clauses | `freshness` |
//! | Vertex AI Search | [`vertex`] | `site:` clauses | not supported |
//! | Perplexity | [`perplexity`] | `search_domain_filter` | `search_recency_filter` |
//! | Firecrawl | [`firecrawl`] | `site:` clauses | `tbs` |
//!
//! Adapters report failures as [`ProviderError`]; [`search`] is the single
//! place that turns those into an empty result, so a provider being down
//! never escapes past the orchestrator.

use crate::config::{Config, ProviderKind, RetrySettings};
use crate::error::ProviderError;
use crate::models::{Article, Lean};
use crate::outlets::{classify, domains_for};
use crate::text::clean_text;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

pub mod brave;
pub mod firecrawl;
pub mod perplexity;
pub mod vertex;

/// How far back a provider should look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recency {
    Week,
    Month,
    Year,
    Any,
}

impl Recency {
    /// Windows tried in order when a lean is still empty.
    pub const ESCALATION: [Recency; 3] = [Recency::Week, Recency::Month, Recency::Year];
}

impl fmt::Display for Recency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Recency::Week => "week",
            Recency::Month => "month",
            Recency::Year => "year",
            Recency::Any => "any",
        })
    }
}

/// Whether the query itself is restricted to the lean's outlets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Domains pushed into the query (`site:` clauses or a native filter).
    Constrained,
    /// Plain topic query; the allow-list is applied only to the results.
    Unconstrained,
}

/// One provider call.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub topic: &'a str,
    pub lean: Lean,
    pub recency: Recency,
    pub scope: Scope,
}

/// A backend that can discover article URLs for a topic.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short identifier reported as `source` to clients and in logs.
    fn name(&self) -> &'static str;

    /// Does the provider honour [`Recency`]? Providers that don't are only
    /// tried once per scope.
    fn supports_recency(&self) -> bool {
        true
    }

    /// Minimum pause between consecutive calls, for rate-limited providers.
    fn lean_delay(&self) -> Option<Duration> {
        None
    }

    /// Run one query and return the accepted articles.
    async fn query(&self, request: &SearchRequest<'_>) -> Result<Vec<Article>, ProviderError>;
}

/// Run a provider, absorbing any failure into an empty result.
#[instrument(level = "info", skip_all, fields(provider = provider.name(), lean = %request.lean, recency = %request.recency))]
pub async fn search(provider: &dyn SearchProvider, request: &SearchRequest<'_>) -> Vec<Article> {
    let t0 = Instant::now();
    match provider.query(request).await {
        Ok(articles) => {
            info!(
                count = articles.len(),
                scope = ?request.scope,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Provider search finished"
            );
            articles
        }
        Err(e) => {
            warn!(
                error = %e,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Provider search failed; treating as zero results"
            );
            Vec::new()
        }
    }
}

/// Remove quote characters users paste around topics.
pub fn clean_topic(topic: &str) -> String {
    topic
        .chars()
        .filter(|c| !matches!(c, '"' | '\u{201c}' | '\u{201d}'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// `(site:a.com OR site:b.com ...)` for the first `max` domains of `lean`.
pub fn site_clause(lean: Lean, max: usize) -> String {
    let sites = domains_for(lean)
        .into_iter()
        .take(max)
        .map(|d| format!("site:{d}"))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("({sites})")
}

/// Query text for providers that constrain by embedding `site:` clauses.
pub fn query_text(request: &SearchRequest<'_>, max_clauses: usize) -> String {
    let topic = clean_topic(request.topic);
    match request.scope {
        Scope::Constrained => format!("{topic} {}", site_clause(request.lean, max_clauses)),
        Scope::Unconstrained => format!("{topic} news"),
    }
}

/// Turn a raw provider hit into an [`Article`], or reject it.
///
/// The URL must classify to `lean` and look like an article path. Title and
/// snippet are cleaned; an empty title becomes `"Article from <outlet>"`
/// and an empty snippet falls back to the title, both of which the metadata
/// repair step recognises as placeholders. The URL is kept as the provider
/// returned it (trimmed); normalisation is only ever a dedupe key.
pub fn accept_candidate(
    url: &str,
    title: &str,
    snippet: &str,
    published_at: Option<DateTime<Utc>>,
    lean: Lean,
) -> Option<Article> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let classification = classify(url)?;
    if classification.lean != lean {
        debug!(domain = classification.domain, wanted = %lean, "Discarding off-lean result");
        return None;
    }
    if !crate::article_path::is_article_path(url) {
        return None;
    }

    let title = match clean_text(title) {
        t if t.is_empty() => format!("Article from {}", classification.outlet),
        t => t,
    };
    let snippet = match clean_text(snippet) {
        s if s.is_empty() => title.clone(),
        s => s,
    };

    Some(Article {
        url: url.to_string(),
        title,
        outlet: classification.outlet,
        snippet,
        lean,
        published_at,
    })
}

/// Send a request, retrying connect/timeout failures with a fixed step
/// backoff (`backoff_ms * attempt`), and fail on non-2xx statuses.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed
/// by sending it.
pub async fn send_with_retry<F>(
    provider: &'static str,
    retry: &RetrySettings,
    build: F,
) -> Result<Response, ProviderError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0u32;
    loop {
        let result = build()
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider, source });

        match result {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::Status {
                    provider,
                    status,
                    body: truncate_for_log(&body, 300),
                });
            }
            Err(e) if e.is_transient() && attempt < retry.attempts => {
                attempt += 1;
                let delay = Duration::from_millis(retry.backoff_ms * attempt as u64);
                debug!(provider, attempt, ?delay, error = %e, "Transient failure; retrying");
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Decode a JSON body, mapping failures to [`ProviderError::Decode`].
pub async fn decode_json<T: DeserializeOwned>(
    provider: &'static str,
    response: Response,
) -> Result<T, ProviderError> {
    response.json::<T>().await.map_err(|e| ProviderError::Decode {
        provider,
        message: e.to_string(),
    })
}

/// Shared HTTP client with the service-wide timeout.
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("perspective_news/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(20))
        .pool_idle_timeout(Duration::from_secs(10))
        .build()
}

/// Instantiate the configured providers in priority order.
///
/// Providers without credentials are skipped with a log line; the result
/// may be empty, in which case every lean simply comes back empty.
pub fn build_providers(config: &Config, http: &Client) -> Vec<Arc<dyn SearchProvider>> {
    let creds = &config.credentials;
    let settings = &config.settings;
    let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();

    for kind in &settings.provider_order {
        let provider: Option<Arc<dyn SearchProvider>> = match kind {
            ProviderKind::Brave => creds.brave.as_ref().map(|key| {
                Arc::new(brave::Brave::new(
                    http.clone(),
                    key.clone(),
                    settings.brave.clone(),
                    settings.retry.clone(),
                )) as Arc<dyn SearchProvider>
            }),
            ProviderKind::Firecrawl => creds.firecrawl.as_ref().map(|key| {
                Arc::new(firecrawl::Firecrawl::new(
                    http.clone(),
                    key.clone(),
                    settings.firecrawl.clone(),
                    settings.retry.clone(),
                )) as Arc<dyn SearchProvider>
            }),
            ProviderKind::Perplexity => creds.perplexity.as_ref().map(|key| {
                Arc::new(perplexity::Perplexity::new(
                    http.clone(),
                    key.clone(),
                    settings.perplexity.clone(),
                    settings.retry.clone(),
                )) as Arc<dyn SearchProvider>
            }),
            ProviderKind::Vertex => match (
                &creds.service_account,
                &creds.vertex_project,
                &creds.vertex_engine,
            ) {
                (Some(account), Some(project), Some(engine)) => Some(Arc::new(vertex::Vertex::new(
                    http.clone(),
                    account.clone(),
                    project.clone(),
                    engine.clone(),
                    settings.vertex.clone(),
                    settings.retry.clone(),
                )) as Arc<dyn SearchProvider>),
                _ => None,
            },
        };

        match provider {
            Some(p) => {
                info!(provider = p.name(), "Search provider enabled");
                providers.push(p);
            }
            None => info!(provider = ?kind, "Search provider not configured; skipping"),
        }
    }
    providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    #[test]
    fn test_accept_candidate_enforces_lean() {
        let url = "https://www.foxnews.com/politics/climate-policy-bill-advances";
        assert!(accept_candidate(url, "t", "s", None, Lean::Left).is_none());
        let article = accept_candidate(url, "<b>Bill</b> advances", "", None, Lean::Right).unwrap();
        assert_eq!(article.lean, Lean::Right);
        assert_eq!(article.outlet, "Fox News");
        assert_eq!(article.title, "Bill advances");
        assert_eq!(article.snippet, "Bill advances");
        assert_eq!(article.url, url);
    }

    #[test]
    fn test_accept_candidate_keeps_provider_url() {
        let url = "https://www.cnn.com/2025/05/06/politics/climate-story?flag&q=a%20b";
        let article = accept_candidate(&format!("  {url} "), "Story", "s", None, Lean::Left).unwrap();
        assert_eq!(article.url, url);
    }

    #[test]
    fn test_accept_candidate_rejects_unknown_and_non_articles() {
        assert!(accept_candidate("https://example.com/2025/a-long-story", "t", "s", None, Lean::Center).is_none());
        assert!(accept_candidate("https://www.reuters.com/", "t", "s", None, Lean::Center).is_none());
        assert!(accept_candidate("", "t", "s", None, Lean::Center).is_none());
    }

    #[test]
    fn test_accept_candidate_placeholder_title() {
        let a = accept_candidate("https://apnews.com/article/some-story-123", "", "", None, Lean::Center).unwrap();
        assert_eq!(a.title, "Article from AP News");
        assert_eq!(a.snippet, a.title);
    }

    #[test]
    fn test_site_clause() {
        let clause = site_clause(Lean::Right, 2);
        assert_eq!(clause, "(site:foxnews.com OR site:nypost.com)");
    }

    #[test]
    fn test_query_text() {
        let constrained = SearchRequest {
            topic: "\u{201c}climate policy\u{201d}",
            lean: Lean::Center,
            recency: Recency::Week,
            scope: Scope::Constrained,
        };
        assert_eq!(
            query_text(&constrained, 1),
            "climate policy (site:reuters.com)"
        );
        let broad = SearchRequest {
            scope: Scope::Unconstrained,
            ..constrained
        };
        assert_eq!(query_text(&broad, 1), "climate policy news");
    }

    #[test]
    fn test_build_providers_skips_missing_credentials() {
        let config = Config {
            credentials: Credentials {
                perplexity: Some("p".into()),
                vertex_project: Some("proj".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let providers = build_providers(&config, &Client::new());
        let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["perplexity"]);
    }

    struct Failing;

    #[async_trait]
    impl SearchProvider for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn query(&self, _: &SearchRequest<'_>) -> Result<Vec<Article>, ProviderError> {
            Err(ProviderError::Status {
                provider: "failing",
                status: 503,
                body: "down".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_search_absorbs_errors() {
        let request = SearchRequest {
            topic: "x",
            lean: Lean::Left,
            recency: Recency::Any,
            scope: Scope::Unconstrained,
        };
        assert!(search(&Failing, &request).await.is_empty());
    }

    #[tokio::test]
    async fn test_send_with_retry_reports_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/x")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;
        let client = Client::new();
        let url = format!("{}/x", server.url());
        let err = send_with_retry("test", &RetrySettings::default(), || client.get(&url))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_send_with_retry_gives_up_on_connection_refused() {
        let client = Client::new();
        let retry = RetrySettings {
            attempts: 1,
            backoff_ms: 1,
        };
        // Port 9 (discard) is closed on test machines.
        let err = send_with_retry("test", &retry, || client.get("http://127.0.0.1:9/"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Http { .. }));
    }
}
