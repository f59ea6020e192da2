//! Vertex AI Search (Discovery Engine) adapter.
//!
//! Authenticates with a service-account bearer token (see [`crate::auth`])
//! and queries a website-search engine. The API has no recency parameter,
//! so the orchestrator tries it once per scope rather than once per window.

use super::{SearchProvider, SearchRequest, accept_candidate, decode_json, query_text, send_with_retry};
use crate::auth::{CLOUD_PLATFORM_SCOPE, ServiceAccount, get_access_token};
use crate::config::{RetrySettings, VertexSettings};
use crate::error::ProviderError;
use crate::models::Article;
use crate::utils::parse_published;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

const NAME: &str = "vertex";

const NO_SNIPPET: &str = "No snippet is available for this page.";

/// Metatags that commonly carry an article's publication time.
const PUBLISHED_TAGS: &[&str] = &["article:published_time", "og:article:published_time", "datepublished", "date"];

pub struct Vertex {
    http: Client,
    account: ServiceAccount,
    project: String,
    engine: String,
    settings: VertexSettings,
    retry: RetrySettings,
}

impl Vertex {
    pub fn new(
        http: Client,
        account: ServiceAccount,
        project: String,
        engine: String,
        settings: VertexSettings,
        retry: RetrySettings,
    ) -> Self {
        Self {
            http,
            account,
            project,
            engine,
            settings,
            retry,
        }
    }

    /// Identifiers come from the environment, so they are escaped as path segments.
    fn search_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/collections/default_collection/engines/{}/servingConfigs/default_search:search",
            self.settings.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.project),
            urlencoding::encode(&self.settings.location),
            urlencoding::encode(&self.engine),
        )
    }
}

#[derive(Debug, Deserialize)]
struct VertexResponse {
    #[serde(default)]
    results: Vec<VertexResult>,
}

#[derive(Debug, Deserialize)]
struct VertexResult {
    #[serde(default)]
    document: Option<VertexDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VertexDocument {
    #[serde(default)]
    derived_struct_data: Option<DerivedData>,
}

#[derive(Debug, Deserialize)]
struct DerivedData {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippets: Vec<VertexSnippet>,
    #[serde(default)]
    pagemap: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct VertexSnippet {
    #[serde(default)]
    snippet: String,
}

/// First real snippet; Vertex fills pages it could not excerpt with a stock line.
fn first_snippet(snippets: &[VertexSnippet]) -> &str {
    snippets
        .iter()
        .map(|s| s.snippet.trim())
        .find(|s| !s.is_empty() && !s.eq_ignore_ascii_case(NO_SNIPPET))
        .unwrap_or_default()
}

/// Publication time from `pagemap.metatags[0]`, when the site exposes one.
fn published_from_pagemap(pagemap: Option<&Value>) -> Option<chrono::DateTime<chrono::Utc>> {
    let tags = pagemap?.get("metatags")?.get(0)?;
    PUBLISHED_TAGS
        .iter()
        .filter_map(|k| tags.get(*k).and_then(Value::as_str))
        .find_map(parse_published)
}

#[async_trait]
impl SearchProvider for Vertex {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports_recency(&self) -> bool {
        false
    }

    async fn query(&self, request: &SearchRequest<'_>) -> Result<Vec<Article>, ProviderError> {
        let token = get_access_token(&self.http, &self.account, CLOUD_PLATFORM_SCOPE).await?;
        let body = json!({
            "query": query_text(request, self.settings.max_site_clauses),
            "pageSize": self.settings.page_size,
            "contentSearchSpec": { "snippetSpec": { "returnSnippet": true } },
        });

        let url = self.search_url();
        let response = send_with_retry(NAME, &self.retry, || {
            self.http.post(&url).bearer_auth(&token).json(&body)
        })
        .await?;
        let parsed: VertexResponse = decode_json(NAME, response).await?;
        debug!(raw = parsed.results.len(), "Vertex results received");

        Ok(parsed
            .results
            .into_iter()
            .filter_map(|r| r.document?.derived_struct_data)
            .filter_map(|d| {
                let snippet = first_snippet(&d.snippets);
                let published = published_from_pagemap(d.pagemap.as_ref());
                accept_candidate(&d.link, &d.title, snippet, published, request.lean)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lean;
    use crate::providers::{Recency, Scope};

    const PRIVATE_KEY: &str = include_str!("../../testdata/service_account_key.pem");

    fn provider(base_url: String) -> Vertex {
        let account = ServiceAccount {
            client_email: "search@perspective-test.iam.gserviceaccount.com".to_string(),
            private_key: PRIVATE_KEY.to_string(),
            token_uri: format!("{base_url}/token"),
            project_id: None,
        };
        Vertex::new(
            Client::new(),
            account,
            "proj".to_string(),
            "news-engine".to_string(),
            VertexSettings {
                base_url,
                ..Default::default()
            },
            RetrySettings::default(),
        )
    }

    #[tokio::test]
    async fn test_query_authenticates_and_parses() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "ya29.vertex"}"#)
            .create_async()
            .await;
        let search = server
            .mock(
                "POST",
                "/v1/projects/proj/locations/global/collections/default_collection/engines/news-engine/servingConfigs/default_search:search",
            )
            .match_header("authorization", "Bearer ya29.vertex")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results": [
                    {"document": {"derivedStructData": {
                        "link": "https://www.reuters.com/world/us/senate-climate-bill-2025-05-06/",
                        "title": "Senate advances climate bill",
                        "snippets": [{"snippet": "The Senate on Tuesday advanced &quot;the bill&quot;."}],
                        "pagemap": {"metatags": [{"article:published_time": "2025-05-06T08:00:00Z"}]}
                    }}},
                    {"document": {"derivedStructData": {"link": "https://www.cnn.com/2025/05/06/politics/x/index.html", "title": "Left"}}},
                    {"document": {}}
                ]}"#,
            )
            .create_async()
            .await;

        let request = SearchRequest {
            topic: "climate bill",
            lean: Lean::Center,
            recency: Recency::Week,
            scope: Scope::Constrained,
        };
        let articles = provider(server.url()).query(&request).await.unwrap();

        token.assert_async().await;
        search.assert_async().await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].outlet, "Reuters");
        assert_eq!(articles[0].snippet, "The Senate on Tuesday advanced \"the bill\".");
        assert!(articles[0].published_at.is_some());
    }

    #[tokio::test]
    async fn test_token_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/token")
            .with_status(400)
            .create_async()
            .await;

        let request = SearchRequest {
            topic: "x",
            lean: Lean::Left,
            recency: Recency::Week,
            scope: Scope::Constrained,
        };
        let err = provider(server.url()).query(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 400, .. }));
    }

    #[test]
    fn test_stock_snippet_is_treated_as_missing() {
        let snippets = |texts: &[&str]| -> Vec<VertexSnippet> {
            texts
                .iter()
                .map(|t| VertexSnippet { snippet: t.to_string() })
                .collect()
        };
        assert_eq!(first_snippet(&snippets(&["No snippet is available for this page."])), "");
        assert_eq!(
            first_snippet(&snippets(&[" ", "No snippet is available for this page.", "Real text."])),
            "Real text."
        );
        assert_eq!(first_snippet(&[]), "");

        let article = accept_candidate(
            "https://www.reuters.com/world/us/senate-climate-bill-2025-05-06/",
            "Senate advances climate bill",
            first_snippet(&snippets(&["No snippet is available for this page."])),
            None,
            Lean::Center,
        )
        .unwrap();
        assert_eq!(article.snippet, "Senate advances climate bill");
    }

    #[test]
    fn test_published_from_pagemap() {
        let pagemap = json!({"metatags": [{"og:title": "x", "date": "2025-05-06"}]});
        assert!(published_from_pagemap(Some(&pagemap)).is_some());
        assert!(published_from_pagemap(None).is_none());
    }
}
