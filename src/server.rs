//! HTTP surface of the service.
//!
//! Endpoints (all answer `OPTIONS` preflight with permissive CORS):
//! - POST /search-perspectives
//! - POST /search-left, /search-center, /search-right
//! - POST /fact-check
//! - GET|POST /trending-topics

use crate::assemble::{assemble, enrich_articles};
use crate::config::Config;
use crate::error::ApiError;
use crate::factcheck::{FactChecker, verify_claims};
use crate::metadata::describe_topic;
use crate::models::{
    Article, ClaimsRequest, ClaimsResponse, Lean, LeanSearchResponse, TopicRequest,
    TopicSearchResponse, TrendingResponse,
};
use crate::orchestrator::{Orchestrator, SearchResult};
use crate::providers::firecrawl::Firecrawl;
use crate::providers::{SearchProvider, build_providers};
use crate::repair::repair_all;
use crate::trending::trending_topics;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderValue;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::response::{Json, Response};
use axum::routing::{get, post};
use chrono::Utc;
use futures::future::join_all;
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type, \
x-supabase-client-platform, x-supabase-client-platform-version, \
x-supabase-client-runtime, x-supabase-client-runtime-version";

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";

const NO_ARTICLES: &str = "No verified articles found for this topic. Try a different search term.";

/// Shared, read-only state for all handlers.
pub struct AppState {
    pub config: Config,
    pub http: Client,
    pub providers: Vec<Arc<dyn SearchProvider>>,
    /// Used for metadata repair when a Firecrawl key is configured.
    pub firecrawl: Option<Firecrawl>,
    pub fact_checker: Option<FactChecker>,
}

impl AppState {
    pub fn new(config: Config, http: Client) -> Self {
        let providers = build_providers(&config, &http);
        let firecrawl = config.credentials.firecrawl.as_ref().map(|key| {
            Firecrawl::new(
                http.clone(),
                key.clone(),
                config.settings.firecrawl.clone(),
                config.settings.retry.clone(),
            )
        });
        let fact_checker = FactChecker::from_config(&config, &http);
        info!(
            providers = providers.len(),
            repair_via_firecrawl = firecrawl.is_some(),
            fact_check = fact_checker.is_some(),
            "Application state ready"
        );
        Self {
            config,
            http,
            providers,
            firecrawl,
            fact_checker,
        }
    }

    fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(
            &self.providers,
            self.config.settings.min_articles_per_lean,
            self.config.settings.max_articles_per_lean,
        )
    }

    async fn repair(&self, articles: Vec<Article>) -> Vec<Article> {
        if !self.config.settings.repair_metadata {
            return articles;
        }
        let limit = Duration::from_millis(self.config.settings.firecrawl.scrape_timeout_ms);
        repair_all(articles, self.firecrawl.as_ref(), &self.http, limit).await
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/search-perspectives",
            post(search_perspectives).options(preflight),
        )
        .route("/search-left", post(search_left).options(preflight))
        .route("/search-center", post(search_center).options(preflight))
        .route("/search-right", post(search_right).options(preflight))
        .route("/fact-check", post(fact_check).options(preflight))
        .route(
            "/trending-topics",
            get(trending).post(trending).options(preflight),
        )
        .layer(axum::middleware::map_response(add_cors_headers))
        .with_state(state)
}

async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    response
}

async fn preflight() -> &'static str {
    "ok"
}

/// Trimmed topic from the request body, or `MissingTopic`.
fn require_topic(body: Result<Json<TopicRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    request
        .topic
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::MissingTopic)
}

#[instrument(level = "info", skip_all)]
async fn search_perspectives(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TopicRequest>, JsonRejection>,
) -> Result<Json<TopicSearchResponse>, ApiError> {
    let topic = require_topic(body)?;
    let api_key = state
        .config
        .credentials
        .ai_gateway
        .as_deref()
        .ok_or(ApiError::NotConfigured)?;

    let start = Instant::now();
    info!(%topic, "Searching all perspectives");

    let found = state.orchestrator().orchestrate(&topic, &Lean::ALL).await;
    if found.is_empty() {
        info!(%topic, elapsed_ms = start.elapsed().as_millis() as u64, "No articles for any lean");
        return Ok(Json(TopicSearchResponse {
            success: false,
            data: None,
            error: Some(NO_ARTICLES.to_string()),
        }));
    }

    let repaired = join_all(
        Lean::ALL
            .iter()
            .map(|&lean| state.repair(found.articles(lean).to_vec())),
    )
    .await;
    let counts: Vec<usize> = repaired.iter().map(Vec::len).collect();
    let flat: Vec<Article> = repaired.into_iter().flatten().collect();

    let fact_checks = async {
        match &state.fact_checker {
            Some(checker) => checker.enrich_all(&flat, &topic).await,
            None => Vec::new(),
        }
    };
    let (claims, metadata) = tokio::join!(
        fact_checks,
        describe_topic(&state.http, api_key, &state.config.settings.gateway, &topic)
    );

    let now = Utc::now();
    let mut articles = flat.into_iter();
    let mut claims = claims.into_iter();
    let by_lean: BTreeMap<Lean, _> = Lean::ALL
        .iter()
        .zip(counts)
        .map(|(&lean, n)| {
            let lean_articles: Vec<Article> = articles.by_ref().take(n).collect();
            let lean_claims = claims.by_ref().take(n).collect();
            (lean, enrich_articles(lean_articles, lean_claims, now))
        })
        .collect();

    let report = assemble(by_lean, metadata);
    info!(
        %topic,
        total = found.total(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Topic search complete"
    );
    Ok(Json(TopicSearchResponse {
        success: true,
        data: Some(report),
        error: None,
    }))
}

async fn search_lean(
    state: &AppState,
    lean: Lean,
    body: Result<Json<TopicRequest>, JsonRejection>,
) -> Result<Json<LeanSearchResponse>, ApiError> {
    let topic = require_topic(body)?;
    let start = Instant::now();

    let found: SearchResult = state.orchestrator().orchestrate(&topic, &[lean]).await;
    let source = found.source(lean);
    let articles = state.repair(found.articles(lean).to_vec()).await;

    info!(
        %topic,
        %lean,
        count = articles.len(),
        source,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Lean search complete"
    );
    Ok(Json(LeanSearchResponse {
        success: true,
        articles,
        source: source.to_string(),
    }))
}

#[instrument(level = "info", skip_all)]
async fn search_left(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TopicRequest>, JsonRejection>,
) -> Result<Json<LeanSearchResponse>, ApiError> {
    search_lean(&state, Lean::Left, body).await
}

#[instrument(level = "info", skip_all)]
async fn search_center(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TopicRequest>, JsonRejection>,
) -> Result<Json<LeanSearchResponse>, ApiError> {
    search_lean(&state, Lean::Center, body).await
}

#[instrument(level = "info", skip_all)]
async fn search_right(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TopicRequest>, JsonRejection>,
) -> Result<Json<LeanSearchResponse>, ApiError> {
    search_lean(&state, Lean::Right, body).await
}

#[instrument(level = "info", skip_all)]
async fn fact_check(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ClaimsRequest>, JsonRejection>,
) -> Result<Json<ClaimsResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let claims = request
        .claims
        .filter(|c| !c.is_empty())
        .ok_or(ApiError::MissingClaims)?;

    info!(count = claims.len(), "Verifying claims");
    let data = verify_claims(state.fact_checker.as_ref(), &claims).await;
    Ok(Json(ClaimsResponse {
        success: true,
        data,
    }))
}

async fn trending(State(state): State<Arc<AppState>>) -> Json<TrendingResponse> {
    let topics = trending_topics(
        &state.http,
        state.config.credentials.perplexity.as_deref(),
        &state.config.settings.perplexity,
    )
    .await;
    Json(TrendingResponse {
        success: true,
        topics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::trending::FALLBACK_TOPICS;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app(config: Config) -> Router {
        build_router(Arc::new(AppState::new(config, Client::new())))
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(json) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => Request::builder().method(method).uri(uri).body(Body::empty()).unwrap(),
        };
        let resp = router.oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_preflight_has_cors_headers() {
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/search-perspectives")
            .body(Body::empty())
            .unwrap();
        let resp = app(Config::default()).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers().clone();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(
            headers[ACCESS_CONTROL_ALLOW_HEADERS]
                .to_str()
                .unwrap()
                .contains("x-client-info")
        );
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_missing_topic_is_bad_request() {
        let (status, body) = send(app(Config::default()), "POST", "/search-perspectives", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"success": false, "error": "Topic is required"}));

        let (status, _) = send(
            app(Config::default()),
            "POST",
            "/search-left",
            Some(json!({"topic": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/search-center")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app(Config::default()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_topic_search_requires_ai_key() {
        let (status, body) = send(
            app(Config::default()),
            "POST",
            "/search-perspectives",
            Some(json!({"topic": "climate"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "AI service not configured");
    }

    #[tokio::test]
    async fn test_topic_search_with_no_articles() {
        let mut config = Config::default();
        config.credentials.ai_gateway = Some("gw-key".to_string());

        let (status, body) = send(
            app(config),
            "POST",
            "/search-perspectives",
            Some(json!({"topic": "climate"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], NO_ARTICLES);
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_lean_search_without_providers() {
        let (status, body) = send(
            app(Config::default()),
            "POST",
            "/search-right",
            Some(json!({"topic": "climate"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "articles": [], "source": "none"}));
    }

    #[tokio::test]
    async fn test_lean_search_through_brave() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/res/v1/web/search")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"web": {"results": [
                    {"url": "https://www.cnn.com/2025/05/06/politics/climate-bill/index.html",
                     "title": "Climate bill advances",
                     "description": "The Senate moved forward on the climate bill on Tuesday after a long debate."},
                    {"url": "https://www.foxnews.com/politics/climate-bill-reaction",
                     "title": "Wrong lean", "description": "x"}
                ]}}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let mut config = Config::default();
        config.credentials.brave = Some("brave-key".to_string());
        config.settings.provider_order = vec![ProviderKind::Brave];
        config.settings.brave.base_url = server.url();
        config.settings.brave.lean_delay_ms = 0;
        config.settings.repair_metadata = false;

        let (status, body) = send(app(config), "POST", "/search-left", Some(json!({"topic": "climate bill"}))).await;

        mock.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["source"], "brave");
        let articles = body["articles"].as_array().unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0]["outlet"], "CNN");
        assert_eq!(articles[0]["perspective"], "left");
    }

    #[tokio::test]
    async fn test_topic_search_groups_articles_and_claims_by_lean() {
        use mockito::Matcher;

        let mut server = mockito::Server::new_async().await;
        let left = server
            .mock("GET", "/res/v1/web/search")
            .match_query(Matcher::Regex("site%3Amsnbc.com".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"web": {"results": [
                    {"url": "https://www.cnn.com/2025/05/06/politics/climate-bill-senate/index.html",
                     "title": "Climate bill clears key Senate vote",
                     "description": "Democrats pushed the climate bill through a procedural vote late on Tuesday."},
                    {"url": "https://www.msnbc.com/news/climate-bill-vote-n123456",
                     "title": "What the climate bill does",
                     "description": "An explainer on the spending and emissions targets in the new climate bill."}
                ]}}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let right = server
            .mock("GET", "/res/v1/web/search")
            .match_query(Matcher::Regex("site%3Afoxnews.com".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"web": {"results": [
                    {"url": "https://www.foxnews.com/politics/climate-bill-faces-senate-opposition",
                     "title": "Climate bill faces Senate opposition",
                     "description": "Republican senators warned the climate bill would raise energy prices for families."}
                ]}}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let gateway = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"content":"{\"title\":\"Climate Bill Showdown\",\"description\":\"The Senate weighs a climate bill.\",\"tags\":[\"Climate\",\"Senate\",\"Energy\"]}"}}]}"#,
            )
            .create_async()
            .await;
        let claims = server
            .mock("GET", "/v1alpha1/claims:search")
            .match_query(Matcher::UrlEncoded(
                "query".into(),
                "climate bill Climate bill faces Senate opposition".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"claims": [{"text": "The climate bill will double gas prices",
                    "claimReview": [{"publisher": {"name": "PolitiFact"},
                        "url": "https://www.politifact.com/factchecks/2025/may/06/climate-bill-gas/",
                        "title": "No, the climate bill will not double gas prices",
                        "textualRating": "False"}]}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let mut config = Config::default();
        config.credentials.brave = Some("brave-key".to_string());
        config.credentials.ai_gateway = Some("gw-key".to_string());
        config.credentials.fact_check = Some("fc-key".to_string());
        config.settings.provider_order = vec![ProviderKind::Brave];
        config.settings.brave.base_url = server.url();
        config.settings.brave.lean_delay_ms = 0;
        config.settings.gateway.url = format!("{}/v1/chat/completions", server.url());
        config.settings.fact_check.base_url = server.url();

        let (status, body) = send(
            app(config),
            "POST",
            "/search-perspectives",
            Some(json!({"topic": "climate bill"})),
        )
        .await;

        left.assert_async().await;
        right.assert_async().await;
        gateway.assert_async().await;
        claims.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["topic"]["title"], "Climate Bill Showdown");

        let perspectives = body["data"]["perspectives"].as_array().unwrap();
        let leans: Vec<&str> = perspectives.iter().map(|p| p["perspective"].as_str().unwrap()).collect();
        assert_eq!(leans, vec!["left", "center", "right"]);

        let left = &perspectives[0];
        assert_eq!(left["articles"].as_array().unwrap().len(), 2);
        assert_eq!(
            left["articleUrl"],
            "https://www.cnn.com/2025/05/06/politics/climate-bill-senate/index.html"
        );
        assert_eq!(left["outlet"], "CNN");
        assert_eq!(left["factChecks"], json!([]));

        let center = &perspectives[1];
        assert_eq!(center["label"], "No center sources found");
        assert_eq!(center["articles"], json!([]));
        assert!(center.get("articleUrl").is_none());

        let right = &perspectives[2];
        assert_eq!(right["articles"].as_array().unwrap().len(), 1);
        assert_eq!(right["headline"], "Climate bill faces Senate opposition");
        assert_eq!(right["factChecks"][0]["source"], "PolitiFact");
        assert_eq!(right["factChecks"][0]["status"], "false");
        assert_eq!(right["articles"][0]["factChecks"][0]["rating"], "False");
        assert_eq!(left["articles"][1]["factChecks"], json!([]));
    }

    #[tokio::test]
    async fn test_fact_check_requires_claims() {
        let (status, body) = send(app(Config::default()), "POST", "/fact-check", Some(json!({"claims": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Claims array is required");
    }

    #[tokio::test]
    async fn test_fact_check_without_key_is_unverified() {
        let (status, body) = send(
            app(Config::default()),
            "POST",
            "/fact-check",
            Some(json!({"claims": ["The moon is cheese", "Water is wet"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["originalClaim"], "The moon is cheese");
        assert_eq!(data[0]["status"], "unverified");
        assert_eq!(data[1]["verified"], false);
    }

    #[tokio::test]
    async fn test_trending_without_key_is_fallback() {
        for method in ["GET", "POST"] {
            let (status, body) = send(app(Config::default()), method, "/trending-topics", None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["topics"], json!(FALLBACK_TOPICS));
        }
    }
}
