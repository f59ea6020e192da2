//! Trending topics from the AI research provider.
//!
//! This endpoint must always answer with something: with no Perplexity key,
//! an upstream failure or an unusable completion, it returns
//! [`FALLBACK_TOPICS`].

use crate::api::{AskAsync, ChatClient};
use crate::config::PerplexitySettings;
use crate::utils::{extract_json_array, truncate_for_log};
use reqwest::Client;
use serde_json::Value;
use tracing::{info, instrument, warn};

pub const FALLBACK_TOPICS: [&str; 5] = ["Breaking News", "Politics", "Technology", "Economy", "Climate"];

const MAX_TOPICS: usize = 5;

const PROMPT: &str = "What are the 5 most talked about news topics TODAY? Return ONLY a JSON \
array of 5 short topic names (2-4 words each), no explanation. Example: [\"Topic One\", \
\"Topic Two\", \"Topic Three\", \"Topic Four\", \"Topic Five\"]";

pub fn fallback_topics() -> Vec<String> {
    FALLBACK_TOPICS.iter().map(|t| t.to_string()).collect()
}

/// Pull up to five non-empty topic strings out of a completion.
pub fn parse_topics(content: &str) -> Option<Vec<String>> {
    let array = extract_json_array(content)?;
    let values: Vec<Value> = serde_json::from_str(array).ok()?;
    let topics: Vec<String> = values
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .take(MAX_TOPICS)
        .map(str::to_string)
        .collect();
    (!topics.is_empty()).then_some(topics)
}

/// Today's talked-about topics, or the fixed fallback list.
#[instrument(level = "info", skip_all)]
pub async fn trending_topics(
    http: &Client,
    api_key: Option<&str>,
    settings: &PerplexitySettings,
) -> Vec<String> {
    let Some(api_key) = api_key else {
        info!("Perplexity key not configured; serving fallback topics");
        return fallback_topics();
    };

    let url = format!("{}/chat/completions", settings.base_url.trim_end_matches('/'));
    let client = ChatClient {
        http,
        url: &url,
        api_key,
        model: &settings.trending_model,
        temperature: 0.3,
        system_prompt: "",
        response_format: None,
    };

    match client.ask(PROMPT).await {
        Ok(content) => match parse_topics(&content) {
            Some(topics) => {
                info!(?topics, "Trending topics");
                topics
            }
            None => {
                warn!(content = %truncate_for_log(&content, 300), "Failed to parse topics");
                fallback_topics()
            }
        },
        Err(e) => {
            warn!(error = %e, "Trending topics request failed");
            fallback_topics()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_topics() {
        let content = "Here you go: [\" Tariffs \", \"\", 42, \"Election Results\", \"AI Chips\", \"Storms\", \"Fed Rates\", \"Extra\"]";
        assert_eq!(
            parse_topics(content).unwrap(),
            vec!["Tariffs", "Election Results", "AI Chips", "Storms", "Fed Rates"]
        );
        assert!(parse_topics("no list").is_none());
        assert!(parse_topics("[]").is_none());
        assert!(parse_topics("[1, 2]").is_none());
    }

    #[tokio::test]
    async fn test_without_key_returns_fallback() {
        let topics = trending_topics(&Client::new(), None, &PerplexitySettings::default()).await;
        assert_eq!(topics, FALLBACK_TOPICS);
    }

    #[tokio::test]
    async fn test_upstream_error_returns_fallback() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .create_async()
            .await;

        let settings = PerplexitySettings {
            base_url: server.url(),
            ..Default::default()
        };
        let topics = trending_topics(&Client::new(), Some("k"), &settings).await;
        assert_eq!(topics, FALLBACK_TOPICS);
    }

    #[tokio::test]
    async fn test_parses_completion() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"model": "sonar"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"[\"Tariffs\", \"Election\"]"}}]}"#)
            .create_async()
            .await;

        let settings = PerplexitySettings {
            base_url: server.url(),
            ..Default::default()
        };
        let topics = trending_topics(&Client::new(), Some("k"), &settings).await;
        assert_eq!(topics, vec!["Tariffs", "Election"]);
    }
}
