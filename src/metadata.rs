//! Cosmetic topic framing from the AI gateway.
//!
//! The model only ever fills a [`TopicMetadata`]: a title, a one-sentence
//! description and three tags. The date is rendered locally. Any failure
//! (transport, status, unparseable JSON, empty fields) falls back to a
//! deterministic default built from the topic string itself.

use crate::api::{ChatClient, ask_with_backoff};
use crate::config::GatewaySettings;
use crate::models::TopicMetadata;
use crate::utils::{extract_json_object, looks_truncated, title_case, truncate_for_log};
use chrono::Local;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

const SYSTEM_PROMPT: &str = "You are a news editor writing neutral labels for a topic \
that will be shown alongside left, center and right coverage. Respond with raw JSON only, \
no markdown: {\"title\": \"Brief topic title\", \"description\": \"One neutral sentence \
describing the topic\", \"tags\": [\"Tag1\", \"Tag2\", \"Tag3\"]}";

const FILLER_TAG: &str = "News";

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Structured-output request accepted by OpenAI-compatible gateways.
fn response_format() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "topic_metadata",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 3,
                        "maxItems": 3
                    }
                },
                "required": ["title", "description", "tags"],
                "additionalProperties": false
            }
        }
    })
}

/// Today's date as shown next to the topic, e.g. `"May 6, 2025"`.
pub fn topic_date() -> String {
    Local::now().format("%B %-d, %Y").to_string()
}

/// Pad or trim to exactly three non-empty tags.
fn three_tags(tags: impl IntoIterator<Item = String>, topic: &str) -> [String; 3] {
    let mut picked: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(3)
        .collect();
    for word in topic.split_whitespace() {
        if picked.len() >= 3 {
            break;
        }
        let tag = title_case(word);
        if !picked.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            picked.push(tag);
        }
    }
    while picked.len() < 3 {
        picked.push(FILLER_TAG.to_string());
    }
    let mut it = picked.into_iter();
    [
        it.next().unwrap_or_default(),
        it.next().unwrap_or_default(),
        it.next().unwrap_or_default(),
    ]
}

/// The metadata used whenever the model cannot be.
pub fn fallback_metadata(topic: &str, date: &str) -> TopicMetadata {
    let topic = topic.trim();
    TopicMetadata {
        title: title_case(topic),
        description: format!("Coverage of {topic} from left, center, and right outlets."),
        date: date.to_string(),
        tags: three_tags(Vec::new(), topic),
    }
}

/// Parse a completion into metadata, or `None` if it is unusable.
pub fn parse_metadata(content: &str, topic: &str, date: &str) -> Option<TopicMetadata> {
    let raw: RawMetadata = match serde_json::from_str(extract_json_object(content)) {
        Ok(r) => r,
        Err(e) => {
            warn!(
                error = %e,
                truncated = looks_truncated(&e),
                content = %truncate_for_log(content, 300),
                "Unparseable topic metadata"
            );
            return None;
        }
    };
    let title = raw.title.trim();
    let description = raw.description.trim();
    if title.is_empty() || description.is_empty() {
        return None;
    }
    Some(TopicMetadata {
        title: title.to_string(),
        description: description.to_string(),
        date: date.to_string(),
        tags: three_tags(raw.tags, topic),
    })
}

/// Ask the gateway to describe `topic`, falling back on any failure.
#[instrument(level = "info", skip(http, api_key, settings))]
pub async fn describe_topic(
    http: &Client,
    api_key: &str,
    settings: &GatewaySettings,
    topic: &str,
) -> TopicMetadata {
    let date = topic_date();
    let client = ChatClient {
        http,
        url: &settings.url,
        api_key,
        model: &settings.model,
        temperature: settings.temperature,
        system_prompt: SYSTEM_PROMPT,
        response_format: Some(response_format()),
    };

    match ask_with_backoff(client, settings, &format!("Topic: {topic}")).await {
        Ok(content) => match parse_metadata(&content, topic, &date) {
            Some(meta) => {
                info!(title = %meta.title, "Generated topic metadata");
                meta
            }
            None => fallback_metadata(topic, &date),
        },
        Err(e) => {
            warn!(error = %e, "Topic metadata generation failed; using fallback");
            fallback_metadata(topic, &date)
        }
    }
}
