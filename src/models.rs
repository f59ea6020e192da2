//! Data models for classified articles, fact-checks and API payloads.
//!
//! This module defines the core data structures used throughout the service:
//! - [`Lean`]: The editorial bucket an outlet belongs to
//! - [`Article`]: A provider result that survived classification and filtering
//! - [`FactCheckClaim`]: A third-party claim review attached to an article
//! - [`TopicMetadata`]: Cosmetic framing for a topic, generated by the LLM
//! - [`Perspective`]: One lean's column in the topic-search response
//!
//! Wire types use camelCase field names to match what the web client expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Editorial orientation of an outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lean {
    Left,
    Center,
    Right,
}

impl Lean {
    /// All leans in display order.
    pub const ALL: [Lean; 3] = [Lean::Left, Lean::Center, Lean::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lean::Left => "left",
            Lean::Center => "center",
            Lean::Right => "right",
        }
    }

    /// Column label used when the lean has at least one article.
    pub fn label(&self) -> &'static str {
        match self {
            Lean::Left => "Left-Leaning Source",
            Lean::Center => "Center Source",
            Lean::Right => "Right-Leaning Source",
        }
    }

    /// Column label used when every provider came back empty for this lean.
    pub fn empty_label(&self) -> String {
        format!("No {} sources found", self.as_str())
    }
}

impl fmt::Display for Lean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lean {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Lean::Left),
            "center" | "centre" => Ok(Lean::Center),
            "right" => Ok(Lean::Right),
            other => Err(format!("unknown lean: {other}")),
        }
    }
}

/// A news article accepted from a provider.
///
/// Articles are only ever constructed from a real provider result whose URL
/// passed the outlet classifier, so `lean` and `outlet` always come from the
/// curated table, never from the provider's own labelling.
///
/// # Fields
///
/// * `url` - Link as returned by the provider; its normalised form is the identity
/// * `title` - Cleaned headline (may be back-filled by metadata repair)
/// * `outlet` - Display name of the publishing outlet
/// * `snippet` - Cleaned summary text (may be back-filled by metadata repair)
/// * `lean` - Bucket of the outlet that owns `url`
/// * `published_at` - Publication time when the provider reported one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub url: String,
    pub title: String,
    pub outlet: String,
    pub snippet: String,
    #[serde(rename = "perspective")]
    pub lean: Lean,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Verdict bucket derived from a fact-checker's free-text rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Verified,
    Disputed,
    False,
}

/// A fact-check review attached to an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactCheckClaim {
    pub claim_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimant: Option<String>,
    pub rating: String,
    pub status: ClaimStatus,
    pub source: String,
    pub source_url: String,
    pub review_title: String,
}

/// Cosmetic framing for a topic.
///
/// This type deliberately has no article fields: whatever the LLM returns can
/// only ever land in `title`, `description` and `tags`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMetadata {
    pub title: String,
    pub description: String,
    pub date: String,
    pub tags: [String; 3],
}

/// An article together with the fact-checks that passed the relevance gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedArticle {
    #[serde(flatten)]
    pub article: Article,
    pub time_ago: String,
    pub fact_checks: Vec<FactCheckClaim>,
}

/// One lean's column in the topic-search response.
///
/// The representative fields (`outlet`, `headline`, `summary`, `timeAgo`,
/// `articleUrl`) mirror the first article of the lean and are omitted when
/// the lean came back empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Perspective {
    pub perspective: Lean,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ago: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_url: Option<String>,
    pub fact_checks: Vec<FactCheckClaim>,
    pub articles: Vec<EnrichedArticle>,
}

/// Payload of a successful topic search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicReport {
    pub topic: TopicMetadata,
    pub perspectives: Vec<Perspective>,
}

/// Envelope returned by `/search-perspectives`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TopicSearchResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TopicReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Envelope returned by the per-lean search endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct LeanSearchResponse {
    pub success: bool,
    pub articles: Vec<Article>,
    pub source: String,
}

/// Envelope returned by `/trending-topics`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrendingResponse {
    pub success: bool,
    pub topics: Vec<String>,
}

/// Request body shared by the topic and per-lean endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct TopicRequest {
    #[serde(default)]
    pub topic: Option<String>,
}

/// Request body of `/fact-check`.
#[derive(Debug, Default, Deserialize)]
pub struct ClaimsRequest {
    #[serde(default)]
    pub claims: Option<Vec<String>>,
}

/// Aggregate verdict for a free-standing claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Disputed,
    False,
    Unverified,
}

/// A single publisher review of a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimReview {
    pub publisher: String,
    pub url: String,
    pub title: String,
    pub rating: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_date: Option<String>,
}

/// A claim found in the fact-check database together with its reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactCheckEntry {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_date: Option<String>,
    pub reviews: Vec<ClaimReview>,
}

/// Result of verifying one claim submitted to `/fact-check`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimVerification {
    pub original_claim: String,
    pub verified: bool,
    pub status: VerificationStatus,
    pub fact_checks: Vec<FactCheckEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl ClaimVerification {
    /// A claim nobody has reviewed (or that could not be looked up).
    pub fn unverified(claim: &str) -> Self {
        Self {
            original_claim: claim.to_string(),
            verified: false,
            status: VerificationStatus::Unverified,
            fact_checks: Vec::new(),
            source: None,
            source_url: None,
        }
    }
}

/// Envelope returned by `/fact-check`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimsResponse {
    pub success: bool,
    pub data: Vec<ClaimVerification>,
}
