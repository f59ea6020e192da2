//! Fact-check enrichment via the Google Fact Check Tools claim search API.
//!
//! Two consumers share the same client:
//!
//! - **Per-article enrichment** ([`FactChecker::enrich`]): searches for
//!   claims about the topic and headline, keeps only claim reviews that pass
//!   a keyword-overlap relevance gate, and maps each free-text rating onto
//!   [`ClaimStatus`]. At most `max_per_article` claims survive.
//! - **Claim verification** ([`FactChecker::verify_claim`]): looks up a
//!   user-supplied claim and summarises every review's rating into one
//!   [`VerificationStatus`].
//!
//! Failures never spread: an article whose lookup fails gets no claims, and
//! a claim whose lookup fails is reported as unverified.

use crate::config::{Config, FactCheckSettings};
use crate::error::ProviderError;
use crate::models::{
    Article, ClaimReview, ClaimStatus, ClaimVerification, FactCheckClaim, FactCheckEntry,
    VerificationStatus,
};
use crate::providers::decode_json;
use crate::text::split_sentences;
use crate::utils::truncate_for_log;
use futures::future::join_all;
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

const NAME: &str = "factcheck";

/// Characters of a query sent to the claim search API.
const MAX_QUERY_CHARS: usize = 200;

/// Entries kept per verified claim.
const MAX_ENTRIES_PER_CLAIM: usize = 3;

/// Shortest token counted as a keyword.
const MIN_KEYWORD_LEN: usize = 4;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "about", "above", "after", "again", "against", "also", "amid", "because", "been", "before",
        "being", "below", "between", "both", "could", "does", "doing", "down", "during", "each",
        "from", "further", "have", "having", "here", "into", "just", "latest", "like", "many",
        "more", "most", "much", "news", "only", "other", "over", "report", "reports", "said",
        "says", "should", "some", "such", "than", "that", "their", "them", "then", "there",
        "these", "they", "this", "those", "through", "today", "under", "until", "very", "were",
        "what", "when", "where", "which", "while", "will", "with", "would", "year", "years",
        "your",
    ]
    .into_iter()
    .collect()
});

/// Lower-cased alphanumeric tokens of at least four characters, minus
/// stopwords, in first-seen order.
pub fn keywords(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_KEYWORD_LEN && !STOPWORDS.contains(t))
        .unique()
        .map(str::to_string)
        .collect()
}

/// Does a claim review actually concern this article?
///
/// At least one topic keyword must occur in `haystack`, and at least two
/// distinct topic-or-headline keywords must occur in total.
pub fn is_relevant(haystack: &str, topic_keywords: &[String], headline_keywords: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    let topic_hits = topic_keywords.iter().filter(|k| haystack.contains(k.as_str())).count();
    if topic_hits == 0 {
        return false;
    }
    let total_hits = topic_keywords
        .iter()
        .chain(headline_keywords)
        .unique()
        .filter(|k| haystack.contains(k.as_str()))
        .count();
    total_hits >= 2
}

/// Map a fact-checker's free-text rating onto a status.
///
/// False markers win over mixed markers, which win over true markers, so
/// "Mostly False" is false and "Half True" is disputed. Anything
/// unrecognised is disputed, never verified.
pub fn rating_status(rating: &str) -> ClaimStatus {
    const FALSE: &[&str] = &["false", "wrong", "pants on fire", "incorrect", "untrue"];
    const MIXED: &[&str] = &["mixed", "partly", "misleading", "half"];
    const TRUE: &[&str] = &["true", "correct", "accurate"];

    let r = rating.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| r.contains(w));
    if has(FALSE) {
        ClaimStatus::False
    } else if has(MIXED) {
        ClaimStatus::Disputed
    } else if has(TRUE) {
        ClaimStatus::Verified
    } else {
        ClaimStatus::Disputed
    }
}

/// Summarise every review rating of a submitted claim.
pub fn aggregate_status(ratings: &[String]) -> VerificationStatus {
    let ratings: Vec<String> = ratings.iter().map(|r| r.to_lowercase()).collect();
    let any = |words: &[&str]| ratings.iter().any(|r| words.iter().any(|w| r.contains(w)));

    let has_true = any(&["true", "correct", "accurate", "verdadeiro"]);
    let has_false = any(&["false", "wrong", "incorrect", "pants on fire", "falso"]);
    let has_mixed = any(&["mixed", "partly", "half", "misleading", "mostly"]);

    if has_false && !has_true {
        VerificationStatus::False
    } else if has_true && !has_false && !has_mixed {
        VerificationStatus::Verified
    } else if has_mixed || (has_true && has_false) {
        VerificationStatus::Disputed
    } else {
        VerificationStatus::Unverified
    }
}

#[derive(Debug, Deserialize)]
struct ClaimSearchResponse {
    #[serde(default)]
    claims: Vec<ApiClaim>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiClaim {
    #[serde(default)]
    text: String,
    #[serde(default)]
    claimant: Option<String>,
    #[serde(default)]
    claim_date: Option<String>,
    #[serde(default)]
    claim_review: Vec<ApiReview>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReview {
    #[serde(default)]
    publisher: Option<Publisher>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    textual_rating: Option<String>,
    #[serde(default)]
    review_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Publisher {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    site: Option<String>,
}

impl ApiReview {
    fn publisher_name(&self) -> String {
        self.publisher
            .as_ref()
            .and_then(|p| p.name.clone().or_else(|| p.site.clone()))
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    fn rating(&self) -> String {
        self.textual_rating
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Keep relevant claim reviews, first come first served, up to `max`.
fn select_claims(claims: Vec<ApiClaim>, topic: &str, headline: &str, max: usize) -> Vec<FactCheckClaim> {
    let topic_keywords = keywords(topic);
    let headline_keywords = keywords(headline);
    let mut seen_urls = HashSet::new();
    let mut selected = Vec::new();

    for claim in claims {
        for review in &claim.claim_review {
            if selected.len() >= max {
                return selected;
            }
            if review.url.is_empty() || !seen_urls.insert(review.url.clone()) {
                continue;
            }
            let haystack = format!("{} {}", claim.text, review.title);
            if !is_relevant(&haystack, &topic_keywords, &headline_keywords) {
                debug!(claim = %truncate_for_log(&claim.text, 80), "Dropping irrelevant claim");
                continue;
            }
            let rating = review.rating();
            selected.push(FactCheckClaim {
                claim_text: claim.text.clone(),
                claimant: claim.claimant.clone(),
                status: rating_status(&rating),
                rating,
                source: review.publisher_name(),
                source_url: review.url.clone(),
                review_title: review.title.clone(),
            });
        }
    }
    selected
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Client for the claim search API.
pub struct FactChecker {
    http: Client,
    api_key: String,
    settings: FactCheckSettings,
}

impl FactChecker {
    pub fn new(http: Client, api_key: String, settings: FactCheckSettings) -> Self {
        Self {
            http,
            api_key,
            settings,
        }
    }

    /// A checker if a key is configured and enrichment is enabled.
    pub fn from_config(config: &Config, http: &Client) -> Option<Self> {
        let key = config.credentials.fact_check.as_ref()?;
        config.settings.fact_check.enabled.then(|| {
            Self::new(http.clone(), key.clone(), config.settings.fact_check.clone())
        })
    }

    async fn search(&self, query: &str, page_size: Option<u32>) -> Result<Vec<ApiClaim>, ProviderError> {
        let url = format!(
            "{}/v1alpha1/claims:search",
            self.settings.base_url.trim_end_matches('/')
        );
        let mut params = vec![
            ("query", truncate_chars(query, MAX_QUERY_CHARS)),
            ("key", self.api_key.clone()),
            ("languageCode", "en".to_string()),
        ];
        if let Some(n) = page_size {
            params.push(("pageSize", n.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: NAME,
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: NAME,
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }
        let parsed: ClaimSearchResponse = decode_json(NAME, response).await?;
        Ok(parsed.claims)
    }

    /// Relevant fact-checks for one article, or none on any failure.
    #[instrument(level = "info", skip_all, fields(url = %article.url))]
    pub async fn enrich(&self, article: &Article, topic: &str) -> Vec<FactCheckClaim> {
        let mut query = format!("{topic} {}", article.title);
        if self.settings.include_summary {
            if let Some(first) = split_sentences(&article.snippet).into_iter().next() {
                query.push(' ');
                query.push_str(&first);
            }
        }

        match self.search(&query, Some(self.settings.page_size)).await {
            Ok(claims) => {
                let raw = claims.len();
                let selected =
                    select_claims(claims, topic, &article.title, self.settings.max_per_article);
                debug!(raw, kept = selected.len(), "Fact-check lookup finished");
                selected
            }
            Err(e) => {
                warn!(error = %e, "Fact-check lookup failed; article left without claims");
                Vec::new()
            }
        }
    }

    /// Enrich every article concurrently; output order matches input order.
    #[instrument(level = "info", skip_all, fields(count = articles.len()))]
    pub async fn enrich_all(&self, articles: &[Article], topic: &str) -> Vec<Vec<FactCheckClaim>> {
        let results = join_all(articles.iter().map(|a| self.enrich(a, topic))).await;
        info!(
            attached = results.iter().map(Vec::len).sum::<usize>(),
            "Fact-check enrichment finished"
        );
        results
    }

    /// Look up one submitted claim and summarise its reviews.
    #[instrument(level = "info", skip_all)]
    pub async fn verify_claim(&self, claim: &str) -> ClaimVerification {
        let claims = match self.search(claim, None).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, claim = %truncate_for_log(claim, 80), "Claim lookup failed");
                return ClaimVerification::unverified(claim);
            }
        };
        if claims.is_empty() {
            return ClaimVerification::unverified(claim);
        }

        let entries: Vec<FactCheckEntry> = claims
            .into_iter()
            .take(MAX_ENTRIES_PER_CLAIM)
            .map(|c| FactCheckEntry {
                reviews: c
                    .claim_review
                    .iter()
                    .map(|r| ClaimReview {
                        publisher: r.publisher_name(),
                        url: r.url.clone(),
                        title: r.title.clone(),
                        rating: r.rating(),
                        review_date: r.review_date.clone(),
                    })
                    .collect(),
                text: c.text,
                claimant: c.claimant,
                claim_date: c.claim_date,
            })
            .collect();

        let ratings: Vec<String> = entries
            .iter()
            .flat_map(|e| e.reviews.iter().map(|r| r.rating.clone()))
            .collect();
        let status = aggregate_status(&ratings);
        let first_review = entries.first().and_then(|e| e.reviews.first());

        ClaimVerification {
            original_claim: claim.to_string(),
            verified: status == VerificationStatus::Verified,
            status,
            source: first_review.map(|r| r.publisher.clone()),
            source_url: first_review.map(|r| r.url.clone()),
            fact_checks: entries,
        }
    }
}

/// Verify each claim concurrently; without a checker every claim is unverified.
pub async fn verify_claims(checker: Option<&FactChecker>, claims: &[String]) -> Vec<ClaimVerification> {
    match checker {
        Some(checker) => join_all(claims.iter().map(|c| checker.verify_claim(c))).await,
        None => {
            info!("Fact-check API key not configured; returning unverified claims");
            claims.iter().map(|c| ClaimVerification::unverified(c)).collect()
        }
    }
}
