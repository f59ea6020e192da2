//! Building the topic-search response.
//!
//! Every representative field of a [`Perspective`] (outlet, headline,
//! summary, URL) is copied from a real [`Article`]; the generated
//! [`TopicMetadata`] only ever lands in the `topic` section.

use crate::models::{
    Article, EnrichedArticle, FactCheckClaim, Lean, Perspective, TopicMetadata, TopicReport,
};
use crate::utils::time_ago;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Pair articles with their fact-checks and render their age.
///
/// `claims` is aligned with `articles`; missing entries mean no claims.
pub fn enrich_articles(
    articles: Vec<Article>,
    claims: Vec<Vec<FactCheckClaim>>,
    now: DateTime<Utc>,
) -> Vec<EnrichedArticle> {
    let mut claims = claims.into_iter();
    articles
        .into_iter()
        .map(|article| EnrichedArticle {
            time_ago: time_ago(article.published_at, now),
            fact_checks: claims.next().unwrap_or_default(),
            article,
        })
        .collect()
}

/// One lean's column. Empty leans keep their slot with a "no sources" label.
pub fn perspective(lean: Lean, articles: Vec<EnrichedArticle>) -> Perspective {
    let Some(first) = articles.first() else {
        return Perspective {
            perspective: lean,
            label: lean.empty_label(),
            outlet: None,
            headline: None,
            summary: None,
            time_ago: None,
            article_url: None,
            fact_checks: Vec::new(),
            articles,
        };
    };

    Perspective {
        perspective: lean,
        label: lean.label().to_string(),
        outlet: Some(first.article.outlet.clone()),
        headline: Some(first.article.title.clone()),
        summary: Some(first.article.snippet.clone()),
        time_ago: Some(first.time_ago.clone()),
        article_url: Some(first.article.url.clone()),
        fact_checks: first.fact_checks.clone(),
        articles,
    }
}

/// The full report, with all three leans in display order.
pub fn assemble(mut by_lean: BTreeMap<Lean, Vec<EnrichedArticle>>, topic: TopicMetadata) -> TopicReport {
    let perspectives = Lean::ALL
        .iter()
        .map(|&lean| perspective(lean, by_lean.remove(&lean).unwrap_or_default()))
        .collect();
    TopicReport { topic, perspectives }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClaimStatus;
    use chrono::{Duration, TimeZone};

    fn article(url: &str, lean: Lean, published_at: Option<DateTime<Utc>>) -> Article {
        Article {
            url: url.to_string(),
            title: format!("Headline {url}"),
            outlet: "Outlet".to_string(),
            snippet: "Summary".to_string(),
            lean,
            published_at,
        }
    }

    fn claim() -> FactCheckClaim {
        FactCheckClaim {
            claim_text: "Claim".to_string(),
            claimant: None,
            rating: "False".to_string(),
            status: ClaimStatus::False,
            source: "PolitiFact".to_string(),
            source_url: "https://politifact.com/x".to_string(),
            review_title: "Review".to_string(),
        }
    }

    fn metadata() -> TopicMetadata {
        TopicMetadata {
            title: "Climate Policy".to_string(),
            description: "d".to_string(),
            date: "May 6, 2025".to_string(),
            tags: ["A".to_string(), "B".to_string(), "C".to_string()],
        }
    }

    #[test]
    fn test_enrich_articles_aligns_claims_and_age() {
        let now = Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap();
        let articles = vec![
            article("https://cnn.com/a", Lean::Left, Some(now - Duration::hours(3))),
            article("https://vox.com/b", Lean::Left, None),
        ];
        let enriched = enrich_articles(articles, vec![vec![claim()]], now);
        assert_eq!(enriched[0].time_ago, "3 hours ago");
        assert_eq!(enriched[0].fact_checks.len(), 1);
        assert_eq!(enriched[1].time_ago, "Recently");
        assert!(enriched[1].fact_checks.is_empty());
    }

    #[test]
    fn test_assemble_keeps_empty_lean_with_label() {
        let now = Utc::now();
        let mut by_lean = BTreeMap::new();
        by_lean.insert(
            Lean::Left,
            enrich_articles(
                vec![
                    article("https://cnn.com/a", Lean::Left, None),
                    article("https://vox.com/b", Lean::Left, None),
                ],
                vec![vec![claim()]],
                now,
            ),
        );
        by_lean.insert(Lean::Center, Vec::new());
        by_lean.insert(
            Lean::Right,
            enrich_articles(vec![article("https://foxnews.com/c", Lean::Right, None)], vec![], now),
        );

        let report = assemble(by_lean, metadata());
        let leans: Vec<Lean> = report.perspectives.iter().map(|p| p.perspective).collect();
        assert_eq!(leans, Lean::ALL);

        let left = &report.perspectives[0];
        assert_eq!(left.articles.len(), 2);
        assert_eq!(left.article_url.as_deref(), Some("https://cnn.com/a"));
        assert_eq!(left.headline.as_deref(), Some("Headline https://cnn.com/a"));
        assert_eq!(left.fact_checks.len(), 1);

        let center = &report.perspectives[1];
        assert!(center.articles.is_empty());
        assert_eq!(center.label, "No center sources found");
        assert!(center.article_url.is_none());

        assert_eq!(report.perspectives[2].articles.len(), 1);
    }

    #[test]
    fn test_empty_perspective_serialization() {
        let p = perspective(Lean::Right, Vec::new());
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["perspective"], "right");
        assert_eq!(json["articles"], serde_json::json!([]));
        assert!(json.get("articleUrl").is_none());
    }

    #[test]
    fn test_all_empty_report() {
        let report = assemble(BTreeMap::new(), metadata());
        assert_eq!(report.perspectives.len(), 3);
        assert!(report.perspectives.iter().all(|p| p.articles.is_empty()));
    }
}
