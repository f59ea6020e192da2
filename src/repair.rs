//! Back-filling of placeholder titles and snippets.
//!
//! Some providers return little more than a URL. Before an article is shown,
//! a placeholder title (`"Article from <outlet>"`, empty, or just the outlet
//! name) or a thin snippet is replaced with what the page itself declares in
//! its Open Graph and `<meta>` tags.
//!
//! Pages are read through Firecrawl's scrape API when it is configured,
//! otherwise fetched directly and parsed with `scraper`. Either way the call
//! is bounded by the scrape timeout, and only `title` and `snippet` may
//! change; URL, outlet and lean are never touched.

use crate::error::ProviderError;
use crate::models::Article;
use crate::providers::firecrawl::{Firecrawl, ScrapedPage};
use crate::text::clean_text;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Snippets shorter than this are treated as missing.
const MIN_SNIPPET_CHARS: usize = 40;

/// Concurrent page fetches per request.
const REPAIR_CONCURRENCY: usize = 6;

static TITLE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        r#"meta[property="og:title"]"#,
        r#"meta[name="twitter:title"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

static DESCRIPTION_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        r#"meta[property="og:description"]"#,
        r#"meta[name="twitter:description"]"#,
        r#"meta[name="description"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

static TITLE_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

pub fn is_placeholder_title(article: &Article) -> bool {
    let title = article.title.trim();
    title.is_empty()
        || title.starts_with("Article from ")
        || title.eq_ignore_ascii_case(article.outlet.trim())
}

pub fn is_placeholder_snippet(article: &Article) -> bool {
    let snippet = article.snippet.trim();
    snippet.is_empty() || snippet == article.title.trim() || snippet.chars().count() < MIN_SNIPPET_CHARS
}

pub fn needs_repair(article: &Article) -> bool {
    is_placeholder_title(article) || is_placeholder_snippet(article)
}

/// Read title and description out of a page's HTML head.
pub fn parse_page_meta(html: &str) -> ScrapedPage {
    let document = Html::parse_document(html);
    let first_content = |selectors: &[Selector]| {
        selectors.iter().find_map(|sel| {
            document
                .select(sel)
                .filter_map(|el| el.value().attr("content"))
                .map(clean_text)
                .find(|s| !s.is_empty())
        })
    };

    let title = first_content(&TITLE_SELECTORS).or_else(|| {
        document
            .select(&TITLE_TAG)
            .next()
            .map(|el| clean_text(&el.text().collect::<String>()))
            .filter(|s| !s.is_empty())
    });
    let description = first_content(&DESCRIPTION_SELECTORS);
    ScrapedPage { title, description }
}

/// Fetch a page directly and read its metadata.
#[instrument(level = "debug", skip(http))]
async fn fetch_page_meta(http: &Client, url: &str, limit: Duration) -> Result<ScrapedPage, ProviderError> {
    let response = http
        .get(url)
        .timeout(limit)
        .header("Accept", "text/html")
        .send()
        .await
        .map_err(|source| ProviderError::Http {
            provider: "direct",
            source,
        })?;
    if !response.status().is_success() {
        return Err(ProviderError::Status {
            provider: "direct",
            status: response.status().as_u16(),
            body: String::new(),
        });
    }
    let html = response.text().await.map_err(|source| ProviderError::Http {
        provider: "direct",
        source,
    })?;
    Ok(parse_page_meta(&html))
}

/// Apply scraped metadata, replacing only placeholder values.
fn apply(mut article: Article, page: ScrapedPage) -> Article {
    if is_placeholder_title(&article) {
        if let Some(title) = page.title.filter(|t| !t.eq_ignore_ascii_case(&article.outlet)) {
            article.title = title;
        }
    }
    if is_placeholder_snippet(&article) {
        if let Some(description) = page.description {
            if description.chars().count() > article.snippet.trim().chars().count() {
                article.snippet = description;
            }
        }
    }
    article
}

/// Repair one article, returning it unchanged on any failure.
pub async fn repair_article(
    article: Article,
    firecrawl: Option<&Firecrawl>,
    http: &Client,
    limit: Duration,
) -> Article {
    if !needs_repair(&article) {
        return article;
    }

    let fetch = async {
        match firecrawl {
            Some(fc) => fc.scrape(&article.url).await,
            None => fetch_page_meta(http, &article.url, limit).await,
        }
    };
    match timeout(limit, fetch).await {
        Ok(Ok(page)) => {
            debug!(url = %article.url, "Repaired article metadata");
            apply(article, page)
        }
        Ok(Err(e)) => {
            warn!(url = %article.url, error = %e, "Metadata repair failed");
            article
        }
        Err(_) => {
            warn!(url = %article.url, timeout_ms = limit.as_millis() as u64, "Metadata repair timed out");
            article
        }
    }
}

/// Repair every article that needs it, concurrently, keeping order.
#[instrument(level = "info", skip_all, fields(count = articles.len()))]
pub async fn repair_all(
    articles: Vec<Article>,
    firecrawl: Option<&Firecrawl>,
    http: &Client,
    limit: Duration,
) -> Vec<Article> {
    let pending = articles.iter().filter(|a| needs_repair(a)).count();
    if pending == 0 {
        return articles;
    }
    info!(pending, "Repairing article metadata");

    stream::iter(articles)
        .map(|article| repair_article(article, firecrawl, http, limit))
        .buffered(REPAIR_CONCURRENCY)
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lean;

    fn article(url: &str, title: &str, snippet: &str) -> Article {
        Article {
            url: url.to_string(),
            title: title.to_string(),
            outlet: "Reuters".to_string(),
            snippet: snippet.to_string(),
            lean: Lean::Center,
            published_at: None,
        }
    }

    const GOOD_SNIPPET: &str = "Lawmakers advanced the climate package on Tuesday after a long debate.";

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder_title(&article("u", "Article from Reuters", GOOD_SNIPPET)));
        assert!(is_placeholder_title(&article("u", "", GOOD_SNIPPET)));
        assert!(is_placeholder_title(&article("u", "reuters", GOOD_SNIPPET)));
        assert!(!is_placeholder_title(&article("u", "Senate votes", GOOD_SNIPPET)));

        assert!(is_placeholder_snippet(&article("u", "Senate votes", "Senate votes")));
        assert!(is_placeholder_snippet(&article("u", "Senate votes", "Too short.")));
        assert!(!is_placeholder_snippet(&article("u", "Senate votes", GOOD_SNIPPET)));
    }

    #[test]
    fn test_parse_page_meta_prefers_open_graph() {
        let html = r#"<html><head>
            <title>Fallback | Reuters</title>
            <meta property="og:title" content="Senate advances climate bill">
            <meta name="description" content="Lawmakers &amp; aides worked late into the night.">
        </head><body></body></html>"#;
        let page = parse_page_meta(html);
        assert_eq!(page.title.as_deref(), Some("Senate advances climate bill"));
        assert_eq!(
            page.description.as_deref(),
            Some("Lawmakers & aides worked late into the night.")
        );
    }

    #[test]
    fn test_parse_page_meta_title_tag_fallback() {
        let page = parse_page_meta("<html><head><title> Only title </title></head></html>");
        assert_eq!(page.title.as_deref(), Some("Only title"));
        assert!(page.description.is_none());
    }

    #[test]
    fn test_apply_touches_only_placeholders() {
        let a = article("https://reuters.com/x/story", "Real headline", "Short");
        let page = ScrapedPage {
            title: Some("Different".into()),
            description: Some(GOOD_SNIPPET.into()),
        };
        let repaired = apply(a.clone(), page);
        assert_eq!(repaired.title, "Real headline");
        assert_eq!(repaired.snippet, GOOD_SNIPPET);
        assert_eq!(repaired.url, a.url);
        assert_eq!(repaired.outlet, a.outlet);
        assert_eq!(repaired.lean, a.lean);
    }

    #[tokio::test]
    async fn test_repair_via_direct_fetch() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/world/story-slug")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(format!(
                r#"<html><head><meta property="og:title" content="Recovered headline">
                   <meta property="og:description" content="{GOOD_SNIPPET}"></head></html>"#
            ))
            .create_async()
            .await;

        let url = format!("{}/world/story-slug", server.url());
        let repaired = repair_all(
            vec![article(&url, "Article from Reuters", "")],
            None,
            &Client::new(),
            Duration::from_secs(2),
        )
        .await;

        assert_eq!(repaired[0].title, "Recovered headline");
        assert_eq!(repaired[0].snippet, GOOD_SNIPPET);
    }

    #[tokio::test]
    async fn test_repair_failure_keeps_article() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let url = format!("{}/gone", server.url());
        let original = article(&url, "Article from Reuters", "");
        let repaired = repair_article(original.clone(), None, &Client::new(), Duration::from_secs(2)).await;
        assert_eq!(repaired, original);
    }

    #[tokio::test]
    async fn test_complete_articles_are_not_fetched() {
        let a = article("http://127.0.0.1:9/never", "Headline", GOOD_SNIPPET);
        let out = repair_all(vec![a.clone()], None, &Client::new(), Duration::from_millis(10)).await;
        assert_eq!(out, vec![a]);
    }
}
