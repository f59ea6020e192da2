//! Heuristic rejection of non-article URLs.
//!
//! Search providers happily return outlet homepages, author bios and tag
//! listings. This filter drops the obvious ones by looking at the path
//! shape only. It is lossy in both directions (a short real slug is
//! rejected, a long section page slips through) and is meant as a cheap
//! first pass, not a precise classifier.

use url::Url;

/// Path prefixes that hold people/author listings.
const LISTING_PREFIXES: &[&str] = &["/author", "/people", "/by/", "/contributors"];

/// Path segments that mark taxonomy pages.
const TAXONOMY_MARKERS: &[&str] = &["/tag/", "/tags/", "/category/", "/categories/", "/topic/", "/topics/"];

/// Paths shorter than this are assumed to be section fronts.
const MIN_PATH_LEN: usize = 10;

/// Does `url` look like it points at a single article?
///
/// Rejects the root path, author/people listings, tag/category/topic pages
/// and any path shorter than ten characters. Unparseable URLs are rejected.
pub fn is_article_path(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path().to_ascii_lowercase();

    if path.is_empty() || path == "/" {
        return false;
    }
    if LISTING_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return false;
    }
    if TAXONOMY_MARKERS.iter().any(|m| path.contains(m)) {
        return false;
    }
    path.len() >= MIN_PATH_LEN
}
