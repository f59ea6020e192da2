//! Cleaning of provider-supplied titles and snippets.
//!
//! Providers hand back headlines with stray HTML, and scrape-based providers
//! hand back whole pages of markdown. [`clean_text`] handles the former;
//! [`clean_snippet`] digs a usable lead sentence out of the latter.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static ENTITIES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)&(#\d+|#x[0-9a-f]+|[a-z]+);").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static MD_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static MD_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static MD_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s*").unwrap());
static MD_QUOTE_OR_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:>+|[-*+]|\d+\.)\s+").unwrap());
static MD_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_`~]{1,3}").unwrap());
static MD_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(?:-{3,}|\*{3,}|_{3,}|\|.*\|)\s*$").unwrap());
static BARE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

/// Sentences matching any of these are navigation, bylines, ads or market
/// tickers rather than article prose.
static BOILERPLATE: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)^(advertisement|sponsored|skip to|jump to|sign (up|in)|log ?in|subscribe|share (this|on)|follow us|click here|read more|watch:|listen:|related:|see also|more from|most popular|trending now)",
        r"(?i)\b(cookie|newsletter|privacy policy|terms of (use|service)|all rights reserved|copyright ©|©\s*\d{4})",
        r"(?i)^(by|written by|reporting by|updated|published|posted)\s",
        r"(?i)\b(min read|minute read|enable javascript|your browser|download the app)\b",
        r"\b[A-Z]{1,5}\s*[+-]\d+(\.\d+)?%",
        r"(?i)\b(dow|nasdaq|s&p 500)\b.*[+-]\d",
    ])
    .unwrap()
});

/// Minimum length of a sentence picked as a snippet.
const MIN_SENTENCE_LEN: usize = 60;

/// Minimum share of alphabetic characters in a picked sentence.
const MIN_LETTER_RATIO: f64 = 0.5;

/// Decode the handful of entities that carry meaning in headlines.
fn decode_common_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
}

/// Strip HTML tags and entities and collapse whitespace.
///
/// Meaningful punctuation entities (`&amp;`, quotes, apostrophes) are
/// decoded; every other entity becomes a space.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_text("<b>Hello</b>&nbsp;world"), "Hello world");
/// ```
pub fn clean_text(raw: &str) -> String {
    let no_tags = TAGS.replace_all(raw, "");
    let decoded = decode_common_entities(&no_tags);
    let no_entities = ENTITIES.replace_all(&decoded, " ");
    WHITESPACE.replace_all(&no_entities, " ").trim().to_string()
}

/// Flatten markdown into plain prose.
///
/// Images are dropped, links become their label text, and heading,
/// emphasis, quote and list markers are removed.
pub fn markdown_to_text(markdown: &str) -> String {
    let s = MD_IMAGE.replace_all(markdown, "");
    let s = MD_LINK.replace_all(&s, "$1");
    let s = BARE_URL.replace_all(&s, "");
    let s = MD_RULE.replace_all(&s, "");
    let s = MD_HEADING.replace_all(&s, "");
    let s = MD_QUOTE_OR_BULLET.replace_all(&s, "");
    let s = MD_EMPHASIS.replace_all(&s, "");
    clean_text(&s)
}

/// Split prose into sentences on `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let terminal = matches!(c, '.' | '!' | '?');
        if terminal && chars.peek().is_none_or(|n| n.is_whitespace()) {
            let s = current.trim();
            if !s.is_empty() {
                sentences.push(s.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

fn letter_ratio(s: &str) -> f64 {
    let total = s.chars().count();
    if total == 0 {
        return 0.0;
    }
    let letters = s.chars().filter(|c| c.is_alphabetic()).count();
    letters as f64 / total as f64
}

fn is_boilerplate(sentence: &str) -> bool {
    BOILERPLATE.is_match(sentence)
}

/// Pick the best available snippet from a scraped page.
///
/// The markdown body is flattened to prose and the first sentence that is
/// at least 60 characters, is not boilerplate, and is at least half letters
/// wins. Otherwise the cleaned `description` is used, then the cleaned
/// `title`.
pub fn clean_snippet(markdown: &str, description: &str, title: &str) -> String {
    let prose = markdown_to_text(markdown);
    let picked = split_sentences(&prose).into_iter().find(|s| {
        s.chars().count() >= MIN_SENTENCE_LEN
            && !is_boilerplate(s)
            && letter_ratio(s) >= MIN_LETTER_RATIO
    });
    if let Some(sentence) = picked {
        return sentence;
    }

    let description = clean_text(description);
    if !description.is_empty() {
        return description;
    }
    clean_text(title)
}
