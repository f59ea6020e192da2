//! Curated outlet table and URL classification.
//!
//! Every outlet the service will show is listed exactly once in [`OUTLETS`],
//! tagged with its lean and display name. Lean lists and the display-name map
//! are both derived from that single table, so one domain can never end up
//! in two buckets.
//!
//! Lean assignments follow AllSides ratings (Left and Lean Left are folded
//! into `left`, Right and Lean Right into `right`).

use crate::models::Lean;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use url::Url;

/// `(registrable domain, lean, display name)`.
pub const OUTLETS: &[(&str, Lean, &str)] = &[
    // left
    ("msnbc.com", Lean::Left, "MSNBC"),
    ("cnn.com", Lean::Left, "CNN"),
    ("nytimes.com", Lean::Left, "New York Times"),
    ("washingtonpost.com", Lean::Left, "Washington Post"),
    ("theguardian.com", Lean::Left, "The Guardian"),
    ("huffpost.com", Lean::Left, "HuffPost"),
    ("vox.com", Lean::Left, "Vox"),
    ("slate.com", Lean::Left, "Slate"),
    ("theatlantic.com", Lean::Left, "The Atlantic"),
    ("thedailybeast.com", Lean::Left, "The Daily Beast"),
    ("motherjones.com", Lean::Left, "Mother Jones"),
    ("thenation.com", Lean::Left, "The Nation"),
    ("jacobin.com", Lean::Left, "Jacobin"),
    ("currentaffairs.org", Lean::Left, "Current Affairs"),
    ("democracynow.org", Lean::Left, "Democracy Now"),
    ("npr.org", Lean::Left, "NPR"),
    ("nbcnews.com", Lean::Left, "NBC News"),
    ("abcnews.go.com", Lean::Left, "ABC News"),
    ("cbsnews.com", Lean::Left, "CBS News"),
    ("politico.com", Lean::Left, "Politico"),
    ("newyorker.com", Lean::Left, "The New Yorker"),
    ("time.com", Lean::Left, "TIME"),
    ("buzzfeednews.com", Lean::Left, "BuzzFeed News"),
    ("theintercept.com", Lean::Left, "The Intercept"),
    ("propublica.org", Lean::Left, "ProPublica"),
    ("salon.com", Lean::Left, "Salon"),
    ("vanityfair.com", Lean::Left, "Vanity Fair"),
    ("rollingstone.com", Lean::Left, "Rolling Stone"),
    ("esquire.com", Lean::Left, "Esquire"),
    ("gq.com", Lean::Left, "GQ"),
    ("bloomberg.com", Lean::Left, "Bloomberg"),
    ("businessinsider.com", Lean::Left, "Business Insider"),
    ("vice.com", Lean::Left, "Vice"),
    ("wired.com", Lean::Left, "Wired"),
    ("arstechnica.com", Lean::Left, "Ars Technica"),
    // center
    ("reuters.com", Lean::Center, "Reuters"),
    ("apnews.com", Lean::Center, "AP News"),
    ("bbc.com", Lean::Center, "BBC"),
    ("bbc.co.uk", Lean::Center, "BBC"),
    ("c-span.org", Lean::Center, "C-SPAN"),
    ("allsides.com", Lean::Center, "AllSides"),
    ("thehill.com", Lean::Center, "The Hill"),
    ("axios.com", Lean::Center, "Axios"),
    ("realclearpolitics.com", Lean::Center, "RealClearPolitics"),
    ("thefactcheck.org", Lean::Center, "FactCheck.org"),
    ("factcheck.org", Lean::Center, "FactCheck.org"),
    ("csmonitor.com", Lean::Center, "Christian Science Monitor"),
    ("pbs.org", Lean::Center, "PBS"),
    ("usatoday.com", Lean::Center, "USA Today"),
    ("newsweek.com", Lean::Center, "Newsweek"),
    ("forbes.com", Lean::Center, "Forbes"),
    ("marketwatch.com", Lean::Center, "MarketWatch"),
    ("politifact.com", Lean::Center, "PolitiFact"),
    ("snopes.com", Lean::Center, "Snopes"),
    ("aljazeera.com", Lean::Center, "Al Jazeera"),
    ("france24.com", Lean::Center, "France 24"),
    ("dw.com", Lean::Center, "DW News"),
    ("scmp.com", Lean::Center, "South China Morning Post"),
    ("economist.com", Lean::Center, "The Economist"),
    ("ft.com", Lean::Center, "Financial Times"),
    ("barrons.com", Lean::Center, "Barron's"),
    // right
    ("foxnews.com", Lean::Right, "Fox News"),
    ("nypost.com", Lean::Right, "New York Post"),
    ("breitbart.com", Lean::Right, "Breitbart"),
    ("newsmax.com", Lean::Right, "Newsmax"),
    ("oann.com", Lean::Right, "OANN"),
    ("dailywire.com", Lean::Right, "Daily Wire"),
    ("thefederalist.com", Lean::Right, "The Federalist"),
    ("dailycaller.com", Lean::Right, "Daily Caller"),
    ("theblaze.com", Lean::Right, "The Blaze"),
    ("townhall.com", Lean::Right, "Townhall"),
    ("pjmedia.com", Lean::Right, "PJ Media"),
    ("hotair.com", Lean::Right, "Hot Air"),
    ("redstate.com", Lean::Right, "RedState"),
    ("wsj.com", Lean::Right, "Wall Street Journal"),
    ("washingtonexaminer.com", Lean::Right, "Washington Examiner"),
    ("nationalreview.com", Lean::Right, "National Review"),
    ("washingtontimes.com", Lean::Right, "Washington Times"),
    ("freebeacon.com", Lean::Right, "Free Beacon"),
    ("foxbusiness.com", Lean::Right, "Fox Business"),
    ("reason.com", Lean::Right, "Reason"),
    ("spectator.org", Lean::Right, "The American Spectator"),
    ("americanthinker.com", Lean::Right, "American Thinker"),
    ("theepochtimes.com", Lean::Right, "The Epoch Times"),
    ("justthenews.com", Lean::Right, "Just the News"),
    ("dailymail.co.uk", Lean::Right, "Daily Mail"),
];

static BY_DOMAIN: Lazy<HashMap<&'static str, (Lean, &'static str)>> = Lazy::new(|| {
    OUTLETS
        .iter()
        .map(|(domain, lean, name)| (*domain, (*lean, *name)))
        .collect()
});

/// Outcome of classifying a URL against the outlet table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub lean: Lean,
    pub outlet: String,
    /// The table entry that matched (the registrable domain, not the full host).
    pub domain: &'static str,
}

/// Domains belonging to `lean`, in table order.
pub fn domains_for(lean: Lean) -> Vec<&'static str> {
    OUTLETS
        .iter()
        .filter(|(_, l, _)| *l == lean)
        .map(|(d, _, _)| *d)
        .collect()
}

/// Lower-cased hostname of `url` without a leading `www.`.
pub fn normalized_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Map a URL onto the outlet table.
///
/// The hostname matches an entry when it equals the entry's domain or ends
/// with `"." + domain`, so `edition.cnn.com` inherits `cnn.com`'s lean.
/// Unparseable URLs and unknown hosts yield `None`; callers must discard
/// those results rather than defaulting them to any lean.
///
/// # Examples
///
/// ```ignore
/// let c = classify("https://www.foxnews.com/politics/story").unwrap();
/// assert_eq!(c.lean, Lean::Right);
/// assert_eq!(c.outlet, "Fox News");
/// ```
pub fn classify(url: &str) -> Option<Classification> {
    let host = normalized_host(url)?;

    // Walk from the full host toward the apex so the most specific entry wins.
    let mut candidate = host.as_str();
    loop {
        if let Some((domain, (lean, name))) = BY_DOMAIN.get_key_value(candidate) {
            return Some(Classification {
                lean: *lean,
                outlet: (*name).to_string(),
                domain: *domain,
            });
        }
        match candidate.split_once('.') {
            Some((_, rest)) if rest.contains('.') => candidate = rest,
            _ => return None,
        }
    }
}
