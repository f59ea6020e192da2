//! Multi-provider search orchestration.
//!
//! Every requested lean is searched independently and concurrently. The
//! primary provider is asked first; a lean that comes back short is then
//! escalated through an ordered list of [`Attempt`]s (broader recency
//! windows, then the fallback providers, then unconstrained queries) until
//! it is satisfied or the list runs out.
//!
//! A lean that is still empty at the end stays empty. Nothing in here ever
//! creates an [`Article`]; every article traces back to a provider result.

use crate::models::{Article, Lean};
use crate::providers::{self, Recency, Scope, SearchProvider, SearchRequest};
use crate::utils::normalize_url;
use futures::future::join_all;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

/// One step of the escalation plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// Index into the provider list.
    pub provider: usize,
    pub recency: Recency,
    pub scope: Scope,
}

/// Articles grouped by lean together with the provider that supplied them.
#[derive(Debug, Default)]
pub struct SearchResult {
    pub by_lean: BTreeMap<Lean, Vec<Article>>,
    pub sources: BTreeMap<Lean, &'static str>,
}

impl SearchResult {
    pub fn articles(&self, lean: Lean) -> &[Article] {
        self.by_lean.get(&lean).map(Vec::as_slice).unwrap_or_default()
    }

    /// Name of the first provider that contributed to `lean`, or `"none"`.
    pub fn source(&self, lean: Lean) -> &'static str {
        self.sources.get(&lean).copied().unwrap_or("none")
    }

    pub fn is_empty(&self) -> bool {
        self.by_lean.values().all(Vec::is_empty)
    }

    pub fn total(&self) -> usize {
        self.by_lean.values().map(Vec::len).sum()
    }
}

/// The fallback sequence for a lean the primary pass left short.
///
/// 1. The primary provider with month and year windows
/// 2. Each fallback provider with week, month and year windows
/// 3. Every provider once more without the domain constraint
///
/// Providers that ignore recency get a single constrained attempt instead
/// of three identical ones.
pub fn escalation_plan(providers: &[Arc<dyn SearchProvider>]) -> Vec<Attempt> {
    let mut plan = Vec::new();

    for (i, provider) in providers.iter().enumerate() {
        let windows: Vec<Recency> = match (i, provider.supports_recency()) {
            (0, true) => Recency::ESCALATION[1..].to_vec(),
            (0, false) => Vec::new(),
            (_, true) => Recency::ESCALATION.to_vec(),
            (_, false) => vec![Recency::Any],
        };
        plan.extend(windows.into_iter().map(|recency| Attempt {
            provider: i,
            recency,
            scope: Scope::Constrained,
        }));
    }

    for (i, provider) in providers.iter().enumerate() {
        plan.push(Attempt {
            provider: i,
            recency: if provider.supports_recency() {
                Recency::Month
            } else {
                Recency::Any
            },
            scope: Scope::Unconstrained,
        });
    }
    plan
}

/// Keeps rate-limited providers from being called faster than they allow.
///
/// Shared by every lean of one orchestration. A provider with a per-lean
/// delay has its call starts spaced at least that far apart; all other
/// providers pass straight through. Nothing is shared across requests.
struct Pacer {
    last_call: Vec<Mutex<Option<Instant>>>,
}

impl Pacer {
    fn new(n: usize) -> Self {
        Self {
            last_call: (0..n).map(|_| Mutex::new(None)).collect(),
        }
    }

    async fn wait(&self, index: usize, provider: &dyn SearchProvider) {
        let Some(delay) = provider.lean_delay() else {
            return;
        };
        // Held through the sleep so concurrent leans queue behind each other.
        let mut last = self.last_call[index].lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < delay {
                debug!(provider = provider.name(), wait_ms = (delay - elapsed).as_millis() as u64, "Pacing provider");
                sleep(delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Accepted articles for one lean and the provider that first filled it.
#[derive(Debug, Default)]
struct LeanBucket {
    articles: Vec<Article>,
    source: Option<&'static str>,
}

impl LeanBucket {
    /// Merge new articles, dropping URLs already present.
    fn absorb(&mut self, lean: Lean, provider: &'static str, articles: Vec<Article>) {
        // Adapters filter by lean already; this keeps a misbehaving one honest.
        let articles: Vec<Article> = articles.into_iter().filter(|a| a.lean == lean).collect();
        if articles.is_empty() {
            return;
        }
        let before = self.articles.len();
        self.articles = self
            .articles
            .drain(..)
            .chain(articles)
            .unique_by(|a| normalize_url(&a.url))
            .collect();
        if self.articles.len() > before {
            self.source.get_or_insert(provider);
        }
    }
}

/// Runs providers for a topic and assembles a per-lean result.
pub struct Orchestrator<'a> {
    providers: &'a [Arc<dyn SearchProvider>],
    min_per_lean: usize,
    max_per_lean: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(providers: &'a [Arc<dyn SearchProvider>], min_per_lean: usize, max_per_lean: usize) -> Self {
        Self {
            providers,
            min_per_lean: min_per_lean.max(1),
            max_per_lean: max_per_lean.max(1),
        }
    }

    /// Search every lean in `leans` and return whatever real results exist.
    ///
    /// Leans run concurrently; only providers that declare a per-lean delay
    /// are serialized between them.
    #[instrument(level = "info", skip_all, fields(topic = %topic, leans = leans.len()))]
    pub async fn orchestrate(&self, topic: &str, leans: &[Lean]) -> SearchResult {
        let t0 = Instant::now();
        let mut result = SearchResult::default();
        for &lean in leans {
            result.by_lean.insert(lean, Vec::new());
        }
        if self.providers.is_empty() {
            info!("No search providers configured; returning empty result");
            return result;
        }

        let pacer = Pacer::new(self.providers.len());
        let plan = escalation_plan(self.providers);
        let buckets = join_all(
            leans
                .iter()
                .map(|&lean| self.search_lean(topic, lean, &plan, &pacer)),
        )
        .await;

        for (lean, mut bucket) in buckets {
            bucket.articles.truncate(self.max_per_lean);
            if let Some(source) = bucket.source {
                result.sources.insert(lean, source);
            }
            result.by_lean.insert(lean, bucket.articles);
        }
        info!(
            total = result.total(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Orchestration finished"
        );
        result
    }

    /// Primary pass for one lean, then the escalation plan while it is short.
    async fn search_lean(
        &self,
        topic: &str,
        lean: Lean,
        plan: &[Attempt],
        pacer: &Pacer,
    ) -> (Lean, LeanBucket) {
        let mut bucket = LeanBucket::default();
        let primary = &self.providers[0];

        pacer.wait(0, primary.as_ref()).await;
        let request = Self::request(topic, lean, Recency::Week, Scope::Constrained);
        bucket.absorb(lean, primary.name(), providers::search(primary.as_ref(), &request).await);

        if bucket.articles.len() >= self.min_per_lean {
            return (lean, bucket);
        }
        info!(lean = %lean, count = bucket.articles.len(), "Escalating lean below minimum");

        for attempt in plan {
            if bucket.articles.len() >= self.min_per_lean {
                break;
            }
            let provider = &self.providers[attempt.provider];
            pacer.wait(attempt.provider, provider.as_ref()).await;
            let request = Self::request(topic, lean, attempt.recency, attempt.scope);
            let articles = providers::search(provider.as_ref(), &request).await;
            bucket.absorb(lean, provider.name(), articles);
        }
        info!(lean = %lean, count = bucket.articles.len(), "Lean escalation finished");
        (lean, bucket)
    }

    fn request(topic: &str, lean: Lean, recency: Recency, scope: Scope) -> SearchRequest<'_> {
        SearchRequest {
            topic,
            lean,
            recency,
            scope,
        }
    }
}
