//! Runtime configuration: credentials from the CLI/environment plus
//! optional tunables from a YAML settings file.
//!
//! Every settings field has a default, so the file only needs the values
//! being changed:
//!
//! ```yaml
//! provider_order: [brave, perplexity, firecrawl]
//! max_articles_per_lean: 3
//! brave:
//!   lean_delay_ms: 1500
//! ```

use crate::auth::ServiceAccount;
use crate::cli::Cli;
use serde::Deserialize;
use std::error::Error;
use tokio::fs;
use tracing::{info, instrument, warn};

/// External search backends, in the order they are named in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Brave,
    Vertex,
    Perplexity,
    Firecrawl,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BraveSettings {
    pub base_url: String,
    pub count: u32,
    /// Pause between per-lean calls; the free tier allows one request a second.
    pub lean_delay_ms: u64,
    pub max_site_clauses: usize,
}

impl Default for BraveSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.search.brave.com".to_string(),
            count: 20,
            lean_delay_ms: 1000,
            max_site_clauses: 12,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FirecrawlSettings {
    pub base_url: String,
    pub limit: u32,
    pub max_site_clauses: usize,
    pub scrape_timeout_ms: u64,
}

impl Default for FirecrawlSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.firecrawl.dev".to_string(),
            limit: 30,
            max_site_clauses: 8,
            scrape_timeout_ms: 6500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerplexitySettings {
    pub base_url: String,
    pub model: String,
    /// Perplexity rejects domain filters longer than this.
    pub max_domain_filter: usize,
    pub trending_model: String,
}

impl Default for PerplexitySettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.perplexity.ai".to_string(),
            model: "sonar".to_string(),
            max_domain_filter: 20,
            trending_model: "sonar".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VertexSettings {
    pub base_url: String,
    pub location: String,
    pub page_size: u32,
    pub max_site_clauses: usize,
}

impl Default for VertexSettings {
    fn default() -> Self {
        Self {
            base_url: "https://discoveryengine.googleapis.com".to_string(),
            location: "global".to_string(),
            page_size: 10,
            max_site_clauses: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub url: String,
    pub model: String,
    pub temperature: f32,
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: "https://ai.gateway.lovable.dev/v1/chat/completions".to_string(),
            model: "google/gemini-2.5-flash".to_string(),
            temperature: 0.3,
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 4000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FactCheckSettings {
    pub base_url: String,
    pub enabled: bool,
    pub max_per_article: usize,
    pub page_size: u32,
    /// Append the first sentence of the snippet to the per-article query.
    pub include_summary: bool,
}

impl Default for FactCheckSettings {
    fn default() -> Self {
        Self {
            base_url: "https://factchecktools.googleapis.com".to_string(),
            enabled: true,
            max_per_article: 3,
            page_size: 10,
            include_summary: false,
        }
    }
}

/// Bounded retry for transient connection failures against providers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub attempts: u32,
    /// Fixed step; the n-th retry waits `backoff_ms * n`.
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff_ms: 300,
        }
    }
}

/// Tunables loaded from the optional YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// First entry is the primary provider; the rest are fallbacks in order.
    pub provider_order: Vec<ProviderKind>,
    /// A lean stops escalating once it has this many articles.
    pub min_articles_per_lean: usize,
    pub max_articles_per_lean: usize,
    pub repair_metadata: bool,
    pub brave: BraveSettings,
    pub firecrawl: FirecrawlSettings,
    pub perplexity: PerplexitySettings,
    pub vertex: VertexSettings,
    pub gateway: GatewaySettings,
    pub fact_check: FactCheckSettings,
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider_order: vec![
                ProviderKind::Brave,
                ProviderKind::Vertex,
                ProviderKind::Perplexity,
                ProviderKind::Firecrawl,
            ],
            min_articles_per_lean: 1,
            max_articles_per_lean: 5,
            repair_metadata: true,
            brave: BraveSettings::default(),
            firecrawl: FirecrawlSettings::default(),
            perplexity: PerplexitySettings::default(),
            vertex: VertexSettings::default(),
            gateway: GatewaySettings::default(),
            fact_check: FactCheckSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

/// Secrets and identifiers supplied through the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub brave: Option<String>,
    pub firecrawl: Option<String>,
    pub perplexity: Option<String>,
    pub ai_gateway: Option<String>,
    pub fact_check: Option<String>,
    pub service_account: Option<ServiceAccount>,
    pub vertex_project: Option<String>,
    pub vertex_engine: Option<String>,
}

/// Everything a request handler needs to know about its environment.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: Settings,
    pub credentials: Credentials,
}

/// Treat blank environment values the same as unset ones.
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse the YAML settings file contents.
pub fn parse_settings(yaml: &str) -> Result<Settings, serde_yaml::Error> {
    if yaml.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(yaml)
}

/// Resolve a service-account credential given either inline JSON or a path.
///
/// A credential that cannot be read or parsed is logged and dropped so the
/// provider that needs it is skipped instead of failing startup.
async fn load_service_account(raw: &str) -> Option<ServiceAccount> {
    let json = if raw.trim_start().starts_with('{') {
        raw.to_string()
    } else {
        match fs::read_to_string(raw).await {
            Ok(s) => s,
            Err(e) => {
                warn!(path = raw, error = %e, "Cannot read service-account file; Vertex search disabled");
                return None;
            }
        }
    };
    match ServiceAccount::from_json(&json) {
        Ok(sa) => Some(sa),
        Err(e) => {
            warn!(error = %e, "Invalid service-account JSON; Vertex search disabled");
            None
        }
    }
}

impl Config {
    /// Build the runtime configuration from parsed CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file was named but cannot be read or
    /// parsed. Missing credentials are never an error here.
    #[instrument(level = "info", skip_all)]
    pub async fn load(cli: &Cli) -> Result<Self, Box<dyn Error>> {
        let settings = match &cli.config {
            Some(path) => {
                let yaml = fs::read_to_string(path).await?;
                let settings = parse_settings(&yaml)?;
                info!(path = %path, "Loaded settings file");
                settings
            }
            None => Settings::default(),
        };

        let service_account = match non_empty(cli.service_account.clone()) {
            Some(raw) => load_service_account(&raw).await,
            None => None,
        };

        let credentials = Credentials {
            brave: non_empty(cli.brave_api_key.clone()),
            firecrawl: non_empty(cli.firecrawl_api_key.clone()),
            perplexity: non_empty(cli.perplexity_api_key.clone()),
            ai_gateway: non_empty(cli.ai_gateway_api_key.clone()),
            fact_check: non_empty(cli.fact_check_api_key.clone()),
            service_account,
            vertex_project: non_empty(cli.vertex_project_id.clone()),
            vertex_engine: non_empty(cli.vertex_engine_id.clone()),
        };

        info!(
            brave = credentials.brave.is_some(),
            firecrawl = credentials.firecrawl.is_some(),
            perplexity = credentials.perplexity.is_some(),
            ai_gateway = credentials.ai_gateway.is_some(),
            fact_check = credentials.fact_check.is_some(),
            vertex = credentials.service_account.is_some()
                && credentials.vertex_project.is_some()
                && credentials.vertex_engine.is_some(),
            "Resolved provider credentials"
        );

        Ok(Self {
            settings,
            credentials,
        })
    }
}
