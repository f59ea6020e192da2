//! Command-line interface definitions for the perspective search service.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment
//! variables, which is how provider credentials are normally supplied.

use clap::Parser;

/// Command-line arguments for the perspective search service.
///
/// Every provider credential is optional; a provider whose key is absent is
/// skipped. The AI gateway key is only required by `/search-perspectives`.
///
/// # Examples
///
/// ```sh
/// # Listen on the default address with keys from the environment
/// perspective_news
///
/// # Custom address and tuning file
/// perspective_news --listen 127.0.0.1:9000 --config ./perspective.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Address to serve the HTTP API on
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8787")]
    pub listen: String,

    /// Optional path to a YAML settings file
    #[arg(short, long, env = "PERSPECTIVE_CONFIG")]
    pub config: Option<String>,

    /// Brave Search API key (web search)
    #[arg(long, env = "BRAVE_SEARCH_API_KEY", hide_env_values = true)]
    pub brave_api_key: Option<String>,

    /// Firecrawl API key (web search and page scraping)
    #[arg(long, env = "FIRECRAWL_API_KEY", hide_env_values = true)]
    pub firecrawl_api_key: Option<String>,

    /// Perplexity API key (AI research search and trending topics)
    #[arg(long, env = "PERPLEXITY_API_KEY", hide_env_values = true)]
    pub perplexity_api_key: Option<String>,

    /// AI gateway API key (topic metadata)
    #[arg(long, env = "LOVABLE_API_KEY", hide_env_values = true)]
    pub ai_gateway_api_key: Option<String>,

    /// Google Fact Check Tools API key
    #[arg(long, env = "GOOGLE_FACT_CHECK_API_KEY", hide_env_values = true)]
    pub fact_check_api_key: Option<String>,

    /// Google service-account credential, as JSON text or a path to a JSON file
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_JSON", hide_env_values = true)]
    pub service_account: Option<String>,

    /// Google Cloud project hosting the Vertex AI Search engine
    #[arg(long, env = "VERTEX_PROJECT_ID")]
    pub vertex_project_id: Option<String>,

    /// Vertex AI Search engine (app) identifier
    #[arg(long, env = "VERTEX_ENGINE_ID")]
    pub vertex_engine_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "perspective_news",
            "--listen",
            "127.0.0.1:9000",
            "--config",
            "./perspective.yaml",
        ]);

        assert_eq!(cli.listen, "127.0.0.1:9000");
        assert_eq!(cli.config.as_deref(), Some("./perspective.yaml"));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["perspective_news", "-l", "0.0.0.0:1", "-c", "/tmp/p.yaml"]);

        assert_eq!(cli.listen, "0.0.0.0:1");
        assert_eq!(cli.config.as_deref(), Some("/tmp/p.yaml"));
    }

    #[test]
    fn test_cli_keys_from_flags() {
        let cli = Cli::parse_from([
            "perspective_news",
            "--brave-api-key",
            "b",
            "--vertex-project-id",
            "proj",
        ]);

        assert_eq!(cli.brave_api_key.as_deref(), Some("b"));
        assert_eq!(cli.vertex_project_id.as_deref(), Some("proj"));
    }
}
