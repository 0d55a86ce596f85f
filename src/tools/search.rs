//! Provider-agnostic web search tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::config::SearchConfig;
use crate::error::{Result, ScoutError};
use crate::message::ToolArguments;
use crate::tool::Tool;

use super::duckduckgo::{DuckDuckGoConfig, DuckDuckGoProvider};
use super::tavily::TavilyProvider;

pub const SEARCH_TOOL_NAME: &str = "search_web";

/// Prefix of the payload returned when the provider fails.
pub const SEARCH_ERROR_MARKER: &str = "Search error:";

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub href: String,
    pub body: String,
}

/// Backend that turns a query into text the model can read.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn search(&self, query: &str) -> Result<String>;
}

/// Render hits as numbered blocks.
pub fn render_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(idx, result)| {
            let mut block = format!("{}. {}\n   {}", idx + 1, result.title, result.href);
            if !result.body.is_empty() {
                block.push_str("\n   ");
                block.push_str(&result.body);
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the provider named in the configuration.
pub fn provider_from_config(cfg: &SearchConfig) -> Result<Arc<dyn SearchProvider>> {
    match cfg.provider.to_ascii_lowercase().as_str() {
        "tavily" => {
            let api_key = cfg.api_key.clone().ok_or_else(|| {
                ScoutError::Config("the tavily search provider requires an API key".into())
            })?;
            Ok(Arc::new(
                TavilyProvider::new(api_key)?
                    .with_max_results(cfg.max_results)
                    .with_timeout_secs(cfg.timeout_secs)?,
            ))
        }
        other => {
            if other != "duckduckgo" {
                warn!(provider = other, "unknown search provider, using duckduckgo");
            }
            Ok(Arc::new(DuckDuckGoProvider::new(DuckDuckGoConfig {
                max_results: cfg.max_results,
                timeout_secs: cfg.timeout_secs,
            })?))
        }
    }
}

/// The `search_web` tool. Never fails: provider errors come back as a
/// payload starting with [`SEARCH_ERROR_MARKER`].
#[derive(Clone)]
pub struct SearchTool {
    provider: Arc<dyn SearchProvider>,
}

impl SearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn search(&self, query: &str) -> String {
        match self.provider.search(query).await {
            Ok(text) => text,
            Err(err) => format!("{SEARCH_ERROR_MARKER} {err}"),
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web for real-time information. Use this when you need current events, latest news, weather, prices, or any information that changes over time."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query. Should be concise keywords or a clear question."
                }
            },
            "required": ["query"]
        }))
    }

    async fn call(&self, arguments: &ToolArguments) -> Result<String> {
        let query = arguments.get("query").map(String::as_str).unwrap_or_default();
        Ok(self.search(query).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenProvider;

    #[async_trait]
    impl SearchProvider for BrokenProvider {
        fn name(&self) -> &str {
            "broken"
        }

        async fn search(&self, _query: &str) -> Result<String> {
            Err(ScoutError::Search("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn provider_failure_becomes_marked_payload() {
        let tool = SearchTool::new(Arc::new(BrokenProvider));
        let mut args = ToolArguments::new();
        args.insert("query".into(), "rust".into());

        let payload = tool.call(&args).await.unwrap();
        assert!(payload.starts_with(SEARCH_ERROR_MARKER));
        assert!(payload.contains("connection reset"));
    }

    #[test]
    fn renders_numbered_blocks() {
        let text = render_results(&[
            SearchResult {
                title: "Rust".into(),
                href: "https://www.rust-lang.org".into(),
                body: "A language empowering everyone".into(),
            },
            SearchResult {
                title: "Crates".into(),
                href: "https://crates.io".into(),
                body: String::new(),
            },
        ]);

        assert!(text.starts_with("1. Rust\n   https://www.rust-lang.org\n   A language"));
        assert!(text.contains("2. Crates\n   https://crates.io"));
        assert_eq!(render_results(&[]), "No results found.");
    }

    #[test]
    fn tavily_requires_key() {
        let cfg = SearchConfig {
            provider: "tavily".into(),
            api_key: None,
            ..SearchConfig::default()
        };
        assert!(matches!(
            provider_from_config(&cfg),
            Err(ScoutError::Config(_))
        ));
    }

    #[test]
    fn unknown_provider_falls_back_to_duckduckgo() {
        let cfg = SearchConfig {
            provider: "altavista".into(),
            ..SearchConfig::default()
        };
        let provider = provider_from_config(&cfg).unwrap();
        assert_eq!(provider.name(), "duckduckgo");
    }
}
