//! DuckDuckGo search provider.
//!
//! Keyless web search via DuckDuckGo's HTML interface.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::error::{Result, ScoutError};

use super::search::{render_results, SearchProvider, SearchResult};

/// Configuration for the DuckDuckGo provider
#[derive(Clone, Debug)]
pub struct DuckDuckGoConfig {
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for DuckDuckGoConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            timeout_secs: 10,
        }
    }
}

pub struct DuckDuckGoProvider {
    http: reqwest::Client,
    config: DuckDuckGoConfig,
}

impl DuckDuckGoProvider {
    pub fn new(config: DuckDuckGoConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (compatible; SayrScout/0.1)")
            .build()
            .map_err(|err| ScoutError::Search(format!("http client error: {err}")))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str) -> Result<String> {
        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query)
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| ScoutError::Search(format!("duckduckgo request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::Search(format!(
                "duckduckgo responded with {status}"
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|err| ScoutError::Search(format!("duckduckgo body error: {err}")))?;

        let results = parse_duckduckgo_html(&html, self.config.max_results);
        Ok(render_results(&results))
    }
}

/// Extract results from the DuckDuckGo HTML page.
///
/// Each result is an `<a class="result__a" href="...">title</a>` followed by an
/// `<a class="result__snippet" ...>body</a>`.
fn parse_duckduckgo_html(html: &str, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    for (i, chunk) in html.split("result__a").enumerate() {
        if i == 0 || results.len() >= max_results {
            continue;
        }

        let href = chunk
            .split("href=\"")
            .nth(1)
            .and_then(|s| s.split('"').next())
            .map(resolve_redirect)
            .unwrap_or_default();

        let title = chunk
            .split_once('>')
            .and_then(|(_, rest)| rest.split("</a>").next())
            .unwrap_or("");

        let body = chunk
            .split("result__snippet")
            .nth(1)
            .and_then(|s| s.split_once('>'))
            .and_then(|(_, rest)| rest.split("</a>").next())
            .unwrap_or("");

        if !href.is_empty() && !title.is_empty() && href.starts_with("http") {
            results.push(SearchResult {
                title: clean_text(title),
                href,
                body: clean_text(body),
            });
        }
    }

    results
}

/// Unwrap `//duckduckgo.com/l/?uddg=<target>` redirect links.
fn resolve_redirect(href: &str) -> String {
    let href = html_decode(href);
    if let Some((_, rest)) = href.split_once("uddg=") {
        let target = rest.split('&').next().unwrap_or(rest);
        if let Ok(decoded) = urlencoding::decode(target) {
            return decoded.into_owned();
        }
    }
    href
}

fn clean_text(fragment: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"));
    html_decode(tags.replace_all(fragment, "").trim())
}

/// Simple HTML entity decoding
fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
}
