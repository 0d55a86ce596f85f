//! Tavily search provider (requires an API key).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Result, ScoutError};

use super::search::{render_results, SearchProvider, SearchResult};

const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";

#[derive(Clone)]
pub struct TavilyProvider {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    max_results: usize,
}

impl TavilyProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ScoutError::Config(
                "the tavily search provider requires an API key".into(),
            ));
        }
        Ok(Self {
            http: Self::client(10)?,
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_results: 5,
        })
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Result<Self> {
        self.http = Self::client(timeout_secs)?;
        Ok(self)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn client(timeout_secs: u64) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| ScoutError::Search(format!("http client error: {err}")))
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str) -> Result<String> {
        let payload = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": self.max_results,
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ScoutError::Search(format!("tavily request failed: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ScoutError::Search(format!(
                "tavily responded with {status}: {body}"
            )));
        }

        let body: TavilyResponse = resp
            .json()
            .await
            .map_err(|err| ScoutError::Search(format!("tavily response parse error: {err}")))?;

        Ok(render_response(body))
    }
}

fn render_response(body: TavilyResponse) -> String {
    let results: Vec<SearchResult> = body
        .results
        .into_iter()
        .map(|hit| SearchResult {
            title: hit.title,
            href: hit.url,
            body: hit.content,
        })
        .collect();

    match body.answer.filter(|answer| !answer.trim().is_empty()) {
        Some(answer) => format!("Summary: {answer}\n\n{}", render_results(&results)),
        None => render_results(&results),
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}
