use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key: None,
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_provider() -> String {
    "duckduckgo".into()
}

fn default_max_results() -> usize {
    5
}

fn default_search_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// Exchange pairs served to the agent.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_memory_path")]
    pub file_path: String,
    #[serde(default = "default_persist")]
    pub persist: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            file_path: default_memory_path(),
            persist: default_persist(),
        }
    }
}

fn default_max_length() -> usize {
    10
}

fn default_memory_path() -> String {
    "chat_history.json".into()
}

fn default_persist() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_search_budget")]
    pub search_budget: usize,
    /// Messages of history placed in front of each new question.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_verbose")]
    pub verbose: bool,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            search_budget: default_search_budget(),
            history_window: default_history_window(),
            verbose: default_verbose(),
            system_prompt: None,
        }
    }
}

fn default_max_iterations() -> usize {
    5
}

fn default_search_budget() -> usize {
    2
}

fn default_history_window() -> usize {
    6
}

fn default_verbose() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|err| ScoutError::Config(format!("Failed to parse configuration: {err}")))
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = env::var("SCOUT_MODEL") {
            self.model.model = model;
        }
        if let Some(key) = first_var(&["SCOUT_API_KEY", "OPENAI_API_KEY"]) {
            self.model.api_key = Some(key);
        }
        if let Some(url) = first_var(&["SCOUT_BASE_URL", "OPENAI_BASE_URL"]) {
            self.model.base_url = Some(url);
        }
        if let Some(temperature) = parsed_var::<f32>("SCOUT_TEMPERATURE") {
            self.model.temperature = temperature.clamp(0.0, 2.0);
        }
        if let Ok(provider) = env::var("SCOUT_SEARCH_PROVIDER") {
            self.search.provider = provider;
        }
        if let Some(key) = first_var(&["SCOUT_SEARCH_API_KEY", "TAVILY_API_KEY"]) {
            self.search.api_key = Some(key);
        }
        if let Ok(path) = env::var("SCOUT_MEMORY_PATH") {
            self.memory.file_path = path;
        }
        if let Some(max_length) = parsed_var::<usize>("SCOUT_MAX_MEMORY") {
            self.memory.max_length = max_length;
        }
        if let Some(max_iterations) = parsed_var::<usize>("SCOUT_MAX_ITERATIONS") {
            self.agent.max_iterations = max_iterations;
        }
        if let Some(verbose) = parsed_var::<bool>("SCOUT_VERBOSE") {
            self.agent.verbose = verbose;
        }
        if let Ok(host) = env::var("SCOUT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parsed_var::<u16>("SCOUT_PORT") {
            self.server.port = port;
        }
    }
}

fn first_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| env::var(name).ok().filter(|value| !value.is_empty()))
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.parse().ok())
}
