use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::agent::{AgentSettings, SearchAgent};
use crate::config::AppConfig;
use crate::error::Result;
use crate::llm::{LanguageModel, OpenAIClient};
use crate::memory::ConversationMemory;
use crate::storage::FileConversationStore;
use crate::tools::{provider_from_config, scout_toolkit, ClockTool, SearchTool};

/// Agent behind a lock; requests are answered one at a time.
pub type SharedAgent = Arc<Mutex<SearchAgent<dyn LanguageModel>>>;

/// Process-wide state built once at startup and handed to front ends.
#[derive(Clone)]
pub struct AppContext {
    config: Arc<AppConfig>,
    agent: SharedAgent,
}

impl AppContext {
    /// Wire the OpenAI-compatible client, the configured search provider,
    /// the clock and (when enabled) the on-disk memory.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let model: Arc<dyn LanguageModel> = Arc::new(OpenAIClient::from_config(&config.model)?);
        Self::with_model(config, model).await
    }

    /// Like [`Self::from_config`] with a caller-supplied model.
    pub async fn with_model(config: AppConfig, model: Arc<dyn LanguageModel>) -> Result<Self> {
        let provider = provider_from_config(&config.search)?;
        let tools = scout_toolkit(SearchTool::new(provider), ClockTool::default());

        let memory = if config.memory.persist {
            let store = Arc::new(FileConversationStore::new(&config.memory.file_path));
            ConversationMemory::load(store, config.memory.max_length).await
        } else {
            ConversationMemory::new(config.memory.max_length)
        };

        let mut agent = SearchAgent::new(model)
            .with_tools(tools)
            .with_memory(memory)
            .with_settings(AgentSettings::from(&config.agent));
        if let Some(prompt) = &config.agent.system_prompt {
            agent = agent.with_system_prompt(prompt.clone());
        }

        info!(
            model = %config.model.model,
            search = %config.search.provider,
            history = agent.memory().len(),
            persistent = agent.memory().is_persistent(),
            "agent ready"
        );

        Ok(Self {
            config: Arc::new(config),
            agent: Arc::new(Mutex::new(agent)),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn agent(&self) -> SharedAgent {
        Arc::clone(&self.agent)
    }

    /// Wait for the in-flight request, if any, then release the agent.
    pub async fn shutdown(self) {
        let agent = self.agent.lock().await;
        info!(messages = agent.memory().len(), "shutting down agent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StubModel;
    use tempfile::tempdir;

    #[tokio::test]
    async fn builds_agent_from_config() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.memory.file_path = dir.path().join("history.json").display().to_string();
        config.agent.max_iterations = 3;
        config.agent.system_prompt = Some("Be brief.".into());

        let model = StubModel::new(vec![r#"{"action":"respond","content":"hi"}"#.into()]);
        let ctx = AppContext::with_model(config, model).await.unwrap();

        let agent = ctx.agent();
        let mut agent = agent.lock().await;
        assert_eq!(agent.settings().max_iterations, 3);
        assert_eq!(agent.tools().names(), vec!["get_current_time", "search_web"]);
        assert!(agent.memory().is_persistent());
        assert_eq!(agent.query("hello").await, "hi");
        drop(agent);

        assert!(dir.path().join("history.json").exists());
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn tavily_without_key_is_rejected() {
        let mut config = AppConfig::default();
        config.memory.persist = false;
        config.search.provider = "tavily".into();

        let model = StubModel::new(Vec::new());
        assert!(AppContext::with_model(config, model).await.is_err());
    }

    #[tokio::test]
    async fn missing_api_key_is_a_config_error() {
        let mut config = AppConfig::default();
        config.model.api_key = None;
        config.memory.persist = false;

        assert!(matches!(
            AppContext::from_config(config).await,
            Err(crate::ScoutError::Config(_))
        ));
    }
}
