use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::error::Result;
use crate::fallback::{MarkupToolCallParser, TextToolCallParser};
use crate::llm::{LanguageModel, ModelCompletion, ToolChoice};
use crate::memory::ConversationMemory;
use crate::message::{Message, ToolArguments, ToolCall};
use crate::tool::{ToolDescription, ToolRegistry};
use crate::tools::{is_failure_payload, SEARCH_TOOL_NAME, TIME_TOOL_NAME, TOOL_ERROR_MARKER};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant that can use search tools to retrieve real-time information to answer user questions.

When you need latest information, real-time data, or content beyond your knowledge, use the search tool.
When a question depends on the current date or time, use the time tool.
For simple common-sense questions, you can answer directly without searching.
Always respond in English.";

/// Prefix of the reply returned when a query fails outright.
pub const ERROR_REPLY_PREFIX: &str = "Sorry, an error occurred while processing your request";

/// Returned instead of an empty final answer.
pub const EMPTY_ANSWER: &str = "I could not produce an answer for that request.";

macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

/// Limits that shape a single query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    /// Tool-seeking model calls before a direct answer is forced.
    pub max_iterations: usize,
    /// Searches allowed per query.
    pub search_budget: usize,
    /// Messages of history placed in front of each new question.
    pub history_window: usize,
    pub verbose: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            search_budget: 2,
            history_window: 6,
            verbose: false,
        }
    }
}

impl From<&AgentConfig> for AgentSettings {
    fn from(cfg: &AgentConfig) -> Self {
        Self {
            max_iterations: cfg.max_iterations,
            search_budget: cfg.search_budget,
            history_window: cfg.history_window,
            verbose: cfg.verbose,
        }
    }
}

/// Per-query counter of executed searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBudget {
    used: usize,
    cap: usize,
}

impl SearchBudget {
    pub fn new(cap: usize) -> Self {
        Self { used: 0, cap }
    }

    pub fn has_remaining(&self) -> bool {
        self.used < self.cap
    }

    /// Reserve one search, or report that the budget is spent.
    pub fn try_spend(&mut self) -> bool {
        if self.has_remaining() {
            self.used += 1;
            true
        } else {
            false
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }
}

/// Outcome of a query that reached a final answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Messages exchanged during this query: the user message, tool requests
    /// and results, and the final answer. Only the first and last are kept
    /// in memory.
    pub turn: Vec<Message>,
    /// Tool-seeking model calls made before the answer.
    pub iterations: usize,
    pub searches: usize,
    /// At least one tool reported a failure instead of an observation.
    pub degraded: bool,
}

/// Reply shape used by chat front ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub memory_length: usize,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolKind {
    Search,
    Time,
    Other,
}

impl ToolKind {
    fn of(name: &str) -> Self {
        match name {
            SEARCH_TOOL_NAME => ToolKind::Search,
            TIME_TOOL_NAME => ToolKind::Time,
            _ => ToolKind::Other,
        }
    }
}

enum Step {
    Continue,
    Finish(String),
}

/// State owned by one `try_query` call.
struct Turn {
    window: Vec<Message>,
    start: usize,
    budget: SearchBudget,
    degraded: bool,
}

/// Agent that alternates between the model and the search and clock tools
/// until the model produces a final answer.
pub struct SearchAgent<M: LanguageModel + ?Sized> {
    system_prompt: String,
    model: Arc<M>,
    tools: ToolRegistry,
    memory: ConversationMemory,
    settings: AgentSettings,
    text_parser: Option<Arc<dyn TextToolCallParser>>,
}

impl<M: LanguageModel + ?Sized> SearchAgent<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model,
            tools: ToolRegistry::new(),
            memory: ConversationMemory::default(),
            settings: AgentSettings::default(),
            text_parser: Some(Arc::new(MarkupToolCallParser)),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_memory(mut self, memory: ConversationMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.settings.max_iterations = max_iterations;
        self
    }

    pub fn with_search_budget(mut self, search_budget: usize) -> Self {
        self.settings.search_budget = search_budget;
        self
    }

    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.settings.history_window = history_window;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.settings.verbose = verbose;
        self
    }

    /// Enable or disable recovery of search calls written as plain text.
    pub fn with_text_tool_calls(mut self, enabled: bool) -> Self {
        self.text_parser = enabled.then(|| Arc::new(MarkupToolCallParser) as Arc<dyn TextToolCallParser>);
        self
    }

    pub fn with_text_parser(mut self, parser: Arc<dyn TextToolCallParser>) -> Self {
        self.text_parser = Some(parser);
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Answer `user_input`, never failing and never returning an empty string.
    pub async fn query(&mut self, user_input: impl Into<String>) -> String {
        let max_iterations = self.settings.max_iterations;
        self.query_with_limit(user_input, max_iterations).await
    }

    pub async fn query_with_limit(
        &mut self,
        user_input: impl Into<String>,
        max_iterations: usize,
    ) -> String {
        match self.try_query(user_input, max_iterations).await {
            Ok(answer) => answer.text,
            Err(err) => {
                if self.settings.verbose {
                    tracing::error!(error = ?err, "query failed");
                } else {
                    tracing::error!(error = %err, "query failed");
                }
                format!("{ERROR_REPLY_PREFIX}: {err}")
            }
        }
    }

    /// Run the tool-calling loop. Tool failures degrade the answer; only
    /// model failures are returned as errors.
    pub async fn try_query(
        &mut self,
        user_input: impl Into<String>,
        max_iterations: usize,
    ) -> Result<Answer> {
        let input = user_input.into();

        let history = {
            let window = self.memory.window();
            let start = window.len().saturating_sub(self.settings.history_window);
            window[start..].to_vec()
        };
        // Recorded before the model runs so a failed call still leaves the question.
        self.memory.append_user(input.clone()).await;

        let mut window = Vec::with_capacity(history.len() + 2);
        window.push(Message::system(self.system_prompt.clone()));
        window.extend(history);
        let start = window.len();
        window.push(Message::user(input));

        let mut turn = Turn {
            window,
            start,
            budget: SearchBudget::new(self.settings.search_budget),
            degraded: false,
        };
        let tools = self.tools.describe();

        for iteration in 1..=max_iterations {
            let tool_choice = if turn.budget.has_remaining() {
                ToolChoice::Auto
            } else {
                ToolChoice::None
            };
            progress!(
                self.settings.verbose,
                iteration,
                searches = turn.budget.used(),
                tool_choice = tool_choice.as_str(),
                "invoking model"
            );

            let completion = self.invoke(&turn.window, &tools, tool_choice).await?;
            if let Step::Finish(text) = self.dispatch(completion, &mut turn).await {
                return Ok(self.finish(text, turn, iteration).await);
            }
        }

        progress!(
            self.settings.verbose,
            max_iterations,
            "iteration limit reached, forcing a direct answer"
        );
        let completion = self.invoke(&turn.window, &tools, ToolChoice::None).await?;
        let text = completion.content.unwrap_or_default();
        Ok(self.finish(text, turn, max_iterations).await)
    }

    /// [`Self::query`] plus bookkeeping for chat front ends.
    pub async fn chat(&mut self, user_input: impl Into<String>) -> ChatReply {
        let response = self.query(user_input).await;
        ChatReply {
            response,
            memory_length: self.memory.window().len(),
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub async fn clear_memory(&mut self) {
        self.memory.clear().await;
        progress!(self.settings.verbose, "conversation memory cleared");
    }

    pub fn memory_summary(&self) -> String {
        self.memory.context_summary()
    }

    async fn invoke(
        &self,
        window: &[Message],
        tools: &[ToolDescription],
        tool_choice: ToolChoice,
    ) -> Result<ModelCompletion> {
        self.model.complete_chat(window, tools, tool_choice).await
    }

    async fn dispatch(&self, completion: ModelCompletion, turn: &mut Turn) -> Step {
        let ModelCompletion {
            content,
            tool_calls,
        } = completion;

        // Structured requests win over any prose sent alongside them.
        if !tool_calls.is_empty() {
            self.run_tool_calls(tool_calls, turn).await;
            return Step::Continue;
        }

        let content = content.unwrap_or_default();
        if turn.budget.has_remaining() {
            let query = self
                .text_parser
                .as_ref()
                .and_then(|parser| parser.parse_search_query(&content));
            if let Some(query) = query {
                turn.budget.try_spend();
                progress!(
                    self.settings.verbose,
                    search = turn.budget.used(),
                    query = %query,
                    "search requested in text"
                );
                let call = ToolCall::generated(
                    SEARCH_TOOL_NAME,
                    ToolArguments::from([("query".to_string(), query)]),
                );
                let results = self.execute(&call, turn).await;
                turn.window.push(Message::assistant(content));
                turn.window.push(Message::assistant(format!(
                    "\n{results}\n\nBased on these results, please provide the answer:"
                )));
                return Step::Continue;
            }
        }

        Step::Finish(content)
    }

    async fn run_tool_calls(&self, tool_calls: Vec<ToolCall>, turn: &mut Turn) {
        let mut kept = Vec::with_capacity(tool_calls.len());
        let mut results = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            if ToolKind::of(&call.name) == ToolKind::Search && !turn.budget.try_spend() {
                progress!(
                    self.settings.verbose,
                    query = call.argument("query").unwrap_or_default(),
                    "search budget exhausted, dropping request"
                );
                continue;
            }
            progress!(
                self.settings.verbose,
                tool = %call.name,
                arguments = ?call.arguments,
                "executing tool"
            );
            let payload = self.execute(&call, turn).await;
            results.push(Message::tool(call.id.clone(), payload));
            kept.push(call);
        }

        if kept.is_empty() {
            return;
        }
        turn.window.push(Message::assistant_with_calls("", kept));
        turn.window.extend(results);
    }

    /// Run one tool and frame its output for the model.
    async fn execute(&self, call: &ToolCall, turn: &mut Turn) -> String {
        let payload = match self.tools.call(&call.name, &call.arguments).await {
            Ok(output) => output,
            Err(err) => format!("{TOOL_ERROR_MARKER} {err}"),
        };
        if is_failure_payload(&payload) {
            tracing::warn!(tool = %call.name, payload = %payload, "tool returned a failure");
            turn.degraded = true;
        }

        match ToolKind::of(&call.name) {
            ToolKind::Search => format!("Search results: {payload}"),
            ToolKind::Time | ToolKind::Other => payload,
        }
    }

    async fn finish(&mut self, text: String, mut turn: Turn, iterations: usize) -> Answer {
        let text = if text.trim().is_empty() {
            EMPTY_ANSWER.to_string()
        } else {
            text
        };
        self.memory.append_assistant(text.clone()).await;
        turn.window.push(Message::assistant(text.clone()));

        Answer {
            text,
            turn: turn.window.split_off(turn.start),
            iterations,
            searches: turn.budget.used(),
            degraded: turn.degraded,
        }
    }
}
