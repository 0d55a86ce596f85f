#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sayr_scout::tools::{scout_toolkit, ClockTool, FixedClock, SearchProvider, SearchTool};
use sayr_scout::{
    LanguageModel, Message, ModelCompletion, Result, ScoutError, ToolArguments, ToolCall,
    ToolChoice, ToolDescription, ToolRegistry,
};

/// Search backend that counts calls and either echoes or fails.
#[derive(Default)]
pub struct RecordingSearch {
    pub queries: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingSearch {
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchProvider for RecordingSearch {
    fn name(&self) -> &str {
        "recording"
    }

    async fn search(&self, query: &str) -> Result<String> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(ScoutError::Search("connection refused".into()));
        }
        Ok(format!("1. Result for {query}\n   https://example.com"))
    }
}

type Script = dyn Fn(usize, &[Message], ToolChoice) -> ModelCompletion + Send + Sync;

/// Model driven by a closure over (call index, window, tool choice).
pub struct ScriptedModel {
    script: Box<Script>,
    calls: AtomicUsize,
    pub choices: Mutex<Vec<ToolChoice>>,
    pub windows: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(
        script: impl Fn(usize, &[Message], ToolChoice) -> ModelCompletion + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            choices: Mutex::new(Vec::new()),
            windows: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn choices(&self) -> Vec<ToolChoice> {
        self.choices.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete_chat(
        &self,
        messages: &[Message],
        _tools: &[ToolDescription],
        tool_choice: ToolChoice,
    ) -> Result<ModelCompletion> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.choices.lock().unwrap().push(tool_choice);
        self.windows.lock().unwrap().push(messages.to_vec());
        Ok((self.script)(index, messages, tool_choice))
    }
}

pub fn search_call(query: &str) -> ToolCall {
    ToolCall::generated(
        "search_web",
        ToolArguments::from([("query".to_string(), query.to_string())]),
    )
}

pub fn time_call(timezone: &str) -> ToolCall {
    ToolCall::generated(
        "get_current_time",
        ToolArguments::from([("timezone".to_string(), timezone.to_string())]),
    )
}

/// Search plus a clock frozen at 2024-05-01 06:30:00 UTC.
pub fn toolkit(search: Arc<RecordingSearch>) -> ToolRegistry {
    let instant = Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).unwrap();
    scout_toolkit(
        SearchTool::new(search),
        ClockTool::new(Arc::new(FixedClock(instant))),
    )
}
