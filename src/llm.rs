//! Language model abstraction and the OpenAI-compatible client.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ModelConfig;
use crate::error::{Result, ScoutError};
use crate::message::{Message, ToolArguments, ToolCall};
use crate::tool::ToolDescription;

/// Whether the model may request tools on this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    /// Tools are described but the model must answer directly.
    None,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
        }
    }
}

/// Result of a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelCompletion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// Minimal abstraction around a chat completion provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
        tool_choice: ToolChoice,
    ) -> Result<ModelCompletion>;
}

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> ScoutError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return ScoutError::LanguageModel(format!("{provider} rate limit exceeded: {body}"));
    }
    ScoutError::LanguageModel(format!("{provider} request failed with {}: {body}", status))
}

fn serialize_tool_arguments(args: &ToolArguments) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| "{}".to_string())
}

/// Decode the JSON argument string a backend attached to a tool call.
///
/// Non-string values are kept in their JSON rendering; an argument string
/// that is not a JSON object ends up under the `input` key.
pub(crate) fn parse_tool_arguments(raw: &str) -> ToolArguments {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect(),
        _ if raw.trim().is_empty() => ToolArguments::new(),
        _ => ToolArguments::from([("input".to_string(), raw.to_string())]),
    }
}

#[derive(Clone)]
pub struct OpenAIClient {
    http: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
    temperature: f32,
}

impl OpenAIClient {
    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = cfg.api_key.clone().ok_or_else(|| {
            ScoutError::Config("missing OpenAI API key in model config".into())
        })?;
        let base_url = cfg
            .base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .map_err(|err| ScoutError::LanguageModel(format!("http client error: {err}")))?,
            model: cfg.model.clone(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: cfg.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_openai_messages(&self, messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|message| match message {
                Message::System { content } => OpenAiMessage::plain("system", content),
                Message::User { content } => OpenAiMessage::plain("user", content),
                Message::Assistant {
                    content,
                    tool_calls,
                } if !tool_calls.is_empty() => OpenAiMessage {
                    role: "assistant".into(),
                    content: (!content.is_empty()).then(|| content.clone()),
                    tool_call_id: None,
                    tool_calls: Some(
                        tool_calls
                            .iter()
                            .map(|call| OpenAiToolCall {
                                id: Some(call.id.clone()),
                                r#type: "function".to_string(),
                                function: OpenAiFunctionCall {
                                    name: call.name.clone(),
                                    arguments: serialize_tool_arguments(&call.arguments),
                                },
                            })
                            .collect(),
                    ),
                },
                Message::Assistant { content, .. } => OpenAiMessage::plain("assistant", content),
                Message::Tool {
                    content,
                    tool_call_id,
                } => OpenAiMessage {
                    role: "tool".into(),
                    content: Some(content.clone()),
                    tool_call_id: Some(tool_call_id.clone()),
                    tool_calls: None,
                },
            })
            .collect()
    }

    fn to_openai_tools(&self, tools: &[ToolDescription]) -> Option<Vec<OpenAiTool>> {
        if tools.is_empty() {
            return None;
        }

        Some(
            tools
                .iter()
                .map(|tool| OpenAiTool {
                    r#type: "function".to_string(),
                    function: OpenAiFunction {
                        name: tool.name.clone(),
                        description: Some(tool.description.clone()),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
        )
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
        tool_choice: ToolChoice,
    ) -> Result<ModelCompletion> {
        let mut payload = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": self.to_openai_messages(messages),
        });
        if let Some(tools) = self.to_openai_tools(tools) {
            payload["tools"] = json!(tools);
            payload["tool_choice"] = json!(tool_choice.as_str());
        }

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ScoutError::LanguageModel(format!("OpenAI request error: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "openai"));
        }

        let body: OpenAiResponse = resp.json().await.map_err(|err| {
            ScoutError::LanguageModel(format!("OpenAI response parse error: {err}"))
        })?;

        completion_from_response(body)
    }
}

fn completion_from_response(body: OpenAiResponse) -> Result<ModelCompletion> {
    let first = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ScoutError::LanguageModel("OpenAI returned no choices".into()))?;

    let tool_calls = first
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let arguments = parse_tool_arguments(&call.function.arguments);
            match call.id {
                Some(id) => ToolCall::new(id, call.function.name, arguments),
                None => ToolCall::generated(call.function.name, arguments),
            }
        })
        .collect();

    Ok(ModelCompletion {
        content: first.message.content,
        tool_calls,
    })
}

/// A deterministic model used for tests and demos.
///
/// Each scripted response is either a JSON directive
/// (`{"action":"respond","content":...}` or
/// `{"action":"call_tool","name":...,"arguments":{...}}`) or raw text that is
/// returned verbatim as the completion content.
pub struct StubModel {
    responses: Mutex<VecDeque<String>>,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
        })
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().expect("stub model poisoned").len()
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum StubDirective {
    Respond {
        content: String,
    },
    CallTool {
        name: String,
        #[serde(default)]
        arguments: ToolArguments,
        #[serde(default)]
        content: Option<String>,
    },
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete_chat(
        &self,
        _messages: &[Message],
        _tools: &[ToolDescription],
        _tool_choice: ToolChoice,
    ) -> Result<ModelCompletion> {
        let raw = {
            let mut locked = self.responses.lock().expect("stub model poisoned");
            locked.pop_front().ok_or_else(|| {
                ScoutError::LanguageModel("StubModel ran out of scripted responses".into())
            })?
        };

        match serde_json::from_str::<StubDirective>(&raw) {
            Ok(StubDirective::Respond { content }) => Ok(ModelCompletion::text(content)),
            Ok(StubDirective::CallTool {
                name,
                arguments,
                content,
            }) => Ok(ModelCompletion {
                content,
                tool_calls: vec![ToolCall::generated(name, arguments)],
            }),
            Err(_) => Ok(ModelCompletion::text(raw)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

impl OpenAiMessage {
    fn plain(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_call_id: None,
            tool_calls: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    r#type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiTool {
    r#type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}
