use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Result, ScoutError};
use crate::message::Message;

/// Persistence contract for conversation state.
///
/// `save` replaces the whole snapshot; there is no incremental append.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Message>>;
    async fn save(&self, messages: &[Message]) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// On-disk layout of a conversation snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    messages: Vec<StoredMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredMessage {
    role: String,
    content: String,
}

impl StoredMessage {
    fn from_message(message: &Message) -> Option<Self> {
        let role = match message {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => return None,
        };
        Some(Self {
            role: role.to_string(),
            content: message.content().to_string(),
        })
    }

    fn into_message(self) -> Option<Message> {
        match self.role.as_str() {
            "system" => Some(Message::system(self.content)),
            "user" => Some(Message::user(self.content)),
            "assistant" => Some(Message::assistant(self.content)),
            _ => None,
        }
    }
}

/// A JSON document store that rewrites the whole file on every save.
pub struct FileConversationStore {
    path: PathBuf,
}

impl FileConversationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn load(&self) -> Result<Vec<Message>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(ScoutError::Storage(format!(
                    "failed to read transcript `{}`: {err}",
                    self.path.display()
                )))
            }
        };

        let snapshot: Snapshot = serde_json::from_str(&content).map_err(|err| {
            ScoutError::Storage(format!(
                "invalid transcript `{}`: {err}",
                self.path.display()
            ))
        })?;

        Ok(snapshot
            .messages
            .into_iter()
            .filter_map(StoredMessage::into_message)
            .collect())
    }

    async fn save(&self, messages: &[Message]) -> Result<()> {
        let snapshot = Snapshot {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            messages: messages
                .iter()
                .filter_map(StoredMessage::from_message)
                .collect(),
        };
        let serialized = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|err| {
                ScoutError::Storage(format!("failed to create `{}`: {err}", parent.display()))
            })?;
        }

        // Readers only ever see a complete snapshot.
        let staging = self.staging_path();
        fs::write(&staging, serialized.as_bytes())
            .await
            .map_err(|err| ScoutError::Storage(format!("failed to persist transcript: {err}")))?;
        fs::rename(&staging, &self.path).await.map_err(|err| {
            ScoutError::Storage(format!(
                "failed to replace `{}`: {err}",
                self.path.display()
            ))
        })
    }

    async fn clear(&self) -> Result<()> {
        fs::remove_file(&self.path)
            .await
            .or_else(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(err)
                }
            })
            .map_err(|err| {
                ScoutError::Storage(format!("failed clearing `{}`: {err}", self.path.display()))
            })
    }
}
