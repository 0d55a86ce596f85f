use std::sync::Arc;

use tracing::{debug, warn};

use crate::message::Message;
use crate::storage::ConversationStore;

pub const NO_HISTORY: &str = "No conversation history";

/// Messages rendered by [`ConversationMemory::context_summary`].
const SUMMARY_MESSAGES: usize = 6;

/// Conversation transcript bounded to the last `max_length` exchange pairs
/// when served, optionally mirrored to a [`ConversationStore`].
///
/// Persistence problems never reach the caller: they are logged and the
/// in-memory log stays authoritative.
#[derive(Clone)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_length: usize,
    store: Option<Arc<dyn ConversationStore>>,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(10)
    }
}

impl std::fmt::Debug for ConversationMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationMemory")
            .field("messages", &self.messages.len())
            .field("max_length", &self.max_length)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl ConversationMemory {
    /// An in-process memory with nothing persisted.
    pub fn new(max_length: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_length: max_length.max(1),
            store: None,
        }
    }

    /// Hydrate from `store`, keeping only user and assistant entries.
    pub async fn load(store: Arc<dyn ConversationStore>, max_length: usize) -> Self {
        let mut memory = Self::new(max_length);
        match store.load().await {
            Ok(stored) => {
                let total = stored.len();
                memory.messages = stored
                    .into_iter()
                    .filter(|message| {
                        matches!(message, Message::User { .. } | Message::Assistant { .. })
                    })
                    .collect();
                debug!(
                    loaded = memory.messages.len(),
                    skipped = total - memory.messages.len(),
                    "restored conversation history"
                );
            }
            Err(err) => warn!(error = %err, "failed to load conversation history"),
        }
        memory.store = Some(store);
        memory
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub async fn append_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
        self.persist().await;
    }

    pub async fn append_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
        self.persist().await;
    }

    /// The last `2 × max_length` messages, oldest first.
    pub fn window(&self) -> &[Message] {
        let cap = self.max_length * 2;
        let start = self.messages.len().saturating_sub(cap);
        &self.messages[start..]
    }

    /// Every message recorded since the last clear.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn context_summary(&self) -> String {
        let window = self.window();
        if window.is_empty() {
            return NO_HISTORY.to_string();
        }

        let start = window.len().saturating_sub(SUMMARY_MESSAGES);
        window[start..]
            .iter()
            .filter_map(|message| match message {
                Message::User { content } => Some(format!("User: {content}")),
                Message::Assistant { content, .. } => Some(format!("Assistant: {content}")),
                Message::System { .. } | Message::Tool { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn clear(&mut self) {
        self.messages.clear();
        if let Some(store) = &self.store {
            if let Err(err) = store.clear().await {
                warn!(error = %err, "failed to delete conversation history");
            }
        }
    }

    async fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = store.save(&self.messages).await {
                warn!(error = %err, "failed to save conversation history");
            }
        }
    }
}
