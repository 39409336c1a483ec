use serde::{Deserialize, Serialize};

/// Retrieval options sent with each chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Ask the backend to emit a sources event
    pub show_sources: bool,
    /// Minimum similarity for a retrieved chunk to count as relevant
    pub similarity_threshold: f64,
    /// Upper bound on sources returned
    pub max_sources: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            show_sources: true,
            similarity_threshold: 0.5,
            max_sources: 4,
        }
    }
}

/// Body of a streaming chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Conversation to continue. `None` lets the backend start one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub options: ChatOptions,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
            options: ChatOptions::default(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }
}
