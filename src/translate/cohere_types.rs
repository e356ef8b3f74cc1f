//! Type definitions for the Cohere [Chat API](https://docs.cohere.com/reference/chat).
//!
//! Covers the request we send upstream, the complete non-streaming reply,
//! and the newline-delimited records of the streaming reply.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Every caller message except the last, in original order.
    pub chat_history: Vec<ChatTurn>,
    /// The current turn (the caller's last message).
    pub message: String,
    pub stream: bool,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectors: Option<Vec<Connector>>,
    /// Caller fields forwarded verbatim (temperature, penalties, ...).
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String, // "USER", "CHATBOT", or another uppercased role
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    pub id: String,
}

/// Complete reply body on the non-streaming path. Everything beyond the
/// answer text (citations, generation ids, ...) is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub text: Option<String>,
    /// Some upstream failures carry a message here instead of `text`.
    #[serde(default)]
    pub error: Option<String>,
}

/// One decoded line of the streaming reply. Transient: parsed, emitted,
/// dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamRecord {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_finished: Option<bool>,
}
