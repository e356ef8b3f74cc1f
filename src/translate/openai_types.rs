//! Type definitions for the `OpenAI`-style chat-completion schema exposed to
//! callers.
//!
//! These cover the incoming request, the non-streaming response, and the
//! streaming chunk format. The request side is deliberately loose: apart
//! from `model`, `messages`, and `stream`, every field rides along in
//! [`ChatCompletionRequest::extra`] and is forwarded upstream untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::DEFAULT_MODEL;

// ---------------------------------------------------------------------------
// Request types (what callers send TO us)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Kept as raw JSON: streaming is enabled only when this is literally
    /// boolean `true`, never a truthy string or number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<serde_json::Value>,
    /// Catch-all for unknown fields, forwarded upstream verbatim.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatCompletionRequest {
    pub fn wants_stream(&self) -> bool {
        matches!(self.stream, Some(serde_json::Value::Bool(true)))
    }

    /// Request synthesized when the inbound body is missing or unparsable:
    /// a single user turn from the `q` query parameter, streamed by default,
    /// with the same scalar defaults a bare browser hit used to get.
    pub fn fallback(prompt: &str) -> Self {
        let mut extra = HashMap::new();
        extra.insert("temperature".to_string(), serde_json::json!(0.5));
        extra.insert("presence_penalty".to_string(), serde_json::json!(0));
        extra.insert("frequency_penalty".to_string(), serde_json::json!(0));
        extra.insert("top_p".to_string(), serde_json::json!(1));

        Self {
            model: Some(DEFAULT_MODEL.to_string()),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            stream: Some(serde_json::Value::Bool(true)),
            extra,
        }
    }
}

// ---------------------------------------------------------------------------
// Response types (what we send BACK to callers)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String, // "chat.completion"
    pub created: u64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: ChatUsage,
    // Serialized as null; the upstream has no equivalent.
    pub system_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u64,
    pub message: ChoiceMessage,
    pub logprobs: Option<serde_json::Value>, // always null
    pub finish_reason: String,               // always "stop"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    pub content: String,
}

/// Token counters are always zero: the upstream does not report usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// Streaming chunk types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String, // "chat.completion.chunk"
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u64,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>, // null until the terminal "stop"
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}
