//! Translate a complete Cohere Chat reply into an `OpenAI`-style completion.
//!
//! The mapping degrades rather than fails: an unparsable upstream body
//! becomes a well-formed completion carrying the parse failure's
//! description as the assistant text, so the caller always receives a
//! completion object.

use super::cohere_types::ChatResponse;
use super::openai_types::{
    ChatCompletionResponse, ChatUsage, Choice, ChoiceMessage,
};
use super::COMPLETION_ID;

/// Map the raw upstream body into one completion. Pure function: `created`
/// is wall-clock seconds captured when the upstream call returned.
pub fn cohere_to_openai(body: &str, model: &str, created: u64) -> ChatCompletionResponse {
    let content = match serde_json::from_str::<ChatResponse>(body) {
        Ok(reply) => reply.text.or(reply.error).unwrap_or_default(),
        Err(e) => e.to_string(),
    };

    ChatCompletionResponse {
        id: COMPLETION_ID.to_string(),
        object: "chat.completion".to_string(),
        created,
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: "assistant".to_string(),
                content,
            },
            logprobs: None,
            finish_reason: "stop".to_string(),
        }],
        usage: ChatUsage::default(),
        system_fingerprint: None,
    }
}
