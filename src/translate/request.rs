//! Translate `OpenAI`-style chat-completion requests into Cohere Chat requests.
//!
//! The caller's unified message list becomes the upstream's
//! single-message-plus-history shape: every message except the last goes
//! into `chat_history`, the last message's content becomes the current
//! turn. Unrecognized request fields pass through verbatim.

use super::cohere_types::{ChatRequest, ChatTurn, Connector};
use super::openai_types::{ChatCompletionRequest, ChatMessage};
use super::{DEFAULT_MODEL, NET_MODEL_PREFIX, WEB_SEARCH_CONNECTOR};
use crate::error::{ProxyError, Result};

/// Translate a caller request into an upstream Cohere Chat request.
/// Pure function; fails only when the conversation cannot be extracted.
pub fn openai_to_cohere(req: &ChatCompletionRequest) -> Result<ChatRequest> {
    let Some((current, history)) = req.messages.split_last() else {
        return Err(ProxyError::translation(
            "messages must contain at least one entry",
        ));
    };

    let message = extract_content(current)?;

    let chat_history = history
        .iter()
        .map(|msg| {
            Ok(ChatTurn {
                role: map_role(&msg.role),
                message: extract_content(msg)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let requested = req.model.as_deref().unwrap_or_default();
    let (model, connectors) = if let Some(stripped) = requested.strip_prefix(NET_MODEL_PREFIX) {
        let connector = Connector {
            id: WEB_SEARCH_CONNECTOR.to_string(),
        };
        (stripped.to_string(), Some(vec![connector]))
    } else {
        (requested.to_string(), None)
    };
    let model = if model.is_empty() {
        DEFAULT_MODEL.to_string()
    } else {
        model
    };

    let extra = req
        .extra
        .iter()
        .filter(|(key, _)| !is_reserved_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(ChatRequest {
        chat_history,
        message,
        stream: req.wants_stream(),
        model,
        connectors,
        extra,
    })
}

/// "assistant" maps to the upstream's "CHATBOT"; any other role keeps its
/// name, uppercased.
fn map_role(role: &str) -> String {
    if role == "assistant" {
        "CHATBOT".to_string()
    } else {
        role.to_uppercase()
    }
}

fn extract_content(msg: &ChatMessage) -> Result<String> {
    msg.content.clone().ok_or_else(|| {
        ProxyError::translation(format!("message with role '{}' has no content", msg.role))
    })
}

/// Fields named with these prefixes are handled explicitly and must not be
/// copied through (catches variants like `stream_options` or `MODEL`).
fn is_reserved_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("model") || key.starts_with("messages") || key.starts_with("stream")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn msg(role: &str, content: &str) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content: Some(content.to_string()),
        }
    }

    fn request(model: Option<&str>, messages: Vec<ChatMessage>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.map(String::from),
            messages,
            stream: None,
            extra: HashMap::new(),
        }
    }

    #[test]
    fn test_history_split() {
        let req = request(
            Some("command-r"),
            vec![
                msg("user", "first"),
                msg("assistant", "second"),
                msg("user", "third"),
            ],
        );

        let data = openai_to_cohere(&req).unwrap();
        assert_eq!(data.chat_history.len(), 2);
        assert_eq!(data.chat_history[0].message, "first");
        assert_eq!(data.chat_history[1].message, "second");
        assert_eq!(data.message, "third");
    }

    #[test]
    fn test_role_mapping() {
        let req = request(
            None,
            vec![
                msg("assistant", "a"),
                msg("user", "b"),
                msg("system", "c"),
                msg("tool", "d"),
            ],
        );

        let data = openai_to_cohere(&req).unwrap();
        let roles: Vec<&str> = data
            .chat_history
            .iter()
            .map(|t| t.role.as_str())
            .collect();
        assert_eq!(roles, vec!["CHATBOT", "USER", "SYSTEM"]);
    }

    #[test]
    fn test_net_prefix_strips_and_attaches_connector() {
        let req = request(Some("net-command-xyz"), vec![msg("user", "hi")]);
        let data = openai_to_cohere(&req).unwrap();

        assert_eq!(data.model, "command-xyz");
        let connectors = data.connectors.unwrap();
        assert_eq!(connectors.len(), 1);
        assert_eq!(connectors[0].id, "web-search");
    }

    #[test]
    fn test_unprefixed_model_passes_through() {
        let req = request(Some("other-model"), vec![msg("user", "hi")]);
        let data = openai_to_cohere(&req).unwrap();

        assert_eq!(data.model, "other-model");
        assert!(data.connectors.is_none());
    }

    #[test]
    fn test_missing_or_empty_model_defaults() {
        let data = openai_to_cohere(&request(None, vec![msg("user", "hi")])).unwrap();
        assert_eq!(data.model, DEFAULT_MODEL);

        let data = openai_to_cohere(&request(Some(""), vec![msg("user", "hi")])).unwrap();
        assert_eq!(data.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_empty_messages_is_an_error() {
        let err = openai_to_cohere(&request(Some("command-r"), vec![])).unwrap_err();
        assert!(matches!(err, ProxyError::Translation { .. }));
    }

    #[test]
    fn test_message_without_content_is_an_error() {
        let req = request(
            None,
            vec![ChatMessage {
                role: "user".to_string(),
                content: None,
            }],
        );
        let err = openai_to_cohere(&req).unwrap_err();
        assert!(matches!(err, ProxyError::Translation { .. }));
    }

    #[test]
    fn test_passthrough_skips_reserved_prefixes() {
        let mut req = request(Some("command-r"), vec![msg("user", "hi")]);
        req.extra
            .insert("temperature".to_string(), serde_json::json!(0.3));
        req.extra
            .insert("stream_options".to_string(), serde_json::json!({"x": 1}));
        req.extra
            .insert("MODEL_kwargs".to_string(), serde_json::json!("y"));

        let data = openai_to_cohere(&req).unwrap();
        assert_eq!(data.extra.len(), 1);
        assert_eq!(data.extra["temperature"], serde_json::json!(0.3));
    }

    #[test]
    fn test_stream_only_on_boolean_true() {
        let mut req = request(Some("command-r"), vec![msg("user", "hi")]);
        req.stream = Some(serde_json::Value::String("true".to_string()));
        assert!(!openai_to_cohere(&req).unwrap().stream);

        req.stream = Some(serde_json::Value::Bool(true));
        assert!(openai_to_cohere(&req).unwrap().stream);
    }
}
