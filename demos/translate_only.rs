//! Demonstrate the translation layer without a server or network calls.
//!
//! Usage:
//!   `cargo run --example translate_only`

use cohere_proxy::translate::openai_types::{ChatCompletionRequest, ChatMessage};
use cohere_proxy::translate::request::openai_to_cohere;
use cohere_proxy::translate::response::cohere_to_openai;
use cohere_proxy::translate::streaming::{frame, ChunkEmitter, LineResegmenter};
use std::collections::HashMap;

fn main() {
    // Build an OpenAI-style request (what a caller sends)
    let mut extra = HashMap::new();
    extra.insert("temperature".to_string(), serde_json::json!(0.7));

    let caller_req = ChatCompletionRequest {
        model: Some("net-command-r".to_string()),
        messages: vec![
            ChatMessage {
                role: "user".to_string(),
                content: Some("What is the capital of France?".to_string()),
            },
            ChatMessage {
                role: "assistant".to_string(),
                content: Some("The capital of France is Paris.".to_string()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: Some("And Germany?".to_string()),
            },
        ],
        stream: Some(serde_json::Value::Bool(false)),
        extra,
    };

    let upstream_req = openai_to_cohere(&caller_req).expect("well-formed request");

    println!("=== Translated Request (Cohere format) ===");
    println!("{}", serde_json::to_string_pretty(&upstream_req).unwrap());

    // Simulate a complete upstream reply and translate back
    let completion = cohere_to_openai(
        r#"{"text":"The capital of Germany is Berlin."}"#,
        &upstream_req.model,
        0,
    );

    println!();
    println!("=== Translated Response (OpenAI format) ===");
    println!("{}", serde_json::to_string_pretty(&completion).unwrap());

    // Demonstrate re-segmentation: records split across arbitrary deliveries
    println!();
    println!("=== Streaming Re-segmentation Demo ===");

    let deliveries: &[&[u8]] = &[
        b"{\"text\":\"The\",\"is_fini",
        b"shed\":false}\n{\"text\":\" capital\",\"is_finished\":false}\n{\"te",
        b"xt\":\" is Berlin.\",\"is_finished\":false}\n{\"is_finished\":true}\n",
    ];

    let mut resegmenter = LineResegmenter::new();
    let mut emitter = ChunkEmitter::new(&upstream_req.model, 0);

    for (i, delivery) in deliveries.iter().enumerate() {
        resegmenter.feed(delivery);
        for record in resegmenter.drain() {
            for chunk in emitter.process_record(&record) {
                let framed = frame(&chunk);
                print!(
                    "  delivery {} -> {}",
                    i,
                    String::from_utf8_lossy(&framed)
                );
            }
        }
    }

    println!();
    println!("Done! The translation layer works without any network calls.");
}
