//! Forwarding to the upstream Cohere Chat endpoint.
//!
//! One POST per request, no retries. A non-200 upstream reply is mirrored
//! back untouched on both paths; a 200 reply is either remapped whole
//! (non-streaming) or restreamed record by record as it arrives.

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::logging::SharedLogger;
use crate::translate::cohere_types::ChatRequest;
use crate::translate::openai_types::ChatCompletionResponse;
use crate::translate::response::cohere_to_openai;
use crate::translate::streaming::{frame, ChunkEmitter, LineResegmenter};

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

/// Outcome of the non-streaming path.
pub enum ProxyResult {
    /// Upstream answered 200 and the reply was remapped.
    Completion {
        status: u16,
        response: ChatCompletionResponse,
    },
    /// Upstream answered non-200; mirrored back unmodified.
    Passthrough {
        status: u16,
        headers: reqwest::header::HeaderMap,
        body: Bytes,
    },
}

/// A live stream of SSE-framed chunk bytes.
pub type ChunkStream =
    Pin<Box<dyn Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send>>;

/// Outcome of the streaming path.
pub enum StreamResult {
    Stream { status: u16, stream: ChunkStream },
    Passthrough {
        status: u16,
        headers: reqwest::header::HeaderMap,
        body: Bytes,
    },
}

async fn send_chat(
    data: &ChatRequest,
    authorization: &str,
    config: &ProxyConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<reqwest::Response> {
    let url = &config.upstream.chat_url;

    logger.info(
        "proxy",
        format!(
            "POST {} model={} stream={} history={}",
            url,
            data.model,
            data.stream,
            data.chat_history.len()
        ),
    );

    client
        .post(url)
        .header("Authorization", authorization)
        .header("Content-Type", "application/json")
        .json(data)
        .send()
        .await
        .map_err(|e| ProxyError::upstream(format!("Request failed: {e}")))
}

/// Forward a non-streaming request and remap the complete reply.
pub async fn proxy_non_streaming(
    data: &ChatRequest,
    authorization: &str,
    config: &ProxyConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<ProxyResult> {
    let response = send_chat(data, authorization, config, client, logger).await?;

    let status = response.status().as_u16();
    if status != 200 {
        return Ok(mirror(response, logger).await?.into());
    }

    let created = now_unix();
    let body = response
        .text()
        .await
        .map_err(|e| ProxyError::upstream(format!("Failed to read response body: {e}")))?;

    logger.debug(
        "proxy",
        format!("Response status={} body_len={}", status, body.len()),
    );

    Ok(ProxyResult::Completion {
        status,
        response: cohere_to_openai(&body, &data.model, created),
    })
}

/// Forward a streaming request, returning the live restreamed chunk bytes.
pub async fn proxy_streaming(
    data: &ChatRequest,
    authorization: &str,
    config: &ProxyConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<StreamResult> {
    let response = send_chat(data, authorization, config, client, logger).await?;

    let status = response.status().as_u16();
    if status != 200 {
        return Ok(mirror(response, logger).await?.into());
    }

    let created = now_unix();
    let stream = restream(
        response.bytes_stream(),
        data.model.clone(),
        created,
        logger.clone(),
    );

    Ok(StreamResult::Stream {
        status,
        stream: Box::pin(stream),
    })
}

/// Re-segment the upstream byte stream into records and emit each as an
/// SSE-framed chunk the moment its final byte arrives.
///
/// A single task owns the buffer: it appends every delivery chunk and
/// drains immediately, so no record is consumed before all of its bytes
/// have arrived and no byte range is consumed twice. The loop ends when
/// the upstream signals completion or its connection closes; an upstream
/// close without the completion record ends the body with no terminal
/// chunk.
pub fn restream(
    byte_stream: impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
    model: String,
    created: u64,
    logger: SharedLogger,
) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + 'static {
    async_stream::stream! {
        let mut resegmenter = LineResegmenter::new();
        let mut emitter = ChunkEmitter::new(&model, created);

        tokio::pin!(byte_stream);

        'deliver: while let Some(delivery) = byte_stream.next().await {
            let bytes = match delivery {
                Ok(b) => b,
                Err(e) => {
                    logger.error("stream", format!("Upstream byte stream error: {e}"));
                    break;
                }
            };

            resegmenter.feed(&bytes);
            for record in resegmenter.drain() {
                for chunk in emitter.process_record(&record) {
                    yield Ok::<_, std::io::Error>(frame(&chunk));
                }
                if emitter.is_finished() {
                    break 'deliver;
                }
            }
        }

        if emitter.is_finished() {
            logger.info("stream", "Upstream signalled completion");
        } else {
            logger.warn("stream", "Upstream closed before signalling completion");
        }
    }
}

struct Mirrored {
    status: u16,
    headers: reqwest::header::HeaderMap,
    body: Bytes,
}

impl From<Mirrored> for ProxyResult {
    fn from(m: Mirrored) -> Self {
        ProxyResult::Passthrough {
            status: m.status,
            headers: m.headers,
            body: m.body,
        }
    }
}

impl From<Mirrored> for StreamResult {
    fn from(m: Mirrored) -> Self {
        StreamResult::Passthrough {
            status: m.status,
            headers: m.headers,
            body: m.body,
        }
    }
}

async fn mirror(response: reqwest::Response, logger: &SharedLogger) -> Result<Mirrored> {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response
        .bytes()
        .await
        .map_err(|e| ProxyError::upstream(format!("Failed to read upstream error body: {e}")))?;

    logger.warn(
        "proxy",
        format!("Upstream status {}, mirroring response ({} bytes)", status, body.len()),
    );

    Ok(Mirrored {
        status,
        headers,
        body,
    })
}

fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
