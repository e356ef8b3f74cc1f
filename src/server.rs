//! Inbound HTTP surface.
//!
//! One fallback handler serves every method and path, matching the worker
//! this proxy replaces: OPTIONS gets an empty 204 with permissive CORS
//! headers, everything else is treated as a chat-completion request. CORS
//! headers are set explicitly in the response builders because the degraded
//! plain-text path must not carry them.

use crate::config::ProxyConfig;
use crate::logging::SharedLogger;
use crate::proxy::{self, ChunkStream, ProxyResult, StreamResult};
use crate::translate::openai_types::ChatCompletionRequest;
use crate::translate::request::openai_to_cohere;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub client: reqwest::Client,
    pub logger: SharedLogger,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(handle_chat)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat(
    State(state): State<Arc<AppState>>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return preflight_response();
    }

    let req = parse_request(&body, &params, &state.logger);
    let data = match openai_to_cohere(&req) {
        Ok(d) => d,
        Err(e) => {
            state
                .logger
                .error("server", format!("Failed to map request: {e}"));
            // Degraded path: plain text, no envelope, no CORS headers.
            return e.to_string().into_response();
        }
    };

    state.logger.info(
        "server",
        format!(
            "Request: model={} streaming={} history={}",
            data.model,
            data.stream,
            data.chat_history.len()
        ),
    );

    let authorization = derive_authorization(&headers, &params);

    if data.stream {
        handle_streaming(state, &data, &authorization).await
    } else {
        handle_non_streaming(state, &data, &authorization).await
    }
}

/// An unparsable body is recovered locally: a single-turn streaming request
/// is synthesized from the `q` query parameter.
fn parse_request(
    body: &Bytes,
    params: &HashMap<String, String>,
    logger: &SharedLogger,
) -> ChatCompletionRequest {
    match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            logger.debug(
                "server",
                format!("Unparsable request body ({e}), synthesizing default"),
            );
            let prompt = params.get("q").map(String::as_str).unwrap_or("hello");
            ChatCompletionRequest::fallback(prompt)
        }
    }
}

/// Inbound `authorization` header verbatim, else a bearer token from the
/// `key` query parameter.
fn derive_authorization(headers: &HeaderMap, params: &HashMap<String, String>) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "bearer {}",
                params.get("key").map(String::as_str).unwrap_or_default()
            )
        })
}

async fn handle_non_streaming(
    state: Arc<AppState>,
    data: &crate::translate::cohere_types::ChatRequest,
    authorization: &str,
) -> Response {
    match proxy::proxy_non_streaming(data, authorization, &state.config, &state.client, &state.logger)
        .await
    {
        Ok(ProxyResult::Completion { status, response }) => json_response(status, &response),
        Ok(ProxyResult::Passthrough {
            status,
            headers,
            body,
        }) => mirror_response(status, &headers, body),
        Err(e) => {
            state.logger.error("server", format!("Proxy error: {e}"));
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

async fn handle_streaming(
    state: Arc<AppState>,
    data: &crate::translate::cohere_types::ChatRequest,
    authorization: &str,
) -> Response {
    match proxy::proxy_streaming(data, authorization, &state.config, &state.client, &state.logger)
        .await
    {
        Ok(StreamResult::Stream { status, stream }) => sse_response(status, stream),
        Ok(StreamResult::Passthrough {
            status,
            headers,
            body,
        }) => mirror_response(status, &headers, body),
        Err(e) => {
            state
                .logger
                .error("server", format!("Streaming setup error: {e}"));
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

fn preflight_response() -> Response {
    with_cors(Response::builder().status(StatusCode::NO_CONTENT))
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn json_response(
    status: u16,
    response: &crate::translate::openai_types::ChatCompletionResponse,
) -> Response {
    let body = serde_json::to_string(response).unwrap_or_default();
    with_cors(
        Response::builder()
            .status(mirror_status(status))
            .header(header::CONTENT_TYPE, "application/json; charset=UTF-8"),
    )
    .body(Body::from(body))
    .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn sse_response(status: u16, stream: ChunkStream) -> Response {
    with_cors(
        Response::builder()
            .status(mirror_status(status))
            .header(header::CONTENT_TYPE, "text/event-stream; charset=UTF-8"),
    )
    .body(Body::from_stream(stream))
    .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Forward an upstream reply untouched: status, headers, and body.
/// Hop-by-hop headers are dropped; the body has already been re-buffered.
fn mirror_response(status: u16, headers: &reqwest::header::HeaderMap, body: Bytes) -> Response {
    let mut builder = Response::builder().status(mirror_status(status));

    for (name, value) in headers {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        let name = HeaderName::from_bytes(name.as_str().as_bytes());
        let value = HeaderValue::from_bytes(value.as_bytes());
        if let (Ok(name), Ok(value)) = (name, value) {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn with_cors(builder: axum::http::response::Builder) -> axum::http::response::Builder {
    builder
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "*")
}

fn mirror_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name,
        "connection" | "transfer-encoding" | "keep-alive" | "content-length" | "upgrade"
    )
}
