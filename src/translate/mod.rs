//! Translation between the `OpenAI`-style schema exposed to callers and the
//! Cohere Chat API spoken upstream.
//!
//! The core of the proxy: converts requests, responses, and the streaming
//! record sequence between the two formats. All translation code is pure
//! (no I/O); the server and proxy layers feed it.

pub mod cohere_types;
pub mod openai_types;
pub mod request;
pub mod response;
pub mod streaming;

/// Model used when the caller omits the model id or sends an empty one.
pub const DEFAULT_MODEL: &str = "command-r";

/// Completion id stamped on every response; the upstream does not issue ids.
pub const COMPLETION_ID: &str = "chatcmpl-QXlha2FBbmROaXhpZUFyZUF3ZXNvbWUK";

/// Model-id prefix that requests the web-search connector.
pub const NET_MODEL_PREFIX: &str = "net-";

/// Connector id attached when the prefix above is present.
pub const WEB_SEARCH_CONNECTOR: &str = "web-search";
