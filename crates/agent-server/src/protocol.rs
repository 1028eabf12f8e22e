//! AI SDK Data Stream Encoding
//!
//! ```text
//! 0:"Horses "\n
//! 0:"cannot "\n
//! 0:"sleep. "\n
//! d:{"finishReason":"stop"}\n
//! ```

use axum::http::{HeaderName, HeaderValue, header};

/// Last line of every data stream
pub const FINISH_LINE: &str = "d:{\"finishReason\":\"stop\"}\n";

pub const DATA_STREAM_HEADER: HeaderName = HeaderName::from_static("x-vercel-ai-data-stream");

/// Headers sent with every data stream response
pub fn stream_headers() -> [(HeaderName, HeaderValue); 4] {
    [
        (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        (DATA_STREAM_HEADER, HeaderValue::from_static("v1")),
    ]
}

/// A text part, JSON-escaped
pub fn text_part(text: &str) -> String {
    format!("0:{}\n", serde_json::Value::from(text))
}

/// One text part per whitespace-separated word, each followed by a space
pub fn word_parts(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().map(|word| text_part(&format!("{} ", word)))
}
