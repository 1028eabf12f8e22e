//! HTTP helpers for the reqwest-based providers

use std::fmt::Display;
use std::pin::Pin;

use agent_core::{AgentError, Result};
use futures::{Stream, StreamExt};
use reqwest::StatusCode;

/// Map a non-success HTTP status to an agent error
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> AgentError {
    let detail = format!("{} returned {}: {}", provider, status, body.trim());
    match status {
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(detail),
        s if s.is_server_error() => AgentError::ProviderUnavailable(detail),
        _ => AgentError::Provider(detail),
    }
}

/// Pass successful responses through, turn the rest into errors
pub(crate) async fn check(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(provider, status, &body))
}

struct LineState<S> {
    body: Pin<Box<S>>,
    buffer: Vec<u8>,
    finished: bool,
}

/// Split a chunked byte stream into trimmed, non-empty lines
pub(crate) fn lines<S, B, E>(body: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = LineState {
        body: Box::pin(body),
        buffer: Vec::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = state.buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                if line.is_empty() {
                    continue;
                }
                return Some((Ok(line), state));
            }

            if state.finished {
                let rest = std::mem::take(&mut state.buffer);
                let line = String::from_utf8_lossy(&rest).trim().to_string();
                return (!line.is_empty()).then(|| (Ok(line), state));
            }

            match state.body.next().await {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(e)) => {
                    state.finished = true;
                    state.buffer.clear();
                    return Some((Err(AgentError::Provider(e.to_string())), state));
                }
                None => state.finished = true,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = std::result::Result<&'static [u8], String>> + Send + 'static {
        let items: Vec<_> = parts.iter().copied().map(|p| Ok(p.as_bytes())).collect();
        futures::stream::iter(items)
    }

    #[tokio::test]
    async fn test_lines_reassemble_across_chunks() {
        let out: Vec<_> = lines(chunks(&["{\"a\":", "1}\n\n{\"b\"", ":2}\n", "tail"]))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|l| l.unwrap())
            .collect();

        assert_eq!(out, vec!["{\"a\":1}", "{\"b\":2}", "tail"]);
    }

    #[tokio::test]
    async fn test_lines_stop_after_error() {
        let body = futures::stream::iter(vec![
            Ok(b"one\ntw".as_slice()),
            Err("reset".to_string()),
            Ok(b"o\n".as_slice()),
        ]);

        let out: Vec<_> = lines(body).collect().await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "one");
        assert!(matches!(out[1], Err(AgentError::Provider(_))));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error("x", StatusCode::TOO_MANY_REQUESTS, ""),
            AgentError::RateLimited(_)
        ));
        assert!(matches!(
            status_error("x", StatusCode::FORBIDDEN, ""),
            AgentError::Auth(_)
        ));
        assert!(matches!(
            status_error("x", StatusCode::BAD_GATEWAY, ""),
            AgentError::ProviderUnavailable(_)
        ));
        assert!(matches!(
            status_error("x", StatusCode::BAD_REQUEST, "bad model"),
            AgentError::Provider(ref m) if m.contains("bad model")
        ));
    }
}
