//! The seam between the orchestrator and whatever carries attempts to the backend
use async_trait::async_trait;
use thiserror::Error;

use crate::activity::ActivityKind;
use crate::wire::{AttemptRequest, AttemptResponse, ErrorBody};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Non-2xx response; `message` is the server's own text when it sent one.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Build a rejection from a raw error body, falling back to `HTTP <status>`.
    #[must_use]
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|parsed| parsed.error)
            .ok()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {status}"));
        Self::Rejected { status, message }
    }
}

/// Posts attempts to the backend.
///
/// Futures are not required to be `Send` so browser fetch implementations fit.
#[async_trait(?Send)]
pub trait AttemptTransport {
    /// Submit one attempt to the endpoint for `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be delivered, the server rejects
    /// it, or the response body cannot be decoded.
    async fn send_attempt(
        &self,
        kind: ActivityKind,
        request: &AttemptRequest,
    ) -> Result<AttemptResponse, TransportError>;
}
