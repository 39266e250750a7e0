//! Browser transport for the attempt and board endpoints
use async_trait::async_trait;
use downtime_game::{
    ActivityKind, AttemptRequest, AttemptResponse, AttemptTransport, BoardSnapshot, CharacterId,
    TransportError,
};
use thiserror::Error;

use crate::dom::{self, FetchedText};
use crate::paths;

/// `localStorage` key holding the bearer token.
pub const TOKEN_KEY: &str = "downtime.token";
/// `localStorage` key holding the selected character id.
pub const CHARACTER_KEY: &str = "downtime.character_id";

/// Credentials and selection read from browser storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub character: Option<CharacterId>,
}

impl Session {
    #[must_use]
    pub fn from_storage() -> Self {
        Self::from_values(
            dom::stored_item(TOKEN_KEY),
            dom::stored_item(CHARACTER_KEY),
        )
    }

    /// Storage is only reachable in the browser; other targets get an empty session.
    #[must_use]
    pub fn from_storage_or_default() -> Self {
        if cfg!(target_arch = "wasm32") {
            Self::from_storage()
        } else {
            Self::default()
        }
    }

    fn from_values(token: Option<String>, character: Option<String>) -> Self {
        Self {
            token: token.filter(|value| !value.trim().is_empty()),
            character: character
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(CharacterId),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("no character selected")]
    NoCharacter,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Map a finished request onto the attempt contract.
///
/// # Errors
/// Non-2xx statuses become [`TransportError::Rejected`] carrying the server's
/// message; unreadable success bodies become [`TransportError::Decode`].
pub fn decode_response<T>(fetched: &FetchedText) -> Result<T, TransportError>
where
    T: serde::de::DeserializeOwned,
{
    if !fetched.ok() {
        return Err(TransportError::from_body(fetched.status, &fetched.body));
    }
    serde_json::from_str(&fetched.body).map_err(|err| TransportError::Decode(err.to_string()))
}

/// Posts attempts with `fetch`, authenticated by the session token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchTransport {
    token: Option<String>,
}

impl FetchTransport {
    #[must_use]
    pub const fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait(?Send)]
impl AttemptTransport for FetchTransport {
    async fn send_attempt(
        &self,
        kind: ActivityKind,
        request: &AttemptRequest,
    ) -> Result<AttemptResponse, TransportError> {
        let body =
            serde_json::to_string(request).map_err(|err| TransportError::Decode(err.to_string()))?;
        let url = paths::api_url(kind.attempt_endpoint());
        let fetched = dom::fetch_json("POST", &url, Some(&body), self.token.as_deref())
            .await
            .map_err(|err| TransportError::Network(dom::js_error_message(&err)))?;
        decode_response(&fetched)
    }
}

/// Load the board for the session's character.
///
/// # Errors
/// Returns an error when no character is selected or the request fails.
#[allow(clippy::future_not_send)]
pub async fn fetch_board(session: &Session) -> Result<BoardSnapshot, BoardError> {
    let character = session.character.ok_or(BoardError::NoCharacter)?;
    let fetched = dom::fetch_json("GET", &paths::board_url(character.0), None, session.token.as_deref())
        .await
        .map_err(|err| TransportError::Network(dom::js_error_message(&err)))?;
    Ok(decode_response(&fetched)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ignores_blank_token_and_bad_id() {
        let session = Session::from_values(Some("  ".into()), Some("abc".into()));
        assert_eq!(session, Session::default());
        let session = Session::from_values(Some("tok".into()), Some(" 42 ".into()));
        assert_eq!(session.token.as_deref(), Some("tok"));
        assert_eq!(session.character, Some(CharacterId(42)));
    }

    #[test]
    fn rejected_status_uses_detail_message() {
        let fetched = FetchedText {
            status: 403,
            body: r#"{"detail": "You do not own this character."}"#.into(),
        };
        let err = decode_response::<AttemptResponse>(&fetched).unwrap_err();
        assert_eq!(err.to_string(), "You do not own this character.");
    }

    #[test]
    fn empty_error_body_reports_status() {
        let fetched = FetchedText {
            status: 500,
            body: String::new(),
        };
        let err = decode_response::<AttemptResponse>(&fetched).unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500");
    }

    #[test]
    fn garbled_success_is_a_decode_error() {
        let fetched = FetchedText {
            status: 200,
            body: "{".into(),
        };
        assert!(matches!(
            decode_response::<AttemptResponse>(&fetched),
            Err(TransportError::Decode(_))
        ));
    }
}
