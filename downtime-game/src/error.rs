//! Errors surfaced by the attempt flow
use thiserror::Error;

use crate::activity::ActivityId;
use crate::character::CharacterId;
use crate::gate::{GateReason, GateVerdict};
use crate::payout::RankNotFoundError;
use crate::transport::TransportError;

/// Why an attempt did not go through. `Display` is the text shown to players.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("{}", join_reasons(.0))]
    InsufficientResources(Vec<GateReason>),
    #[error("activity already completed")]
    ActivityCompleted,
    /// The recipe needs a higher tool grade or a researched formula.
    #[error("{}", join_reasons(.0))]
    Locked(Vec<GateReason>),
    #[error("maximum rank reached")]
    RankNotFound(#[from] RankNotFoundError),
    /// Server or network failure; carries the server's message verbatim.
    #[error("{0}")]
    RequestFailed(String),
    #[error("an attempt is already in progress")]
    InFlight,
    #[error("roll override must be between 1 and 20 (got {0})")]
    InvalidRoll(i32),
    #[error("no snapshot loaded for character {character} and activity {activity}")]
    UnknownSnapshot {
        character: CharacterId,
        activity: ActivityId,
    },
    #[error("no failed attempt to retry")]
    NothingToRetry,
}

fn join_reasons(reasons: &[GateReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl AttemptError {
    /// Map a failing gate verdict to the error the caller should see.
    #[must_use]
    pub fn from_verdict(verdict: &GateVerdict) -> Self {
        if verdict.contains(GateReason::ActivityCompleted) {
            Self::ActivityCompleted
        } else if verdict.reasons.iter().any(|reason| reason.is_lock()) {
            Self::Locked(verdict.reasons.to_vec())
        } else {
            Self::InsufficientResources(verdict.reasons.to_vec())
        }
    }

    /// Only request failures are worth retrying unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RequestFailed(_))
    }
}

impl From<TransportError> for AttemptError {
    fn from(err: TransportError) -> Self {
        Self::RequestFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_render_as_user_text() {
        let err = AttemptError::InsufficientResources(vec![
            GateReason::InsufficientFreeTime,
            GateReason::InsufficientGold,
        ]);
        assert_eq!(err.to_string(), "insufficient free time; insufficient gold");
    }

    #[test]
    fn lock_reasons_map_to_locked() {
        let verdict = GateVerdict {
            allowed: false,
            reasons: [GateReason::InsufficientGold, GateReason::GradeTooLow]
                .into_iter()
                .collect(),
        };
        let err = AttemptError::from_verdict(&verdict);
        assert_eq!(
            err,
            AttemptError::Locked(vec![GateReason::InsufficientGold, GateReason::GradeTooLow])
        );
        assert_eq!(
            err.to_string(),
            "insufficient gold; tool grade too low for this recipe"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn out_of_range_roll_keeps_the_typed_value() {
        assert_eq!(
            AttemptError::InvalidRoll(300).to_string(),
            "roll override must be between 1 and 20 (got 300)"
        );
    }

    #[test]
    fn rank_error_reads_as_maximum_rank() {
        let err = AttemptError::from(RankNotFoundError {
            requested: 6,
            max_rank: 5,
        });
        assert_eq!(err.to_string(), "maximum rank reached");
    }

    #[test]
    fn transport_errors_keep_server_text() {
        let err = AttemptError::from(TransportError::Rejected {
            status: 400,
            message: "insufficient gold".into(),
        });
        assert_eq!(err.to_string(), "insufficient gold");
        assert!(err.is_retryable());
    }
}
