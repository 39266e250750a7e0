//! JSON bodies exchanged with the attempt endpoints
use serde::{Deserialize, Serialize};

use crate::activity::{Activity, ActivityId};
use crate::character::{Character, CharacterId};
use crate::progress::{AttemptRecord, Progress, ProgressId};

/// Body posted to an attempt endpoint. Optional fields are omitted when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRequest {
    pub character_id: CharacterId,
    pub activity_id: ActivityId,
    pub progress_id: ProgressId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_to_spend: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economy_bonus: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_override: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedUp {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u8>,
}

/// Successful attempt result. The snapshots are authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptResponse {
    pub roll: u8,
    pub modifier: i32,
    pub total: i32,
    pub dc: i32,
    pub success: bool,
    /// Net gold change: negative when spent, positive when earned.
    pub gold_delta: i64,
    pub updated_character: Character,
    pub updated_progress: Progress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranked_up: Option<RankedUp>,
    /// Gold charged by this attempt, before any earnings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gold_spent: Option<u32>,
    /// Recipe unlocked by completing a research project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_recipe: Option<String>,
}

impl AttemptResponse {
    /// Rebuild the attempt record relative to the previous progress snapshot.
    ///
    /// Without an explicit `gold_spent`, a net loss is the spend; otherwise
    /// `expected_spend` stands in, since earnings hide the charge.
    #[must_use]
    pub fn record(&self, previous: Option<&Progress>, expected_spend: u32) -> AttemptRecord {
        let (accumulated, days) =
            previous.map_or((0, 0), |progress| (progress.accumulated, progress.days_spent));
        let gold_spent = self.gold_spent.unwrap_or_else(|| {
            if self.gold_delta < 0 {
                u32::try_from(self.gold_delta.unsigned_abs()).unwrap_or(u32::MAX)
            } else {
                expected_spend
            }
        });
        let progress = &self.updated_progress;
        let reached = progress.accumulated.min(progress.required);
        AttemptRecord {
            roll: self.roll,
            modifier: self.modifier,
            total: self.total,
            dc: self.dc,
            success: self.success,
            gold_spent,
            delta: reached.saturating_sub(accumulated),
            days_spent: progress.days_spent.saturating_sub(days),
        }
    }
}

/// Error body; accepts both `{"error": ...}` and `{"detail": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(alias = "detail")]
    pub error: String,
}

/// Everything the attempt screen needs for one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub character: Character,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub progress: Vec<Progress>,
}

impl BoardSnapshot {
    #[must_use]
    pub fn progress_for(&self, activity: ActivityId) -> Option<&Progress> {
        self.progress
            .iter()
            .find(|progress| progress.activity_id == activity)
    }
}
