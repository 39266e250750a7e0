//! Progress records and the attempt log
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::activity::{Activity, ActivityId, GoalKind};
use crate::character::CharacterId;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProgressId(pub u64);

impl fmt::Display for ProgressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    #[default]
    Active,
    Completed,
}

/// One resolved roll. Never edited after it is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub roll: u8,
    pub modifier: i32,
    pub total: i32,
    pub dc: i32,
    pub success: bool,
    pub gold_spent: u32,
    /// Gold or successes the attempt added to the goal.
    pub delta: u32,
    #[serde(default = "AttemptRecord::default_days")]
    pub days_spent: u32,
}

impl AttemptRecord {
    const fn default_days() -> u32 {
        1
    }

    /// Resolve a roll against the DC. `delta_on_success` is kept only when the
    /// total meets or beats the DC.
    #[must_use]
    pub const fn resolve(
        roll: u8,
        modifier: i32,
        dc: i32,
        gold_spent: u32,
        delta_on_success: u32,
        days_spent: u32,
    ) -> Self {
        let total = roll as i32 + modifier;
        let success = total >= dc;
        Self {
            roll,
            modifier,
            total,
            dc,
            success,
            gold_spent,
            delta: if success { delta_on_success } else { 0 },
            days_spent,
        }
    }
}

/// What applying an attempt did to a progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressTransition {
    Stalled,
    Advanced,
    Completed,
    AlreadyCompleted,
}

const fn default_rank() -> u8 {
    1
}

/// Accumulated state of one character working on one activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub id: ProgressId,
    pub character_id: CharacterId,
    pub activity_id: ActivityId,
    #[serde(default = "default_rank")]
    pub rank: u8,
    pub goal: GoalKind,
    pub required: u32,
    #[serde(default)]
    pub accumulated: u32,
    #[serde(default)]
    pub days_spent: u32,
    /// Days worked at the current rank (employment promotion).
    #[serde(default)]
    pub rank_days: u32,
    /// Attempt history, newest first.
    #[serde(default)]
    pub log: Vec<AttemptRecord>,
    #[serde(default)]
    pub state: ProgressState,
}

impl Progress {
    #[must_use]
    pub fn start(id: ProgressId, character_id: CharacterId, activity: &Activity) -> Self {
        Self {
            id,
            character_id,
            activity_id: activity.id,
            rank: 1,
            goal: activity.goal.kind(),
            required: activity.goal.required(),
            accumulated: 0,
            days_spent: 0,
            rank_days: 0,
            log: Vec::new(),
            state: ProgressState::Active,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == ProgressState::Completed
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.required.saturating_sub(self.accumulated)
    }

    /// Completion in `0.0..=100.0`. A zero requirement counts as done.
    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        if self.required == 0 {
            return 100.0;
        }
        (f64::from(self.accumulated) / f64::from(self.required) * 100.0).clamp(0.0, 100.0)
    }

    #[must_use]
    pub fn latest(&self) -> Option<&AttemptRecord> {
        self.log.first()
    }

    /// Apply a resolved attempt, clamping its delta to what is still required.
    pub fn apply_attempt(&mut self, record: AttemptRecord) -> ProgressTransition {
        if self.is_completed() {
            return ProgressTransition::AlreadyCompleted;
        }
        let gain = if record.success {
            record.delta.min(self.remaining())
        } else {
            0
        };
        self.accumulated += gain;
        self.days_spent = self.days_spent.saturating_add(record.days_spent);
        self.log.insert(0, record);
        if self.accumulated >= self.required {
            self.state = ProgressState::Completed;
            ProgressTransition::Completed
        } else if gain > 0 {
            ProgressTransition::Advanced
        } else {
            ProgressTransition::Stalled
        }
    }

    /// Restore invariants on a snapshot from outside. Returns `true` when
    /// anything had to change.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;
        if self.accumulated > self.required {
            self.accumulated = self.required;
            changed = true;
        }
        if self.accumulated >= self.required && !self.is_completed() {
            self.state = ProgressState::Completed;
            changed = true;
        }
        if self.rank == 0 {
            self.rank = 1;
            changed = true;
        }
        changed
    }
}
