//! Pre-submission resource checks
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::activity::{Activity, ActivityVariant, CraftingCost};
use crate::character::Character;
use crate::payout::RankCost;
use crate::progress::Progress;
use crate::rules::GradeLadder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    InsufficientFreeTime,
    InsufficientGold,
    ActivityCompleted,
    GradeTooLow,
    ResearchRequired,
}

impl GateReason {
    /// Reasons that more gold or time cannot fix.
    #[must_use]
    pub const fn is_lock(self) -> bool {
        matches!(self, Self::GradeTooLow | Self::ResearchRequired)
    }
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InsufficientFreeTime => "insufficient free time",
            Self::InsufficientGold => "insufficient gold",
            Self::ActivityCompleted => "activity already completed",
            Self::GradeTooLow => "tool grade too low for this recipe",
            Self::ResearchRequired => "recipe must be researched first",
        };
        f.write_str(text)
    }
}

/// Resources one attempt consumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptCost {
    pub gold: u32,
    pub days: u32,
}

impl AttemptCost {
    /// The general per-attempt cost: one day plus the rank's gold cost.
    #[must_use]
    pub const fn single_day(cost: &RankCost) -> Self {
        Self {
            gold: cost.gold_cost,
            days: 1,
        }
    }

    /// What an attempt at `activity` must have available.
    ///
    /// Employment charges the rank cost for each day worked. Magical crafting
    /// needs its completion cost on hand instead of a per-roll charge.
    #[must_use]
    pub fn for_activity(activity: &Activity, cost: &RankCost, days_to_spend: u32) -> Self {
        match &activity.variant {
            ActivityVariant::Crafting(details) => match details.cost {
                CraftingCost::Mundane => Self::single_day(cost),
                CraftingCost::Magical {
                    completion_days,
                    completion_gold,
                } => Self {
                    gold: completion_gold,
                    days: completion_days.max(1),
                },
            },
            ActivityVariant::Research(_) => Self::single_day(cost),
            ActivityVariant::Employment(_) => {
                let days = days_to_spend.max(1);
                Self {
                    gold: cost.gold_cost.saturating_mul(days),
                    days,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub allowed: bool,
    pub reasons: SmallVec<[GateReason; 2]>,
}

impl GateVerdict {
    fn from_reasons(reasons: SmallVec<[GateReason; 2]>) -> Self {
        Self {
            allowed: reasons.is_empty(),
            reasons,
        }
    }

    #[must_use]
    pub fn contains(&self, reason: GateReason) -> bool {
        self.reasons.contains(&reason)
    }

    /// Reasons joined for display, e.g. `insufficient free time; insufficient gold`.
    #[must_use]
    pub fn summary(&self) -> String {
        self.reasons
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Check a single-day attempt at the resolved rank.
#[must_use]
pub fn can_attempt(character: &Character, cost: &RankCost) -> GateVerdict {
    can_afford(character, AttemptCost::single_day(cost))
}

/// Every failing condition is reported, time before gold.
#[must_use]
pub fn can_afford(character: &Character, cost: AttemptCost) -> GateVerdict {
    let mut reasons = SmallVec::new();
    if character.free_days < cost.days.max(1) {
        reasons.push(GateReason::InsufficientFreeTime);
    }
    if character.gold < cost.gold {
        reasons.push(GateReason::InsufficientGold);
    }
    GateVerdict::from_reasons(reasons)
}

/// Completed progress short-circuits the resource checks.
#[must_use]
pub fn check_progress(character: &Character, cost: AttemptCost, progress: &Progress) -> GateVerdict {
    if progress.is_completed() {
        let mut reasons = SmallVec::new();
        reasons.push(GateReason::ActivityCompleted);
        return GateVerdict::from_reasons(reasons);
    }
    can_afford(character, cost)
}

/// Recipe requirements: the minimum tool grade and a researched formula.
///
/// A minimum grade the ladder does not know is never met.
#[must_use]
pub fn check_requirements(
    activity: &Activity,
    character: &Character,
    ladder: &GradeLadder,
) -> SmallVec<[GateReason; 2]> {
    let mut reasons = SmallVec::new();
    let ActivityVariant::Crafting(details) = &activity.variant else {
        return reasons;
    };
    if let Some(minimum) = details.minimum_grade.as_deref() {
        let current = ladder.grade_index(character.competency_successes(&details.tool));
        if ladder.index_of(minimum).is_none_or(|required| current < required) {
            reasons.push(GateReason::GradeTooLow);
        }
    }
    if details.requires_research && !character.has_unlocked(&activity.target) {
        reasons.push(GateReason::ResearchRequired);
    }
    reasons
}

/// Full pre-submission check: completion, then resources, then recipe
/// requirements.
#[must_use]
pub fn check_activity(
    activity: &Activity,
    character: &Character,
    cost: AttemptCost,
    progress: &Progress,
    ladder: &GradeLadder,
) -> GateVerdict {
    let mut verdict = check_progress(character, cost, progress);
    if progress.is_completed() {
        return verdict;
    }
    verdict
        .reasons
        .extend(check_requirements(activity, character, ladder));
    GateVerdict::from_reasons(verdict.reasons)
}
