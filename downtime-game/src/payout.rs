//! Rank table resolution and payout evaluation
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::activity::{Activity, ActivityVariant};
use crate::character::Character;
use crate::progress::Progress;
use crate::rules::{GradeLadder, PerformanceBands};

/// Requested rank is not covered by the activity's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("maximum rank reached (rank {requested} requested, table ends at {max_rank})")]
pub struct RankNotFoundError {
    pub requested: u8,
    pub max_rank: u8,
}

/// `(base_value + external_bonus) * multiplier`, floored at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoutFormula {
    pub base_value: i32,
    pub multiplier: f64,
}

impl PayoutFormula {
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn evaluate(&self, external_bonus: i32) -> u32 {
        let raw = (f64::from(self.base_value) + f64::from(external_bonus)) * self.multiplier;
        if raw.is_nan() || raw <= 0.0 {
            0
        } else {
            raw.floor().min(f64::from(u32::MAX)) as u32
        }
    }
}

/// Cost and payout for one attempt at a given rank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankCost {
    pub rank: u8,
    pub gold_cost: u32,
    pub payout: PayoutFormula,
}

/// Look up the cost/payout row for `rank`.
///
/// # Errors
///
/// Returns [`RankNotFoundError`] for rank 0 or any rank above the activity's ceiling.
pub fn resolve_rank(activity: &Activity, rank: u8) -> Result<RankCost, RankNotFoundError> {
    let max_rank = activity.rank_ceiling();
    let not_found = RankNotFoundError {
        requested: rank,
        max_rank,
    };
    if rank == 0 || rank > max_rank {
        return Err(not_found);
    }
    let row = activity.table.row(rank).ok_or(not_found)?;
    Ok(RankCost {
        rank,
        gold_cost: row.gold_cost,
        payout: PayoutFormula {
            base_value: row.base_value,
            multiplier: row.multiplier,
        },
    })
}

/// Rank an attempt resolves at.
///
/// Crafting follows the character's grade in the tool, capped at the recipe's
/// last row. Employment follows the progress record. Research is always rank 1.
#[must_use]
pub fn attempt_rank(
    activity: &Activity,
    character: &Character,
    progress: &Progress,
    ladder: &GradeLadder,
) -> u8 {
    match &activity.variant {
        ActivityVariant::Crafting(details) => ladder
            .rank_for(character.competency_successes(&details.tool))
            .min(activity.rank_ceiling().max(1)),
        ActivityVariant::Research(_) => 1,
        ActivityVariant::Employment(_) => progress.rank,
    }
}

/// Expected wages for an employment stint, shown before the roll is known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WageEstimate {
    pub per_day: u32,
    pub performance: f64,
    pub days: u32,
    pub total: u32,
}

/// Wages for `days` at the given rank, scaled by the roll's performance band.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn estimate_wages(
    cost: &RankCost,
    economy_bonus: i32,
    bands: &PerformanceBands,
    roll: u8,
    days: u32,
) -> WageEstimate {
    let per_day = cost.payout.evaluate(economy_bonus);
    let performance = bands.multiplier_for(roll);
    let daily = (f64::from(per_day) * performance).floor().max(0.0) as u32;
    WageEstimate {
        per_day,
        performance,
        days,
        total: daily.saturating_mul(days),
    }
}
