//! Downtime Activity Engine
//!
//! Platform-agnostic rules for resolving downtime activities (crafting,
//! research and employment) between adventures. The crate computes check
//! modifiers, resolves rank tables, gates attempts on free time and gold, and
//! applies authoritative backend responses to a local snapshot cache. It has no
//! UI or network dependencies; transports plug in through [`AttemptTransport`].

pub mod activity;
pub mod cache;
pub mod character;
pub mod error;
pub mod gate;
pub mod grade;
pub mod modifier;
pub mod orchestrator;
pub mod payout;
pub mod progress;
pub mod rules;
pub mod sim;
pub mod transport;
pub mod wire;

// Re-export commonly used types
pub use activity::{
    Activity, ActivityId, ActivityKind, ActivityVariant, CraftingCost, CraftingDetails,
    EmploymentDetails, Goal, GoalKind, RankRow, RankTable, ResearchDetails, ResearchSource,
};
pub use cache::{SnapshotCache, SnapshotKey};
pub use character::{Ability, AbilityScores, Character, CharacterId};
pub use error::AttemptError;
pub use gate::{AttemptCost, GateReason, GateVerdict, can_afford, can_attempt, check_progress};
pub use grade::{GradeIncreased, GradeTracker};
pub use modifier::{ModifierBreakdown, ability_modifier, compute_modifier, modifier_breakdown};
pub use orchestrator::{
    ActivityOrchestrator, AttemptOptions, AttemptOutcome, AttemptPreview, PendingAttempt,
};
pub use payout::{
    PayoutFormula, RankCost, RankNotFoundError, WageEstimate, attempt_rank, estimate_wages,
    resolve_rank,
};
pub use progress::{AttemptRecord, Progress, ProgressId, ProgressState, ProgressTransition};
pub use rules::{
    DowntimeRules, GradeLadder, GradeStep, PerformanceBands, ProficiencyTable, Rarity,
    ResearchRules, RulesError,
};
pub use sim::SimulatedBackend;
pub use transport::{AttemptTransport, TransportError};
pub use wire::{AttemptRequest, AttemptResponse, BoardSnapshot, ErrorBody, RankedUp};
