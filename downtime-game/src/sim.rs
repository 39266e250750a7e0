//! In-memory attempt resolver
//!
//! Applies the backend's rules to an owned copy of the world: resources are
//! re-validated, dice are rolled from a seeded `ChaCha8Rng`, and each activity
//! variant charges and pays the way the live endpoints do.
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use crate::activity::{
    Activity, ActivityId, ActivityKind, ActivityVariant, CraftingCost, GoalKind,
};
use crate::character::{Character, CharacterId};
use crate::gate::{AttemptCost, can_afford, check_requirements};
use crate::modifier::compute_modifier;
use crate::payout::{attempt_rank, resolve_rank};
use crate::progress::{AttemptRecord, Progress, ProgressId, ProgressTransition};
use crate::rules::DowntimeRules;
use crate::transport::{AttemptTransport, TransportError};
use crate::wire::{AttemptRequest, AttemptResponse, BoardSnapshot, RankedUp};

const BAD_REQUEST: u16 = 400;
const NOT_FOUND: u16 = 404;

fn rejected(status: u16, message: impl Into<String>) -> TransportError {
    TransportError::Rejected {
        status,
        message: message.into(),
    }
}

#[derive(Debug)]
struct World {
    rng: ChaCha8Rng,
    characters: HashMap<CharacterId, Character>,
    activities: HashMap<ActivityId, Activity>,
    progress: HashMap<ProgressId, Progress>,
    scripted_rolls: VecDeque<u8>,
    pending_failure: Option<TransportError>,
    requests: usize,
}

/// Deterministic stand-in for the attempt endpoints.
#[derive(Debug)]
pub struct SimulatedBackend {
    rules: DowntimeRules,
    history_limit: Option<usize>,
    world: RefCell<World>,
}

impl SimulatedBackend {
    #[must_use]
    pub fn new(seed: u64, rules: DowntimeRules) -> Self {
        Self {
            rules,
            history_limit: None,
            world: RefCell::new(World {
                rng: ChaCha8Rng::seed_from_u64(seed),
                characters: HashMap::new(),
                activities: HashMap::new(),
                progress: HashMap::new(),
                scripted_rolls: VecDeque::new(),
                pending_failure: None,
                requests: 0,
            }),
        }
    }

    /// Respond with an empty attempt log, leaving history to the client.
    #[must_use]
    pub const fn without_history(self) -> Self {
        self.with_history_limit(0)
    }

    /// Return only the newest `limit` log entries.
    #[must_use]
    pub const fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn insert_character(&self, character: Character) {
        self.world
            .borrow_mut()
            .characters
            .insert(character.id, character);
    }

    pub fn insert_activity(&self, activity: Activity) {
        self.world
            .borrow_mut()
            .activities
            .insert(activity.id, activity);
    }

    pub fn insert_progress(&self, progress: Progress) {
        self.world.borrow_mut().progress.insert(progress.id, progress);
    }

    /// Queue natural d20 results used before the seeded generator.
    pub fn script_rolls(&self, rolls: impl IntoIterator<Item = u8>) {
        self.world.borrow_mut().scripted_rolls.extend(rolls);
    }

    /// Fail the next request with a server-side rejection.
    pub fn reject_next(&self, status: u16, message: impl Into<String>) {
        self.world.borrow_mut().pending_failure = Some(rejected(status, message));
    }

    /// Fail the next request as if the network dropped it.
    pub fn drop_next(&self, reason: impl Into<String>) {
        self.world.borrow_mut().pending_failure = Some(TransportError::Network(reason.into()));
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.world.borrow().requests
    }

    #[must_use]
    pub fn character(&self, id: CharacterId) -> Option<Character> {
        self.world.borrow().characters.get(&id).cloned()
    }

    #[must_use]
    pub fn progress(&self, id: ProgressId) -> Option<Progress> {
        self.world.borrow().progress.get(&id).cloned()
    }

    /// What the board endpoint would return for `character`.
    #[must_use]
    pub fn board(&self, character: CharacterId) -> Option<BoardSnapshot> {
        let world = self.world.borrow();
        let snapshot = world.characters.get(&character)?.clone();
        let progress: Vec<Progress> = world
            .progress
            .values()
            .filter(|progress| progress.character_id == character)
            .cloned()
            .collect();
        let mut activities: Vec<Activity> = progress
            .iter()
            .filter_map(|progress| world.activities.get(&progress.activity_id).cloned())
            .collect();
        activities.sort_by_key(|activity| activity.id);
        Some(BoardSnapshot {
            character: snapshot,
            activities,
            progress,
        })
    }

    /// Resolve one attempt against the in-memory world.
    ///
    /// # Errors
    ///
    /// Rejects unknown records, mismatched endpoints, completed progress,
    /// locked recipes, unaffordable attempts and invalid roll overrides,
    /// mirroring the backend.
    #[allow(clippy::too_many_lines)]
    pub fn resolve(
        &self,
        kind: ActivityKind,
        request: &AttemptRequest,
    ) -> Result<AttemptResponse, TransportError> {
        let mut world = self.world.borrow_mut();
        world.requests += 1;
        if let Some(failure) = world.pending_failure.take() {
            return Err(failure);
        }

        let activity = world
            .activities
            .get(&request.activity_id)
            .cloned()
            .ok_or_else(|| rejected(NOT_FOUND, "activity not found"))?;
        let mut character = world
            .characters
            .get(&request.character_id)
            .cloned()
            .ok_or_else(|| rejected(NOT_FOUND, "character not found"))?;
        let mut progress = world
            .progress
            .get(&request.progress_id)
            .cloned()
            .ok_or_else(|| rejected(NOT_FOUND, "progress not found"))?;

        if activity.kind() != kind {
            return Err(rejected(BAD_REQUEST, "activity does not match endpoint"));
        }
        if progress.character_id != character.id || progress.activity_id != activity.id {
            return Err(rejected(BAD_REQUEST, "progress does not belong to this attempt"));
        }
        if progress.is_completed() {
            return Err(rejected(BAD_REQUEST, "activity already completed"));
        }
        let locks = check_requirements(&activity, &character, &self.rules.grades);
        if let Some(reason) = locks.first() {
            return Err(rejected(BAD_REQUEST, reason.to_string()));
        }

        let rank = attempt_rank(&activity, &character, &progress, &self.rules.grades);
        if let Some(requested) = request.rank
            && requested != rank
        {
            return Err(rejected(BAD_REQUEST, format!("rank {requested} is not your current rank")));
        }
        let cost = resolve_rank(&activity, rank)
            .map_err(|_| rejected(BAD_REQUEST, "maximum rank reached"))?;
        let days = request.days_to_spend.unwrap_or(1).max(1);
        let needed = AttemptCost::for_activity(&activity, &cost, days);
        let verdict = can_afford(&character, needed);
        if !verdict.allowed {
            return Err(rejected(BAD_REQUEST, verdict.summary()));
        }

        let roll = match request.roll_override {
            Some(value) if (1..=20).contains(&value) => value,
            Some(value) => {
                return Err(rejected(
                    BAD_REQUEST,
                    format!("roll override {value} is outside 1-20"),
                ));
            }
            None => {
                let scripted = world.scripted_rolls.pop_front();
                scripted.unwrap_or_else(|| world.rng.gen_range(1..=20))
            }
        };
        let modifier = compute_modifier(&character, &activity, &self.rules.proficiency);
        let check = AttemptRecord::resolve(roll, modifier, activity.dc, 0, 0, 1);

        let remaining = progress.remaining();
        let mut earned: u32 = 0;
        let (gold_spent, days_spent, gain) = match &activity.variant {
            ActivityVariant::Crafting(details) => match details.cost {
                CraftingCost::Mundane => {
                    let unit = match activity.goal.kind() {
                        GoalKind::Gold => cost.payout.evaluate(0).max(1),
                        GoalKind::Successes => 1,
                    };
                    let gain = unit.min(remaining);
                    (needed.gold, 1, gain)
                }
                CraftingCost::Magical {
                    completion_days,
                    completion_gold,
                } => {
                    let gain = 1.min(remaining);
                    if check.success && gain >= remaining {
                        (completion_gold, completion_days, gain)
                    } else {
                        (0, 0, gain)
                    }
                }
            },
            ActivityVariant::Research(_) => (needed.gold, 1, 1.min(remaining)),
            ActivityVariant::Employment(_) => {
                if check.success {
                    let multiplier = self.rules.performance.multiplier_for(roll);
                    let per_day = cost.payout.evaluate(request.economy_bonus.unwrap_or(0));
                    earned = wage_total(per_day, multiplier, days);
                }
                (needed.gold, days, earned.min(remaining))
            }
        };
        let record = AttemptRecord::resolve(
            roll,
            modifier,
            activity.dc,
            gold_spent,
            gain,
            if matches!(activity.kind(), ActivityKind::Employment) {
                days
            } else {
                1
            },
        );

        character.gold = character.gold.saturating_sub(gold_spent).saturating_add(earned);
        character.free_days = character.free_days.saturating_sub(days_spent);

        let transition = progress.apply_attempt(record);
        let completed = transition == ProgressTransition::Completed;

        // A finished item is one qualifying success for the tool.
        let mut ranked_up = None;
        if completed && let Some(competency) = activity.competency() {
            ranked_up = self.count_success(&mut character, competency);
        }
        let mut unlocked_recipe = None;
        if completed
            && let Some(recipe) = activity.unlocks_recipe()
            && character.unlock_recipe(recipe)
        {
            unlocked_recipe = Some(recipe.to_string());
        }

        if let ActivityVariant::Employment(_) = activity.variant {
            progress.rank_days = progress.rank_days.saturating_add(days);
            if let Some(threshold) = activity
                .table
                .row(progress.rank)
                .and_then(|row| row.days_to_next_rank)
                && progress.rank_days >= threshold
                && progress.rank < activity.rank_ceiling()
            {
                progress.rank += 1;
                progress.rank_days = 0;
                ranked_up = Some(RankedUp {
                    message: format!("You were promoted to rank {} as {}!", progress.rank, activity.name),
                    grade: None,
                    rank: Some(progress.rank),
                });
            }
        }
        if completed {
            log::info!(
                "simulated backend: character {} completed {}",
                character.id,
                activity.name
            );
        }

        world.characters.insert(character.id, character.clone());
        world.progress.insert(progress.id, progress.clone());

        let mut updated_progress = progress;
        if let Some(limit) = self.history_limit {
            updated_progress.log.truncate(limit);
        }
        Ok(AttemptResponse {
            roll,
            modifier,
            total: record.total,
            dc: activity.dc,
            success: record.success,
            gold_delta: i64::from(earned) - i64::from(gold_spent),
            updated_character: character,
            updated_progress,
            ranked_up,
            gold_spent: Some(gold_spent),
            unlocked_recipe,
        })
    }

    fn count_success(&self, character: &mut Character, competency: &str) -> Option<RankedUp> {
        let before = character.competency_successes(competency);
        let after = before + 1;
        let slot = character
            .competencies
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(competency))
            .map(|(_, successes)| successes);
        match slot {
            Some(successes) => *successes = after,
            None => {
                character.competencies.insert(competency.to_string(), after);
            }
        }
        let ladder = &self.rules.grades;
        if ladder.grade_index(after) <= ladder.grade_index(before) {
            return None;
        }
        let grade = ladder.grade_name(after).to_string();
        Some(RankedUp {
            message: format!("Your skill with {competency} has grown: you are now {grade}!"),
            grade: Some(grade),
            rank: Some(ladder.rank_for(after)),
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn wage_total(per_day: u32, multiplier: f64, days: u32) -> u32 {
    let daily = (f64::from(per_day) * multiplier).floor().max(0.0) as u32;
    daily.saturating_mul(days)
}

#[async_trait(?Send)]
impl AttemptTransport for SimulatedBackend {
    async fn send_attempt(
        &self,
        kind: ActivityKind,
        request: &AttemptRequest,
    ) -> Result<AttemptResponse, TransportError> {
        self.resolve(kind, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{CraftingDetails, Goal, RankTable, ResearchDetails, ResearchSource};
    use crate::character::Ability;
    use crate::rules::Rarity;

    fn backend() -> (SimulatedBackend, AttemptRequest) {
        let backend = SimulatedBackend::new(7, DowntimeRules::default());
        let activity = Activity {
            id: ActivityId(1),
            name: "Forge".into(),
            target: "Dagger".into(),
            ability: Ability::Strength,
            proficiency: None,
            dc: 12,
            table: RankTable::single(5, 5),
            goal: Goal::Gold { required: 10 },
            variant: ActivityVariant::Crafting(CraftingDetails::new(
                "Smith's Tools",
                CraftingCost::Mundane,
            )),
        };
        backend.insert_character(Character::new(CharacterId(1), "Ilsa", 1).with_purse(20, 4));
        backend.insert_progress(Progress::start(ProgressId(3), CharacterId(1), &activity));
        backend.insert_activity(activity);
        let request = AttemptRequest {
            character_id: CharacterId(1),
            activity_id: ActivityId(1),
            progress_id: ProgressId(3),
            rank: None,
            days_to_spend: None,
            economy_bonus: None,
            roll_override: None,
        };
        (backend, request)
    }

    #[test]
    fn scripted_roll_is_used_first() {
        let (backend, request) = backend();
        backend.script_rolls([20]);
        let response = backend.resolve(ActivityKind::Crafting, &request).unwrap();
        assert_eq!(response.roll, 20);
        assert!(response.success);
        assert_eq!(response.gold_spent, Some(5));
        assert_eq!(response.updated_character.gold, 15);
    }

    #[test]
    fn tool_success_counts_once_the_item_is_finished() {
        let (backend, request) = backend();
        backend.script_rolls([20, 20]);
        let halfway = backend.resolve(ActivityKind::Crafting, &request).unwrap();
        assert_eq!(halfway.updated_progress.accumulated, 5);
        assert_eq!(halfway.updated_character.competency_successes("smith's tools"), 0);

        let done = backend.resolve(ActivityKind::Crafting, &request).unwrap();
        assert!(done.updated_progress.is_completed());
        assert_eq!(done.updated_character.competency_successes("smith's tools"), 1);
        assert!(done.ranked_up.is_none());
    }

    #[test]
    fn completed_research_unlocks_its_recipe() {
        let backend = SimulatedBackend::new(7, DowntimeRules::default());
        let details = ResearchDetails::new(Rarity::Common, ResearchSource::Books)
            .unlocking("Bag of Holding");
        let activity = Activity::research(
            ActivityId(2),
            "Bag of Holding",
            details,
            &DowntimeRules::default().research,
        );
        backend.insert_character(Character::new(CharacterId(1), "Oren", 1).with_purse(100, 5));
        backend.insert_progress(Progress::start(ProgressId(4), CharacterId(1), &activity));
        backend.insert_activity(activity);
        backend.script_rolls([20]);
        let request = AttemptRequest {
            character_id: CharacterId(1),
            activity_id: ActivityId(2),
            progress_id: ProgressId(4),
            rank: None,
            days_to_spend: None,
            economy_bonus: None,
            roll_override: None,
        };
        let response = backend.resolve(ActivityKind::Research, &request).unwrap();
        assert!(response.updated_progress.is_completed());
        assert_eq!(response.unlocked_recipe.as_deref(), Some("Bag of Holding"));
        assert!(response.updated_character.has_unlocked("bag of holding"));
    }

    #[test]
    fn locked_recipe_is_rejected_by_the_server() {
        let (backend, request) = backend();
        let mut locked = backend.world.borrow().activities[&ActivityId(1)].clone();
        locked.variant = ActivityVariant::Crafting(
            CraftingDetails::new("Smith's Tools", CraftingCost::Mundane).requiring_research(),
        );
        backend.insert_activity(locked);
        let err = backend.resolve(ActivityKind::Crafting, &request).unwrap_err();
        assert_eq!(err.to_string(), "recipe must be researched first");
    }

    #[test]
    fn history_limit_truncates_the_returned_log() {
        let (backend, request) = backend();
        let backend = backend.with_history_limit(1);
        backend.script_rolls([3, 4]);
        backend.resolve(ActivityKind::Crafting, &request).unwrap();
        let response = backend.resolve(ActivityKind::Crafting, &request).unwrap();
        assert_eq!(response.updated_progress.log.len(), 1);
        assert_eq!(response.updated_progress.log[0].roll, 4);
        let stored = backend.progress(ProgressId(3)).unwrap();
        assert_eq!(stored.log.len(), 2);
    }

    #[test]
    fn seeded_rolls_repeat() {
        let (first, request) = backend();
        let (second, _) = backend();
        let a = first.resolve(ActivityKind::Crafting, &request).unwrap();
        let b = second.resolve(ActivityKind::Crafting, &request).unwrap();
        assert_eq!(a.roll, b.roll);
        assert!((1..=20).contains(&a.roll));
    }

    #[test]
    fn wrong_endpoint_is_rejected() {
        let (backend, request) = backend();
        let err = backend.resolve(ActivityKind::Research, &request).unwrap_err();
        assert_eq!(err.to_string(), "activity does not match endpoint");
    }

    #[test]
    fn server_recheck_rejects_broke_character() {
        let (backend, request) = backend();
        backend.insert_character(Character::new(CharacterId(1), "Ilsa", 1).with_purse(1, 0));
        let err = backend.resolve(ActivityKind::Crafting, &request).unwrap_err();
        assert_eq!(err.to_string(), "insufficient free time; insufficient gold");
        assert_eq!(backend.request_count(), 1);
    }

    #[test]
    fn queued_failure_fires_once() {
        let (backend, request) = backend();
        backend.reject_next(500, "server exploded");
        assert!(backend.resolve(ActivityKind::Crafting, &request).is_err());
        assert!(backend.resolve(ActivityKind::Crafting, &request).is_ok());
    }
}
