//! Attempt orchestration: gate, submit, apply
//!
//! The orchestrator owns the snapshot cache and the grade tracker. A
//! submission is split in two so callers never hold the orchestrator across an
//! await point:
//!
//! 1. [`ActivityOrchestrator::begin`] checks the gate and builds the request.
//! 2. [`ActivityOrchestrator::finish`] applies whatever the transport returned.
//!
//! [`ActivityOrchestrator::submit_attempt`] composes both for callers that can
//! hold a mutable borrow for the whole exchange.
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::activity::{Activity, ActivityKind, ActivityVariant, GoalKind};
use crate::cache::{SnapshotCache, SnapshotKey};
use crate::character::{Character, CharacterId};
use crate::error::AttemptError;
use crate::gate::{AttemptCost, GateVerdict, check_activity};
use crate::grade::{GradeIncreased, GradeTracker};
use crate::modifier::{ModifierBreakdown, modifier_breakdown};
use crate::payout::{RankCost, WageEstimate, attempt_rank, estimate_wages, resolve_rank};
use crate::progress::{AttemptRecord, Progress};
use crate::rules::DowntimeRules;
use crate::transport::{AttemptTransport, TransportError};
use crate::wire::{AttemptRequest, AttemptResponse, BoardSnapshot};

/// Player-chosen knobs for a single attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptOptions {
    /// Days to work in one employment attempt. Ignored elsewhere.
    pub days_to_spend: Option<u32>,
    /// Economy bonus added to employment pay. Ignored elsewhere.
    pub economy_bonus: Option<i32>,
    /// Fixed d20 result as typed, validated to 1-20 before use.
    pub roll_override: Option<i32>,
}

/// Everything the attempt panel shows before the player commits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptPreview {
    pub modifier: ModifierBreakdown,
    pub dc: i32,
    pub cost: RankCost,
    pub attempt_cost: AttemptCost,
    pub verdict: GateVerdict,
    pub percent_complete: f64,
    /// Gold or successes a successful attempt would add, before clamping.
    pub gain_on_success: u32,
    /// Employment wage estimate, shown only when a roll override is set.
    pub wages: Option<WageEstimate>,
}

/// A request that passed the gate and is waiting on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttempt {
    pub key: SnapshotKey,
    pub kind: ActivityKind,
    pub request: AttemptRequest,
    /// What the gate cleared this attempt to spend.
    pub cost: AttemptCost,
    options: AttemptOptions,
}

/// State after a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub record: AttemptRecord,
    pub character: Character,
    pub progress: Progress,
    pub completed: bool,
    pub grade_up: Option<GradeIncreased>,
    pub unlocked_recipe: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityOrchestrator {
    rules: DowntimeRules,
    cache: SnapshotCache,
    grades: GradeTracker,
    in_flight: HashSet<SnapshotKey>,
    failed: HashMap<SnapshotKey, AttemptOptions>,
}

impl ActivityOrchestrator {
    #[must_use]
    pub fn new(rules: DowntimeRules) -> Self {
        let grades = GradeTracker::new(rules.grades.clone());
        Self {
            rules,
            cache: SnapshotCache::new(),
            grades,
            in_flight: HashSet::new(),
            failed: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn rules(&self) -> &DowntimeRules {
        &self.rules
    }

    #[must_use]
    pub const fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Replace the cached character and seed grade tracking from it.
    pub fn load_character(&mut self, character: Character) {
        self.grades.seed(&character);
        self.cache.put_character(character);
    }

    /// Replace cached progress. Inconsistent snapshots are normalized.
    pub fn load_progress(&mut self, activity: &Activity, mut progress: Progress) {
        if progress.normalize() {
            log::warn!(
                "normalized progress {} for activity {}",
                progress.id,
                progress.activity_id
            );
        }
        if activity.kind() == ActivityKind::Employment {
            self.grades
                .seed_rank(progress.character_id, &activity.name, progress.rank);
        }
        self.cache.put_progress(progress);
    }

    /// Load everything a board read returned.
    pub fn load_board(&mut self, board: &BoardSnapshot) {
        self.load_character(board.character.clone());
        for progress in &board.progress {
            if let Some(activity) = board
                .activities
                .iter()
                .find(|activity| activity.id == progress.activity_id)
            {
                self.load_progress(activity, progress.clone());
            }
        }
    }

    #[must_use]
    pub fn is_in_flight(&self, key: SnapshotKey) -> bool {
        self.in_flight.contains(&key)
    }

    #[must_use]
    pub fn can_retry(&self, key: SnapshotKey) -> bool {
        self.failed.contains_key(&key)
    }

    pub fn take_grade_notice(&mut self) -> Option<GradeIncreased> {
        self.grades.take_notice()
    }

    #[must_use]
    pub fn pending_grade_notice(&self) -> Option<&GradeIncreased> {
        self.grades.pending_notice()
    }

    /// Rank the next attempt resolves at.
    #[must_use]
    pub fn current_rank(&self, activity: &Activity, character: &Character, progress: &Progress) -> u8 {
        attempt_rank(activity, character, progress, &self.rules.grades)
    }

    fn snapshots(
        &self,
        activity: &Activity,
        character: CharacterId,
    ) -> Result<(SnapshotKey, &Character, &Progress), AttemptError> {
        let key = SnapshotKey::new(character, activity.id);
        let unknown = AttemptError::UnknownSnapshot {
            character,
            activity: activity.id,
        };
        let character = self.cache.character(character).ok_or(unknown.clone())?;
        let progress = self.cache.progress(key).ok_or(unknown)?;
        Ok((key, character, progress))
    }

    /// Modifier, cost, verdict and completion for the next attempt. No side effects.
    ///
    /// # Errors
    ///
    /// Returns an error when snapshots are missing, the roll override is out of
    /// range, or the current rank is beyond the table.
    pub fn preview(
        &self,
        activity: &Activity,
        character: CharacterId,
        options: AttemptOptions,
    ) -> Result<AttemptPreview, AttemptError> {
        let (_, character, progress) = self.snapshots(activity, character)?;
        let roll = validate_roll(options.roll_override)?;
        let rank = self.current_rank(activity, character, progress);
        let cost = resolve_rank(activity, rank)?;
        let days = options.days_to_spend.unwrap_or(1);
        let attempt_cost = AttemptCost::for_activity(activity, &cost, days);
        let verdict = check_activity(
            activity,
            character,
            attempt_cost,
            progress,
            &self.rules.grades,
        );
        let economy = options.economy_bonus.unwrap_or(0);
        let (gain_on_success, wages) = match &activity.variant {
            ActivityVariant::Crafting(_) if activity.goal.kind() == GoalKind::Gold => {
                (cost.payout.evaluate(0), None)
            }
            ActivityVariant::Crafting(_) | ActivityVariant::Research(_) => (1, None),
            ActivityVariant::Employment(_) => {
                let days = attempt_cost.days;
                let wages = roll.map(|roll| {
                    estimate_wages(&cost, economy, &self.rules.performance, roll, days)
                });
                let flat = cost.payout.evaluate(economy).saturating_mul(days);
                (wages.map_or(flat, |estimate| estimate.total), wages)
            }
        };
        Ok(AttemptPreview {
            modifier: modifier_breakdown(character, activity, &self.rules.proficiency),
            dc: activity.dc,
            cost,
            attempt_cost,
            verdict,
            percent_complete: progress.percent_complete(),
            gain_on_success,
            wages,
        })
    }

    /// Gate the attempt and mark it in flight.
    ///
    /// # Errors
    ///
    /// Fails without side effects when an attempt for the same key is already
    /// in flight, the gate refuses, the roll override is out of range, or the
    /// rank cannot be resolved.
    pub fn begin(
        &mut self,
        activity: &Activity,
        character: CharacterId,
        options: AttemptOptions,
    ) -> Result<PendingAttempt, AttemptError> {
        let key = SnapshotKey::new(character, activity.id);
        if self.in_flight.contains(&key) {
            return Err(AttemptError::InFlight);
        }
        let preview = self.preview(activity, character, options)?;
        if !preview.verdict.allowed {
            return Err(AttemptError::from_verdict(&preview.verdict));
        }
        let roll = validate_roll(options.roll_override)?;
        let progress = self
            .cache
            .progress(key)
            .ok_or(AttemptError::UnknownSnapshot {
                character,
                activity: activity.id,
            })?;
        let employment = activity.kind() == ActivityKind::Employment;
        let request = AttemptRequest {
            character_id: character,
            activity_id: activity.id,
            progress_id: progress.id,
            rank: employment.then_some(preview.cost.rank),
            days_to_spend: employment.then_some(preview.attempt_cost.days),
            economy_bonus: if employment { options.economy_bonus } else { None },
            roll_override: roll,
        };
        log::debug!(
            "dispatching {} attempt for character {} on activity {}",
            activity.kind(),
            character,
            activity.id
        );
        self.in_flight.insert(key);
        Ok(PendingAttempt {
            key,
            kind: activity.kind(),
            request,
            cost: preview.attempt_cost,
            options,
        })
    }

    /// Release an in-flight key without touching any snapshot.
    pub fn abandon(&mut self, pending: PendingAttempt) {
        self.in_flight.remove(&pending.key);
    }

    /// Apply a transport result to the cache.
    ///
    /// # Errors
    ///
    /// Transport failures become [`AttemptError::RequestFailed`] and leave every
    /// snapshot as it was.
    pub fn finish(
        &mut self,
        activity: &Activity,
        pending: PendingAttempt,
        result: Result<AttemptResponse, TransportError>,
    ) -> Result<AttemptOutcome, AttemptError> {
        self.in_flight.remove(&pending.key);
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                log::warn!(
                    "attempt on activity {} failed: {err}",
                    pending.request.activity_id
                );
                self.failed.insert(pending.key, pending.options);
                return Err(err.into());
            }
        };
        let returned = &response.updated_progress;
        if response.updated_character.id != pending.key.character
            || returned.character_id != pending.key.character
            || returned.activity_id != pending.key.activity
            || returned.id != pending.request.progress_id
        {
            self.failed.insert(pending.key, pending.options);
            return Err(AttemptError::RequestFailed(
                "response does not match the submitted attempt".to_string(),
            ));
        }
        self.failed.remove(&pending.key);

        let previous = self.cache.progress(pending.key).cloned();
        let expected_spend = match pending.kind {
            ActivityKind::Employment => pending.cost.gold,
            ActivityKind::Crafting | ActivityKind::Research => 0,
        };
        let derived = response.record(previous.as_ref(), expected_spend);
        let mut progress = response.updated_progress.clone();
        if progress.normalize() {
            log::warn!("server returned inconsistent progress {}", progress.id);
        }
        let logged = progress
            .latest()
            .is_some_and(|head| same_check(head, &derived));
        if !logged {
            // The server did not log this attempt; keep local history.
            if progress.log.is_empty() {
                progress.log = previous.map(|prior| prior.log).unwrap_or_default();
            }
            progress.log.insert(0, derived);
        }
        let record = progress.latest().copied().unwrap_or(derived);

        let character = response.updated_character;
        let tracked = match &activity.variant {
            ActivityVariant::Crafting(details) => self.grades.observe(&character, &details.tool),
            ActivityVariant::Employment(_) => {
                self.grades
                    .observe_rank(character.id, &activity.name, progress.rank)
            }
            ActivityVariant::Research(_) => None,
        };
        let server_message = response.ranked_up.as_ref().map(|up| up.message.as_str());
        let grade_up = match (tracked, response.ranked_up.as_ref()) {
            (Some(event), _) => Some(event.with_message(server_message)),
            (None, Some(up)) => Some(GradeIncreased {
                character_id: character.id,
                competency: activity
                    .competency()
                    .unwrap_or(activity.name.as_str())
                    .to_string(),
                grade: up.grade.clone().unwrap_or_default(),
                rank: up.rank.unwrap_or(progress.rank),
                message: up.message.clone(),
            }),
            (None, None) => None,
        };
        if let Some(event) = &grade_up {
            self.grades.post(event.clone());
        }

        let completed = progress.is_completed();
        if completed {
            log::info!(
                "character {} completed activity {}",
                character.id,
                activity.id
            );
        }
        let unlocked_recipe = response.unlocked_recipe;
        if let Some(recipe) = &unlocked_recipe {
            log::info!("character {} unlocked recipe {recipe}", character.id);
        }
        self.cache.put_character(character.clone());
        self.cache.put_progress(progress.clone());
        Ok(AttemptOutcome {
            record,
            character,
            progress,
            completed,
            grade_up,
            unlocked_recipe,
        })
    }

    /// Gate, send and apply one attempt.
    ///
    /// # Errors
    ///
    /// See [`Self::begin`] and [`Self::finish`].
    pub async fn submit_attempt<T>(
        &mut self,
        transport: &T,
        activity: &Activity,
        character: CharacterId,
        options: AttemptOptions,
    ) -> Result<AttemptOutcome, AttemptError>
    where
        T: AttemptTransport + ?Sized,
    {
        let pending = self.begin(activity, character, options)?;
        let result = transport.send_attempt(pending.kind, &pending.request).await;
        self.finish(activity, pending, result)
    }

    /// Gate the last failed attempt for this key again, with the same options.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError::NothingToRetry`] when the last attempt did not
    /// fail, otherwise as [`Self::begin`].
    pub fn begin_retry(
        &mut self,
        activity: &Activity,
        character: CharacterId,
    ) -> Result<PendingAttempt, AttemptError> {
        let key = SnapshotKey::new(character, activity.id);
        let options = self
            .failed
            .get(&key)
            .copied()
            .ok_or(AttemptError::NothingToRetry)?;
        self.begin(activity, character, options)
    }

    /// Re-run the last failed attempt for this key through the gate.
    ///
    /// # Errors
    ///
    /// See [`Self::begin_retry`] and [`Self::finish`].
    pub async fn retry<T>(
        &mut self,
        transport: &T,
        activity: &Activity,
        character: CharacterId,
    ) -> Result<AttemptOutcome, AttemptError>
    where
        T: AttemptTransport + ?Sized,
    {
        let pending = self.begin_retry(activity, character)?;
        let result = transport.send_attempt(pending.kind, &pending.request).await;
        self.finish(activity, pending, result)
    }
}

fn validate_roll(roll: Option<i32>) -> Result<Option<u8>, AttemptError> {
    roll.map(|value| match u8::try_from(value) {
        Ok(natural) if (1..=20).contains(&natural) => Ok(natural),
        _ => Err(AttemptError::InvalidRoll(value)),
    })
    .transpose()
}

/// Same die, modifier and outcome against the same DC.
fn same_check(a: &AttemptRecord, b: &AttemptRecord) -> bool {
    a.roll == b.roll
        && a.modifier == b.modifier
        && a.total == b.total
        && a.dc == b.dc
        && a.success == b.success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityId, CraftingCost, CraftingDetails, Goal, RankTable};
    use crate::character::Ability;
    use crate::progress::ProgressId;
    use futures::executor::block_on;
    use std::cell::Cell;

    struct Unreachable {
        calls: Cell<usize>,
    }

    #[async_trait::async_trait(?Send)]
    impl AttemptTransport for Unreachable {
        async fn send_attempt(
            &self,
            _kind: ActivityKind,
            _request: &AttemptRequest,
        ) -> Result<AttemptResponse, TransportError> {
            self.calls.set(self.calls.get() + 1);
            Err(TransportError::Network("offline".into()))
        }
    }

    fn forge() -> Activity {
        Activity {
            id: ActivityId(2),
            name: "Forge".into(),
            target: "Dagger".into(),
            ability: Ability::Strength,
            proficiency: Some("Smith's Tools".into()),
            dc: 12,
            table: RankTable::single(10, 5),
            goal: Goal::Gold { required: 20 },
            variant: ActivityVariant::Crafting(CraftingDetails::new(
                "Smith's Tools",
                CraftingCost::Mundane,
            )),
        }
    }

    fn loaded(gold: u32) -> (ActivityOrchestrator, Activity) {
        let activity = forge();
        let mut orchestrator = ActivityOrchestrator::new(DowntimeRules::default());
        orchestrator.load_character(Character::new(CharacterId(1), "Ilsa", 3).with_purse(gold, 5));
        let progress = Progress::start(ProgressId(9), CharacterId(1), &activity);
        orchestrator.load_progress(&activity, progress);
        (orchestrator, activity)
    }

    #[test]
    fn gate_refusal_makes_no_request() {
        let (mut orchestrator, activity) = loaded(5);
        let transport = Unreachable {
            calls: Cell::new(0),
        };
        let err = block_on(orchestrator.submit_attempt(
            &transport,
            &activity,
            CharacterId(1),
            AttemptOptions::default(),
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "insufficient gold");
        assert_eq!(transport.calls.get(), 0);
    }

    #[test]
    fn second_begin_is_in_flight() {
        let (mut orchestrator, activity) = loaded(50);
        let pending = orchestrator
            .begin(&activity, CharacterId(1), AttemptOptions::default())
            .unwrap();
        assert_eq!(
            orchestrator.begin(&activity, CharacterId(1), AttemptOptions::default()),
            Err(AttemptError::InFlight)
        );
        orchestrator.abandon(pending);
        assert!(!orchestrator.is_in_flight(SnapshotKey::new(CharacterId(1), activity.id)));
    }

    #[test]
    fn crafting_request_omits_employment_fields() {
        let (mut orchestrator, activity) = loaded(50);
        let pending = orchestrator
            .begin(
                &activity,
                CharacterId(1),
                AttemptOptions {
                    days_to_spend: Some(3),
                    economy_bonus: Some(2),
                    roll_override: Some(11),
                },
            )
            .unwrap();
        assert_eq!(pending.request.rank, None);
        assert_eq!(pending.request.days_to_spend, None);
        assert_eq!(pending.request.economy_bonus, None);
        assert_eq!(pending.request.roll_override, Some(11));
        assert_eq!(pending.kind.attempt_endpoint(), "downtime/crafting/attempt/");
    }

    #[test]
    fn invalid_roll_override_is_refused() {
        let (mut orchestrator, activity) = loaded(50);
        let options = AttemptOptions {
            roll_override: Some(21),
            ..AttemptOptions::default()
        };
        assert_eq!(
            orchestrator.begin(&activity, CharacterId(1), options),
            Err(AttemptError::InvalidRoll(21))
        );
    }

    #[test]
    fn failed_transport_leaves_cache_and_enables_retry() {
        let (mut orchestrator, activity) = loaded(50);
        let transport = Unreachable {
            calls: Cell::new(0),
        };
        let before = orchestrator.cache().character(CharacterId(1)).cloned();
        let err = block_on(orchestrator.submit_attempt(
            &transport,
            &activity,
            CharacterId(1),
            AttemptOptions::default(),
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "network error: offline");
        assert_eq!(orchestrator.cache().character(CharacterId(1)).cloned(), before);
        let key = SnapshotKey::new(CharacterId(1), activity.id);
        assert!(orchestrator.can_retry(key));
        assert!(!orchestrator.is_in_flight(key));
        let _ = block_on(orchestrator.retry(&transport, &activity, CharacterId(1)));
        assert_eq!(transport.calls.get(), 2);
    }

    #[test]
    fn progress_for_another_character_is_refused() {
        let (mut orchestrator, activity) = loaded(50);
        let before_character = orchestrator.cache().character(CharacterId(1)).cloned();
        let key = SnapshotKey::new(CharacterId(1), activity.id);
        let before_progress = orchestrator.cache().progress(key).cloned();
        let pending = orchestrator
            .begin(&activity, CharacterId(1), AttemptOptions::default())
            .unwrap();

        let mut foreign = Progress::start(ProgressId(9), CharacterId(99), &activity);
        foreign.accumulated = 5;
        let mut spent = Character::new(CharacterId(1), "Ilsa", 3).with_purse(40, 4);
        spent.competencies.insert("Smith's Tools".into(), 1);
        let response = AttemptResponse {
            roll: 18,
            modifier: 0,
            total: 18,
            dc: 12,
            success: true,
            gold_delta: -10,
            updated_character: spent,
            updated_progress: foreign,
            ranked_up: None,
            gold_spent: None,
            unlocked_recipe: None,
        };
        let err = orchestrator
            .finish(&activity, pending, Ok(response))
            .unwrap_err();
        assert!(matches!(err, AttemptError::RequestFailed(_)));
        assert_eq!(
            orchestrator.cache().character(CharacterId(1)).cloned(),
            before_character
        );
        assert_eq!(orchestrator.cache().progress(key).cloned(), before_progress);
        assert!(
            orchestrator
                .cache()
                .progress(SnapshotKey::new(CharacterId(99), activity.id))
                .is_none()
        );
        assert!(orchestrator.can_retry(key));
    }

    #[test]
    fn out_of_range_typed_roll_is_reported() {
        let (orchestrator, activity) = loaded(50);
        let options = AttemptOptions {
            roll_override: Some(300),
            ..AttemptOptions::default()
        };
        assert_eq!(
            orchestrator.preview(&activity, CharacterId(1), options),
            Err(AttemptError::InvalidRoll(300))
        );
    }

    #[test]
    fn retry_without_failure_is_refused() {
        let (mut orchestrator, activity) = loaded(50);
        let transport = Unreachable {
            calls: Cell::new(0),
        };
        let err = block_on(orchestrator.retry(&transport, &activity, CharacterId(1))).unwrap_err();
        assert_eq!(err, AttemptError::NothingToRetry);
    }

    #[test]
    fn unknown_snapshot_is_reported() {
        let orchestrator = ActivityOrchestrator::new(DowntimeRules::default());
        let err = orchestrator
            .preview(&forge(), CharacterId(4), AttemptOptions::default())
            .unwrap_err();
        assert!(matches!(err, AttemptError::UnknownSnapshot { .. }));
    }

    #[test]
    fn preview_reports_cost_and_gain() {
        let (orchestrator, activity) = loaded(50);
        let preview = orchestrator
            .preview(&activity, CharacterId(1), AttemptOptions::default())
            .unwrap();
        assert!(preview.verdict.allowed);
        assert_eq!(preview.attempt_cost, AttemptCost { gold: 10, days: 1 });
        assert_eq!(preview.gain_on_success, 5);
        assert!(preview.percent_complete.abs() < f64::EPSILON);
        assert!(preview.wages.is_none());
    }
}
