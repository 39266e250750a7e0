//! Competency grade tracking
//!
//! The tracker remembers the last grade it saw per character and competency.
//! Observations that land on a higher grade produce a single
//! [`GradeIncreased`] for the highest grade reached, even when several
//! thresholds were crossed at once. Competencies missing from a seeded
//! character start at the lowest grade; for characters never seeded the first
//! observation only records the grade.
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::character::{Character, CharacterId};
use crate::rules::GradeLadder;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeIncreased {
    pub character_id: CharacterId,
    pub competency: String,
    pub grade: String,
    pub rank: u8,
    pub message: String,
}

impl GradeIncreased {
    /// Prefer the server's wording when it sent one.
    #[must_use]
    pub fn with_message(mut self, message: Option<&str>) -> Self {
        if let Some(message) = message.filter(|text| !text.trim().is_empty()) {
            self.message = message.to_string();
        }
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradeTracker {
    ladder: GradeLadder,
    seen: HashMap<(CharacterId, String), u8>,
    seeded: HashSet<CharacterId>,
    notice: Option<GradeIncreased>,
}

impl GradeTracker {
    #[must_use]
    pub fn new(ladder: GradeLadder) -> Self {
        Self {
            ladder,
            seen: HashMap::new(),
            seeded: HashSet::new(),
            notice: None,
        }
    }

    #[must_use]
    pub fn ladder(&self) -> &GradeLadder {
        &self.ladder
    }

    /// Seed every competency on a freshly loaded character.
    pub fn seed(&mut self, character: &Character) {
        self.seeded.insert(character.id);
        for (competency, successes) in &character.competencies {
            let rank = self.ladder.rank_for(*successes);
            self.seen
                .insert((character.id, competency.to_ascii_lowercase()), rank);
        }
    }

    /// Compare the character's successes on `competency` against the ladder.
    pub fn observe(&mut self, character: &Character, competency: &str) -> Option<GradeIncreased> {
        let successes = character.competency_successes(competency);
        let index = self.ladder.grade_index(successes);
        let rank = self.ladder.rank_for(successes);
        let grade = self
            .ladder
            .step(index)
            .map(|step| step.name.clone())
            .unwrap_or_default();
        let message = format!("{} reached {grade} in {competency}", character.name);
        self.advance(character.id, competency, rank, grade, message)
    }

    /// Record a non-ladder rank without reporting a change.
    pub fn seed_rank(&mut self, character_id: CharacterId, label: &str, rank: u8) {
        self.seen
            .insert((character_id, label.to_ascii_lowercase()), rank);
    }

    /// Track a rank that is not ladder-driven, such as an employment rank.
    pub fn observe_rank(
        &mut self,
        character_id: CharacterId,
        label: &str,
        rank: u8,
    ) -> Option<GradeIncreased> {
        let grade = format!("Rank {rank}");
        let message = format!("Promoted to rank {rank} as {label}");
        self.advance(character_id, label, rank, grade, message)
    }

    fn advance(
        &mut self,
        character_id: CharacterId,
        competency: &str,
        rank: u8,
        grade: String,
        message: String,
    ) -> Option<GradeIncreased> {
        let key = (character_id, competency.to_ascii_lowercase());
        let previous = self
            .seen
            .insert(key, rank)
            .or_else(|| self.seeded.contains(&character_id).then_some(1));
        match previous {
            Some(previous) if rank > previous => {
                let event = GradeIncreased {
                    character_id,
                    competency: competency.to_string(),
                    grade,
                    rank,
                    message,
                };
                log::info!(
                    "grade increased for character {character_id}: {} -> {}",
                    event.competency,
                    event.grade
                );
                Some(event)
            }
            _ => None,
        }
    }

    /// Hold an event until the UI takes it.
    pub fn post(&mut self, event: GradeIncreased) {
        self.notice = Some(event);
    }

    /// The pending notice, cleared once taken.
    pub fn take_notice(&mut self) -> Option<GradeIncreased> {
        self.notice.take()
    }

    #[must_use]
    pub fn pending_notice(&self) -> Option<&GradeIncreased> {
        self.notice.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::GradeStep;

    fn smith(successes: u32) -> Character {
        let mut hero = Character::new(CharacterId(7), "Ilsa", 4);
        hero.competencies
            .insert("Smith's Tools".to_string(), successes);
        hero
    }

    #[test]
    fn first_observation_only_seeds() {
        let mut tracker = GradeTracker::new(GradeLadder::standard());
        assert!(tracker.observe(&smith(20), "Smith's Tools").is_none());
        assert!(tracker.observe(&smith(21), "Smith's Tools").is_none());
    }

    #[test]
    fn first_success_in_a_new_tool_can_grade_up() {
        let ladder = GradeLadder::new(vec![
            GradeStep {
                name: "Novice".into(),
                successes: 0,
            },
            GradeStep {
                name: "Apprentice".into(),
                successes: 1,
            },
        ])
        .unwrap();
        let mut tracker = GradeTracker::new(ladder);
        let fresh = Character::new(CharacterId(7), "Ilsa", 1);
        tracker.seed(&fresh);

        let event = tracker.observe(&smith(1), "Smith's Tools").unwrap();
        assert_eq!(event.grade, "Apprentice");
        assert_eq!(event.rank, 2);
        assert!(tracker.observe(&smith(1), "Smith's Tools").is_none());
    }

    #[test]
    fn seeded_rank_stays_quiet_until_it_rises() {
        let mut tracker = GradeTracker::default();
        tracker.seed(&Character::new(CharacterId(1), "Tam", 1));
        tracker.seed_rank(CharacterId(1), "Scribe", 3);
        assert!(tracker.observe_rank(CharacterId(1), "Scribe", 3).is_none());
        assert_eq!(
            tracker
                .observe_rank(CharacterId(1), "Scribe", 4)
                .map(|event| event.rank),
            Some(4)
        );
    }

    #[test]
    fn crossing_threshold_fires_once() {
        let mut tracker = GradeTracker::new(GradeLadder::standard());
        tracker.seed(&smith(4));
        let event = tracker.observe(&smith(5), "Smith's Tools").unwrap();
        assert_eq!(event.grade, "Apprentice");
        assert_eq!(event.rank, 2);
        assert!(tracker.observe(&smith(6), "Smith's Tools").is_none());
    }

    #[test]
    fn multiple_thresholds_report_highest() {
        let mut tracker = GradeTracker::new(GradeLadder::standard());
        tracker.seed(&smith(4));
        let event = tracker.observe(&smith(16), "smith's tools").unwrap();
        assert_eq!(event.grade, "Expert");
        assert_eq!(event.rank, 3);
    }

    #[test]
    fn notice_is_taken_once() {
        let mut tracker = GradeTracker::default();
        tracker.observe_rank(CharacterId(1), "Scribe", 1);
        let event = tracker.observe_rank(CharacterId(1), "Scribe", 2).unwrap();
        tracker.post(event.with_message(Some("You are now a senior scribe")));
        assert_eq!(
            tracker.take_notice().map(|notice| notice.message),
            Some("You are now a senior scribe".to_string())
        );
        assert!(tracker.take_notice().is_none());
    }

    #[test]
    fn blank_server_message_keeps_local_text() {
        let mut tracker = GradeTracker::default();
        tracker.observe_rank(CharacterId(1), "Scribe", 1);
        let event = tracker
            .observe_rank(CharacterId(1), "Scribe", 2)
            .unwrap()
            .with_message(Some("  "));
        assert_eq!(event.message, "Promoted to rank 2 as Scribe");
    }
}
