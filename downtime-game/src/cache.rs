//! Client-side snapshot cache
use std::collections::HashMap;

use crate::activity::ActivityId;
use crate::character::{Character, CharacterId};
use crate::progress::Progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub character: CharacterId,
    pub activity: ActivityId,
}

impl SnapshotKey {
    #[must_use]
    pub const fn new(character: CharacterId, activity: ActivityId) -> Self {
        Self {
            character,
            activity,
        }
    }
}

/// Latest character and progress snapshots. Entries are replaced whole,
/// never merged field by field.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    characters: HashMap<CharacterId, Character>,
    progress: HashMap<SnapshotKey, Progress>,
}

impl SnapshotCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the snapshot that was replaced, if any.
    pub fn put_character(&mut self, character: Character) -> Option<Character> {
        self.characters.insert(character.id, character)
    }

    pub fn put_progress(&mut self, progress: Progress) -> Option<Progress> {
        let key = SnapshotKey::new(progress.character_id, progress.activity_id);
        self.progress.insert(key, progress)
    }

    #[must_use]
    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    #[must_use]
    pub fn progress(&self, key: SnapshotKey) -> Option<&Progress> {
        self.progress.get(&key)
    }

    pub fn remove_progress(&mut self, key: SnapshotKey) -> Option<Progress> {
        self.progress.remove(&key)
    }

    pub fn progress_for(&self, character: CharacterId) -> impl Iterator<Item = &Progress> {
        self.progress
            .iter()
            .filter(move |(key, _)| key.character == character)
            .map(|(_, progress)| progress)
    }
}
