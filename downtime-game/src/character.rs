//! Character snapshots mirrored from the campaign backend
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CharacterId(pub u64);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The six ability scores a check can be governed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub const ALL: [Self; 6] = [
        Self::Strength,
        Self::Dexterity,
        Self::Constitution,
        Self::Intelligence,
        Self::Wisdom,
        Self::Charisma,
    ];

    #[must_use]
    pub const fn short_label(self) -> &'static str {
        match self {
            Self::Strength => "STR",
            Self::Dexterity => "DEX",
            Self::Constitution => "CON",
            Self::Intelligence => "INT",
            Self::Wisdom => "WIS",
            Self::Charisma => "CHA",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Strength => "strength",
            Self::Dexterity => "dexterity",
            Self::Constitution => "constitution",
            Self::Intelligence => "intelligence",
            Self::Wisdom => "wisdom",
            Self::Charisma => "charisma",
        };
        f.write_str(label)
    }
}

/// Raw ability scores. Missing scores default to the average of 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

impl AbilityScores {
    #[must_use]
    pub const fn score(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    /// Replace a single score, returning the updated set.
    #[must_use]
    pub const fn with(mut self, ability: Ability, score: u8) -> Self {
        match ability {
            Ability::Strength => self.strength = score,
            Ability::Dexterity => self.dexterity = score,
            Ability::Constitution => self.constitution = score,
            Ability::Intelligence => self.intelligence = score,
            Ability::Wisdom => self.wisdom = score,
            Ability::Charisma => self.charisma = score,
        }
        self
    }
}

/// Read-only snapshot of a player character.
///
/// The backend owns every field here. A fresh snapshot always replaces the
/// previous one as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    #[serde(default)]
    pub name: String,
    pub level: u8,
    #[serde(default)]
    pub abilities: AbilityScores,
    pub gold: u32,
    pub free_days: u32,
    /// Skill and tool names the character is proficient with.
    #[serde(default)]
    pub proficiencies: BTreeSet<String>,
    /// Cumulative qualifying successes per tool or job competency.
    #[serde(default)]
    pub competencies: BTreeMap<String, u32>,
    /// Recipes whose formula the character has researched.
    #[serde(default)]
    pub unlocked_recipes: BTreeSet<String>,
}

impl Character {
    #[must_use]
    pub fn new(id: CharacterId, name: impl Into<String>, level: u8) -> Self {
        Self {
            id,
            name: name.into(),
            level,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_purse(mut self, gold: u32, free_days: u32) -> Self {
        self.gold = gold;
        self.free_days = free_days;
        self
    }

    #[must_use]
    pub fn with_proficiency(mut self, name: impl Into<String>) -> Self {
        self.proficiencies.insert(name.into());
        self
    }

    /// Proficiency names compare case-insensitively.
    #[must_use]
    pub fn is_proficient(&self, name: &str) -> bool {
        self.proficiencies
            .iter()
            .any(|held| held.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn has_unlocked(&self, recipe: &str) -> bool {
        self.unlocked_recipes
            .iter()
            .any(|held| held.eq_ignore_ascii_case(recipe))
    }

    /// Record a researched recipe. Returns `false` if it was already known.
    pub fn unlock_recipe(&mut self, recipe: &str) -> bool {
        if self.has_unlocked(recipe) {
            return false;
        }
        self.unlocked_recipes.insert(recipe.to_string())
    }

    #[must_use]
    pub fn competency_successes(&self, name: &str) -> u32 {
        self.competencies
            .iter()
            .find(|(held, _)| held.eq_ignore_ascii_case(name))
            .map_or(0, |(_, successes)| *successes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proficiency_lookup_ignores_case() {
        let hero = Character::new(CharacterId(1), "Ilsa", 3).with_proficiency("Smith's Tools");
        assert!(hero.is_proficient("smith's tools"));
        assert!(!hero.is_proficient("Tinker's Tools"));
    }

    #[test]
    fn missing_abilities_default_to_ten() {
        let json = r#"{"id": 4, "level": 2, "gold": 10, "free_days": 3, "abilities": {"wisdom": 14}}"#;
        let parsed: Character = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.abilities.score(Ability::Wisdom), 14);
        assert_eq!(parsed.abilities.score(Ability::Strength), 10);
        assert!(parsed.competencies.is_empty());
    }

    #[test]
    fn negative_gold_is_rejected() {
        let json = r#"{"id": 4, "level": 2, "gold": -5, "free_days": 3}"#;
        assert!(serde_json::from_str::<Character>(json).is_err());
    }

    #[test]
    fn competency_lookup_defaults_to_zero() {
        let mut hero = Character::new(CharacterId(2), "Bram", 1);
        hero.competencies.insert("Alchemist's Supplies".to_string(), 7);
        assert_eq!(hero.competency_successes("alchemist's supplies"), 7);
        assert_eq!(hero.competency_successes("Brewer's Supplies"), 0);
    }

    #[test]
    fn recipes_unlock_once_ignoring_case() {
        let mut hero = Character::new(CharacterId(3), "Oren", 5);
        assert!(!hero.has_unlocked("Staff of Frost"));
        assert!(hero.unlock_recipe("Staff of Frost"));
        assert!(!hero.unlock_recipe("staff of frost"));
        assert!(hero.has_unlocked("STAFF OF FROST"));
        assert_eq!(hero.unlocked_recipes.len(), 1);
    }
}
