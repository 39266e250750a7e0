//! Check modifier calculation
use serde::{Deserialize, Serialize};

use crate::activity::Activity;
use crate::character::{Ability, Character};
use crate::rules::ProficiencyTable;

/// Standard ability modifier: `floor((score - 10) / 2)`.
#[must_use]
pub const fn ability_modifier(score: u8) -> i32 {
    (score as i32 - 10).div_euclid(2)
}

/// The parts that add up to a check modifier, for display next to the roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierBreakdown {
    pub ability: Ability,
    pub ability_modifier: i32,
    pub proficient: bool,
    pub proficiency_bonus: i32,
}

impl ModifierBreakdown {
    #[must_use]
    pub const fn total(&self) -> i32 {
        self.ability_modifier + self.proficiency_bonus
    }
}

#[must_use]
pub fn modifier_breakdown(
    character: &Character,
    activity: &Activity,
    table: &ProficiencyTable,
) -> ModifierBreakdown {
    let ability_modifier = ability_modifier(character.abilities.score(activity.ability));
    let proficient = activity
        .proficiency
        .as_deref()
        .is_some_and(|name| character.is_proficient(name));
    let proficiency_bonus = if proficient {
        table.bonus_for(character.level)
    } else {
        0
    };
    ModifierBreakdown {
        ability: activity.ability,
        ability_modifier,
        proficient,
        proficiency_bonus,
    }
}

/// Ability modifier plus the level's proficiency bonus when the character is
/// proficient in the activity's skill or tool.
#[must_use]
pub fn compute_modifier(
    character: &Character,
    activity: &Activity,
    table: &ProficiencyTable,
) -> i32 {
    modifier_breakdown(character, activity, table).total()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{
        ActivityId, ActivityVariant, CraftingCost, CraftingDetails, Goal, RankTable,
    };
    use crate::character::CharacterId;

    fn forge(proficiency: Option<&str>) -> Activity {
        Activity {
            id: ActivityId(1),
            name: "Forge".into(),
            target: "Dagger".into(),
            ability: Ability::Strength,
            proficiency: proficiency.map(str::to_string),
            dc: 12,
            table: RankTable::single(5, 5),
            goal: Goal::Gold { required: 10 },
            variant: ActivityVariant::Crafting(CraftingDetails::new(
                "Smith's Tools",
                CraftingCost::Mundane,
            )),
        }
    }

    #[test]
    fn ability_modifier_floors_toward_negative() {
        assert_eq!(ability_modifier(1), -5);
        assert_eq!(ability_modifier(8), -1);
        assert_eq!(ability_modifier(9), -1);
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(11), 0);
        assert_eq!(ability_modifier(14), 2);
        assert_eq!(ability_modifier(20), 5);
    }

    #[test]
    fn proficient_level_five_adds_three() {
        let mut hero = Character::new(CharacterId(1), "Ilsa", 5).with_proficiency("smith's tools");
        hero.abilities = hero.abilities.with(Ability::Strength, 14);
        let table = ProficiencyTable::standard();
        assert_eq!(compute_modifier(&hero, &forge(Some("Smith's Tools")), &table), 5);
    }

    #[test]
    fn non_proficient_uses_ability_only() {
        let mut hero = Character::new(CharacterId(1), "Ilsa", 9);
        hero.abilities = hero.abilities.with(Ability::Strength, 8);
        let table = ProficiencyTable::standard();
        let breakdown = modifier_breakdown(&hero, &forge(Some("Smith's Tools")), &table);
        assert!(!breakdown.proficient);
        assert_eq!(breakdown.total(), -1);
        assert_eq!(compute_modifier(&hero, &forge(None), &table), -1);
    }

    #[test]
    fn level_outside_table_is_clamped() {
        let hero = Character::new(CharacterId(1), "Ilsa", 0).with_proficiency("Smith's Tools");
        let table = ProficiencyTable::standard();
        assert_eq!(compute_modifier(&hero, &forge(Some("Smith's Tools")), &table), 2);
    }
}
