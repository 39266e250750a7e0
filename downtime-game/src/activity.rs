//! Activity definitions and their rank tables
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::character::Ability;
use crate::rules::{Rarity, ResearchRules, RulesError};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActivityId(pub u64);

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Crafting,
    Research,
    Employment,
}

impl ActivityKind {
    pub const ALL: [Self; 3] = [Self::Crafting, Self::Research, Self::Employment];

    /// Path of the attempt endpoint, relative to the API base.
    #[must_use]
    pub const fn attempt_endpoint(self) -> &'static str {
        match self {
            Self::Crafting => "downtime/crafting/attempt/",
            Self::Research => "downtime/research/attempt/",
            Self::Employment => "downtime/employment/attempt/",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Crafting => "crafting",
            Self::Research => "research",
            Self::Employment => "employment",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    Successes,
    Gold,
}

/// What completes an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Goal {
    Successes { required: u32 },
    Gold { required: u32 },
}

impl Goal {
    #[must_use]
    pub const fn kind(self) -> GoalKind {
        match self {
            Self::Successes { .. } => GoalKind::Successes,
            Self::Gold { .. } => GoalKind::Gold,
        }
    }

    #[must_use]
    pub const fn required(self) -> u32 {
        match self {
            Self::Successes { required } | Self::Gold { required } => required,
        }
    }
}

const fn default_multiplier() -> f64 {
    1.0
}

/// One row of an activity's cost/payout table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankRow {
    pub rank: u8,
    pub gold_cost: u32,
    pub base_value: i32,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Days worked at this rank before promotion (employment only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_to_next_rank: Option<u32>,
}

impl RankRow {
    #[must_use]
    pub const fn new(rank: u8, gold_cost: u32, base_value: i32) -> Self {
        Self {
            rank,
            gold_cost,
            base_value,
            multiplier: 1.0,
            days_to_next_rank: None,
        }
    }

    #[must_use]
    pub const fn with_promotion(mut self, days: u32) -> Self {
        self.days_to_next_rank = Some(days);
        self
    }
}

/// Rank rows ordered and contiguous from rank 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RankRow>", into = "Vec<RankRow>")]
pub struct RankTable {
    rows: Vec<RankRow>,
}

impl RankTable {
    /// # Errors
    ///
    /// Returns an error when the table is empty or ranks skip a value.
    pub fn new(mut rows: Vec<RankRow>) -> Result<Self, RulesError> {
        if rows.is_empty() {
            return Err(RulesError::EmptyRankTable);
        }
        rows.sort_by_key(|row| row.rank);
        for (expected, row) in (1..=u8::MAX).zip(&rows) {
            if row.rank != expected {
                return Err(RulesError::RankTableGap {
                    expected,
                    found: row.rank,
                });
            }
        }
        Ok(Self { rows })
    }

    /// A table with a single rank-1 row.
    #[must_use]
    pub fn single(gold_cost: u32, base_value: i32) -> Self {
        Self {
            rows: vec![RankRow::new(1, gold_cost, base_value)],
        }
    }

    #[must_use]
    pub fn row(&self, rank: u8) -> Option<&RankRow> {
        rank.checked_sub(1)
            .and_then(|index| self.rows.get(usize::from(index)))
    }

    #[must_use]
    pub fn max_rank(&self) -> u8 {
        self.rows.last().map_or(0, |row| row.rank)
    }

    #[must_use]
    pub fn rows(&self) -> &[RankRow] {
        &self.rows
    }
}

impl TryFrom<Vec<RankRow>> for RankTable {
    type Error = RulesError;

    fn try_from(rows: Vec<RankRow>) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

impl From<RankTable> for Vec<RankRow> {
    fn from(table: RankTable) -> Self {
        table.rows
    }
}

/// How a crafting project charges the character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CraftingCost {
    /// Every attempt costs one day and the rank's gold cost.
    Mundane,
    /// Attempts are free; the completion cost is charged when the goal is met
    /// and must be affordable before each attempt.
    Magical { completion_days: u32, completion_gold: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftingDetails {
    pub tool: String,
    #[serde(flatten)]
    pub cost: CraftingCost,
    /// Lowest tool grade allowed to work the recipe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_grade: Option<String>,
    /// The recipe (the activity's target) must be researched first.
    #[serde(default)]
    pub requires_research: bool,
}

impl CraftingDetails {
    #[must_use]
    pub fn new(tool: impl Into<String>, cost: CraftingCost) -> Self {
        Self {
            tool: tool.into(),
            cost,
            minimum_grade: None,
            requires_research: false,
        }
    }

    #[must_use]
    pub fn with_minimum_grade(mut self, grade: impl Into<String>) -> Self {
        self.minimum_grade = Some(grade.into());
        self
    }

    #[must_use]
    pub const fn requiring_research(mut self) -> Self {
        self.requires_research = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchSource {
    Books,
    Interviews,
    Experiments,
    Field,
}

impl ResearchSource {
    /// Ability usually governing checks drawn from this source.
    #[must_use]
    pub const fn default_ability(self) -> Ability {
        match self {
            Self::Books | Self::Field => Ability::Intelligence,
            Self::Interviews => Ability::Charisma,
            Self::Experiments => Ability::Wisdom,
        }
    }

    /// Skill usually granting proficiency for this source.
    #[must_use]
    pub const fn default_skill(self) -> Option<&'static str> {
        match self {
            Self::Books => Some("Investigation"),
            Self::Interviews => Some("Persuasion"),
            Self::Experiments => Some("Survival"),
            Self::Field => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchDetails {
    pub rarity: Rarity,
    pub source: ResearchSource,
    /// Tool whose proficiency field work rolls with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Recipe unlocked when the research completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocks: Option<String>,
}

impl ResearchDetails {
    #[must_use]
    pub const fn new(rarity: Rarity, source: ResearchSource) -> Self {
        Self {
            rarity,
            source,
            tool: None,
            unlocks: None,
        }
    }

    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    #[must_use]
    pub fn unlocking(mut self, recipe: impl Into<String>) -> Self {
        self.unlocks = Some(recipe.into());
        self
    }

    /// Skill or tool granting proficiency on this research's checks.
    #[must_use]
    pub fn proficiency(&self) -> Option<String> {
        match self.source {
            ResearchSource::Field => self.tool.clone(),
            source => source.default_skill().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmploymentDetails {
    /// Rank ceiling for this job, never above the table's own maximum.
    pub max_rank: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityVariant {
    Crafting(CraftingDetails),
    Research(ResearchDetails),
    Employment(EmploymentDetails),
}

/// A downtime activity as published by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
    /// Recipe, research topic or job the attempts work toward.
    #[serde(default)]
    pub target: String,
    pub ability: Ability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proficiency: Option<String>,
    pub dc: i32,
    pub table: RankTable,
    pub goal: Goal,
    pub variant: ActivityVariant,
}

impl Activity {
    #[must_use]
    pub const fn kind(&self) -> ActivityKind {
        match self.variant {
            ActivityVariant::Crafting(_) => ActivityKind::Crafting,
            ActivityVariant::Research(_) => ActivityKind::Research,
            ActivityVariant::Employment(_) => ActivityKind::Employment,
        }
    }

    /// Competency whose successes drive grade-ups, if attempts train one.
    #[must_use]
    pub fn competency(&self) -> Option<&str> {
        match &self.variant {
            ActivityVariant::Crafting(details) => Some(details.tool.as_str()),
            ActivityVariant::Research(_) | ActivityVariant::Employment(_) => None,
        }
    }

    /// Recipe a completed research project unlocks.
    #[must_use]
    pub fn unlocks_recipe(&self) -> Option<&str> {
        match &self.variant {
            ActivityVariant::Research(details) => details.unlocks.as_deref(),
            _ => None,
        }
    }

    /// Highest rank attempts may resolve at.
    #[must_use]
    pub fn rank_ceiling(&self) -> u8 {
        match self.variant {
            ActivityVariant::Employment(details) => details.max_rank.min(self.table.max_rank()),
            _ => self.table.max_rank(),
        }
    }

    /// Build a research activity from the rarity table.
    ///
    /// DC and required successes come from `rules`; the per-day cost becomes the
    /// single rank row.
    #[must_use]
    pub fn research(
        id: ActivityId,
        target: impl Into<String>,
        details: ResearchDetails,
        rules: &ResearchRules,
    ) -> Self {
        let target = target.into();
        let profile = rules.profile(details.rarity);
        Self {
            id,
            name: format!("Research: {target}"),
            target,
            ability: details.source.default_ability(),
            proficiency: details.proficiency(),
            dc: profile.dc,
            table: RankTable::single(rules.cost_per_day, 1),
            goal: Goal::Successes {
                required: profile.successes,
            },
            variant: ActivityVariant::Research(details),
        }
    }
}
