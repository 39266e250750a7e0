//! Downtime rule tables: proficiency bonuses, grade ladder, research rarities
//! and employment performance bands.
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest character level the proficiency table covers.
pub const MAX_LEVEL: u8 = 20;

const EMBEDDED_RULES: &str = include_str!("../assets/rules.json");

static DEFAULT_RULES: Lazy<DowntimeRules> = Lazy::new(|| parse_or_standard(EMBEDDED_RULES));

fn parse_or_standard(json: &str) -> DowntimeRules {
    DowntimeRules::from_json(json).unwrap_or_else(|err| {
        log::error!("bundled rules are invalid, falling back to standard tables: {err}");
        DowntimeRules::default()
    })
}

/// Errors raised when rule tables violate their invariants.
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("proficiency table must cover levels 1-{MAX_LEVEL} (found {found} rows)")]
    ProficiencyCoverage { found: usize },
    #[error("proficiency table has no row for level {level}")]
    ProficiencyLevelGap { level: u8 },
    #[error("proficiency bonus decreases at level {level} ({bonus} < {previous})")]
    ProficiencyDecreasing { level: u8, bonus: i32, previous: i32 },
    #[error("grade ladder is empty")]
    EmptyGradeLadder,
    #[error("grade ladder must start at 0 successes (starts at {successes})")]
    GradeLadderStart { successes: u32 },
    #[error("grade '{name}' does not raise the success threshold")]
    GradeThresholdOrder { name: String },
    #[error("rank table is empty")]
    EmptyRankTable,
    #[error("rank table must be contiguous from 1 (expected rank {expected}, found {found})")]
    RankTableGap { expected: u8, found: u8 },
    #[error("research table has no entry for {0}")]
    MissingRarity(Rarity),
    #[error("performance bands invalid: {0}")]
    PerformanceBands(String),
    #[error("failed to parse rules: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProficiencyRow {
    pub level: u8,
    pub bonus: i32,
}

/// Proficiency bonus per character level, covering exactly levels 1 through 20.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ProficiencyRow>", into = "Vec<ProficiencyRow>")]
pub struct ProficiencyTable {
    rows: Vec<ProficiencyRow>,
}

impl ProficiencyTable {
    /// Build a table after checking coverage and ordering.
    ///
    /// # Errors
    ///
    /// Returns an error when a level is missing or a bonus decreases.
    pub fn new(mut rows: Vec<ProficiencyRow>) -> Result<Self, RulesError> {
        if rows.len() != usize::from(MAX_LEVEL) {
            return Err(RulesError::ProficiencyCoverage { found: rows.len() });
        }
        rows.sort_by_key(|row| row.level);
        let mut previous: Option<i32> = None;
        for (expected, row) in (1..=MAX_LEVEL).zip(&rows) {
            if row.level != expected {
                return Err(RulesError::ProficiencyLevelGap { level: expected });
            }
            if let Some(previous) = previous
                && row.bonus < previous
            {
                return Err(RulesError::ProficiencyDecreasing {
                    level: row.level,
                    bonus: row.bonus,
                    previous,
                });
            }
            previous = Some(row.bonus);
        }
        Ok(Self { rows })
    }

    /// The standard progression: +2 at level 1 rising by one every four levels.
    #[must_use]
    pub fn standard() -> Self {
        let rows = (1..=MAX_LEVEL)
            .map(|level| ProficiencyRow {
                level,
                bonus: 2 + i32::from((level - 1) / 4),
            })
            .collect();
        Self { rows }
    }

    /// Levels outside 1-20 are clamped to the nearest covered level.
    #[must_use]
    pub fn bonus_for(&self, level: u8) -> i32 {
        let index = usize::from(level.clamp(1, MAX_LEVEL) - 1);
        self.rows.get(index).map_or(0, |row| row.bonus)
    }

    #[must_use]
    pub fn rows(&self) -> &[ProficiencyRow] {
        &self.rows
    }
}

impl Default for ProficiencyTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<ProficiencyRow>> for ProficiencyTable {
    type Error = RulesError;

    fn try_from(rows: Vec<ProficiencyRow>) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

impl From<ProficiencyTable> for Vec<ProficiencyRow> {
    fn from(table: ProficiencyTable) -> Self {
        table.rows
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeStep {
    pub name: String,
    pub successes: u32,
}

/// Named competency grades keyed by cumulative qualifying successes.
///
/// Grade `n` (zero based) unlocks rank `n + 1` of tool-based tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<GradeStep>", into = "Vec<GradeStep>")]
pub struct GradeLadder {
    steps: Vec<GradeStep>,
}

impl GradeLadder {
    /// # Errors
    ///
    /// Returns an error when the ladder is empty, does not start at zero, or
    /// thresholds are not strictly ascending.
    pub fn new(steps: Vec<GradeStep>) -> Result<Self, RulesError> {
        let first = steps.first().ok_or(RulesError::EmptyGradeLadder)?;
        if first.successes != 0 {
            return Err(RulesError::GradeLadderStart {
                successes: first.successes,
            });
        }
        if let Some(pair) = steps
            .windows(2)
            .find(|pair| pair[1].successes <= pair[0].successes)
        {
            return Err(RulesError::GradeThresholdOrder {
                name: pair[1].name.clone(),
            });
        }
        Ok(Self { steps })
    }

    #[must_use]
    pub fn standard() -> Self {
        let steps = [
            ("Novice", 0),
            ("Apprentice", 5),
            ("Expert", 15),
            ("Master Artisan", 35),
            ("Grand Master", 75),
        ]
        .into_iter()
        .map(|(name, successes)| GradeStep {
            name: name.to_string(),
            successes,
        })
        .collect();
        Self { steps }
    }

    /// Index of the highest grade whose threshold `successes` meets.
    #[must_use]
    pub fn grade_index(&self, successes: u32) -> usize {
        self.steps
            .iter()
            .rposition(|step| successes >= step.successes)
            .unwrap_or(0)
    }

    /// Position of a grade by name, ignoring case.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.name.eq_ignore_ascii_case(name.trim()))
    }

    #[must_use]
    pub fn step(&self, index: usize) -> Option<&GradeStep> {
        self.steps.get(index)
    }

    #[must_use]
    pub fn grade_name(&self, successes: u32) -> &str {
        self.step(self.grade_index(successes))
            .map_or("", |step| step.name.as_str())
    }

    /// Table rank unlocked by a cumulative success count.
    #[must_use]
    pub fn rank_for(&self, successes: u32) -> u8 {
        u8::try_from(self.grade_index(successes) + 1).unwrap_or(u8::MAX)
    }

    /// Successes still needed to reach the next grade, if any remains.
    #[must_use]
    pub fn successes_to_next(&self, successes: u32) -> Option<u32> {
        self.steps
            .get(self.grade_index(successes) + 1)
            .map(|next| next.successes - successes)
    }

    #[must_use]
    pub fn steps(&self) -> &[GradeStep] {
        &self.steps
    }
}

impl Default for GradeLadder {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<GradeStep>> for GradeLadder {
    type Error = RulesError;

    fn try_from(steps: Vec<GradeStep>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<GradeLadder> for Vec<GradeStep> {
    fn from(ladder: GradeLadder) -> Self {
        ladder.steps
    }
}

/// Rarity of a researched item or recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    VeryRare,
    Legendary,
}

impl Rarity {
    pub const ALL: [Self; 5] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::VeryRare,
        Self::Legendary,
    ];
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::VeryRare => "very rare",
            Self::Legendary => "legendary",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityProfile {
    pub rarity: Rarity,
    pub dc: i32,
    pub successes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawResearchRules")]
pub struct ResearchRules {
    pub cost_per_day: u32,
    rarities: Vec<RarityProfile>,
}

#[derive(Deserialize)]
struct RawResearchRules {
    cost_per_day: u32,
    rarities: Vec<RarityProfile>,
}

impl TryFrom<RawResearchRules> for ResearchRules {
    type Error = RulesError;

    fn try_from(raw: RawResearchRules) -> Result<Self, Self::Error> {
        Self::new(raw.cost_per_day, raw.rarities)
    }
}

impl ResearchRules {
    /// # Errors
    ///
    /// Returns an error when any rarity lacks a profile.
    pub fn new(cost_per_day: u32, rarities: Vec<RarityProfile>) -> Result<Self, RulesError> {
        if let Some(missing) = Rarity::ALL
            .into_iter()
            .find(|rarity| !rarities.iter().any(|profile| profile.rarity == *rarity))
        {
            return Err(RulesError::MissingRarity(missing));
        }
        Ok(Self {
            cost_per_day,
            rarities,
        })
    }

    #[must_use]
    pub fn standard() -> Self {
        let rarities = [
            (Rarity::Common, 10, 1),
            (Rarity::Uncommon, 15, 1),
            (Rarity::Rare, 20, 1),
            (Rarity::VeryRare, 25, 3),
            (Rarity::Legendary, 30, 3),
        ]
        .into_iter()
        .map(|(rarity, dc, successes)| RarityProfile {
            rarity,
            dc,
            successes,
        })
        .collect();
        Self {
            cost_per_day: 25,
            rarities,
        }
    }

    #[must_use]
    pub fn profile(&self, rarity: Rarity) -> RarityProfile {
        self.rarities
            .iter()
            .copied()
            .find(|profile| profile.rarity == rarity)
            .unwrap_or(RarityProfile {
                rarity,
                dc: 10,
                successes: 1,
            })
    }
}

impl Default for ResearchRules {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBand {
    pub max_roll: u8,
    pub multiplier: f64,
}

/// Employment pay multiplier keyed by the natural d20 roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PerformanceBand>", into = "Vec<PerformanceBand>")]
pub struct PerformanceBands {
    bands: Vec<PerformanceBand>,
}

impl PerformanceBands {
    /// # Errors
    ///
    /// Returns an error when bands are unordered, negative, or stop short of 20.
    pub fn new(bands: Vec<PerformanceBand>) -> Result<Self, RulesError> {
        if bands.last().map(|band| band.max_roll) != Some(20) {
            return Err(RulesError::PerformanceBands(
                "the last band must end at 20".to_string(),
            ));
        }
        if bands.windows(2).any(|pair| pair[1].max_roll <= pair[0].max_roll) {
            return Err(RulesError::PerformanceBands(
                "band ceilings must ascend".to_string(),
            ));
        }
        if bands.iter().any(|band| band.multiplier < 0.0) {
            return Err(RulesError::PerformanceBands(
                "multipliers cannot be negative".to_string(),
            ));
        }
        Ok(Self { bands })
    }

    #[must_use]
    pub fn standard() -> Self {
        let bands = [(5, 0.5), (10, 0.75), (15, 1.0), (19, 1.25), (20, 1.5)]
            .into_iter()
            .map(|(max_roll, multiplier)| PerformanceBand {
                max_roll,
                multiplier,
            })
            .collect();
        Self { bands }
    }

    #[must_use]
    pub fn multiplier_for(&self, roll: u8) -> f64 {
        self.bands
            .iter()
            .find(|band| roll <= band.max_roll)
            .map_or(1.0, |band| band.multiplier)
    }
}

impl Default for PerformanceBands {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<PerformanceBand>> for PerformanceBands {
    type Error = RulesError;

    fn try_from(bands: Vec<PerformanceBand>) -> Result<Self, Self::Error> {
        Self::new(bands)
    }
}

impl From<PerformanceBands> for Vec<PerformanceBand> {
    fn from(bands: PerformanceBands) -> Self {
        bands.bands
    }
}

/// Every static table the downtime flow consults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DowntimeRules {
    #[serde(default)]
    pub proficiency: ProficiencyTable,
    #[serde(default)]
    pub grades: GradeLadder,
    #[serde(default)]
    pub research: ResearchRules,
    #[serde(default)]
    pub performance: PerformanceBands,
}

impl DowntimeRules {
    /// Parse rules from JSON, validating every table.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a table is invalid.
    pub fn from_json(json: &str) -> Result<Self, RulesError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rules bundled with the crate.
    #[must_use]
    pub fn embedded() -> &'static Self {
        &DEFAULT_RULES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_proficiency_matches_level_bands() {
        let table = ProficiencyTable::standard();
        assert_eq!(table.bonus_for(1), 2);
        assert_eq!(table.bonus_for(4), 2);
        assert_eq!(table.bonus_for(5), 3);
        assert_eq!(table.bonus_for(12), 4);
        assert_eq!(table.bonus_for(16), 5);
        assert_eq!(table.bonus_for(20), 6);
    }

    #[test]
    fn out_of_range_levels_clamp() {
        let table = ProficiencyTable::standard();
        assert_eq!(table.bonus_for(0), 2);
        assert_eq!(table.bonus_for(27), 6);
    }

    #[test]
    fn proficiency_table_requires_full_coverage() {
        let rows = vec![ProficiencyRow { level: 1, bonus: 2 }];
        assert!(matches!(
            ProficiencyTable::new(rows),
            Err(RulesError::ProficiencyCoverage { found: 1 })
        ));
    }

    #[test]
    fn proficiency_table_rejects_decreasing_bonus() {
        let mut rows = ProficiencyTable::standard().rows().to_vec();
        rows[9].bonus = 1;
        assert!(matches!(
            ProficiencyTable::new(rows),
            Err(RulesError::ProficiencyDecreasing { level: 10, .. })
        ));
    }

    #[test]
    fn grade_ladder_maps_successes_to_rank() {
        let ladder = GradeLadder::standard();
        assert_eq!(ladder.rank_for(0), 1);
        assert_eq!(ladder.rank_for(4), 1);
        assert_eq!(ladder.rank_for(5), 2);
        assert_eq!(ladder.grade_name(16), "Expert");
        assert_eq!(ladder.rank_for(500), 5);
        assert_eq!(ladder.successes_to_next(3), Some(2));
        assert_eq!(ladder.successes_to_next(80), None);
    }

    #[test]
    fn grade_ladder_rejects_flat_threshold() {
        let steps = vec![
            GradeStep {
                name: "Novice".into(),
                successes: 0,
            },
            GradeStep {
                name: "Also Novice".into(),
                successes: 0,
            },
        ];
        assert!(matches!(
            GradeLadder::new(steps),
            Err(RulesError::GradeThresholdOrder { .. })
        ));
    }

    #[test]
    fn performance_bands_follow_roll() {
        let bands = PerformanceBands::standard();
        assert!((bands.multiplier_for(1) - 0.5).abs() < f64::EPSILON);
        assert!((bands.multiplier_for(10) - 0.75).abs() < f64::EPSILON);
        assert!((bands.multiplier_for(13) - 1.0).abs() < f64::EPSILON);
        assert!((bands.multiplier_for(19) - 1.25).abs() < f64::EPSILON);
        assert!((bands.multiplier_for(20) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn embedded_rules_match_standard_tables() {
        let parsed = DowntimeRules::from_json(EMBEDDED_RULES).unwrap();
        assert_eq!(parsed, DowntimeRules::default());
        assert_eq!(DowntimeRules::embedded(), &parsed);
    }

    #[test]
    fn unreadable_bundle_falls_back_to_standard_tables() {
        assert_eq!(parse_or_standard("{ not json"), DowntimeRules::default());
    }

    #[test]
    fn grade_names_resolve_to_ladder_positions() {
        let ladder = GradeLadder::standard();
        assert_eq!(ladder.index_of("apprentice"), Some(1));
        assert_eq!(ladder.index_of(" Grand Master "), Some(4));
        assert_eq!(ladder.index_of("Journeyman"), None);
    }

    #[test]
    fn research_rules_require_every_rarity() {
        let err = ResearchRules::new(25, Vec::new()).unwrap_err();
        assert!(matches!(err, RulesError::MissingRarity(Rarity::Common)));
        let standard = ResearchRules::standard();
        assert_eq!(standard.profile(Rarity::VeryRare).dc, 25);
        assert_eq!(standard.profile(Rarity::Legendary).successes, 3);
    }

    #[test]
    fn invalid_json_table_is_reported() {
        let json = r#"{"grades": [{"name": "Novice", "successes": 3}]}"#;
        let err = DowntimeRules::from_json(json).unwrap_err();
        assert!(err.to_string().contains("must start at 0"));
    }
}
