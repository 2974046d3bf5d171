// Pick representation, rating labels, and card tallying.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stat categories a pick can be written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatCategory {
    #[serde(rename = "PTS")]
    Points,
    #[serde(rename = "REB")]
    Rebounds,
    #[serde(rename = "AST")]
    Assists,
    #[serde(rename = "PRA")]
    PointsReboundsAssists,
    #[serde(rename = "3PM")]
    ThreesMade,
}

impl StatCategory {
    /// Parse a category string into a StatCategory enum.
    ///
    /// Handles sportsbook-style abbreviations:
    /// - "PTS" -> Points, "REB" -> Rebounds, "AST" -> Assists
    /// - "PRA" -> PointsReboundsAssists (combined points+rebounds+assists)
    /// - "3PM" -> ThreesMade
    pub fn from_str_cat(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PTS" => Some(StatCategory::Points),
            "REB" => Some(StatCategory::Rebounds),
            "AST" => Some(StatCategory::Assists),
            "PRA" => Some(StatCategory::PointsReboundsAssists),
            "3PM" => Some(StatCategory::ThreesMade),
            _ => None,
        }
    }

    /// Return the display string for this category.
    pub fn display_str(&self) -> &'static str {
        match self {
            StatCategory::Points => "PTS",
            StatCategory::Rebounds => "REB",
            StatCategory::Assists => "AST",
            StatCategory::PointsReboundsAssists => "PRA",
            StatCategory::ThreesMade => "3PM",
        }
    }

    /// All categories, in display order.
    pub fn all() -> [StatCategory; 5] {
        [
            StatCategory::Points,
            StatCategory::Rebounds,
            StatCategory::Assists,
            StatCategory::PointsReboundsAssists,
            StatCategory::ThreesMade,
        ]
    }
}

impl fmt::Display for StatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// Which side of the line a pick takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "OVER", alias = "MORE")]
    Over,
    #[serde(rename = "UNDER", alias = "LESS")]
    Under,
}

impl Direction {
    /// Parse a direction string ("OVER"/"UNDER", with legacy "MORE"/"LESS" aliases).
    pub fn from_str_dir(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OVER" | "MORE" => Some(Direction::Over),
            "UNDER" | "LESS" => Some(Direction::Under),
            _ => None,
        }
    }

    /// Return the display string for this direction.
    pub fn display_str(&self) -> &'static str {
        match self {
            Direction::Over => "OVER",
            Direction::Under => "UNDER",
        }
    }

    /// The opposite side of the line.
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Over => Direction::Under,
            Direction::Under => Direction::Over,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// A single prop pick to evaluate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    /// Name of the player the pick is on.
    pub player_name: String,
    /// The player's own team abbreviation (e.g. "ATL").
    pub team: String,
    /// Opposing team abbreviation for matchup context.
    pub opponent: String,
    /// Stat category the line is written against.
    pub stat: StatCategory,
    /// The posted line value.
    pub line: f64,
    /// Which side of the line the pick takes.
    pub direction: Direction,
}

/// Rating label for an evaluated pick.
///
/// Strong and Lean carry the direction the numbers actually support,
/// which is not necessarily the direction the pick asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "band", content = "side", rename_all = "snake_case")]
pub enum Rating {
    Strong(Direction),
    Lean(Direction),
    Neutral,
}

impl Rating {
    /// The direction this rating supports, if it supports one at all.
    pub fn supported_side(&self) -> Option<Direction> {
        match self {
            Rating::Strong(dir) | Rating::Lean(dir) => Some(*dir),
            Rating::Neutral => None,
        }
    }

    /// Tally bucket for this rating relative to the direction the pick asked for.
    ///
    /// Green when the numbers strongly agree, yellow when they lean the same
    /// way, red when they strongly disagree. A lean against the pick is not
    /// treated as a hard conflict and lands in neutral.
    pub fn bucket(&self, requested: Direction) -> Bucket {
        match self {
            Rating::Strong(dir) if *dir == requested => Bucket::Green,
            Rating::Lean(dir) if *dir == requested => Bucket::Yellow,
            Rating::Strong(_) => Bucket::Red,
            _ => Bucket::Neutral,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rating::Strong(dir) => write!(f, "Strong {}", dir),
            Rating::Lean(dir) => write!(f, "Lean {}", dir),
            Rating::Neutral => write!(f, "Neutral"),
        }
    }
}

/// Card tally bucket for a single rated pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Green,
    Yellow,
    Red,
    Neutral,
}

/// Why a pick could not be rated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The stats provider could not be reached or returned an error.
    UpstreamUnavailable,
    /// The player was not on the team roster after a refresh.
    PlayerNotFound,
    /// The player record exists but has no average for the pick's category.
    MissingStat,
}

/// Full numeric trace of a rated pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Recent-window average used for the recent term. Falls back to the
    /// season average when no recent window is available.
    pub recent_avg: f64,
    /// Season average for the pick's category.
    pub season_avg: f64,
    /// recent_avg minus the line.
    pub recent_diff: f64,
    /// season_avg minus the line.
    pub season_diff: f64,
    /// Weighted over-performance relative to the line, before multipliers.
    pub base_score: f64,
    /// Opponent defensive rank consulted for the matchup multiplier.
    pub matchup_rank: Option<u32>,
    pub matchup_multiplier: f64,
    /// Season average minutes, when the upstream feed reported them.
    pub minutes: Option<f64>,
    pub minutes_multiplier: f64,
    /// base_score with both multipliers applied, still over-oriented.
    pub final_score: f64,
    /// final_score oriented to the pick's direction (negated for UNDER).
    pub oriented_score: f64,
    pub rating: Rating,
}

/// Outcome of evaluating one pick: a full breakdown, or a structured failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Ok(ScoreBreakdown),
    Error { kind: FailureKind, message: String },
}

/// Evaluation result for a single pick. Serializes flat: the input pick's
/// fields alongside the outcome, so one failed leg in a card is still
/// identifiable without positional bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(flatten)]
    pub pick: Pick,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl EvaluationResult {
    pub fn rated(pick: Pick, breakdown: ScoreBreakdown) -> Self {
        EvaluationResult { pick, outcome: Outcome::Ok(breakdown) }
    }

    pub fn failed(pick: Pick, kind: FailureKind, message: impl Into<String>) -> Self {
        EvaluationResult { pick, outcome: Outcome::Error { kind, message: message.into() } }
    }

    pub fn is_rated(&self) -> bool {
        matches!(self.outcome, Outcome::Ok(_))
    }

    pub fn breakdown(&self) -> Option<&ScoreBreakdown> {
        match &self.outcome {
            Outcome::Ok(breakdown) => Some(breakdown),
            Outcome::Error { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<(FailureKind, &str)> {
        match &self.outcome {
            Outcome::Ok(_) => None,
            Outcome::Error { kind, message } => Some((*kind, message.as_str())),
        }
    }
}

/// Aggregate counts across an evaluated card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub total: usize,
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
    pub neutral: usize,
    pub error: usize,
}

impl CardSummary {
    /// Tally per-pick results into card-level counts.
    pub fn tally(results: &[EvaluationResult]) -> Self {
        let mut summary = CardSummary { total: results.len(), ..CardSummary::default() };
        for result in results {
            match &result.outcome {
                Outcome::Ok(breakdown) => {
                    match breakdown.rating.bucket(result.pick.direction) {
                        Bucket::Green => summary.green += 1,
                        Bucket::Yellow => summary.yellow += 1,
                        Bucket::Red => summary.red += 1,
                        Bucket::Neutral => summary.neutral += 1,
                    }
                }
                Outcome::Error { .. } => summary.error += 1,
            }
        }
        summary
    }
}

/// An evaluated card: per-pick results in input order plus the tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardEvaluation {
    pub summary: CardSummary,
    pub results: Vec<EvaluationResult>,
}
