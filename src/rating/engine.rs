// Pick scoring and rating.
//
// Blends recent and season averages against the posted line, applies matchup
// and minutes multipliers, orients the score to the pick's direction, and
// maps it onto the Strong/Lean/Neutral bands.

use futures_util::future::join_all;
use std::sync::Arc;
use tracing::debug;

use crate::config::RatingConfig;
use crate::rating::matchups::MatchupTable;
use crate::rating::pick::{
    CardEvaluation, CardSummary, Direction, EvaluationResult, FailureKind, Pick, Rating,
    ScoreBreakdown,
};
use crate::stats::cache::{CacheError, PlayerRecord, PlayerStatsCache};

// ---------------------------------------------------------------------------
// Rank cutoffs
// ---------------------------------------------------------------------------

/// Defensive rank at or above which an opponent counts as a soft matchup
/// (they give up a lot in the category).
const SOFT_MATCHUP_RANK: u32 = 21;

/// Defensive rank at or below which an opponent counts as a tough matchup.
const TOUGH_MATCHUP_RANK: u32 = 10;

// ---------------------------------------------------------------------------
// RatingEngine
// ---------------------------------------------------------------------------

/// Scores picks against cached player records and the matchup table.
pub struct RatingEngine {
    cache: Arc<PlayerStatsCache>,
    matchups: MatchupTable,
    config: RatingConfig,
}

impl RatingEngine {
    pub fn new(cache: Arc<PlayerStatsCache>, matchups: MatchupTable, config: RatingConfig) -> Self {
        Self { cache, matchups, config }
    }

    /// The player stats cache backing this engine.
    pub fn cache(&self) -> &PlayerStatsCache {
        &self.cache
    }

    /// Evaluate a single pick end to end: resolve the player through the
    /// cache, then score the record. Failures come back as a structured
    /// result, never as an Err.
    pub async fn evaluate_pick(&self, pick: &Pick) -> EvaluationResult {
        match self.cache.get(&pick.player_name, &pick.team).await {
            Ok(record) => self.rate(pick, &record),
            Err(err) => EvaluationResult::failed(pick.clone(), failure_kind(&err), err.to_string()),
        }
    }

    /// Evaluate a whole card concurrently. One failed leg never aborts the
    /// card, and results come back in input order.
    pub async fn evaluate_card(&self, picks: &[Pick]) -> CardEvaluation {
        let results = join_all(picks.iter().map(|pick| self.evaluate_pick(pick))).await;
        let summary = CardSummary::tally(&results);
        debug!(
            total = summary.total,
            green = summary.green,
            yellow = summary.yellow,
            red = summary.red,
            neutral = summary.neutral,
            error = summary.error,
            "card evaluated"
        );
        CardEvaluation { summary, results }
    }

    /// Score a pick against an already-resolved player record. Pure: no I/O,
    /// no cache access.
    pub fn rate(&self, pick: &Pick, record: &PlayerRecord) -> EvaluationResult {
        let season = record.season.get(&pick.stat).copied();
        let recent = record.recent.get(&pick.stat).copied().or(season);
        let (recent_avg, season_avg) = match (recent, season) {
            (Some(recent), Some(season)) => (recent, season),
            _ => {
                return EvaluationResult::failed(
                    pick.clone(),
                    FailureKind::MissingStat,
                    format!("missing {} averages for player '{}'", pick.stat, record.name),
                );
            }
        };

        let recent_diff = recent_avg - pick.line;
        let season_diff = season_avg - pick.line;
        let base_score =
            recent_diff * self.config.weights.recent + season_diff * self.config.weights.season;

        let matchup_rank = self
            .matchups
            .lookup(&pick.opponent)
            .map(|row| row.rank_for(pick.stat));
        let matchup_multiplier = self.matchup_multiplier(matchup_rank);
        let minutes_multiplier = self.minutes_multiplier(record.minutes);

        let final_score = base_score * matchup_multiplier * minutes_multiplier;
        let oriented_score = match pick.direction {
            Direction::Over => final_score,
            Direction::Under => -final_score,
        };
        let rating = self.map_score(oriented_score, pick.direction);
        debug!(
            player = %record.name,
            stat = %pick.stat,
            line = pick.line,
            oriented = oriented_score,
            rating = %rating,
            "pick scored"
        );

        EvaluationResult::rated(
            pick.clone(),
            ScoreBreakdown {
                recent_avg,
                season_avg,
                recent_diff,
                season_diff,
                base_score,
                matchup_rank,
                matchup_multiplier,
                minutes: record.minutes,
                minutes_multiplier,
                final_score,
                oriented_score,
                rating,
            },
        )
    }

    /// Multiplier from the opponent's defensive rank in the pick's category.
    ///
    /// Ranks 21-30 (generous defense) boost, ranks 1-10 (stingy defense)
    /// penalize. Anything else, including an unknown opponent, is neutral.
    fn matchup_multiplier(&self, rank: Option<u32>) -> f64 {
        match rank {
            Some(rank) if rank >= SOFT_MATCHUP_RANK => self.config.matchup.boost,
            Some(rank) if rank <= TOUGH_MATCHUP_RANK => self.config.matchup.penalty,
            _ => self.config.matchup.neutral,
        }
    }

    /// Multiplier from the player's season minutes load. Unknown minutes are
    /// neutral, not penalized.
    fn minutes_multiplier(&self, minutes: Option<f64>) -> f64 {
        match minutes {
            Some(m) if m >= self.config.minutes.high_threshold => self.config.minutes.boost,
            Some(m) if m <= self.config.minutes.low_threshold => self.config.minutes.penalty,
            _ => self.config.minutes.neutral,
        }
    }

    /// Map an oriented score onto the rating bands.
    ///
    /// The guard chain runs top to bottom and the first match wins, so a
    /// score sitting exactly on a band edge lands in the stronger band.
    fn map_score(&self, oriented: f64, requested: Direction) -> Rating {
        let strong = self.config.thresholds.strong_edge;
        let lean = self.config.thresholds.lean_edge;
        if oriented >= strong {
            Rating::Strong(requested)
        } else if oriented >= lean {
            Rating::Lean(requested)
        } else if oriented > -lean {
            Rating::Neutral
        } else if oriented > -strong {
            Rating::Lean(requested.opposite())
        } else {
            Rating::Strong(requested.opposite())
        }
    }
}

fn failure_kind(err: &CacheError) -> FailureKind {
    match err {
        CacheError::Upstream(_) => FailureKind::UpstreamUnavailable,
        CacheError::PlayerNotFound { .. } => FailureKind::PlayerNotFound,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
