// Opponent defensive matchup table loading and lookup.
//
// Reads a league-wide CSV of per-team defensive ranks (1 = stingiest defense,
// 30 = most generous) in the four categories the engine consults.

use crate::rating::pick::StatCategory;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::warn;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Defensive ranks a single opponent allows, per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchupRow {
    pub team: String,
    pub pts_allowed_rank: u32,
    pub reb_allowed_rank: u32,
    pub ast_allowed_rank: u32,
    pub three_pm_allowed_rank: u32,
}

impl MatchupRow {
    /// The rank consulted for a given pick category.
    ///
    /// Combined points+rebounds+assists lines lean on the points rank as the
    /// dominant component; threes use their own rank.
    pub fn rank_for(&self, cat: StatCategory) -> u32 {
        match cat {
            StatCategory::Points | StatCategory::PointsReboundsAssists => self.pts_allowed_rank,
            StatCategory::Rebounds => self.reb_allowed_rank,
            StatCategory::Assists => self.ast_allowed_rank,
            StatCategory::ThreesMade => self.three_pm_allowed_rank,
        }
    }
}

/// All matchup rows keyed by uppercased team abbreviation.
#[derive(Debug, Clone, Default)]
pub struct MatchupTable {
    rows: HashMap<String, MatchupRow>,
}

impl MatchupTable {
    /// Build a table from already-parsed rows. Exposed for testing and for
    /// callers that source ranks somewhere other than the CSV file.
    pub fn from_rows(rows: Vec<MatchupRow>) -> Self {
        let mut map = HashMap::new();
        for row in rows {
            map.insert(row.team.trim().to_uppercase(), row);
        }
        MatchupTable { rows: map }
    }

    /// Look up a team's row by abbreviation, case-insensitively.
    pub fn lookup(&self, team: &str) -> Option<&MatchupRow> {
        self.rows.get(&team.trim().to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MatchupError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Raw CSV serde struct (private)
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Deserialize)]
struct RawMatchupRow {
    team: String,
    pts_allowed_rank: u32,
    reb_allowed_rank: u32,
    ast_allowed_rank: u32,
    three_pm_allowed_rank: u32,
}

// ---------------------------------------------------------------------------
// Reader-based loader (private, enables testing without temp files)
// ---------------------------------------------------------------------------

fn load_matchups_from_reader<R: Read>(rdr: R) -> Result<HashMap<String, MatchupRow>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut map = HashMap::new();
    for result in reader.deserialize::<RawMatchupRow>() {
        match result {
            Ok(raw) => {
                let team = raw.team.trim().to_uppercase();
                if team.is_empty() {
                    warn!("skipping matchup row with empty team abbreviation");
                    continue;
                }
                if map.contains_key(&team) {
                    warn!("duplicate matchup row for '{}', using latest value", team);
                }
                map.insert(
                    team.clone(),
                    MatchupRow {
                        team,
                        pts_allowed_rank: raw.pts_allowed_rank,
                        reb_allowed_rank: raw.reb_allowed_rank,
                        ast_allowed_rank: raw.ast_allowed_rank,
                        three_pm_allowed_rank: raw.three_pm_allowed_rank,
                    },
                );
            }
            Err(e) => {
                warn!("skipping malformed matchup row: {}", e);
            }
        }
    }
    Ok(map)
}

// ---------------------------------------------------------------------------
// Public path-based loader
// ---------------------------------------------------------------------------

/// Load the matchup table from a CSV file.
///
/// An empty table is not an error: every lookup misses and the engine rates
/// with a neutral matchup multiplier throughout.
pub fn load_matchups(path: &Path) -> Result<MatchupTable, MatchupError> {
    let file = std::fs::File::open(path).map_err(|e| MatchupError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let rows = load_matchups_from_reader(file).map_err(|e| MatchupError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if rows.is_empty() {
        warn!(
            "matchup table at {} has no rows, all matchup multipliers will be neutral",
            path.display()
        );
    }
    Ok(MatchupTable { rows })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
