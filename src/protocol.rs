// Wire types for the WebSocket request/response protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::rating::pick::{CardSummary, EvaluationResult, Pick, StatCategory};
use crate::stats::cache::PlayerRecord;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A client request, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Rate a single pick.
    EvaluatePick { pick: Pick },
    /// Rate a batch of picks and tally the card.
    EvaluateCard { picks: Vec<Pick> },
    /// Force a roster refetch for a team, bypassing freshness.
    RefreshTeam { team: String },
    /// Look up one player's cached record, refetching if stale.
    PlayerStats { player_name: String, team: String },
    /// List the cached records for a team without touching the upstream.
    ListTeam { team: String },
    /// List every cached record across all teams, for inspection.
    ListPlayers,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A server response, tagged by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerResponse {
    PickResult {
        result: EvaluationResult,
    },
    CardResult {
        summary: CardSummary,
        results: Vec<EvaluationResult>,
    },
    TeamPlayers {
        team: String,
        players: Vec<PlayerView>,
    },
    AllPlayers {
        players: Vec<PlayerView>,
    },
    PlayerRecord {
        player: PlayerView,
    },
    /// Request-level failure: unparseable request, unknown team, or an
    /// upstream error outside of pick evaluation.
    Error {
        message: String,
    },
}

/// Client-facing view of a cached player record. Swaps the monotonic
/// freshness stamp for a derived age and a fresh/stale flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub name: String,
    pub team: String,
    pub season: HashMap<StatCategory, f64>,
    pub recent: HashMap<StatCategory, f64>,
    pub minutes: Option<f64>,
    pub fetched_at: DateTime<Utc>,
    pub age_secs: u64,
    pub fresh: bool,
}

impl PlayerView {
    pub fn from_record(record: &PlayerRecord, freshness: Duration) -> Self {
        Self {
            name: record.name.clone(),
            team: record.team.clone(),
            season: record.season.clone(),
            recent: record.recent.clone(),
            minutes: record.minutes,
            fetched_at: record.fetched_at,
            age_secs: record.age().as_secs(),
            fresh: record.is_fresh(freshness),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
