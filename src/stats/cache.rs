// In-memory player stats cache keyed by player name and team.
//
// Records are created and replaced only by whole-team refreshes against the
// upstream provider. Lookups never mutate a single record in place, so a
// team's entries are always either the previous snapshot or the new one.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::Config;
use crate::rating::pick::StatCategory;
use crate::stats::provider::{self, ProviderError, RosterEntry, StatsProvider};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Cached seasonal stats for one player.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub name: String,
    pub team: String,
    /// Season-long per-game averages by category.
    pub season: HashMap<StatCategory, f64>,
    /// Recent-window per-game averages by category.
    ///
    /// The seasonal feed carries no recent-window data, so today this map is
    /// always empty and scoring falls back to season averages. It stays in
    /// the model so a game-log feed can fill it without reshaping the cache.
    pub recent: HashMap<StatCategory, f64>,
    /// Season average minutes per game, when the feed reported them.
    pub minutes: Option<f64>,
    /// Monotonic stamp used for freshness decisions.
    pub refreshed_at: Instant,
    /// Wall-clock stamp for display and logging.
    pub fetched_at: DateTime<Utc>,
}

impl PlayerRecord {
    /// Whether this record is still inside the freshness window.
    pub fn is_fresh(&self, window: Duration) -> bool {
        self.refreshed_at.elapsed() < window
    }

    /// Time since this record was last refreshed.
    pub fn age(&self) -> Duration {
        self.refreshed_at.elapsed()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("stats provider error: {0}")]
    Upstream(#[from] ProviderError),

    #[error("player '{name}' not found on team '{team}' after roster refresh")]
    PlayerNotFound { name: String, team: String },
}

// ---------------------------------------------------------------------------
// Key normalization
// ---------------------------------------------------------------------------

/// Cache key: (lowercased player name, uppercased team abbreviation).
type PlayerKey = (String, String);

pub(crate) fn normalize_team(team: &str) -> String {
    team.trim().to_uppercase()
}

fn player_key(name: &str, team: &str) -> PlayerKey {
    (name.trim().to_lowercase(), normalize_team(team))
}

// ---------------------------------------------------------------------------
// PlayerStatsCache
// ---------------------------------------------------------------------------

/// Async cache of player records in front of a stats provider.
pub struct PlayerStatsCache {
    provider: Arc<dyn StatsProvider>,
    freshness: Duration,
    players: RwLock<HashMap<PlayerKey, Arc<PlayerRecord>>>,
}

impl PlayerStatsCache {
    pub fn new(provider: Arc<dyn StatsProvider>, freshness: Duration) -> Self {
        Self {
            provider,
            freshness,
            players: RwLock::new(HashMap::new()),
        }
    }

    /// Build a cache from the application config's freshness window.
    pub fn from_config(provider: Arc<dyn StatsProvider>, config: &Config) -> Self {
        Self::new(provider, Duration::from_secs(config.cache.freshness_secs))
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness
    }

    /// Look up a player's record, refreshing the whole team when the cached
    /// entry is missing or stale.
    pub async fn get(&self, name: &str, team: &str) -> Result<Arc<PlayerRecord>, CacheError> {
        let key = player_key(name, team);
        {
            let players = self.players.read().await;
            if let Some(record) = players.get(&key) {
                if record.is_fresh(self.freshness) {
                    return Ok(Arc::clone(record));
                }
                debug!(player = %key.0, team = %key.1, "cached record is stale");
            }
        }

        self.refresh_team(team).await?;

        let players = self.players.read().await;
        players.get(&key).cloned().ok_or_else(|| CacheError::PlayerNotFound {
            name: name.trim().to_string(),
            team: key.1.clone(),
        })
    }

    /// Fetch a team's roster and replace its cache entries in one step.
    ///
    /// The provider call happens before any lock is taken. On provider
    /// failure the previous entries stay untouched and readable. Returns the
    /// number of records now cached for the team.
    pub async fn refresh_team(&self, team: &str) -> Result<usize, CacheError> {
        let team_code = normalize_team(team);
        let roster = self.provider.fetch_team_roster(&team_code).await?;
        let refreshed_at = Instant::now();
        let records: Vec<Arc<PlayerRecord>> = roster
            .into_iter()
            .map(|entry| Arc::new(build_record(entry, &team_code, refreshed_at)))
            .collect();
        let count = records.len();

        let mut players = self.players.write().await;
        players.retain(|key, _| key.1 != team_code);
        for record in records {
            players.insert(player_key(&record.name, &team_code), record);
        }
        info!(team = %team_code, players = count, "team stats refreshed");
        Ok(count)
    }

    /// All cached records for a team, sorted by player name. Never triggers a
    /// fetch; stale records are included.
    pub async fn list_team(&self, team: &str) -> Vec<Arc<PlayerRecord>> {
        let team_code = normalize_team(team);
        let players = self.players.read().await;
        let mut records: Vec<Arc<PlayerRecord>> = players
            .iter()
            .filter(|(key, _)| key.1 == team_code)
            .map(|(_, record)| Arc::clone(record))
            .collect();
        records.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        records
    }

    /// Every cached record across all teams, sorted by team then player name.
    /// Never triggers a fetch.
    pub async fn all_players(&self) -> Vec<Arc<PlayerRecord>> {
        let players = self.players.read().await;
        let mut records: Vec<Arc<PlayerRecord>> = players.values().map(Arc::clone).collect();
        records.sort_by(|a, b| {
            (a.team.as_str(), a.name.to_lowercase()).cmp(&(b.team.as_str(), b.name.to_lowercase()))
        });
        records
    }
}

// ---------------------------------------------------------------------------
// Record construction
// ---------------------------------------------------------------------------

/// Turn a raw roster entry into a cache record: derive the combined PRA
/// average when all three components are present, and normalize minutes.
fn build_record(entry: RosterEntry, team: &str, refreshed_at: Instant) -> PlayerRecord {
    let mut season = entry.season;
    let pts = season.get(&StatCategory::Points).copied();
    let reb = season.get(&StatCategory::Rebounds).copied();
    let ast = season.get(&StatCategory::Assists).copied();
    if let (Some(pts), Some(reb), Some(ast)) = (pts, reb, ast) {
        season.insert(StatCategory::PointsReboundsAssists, pts + reb + ast);
    }
    let minutes = provider::parse_minutes(&entry.minutes_raw);
    PlayerRecord {
        name: entry.name,
        team: team.to_string(),
        season,
        recent: HashMap::new(),
        minutes,
        refreshed_at,
        fetched_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
