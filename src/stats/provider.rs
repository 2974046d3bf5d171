// Sportradar NBA API client for seasonal team statistics.
//
// Fetches the seasonal statistics endpoint for one team at a time and
// flattens the payload into per-player roster entries. Everything downstream
// of the raw payload (PRA derivation, freshness stamping) belongs to the
// cache, not this client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::rating::pick::StatCategory;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A single player's seasonal averages as reported by the upstream feed.
///
/// Minutes stay untyped here: the feed is inconsistent about the shape
/// (plain number or "MM:SS" string) and normalization happens when the
/// cache builds its records.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub name: String,
    pub season: HashMap<StatCategory, f64>,
    pub minutes_raw: Value,
}

/// Upstream source of seasonal team statistics.
///
/// The production implementation talks to the Sportradar NBA API; tests
/// substitute their own.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Fetch all seasonal roster entries for a team abbreviation.
    async fn fetch_team_roster(&self, team: &str) -> Result<Vec<RosterEntry>, ProviderError>;
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("stats API key not configured")]
    MissingApiKey,

    #[error("no upstream team id configured for '{team}'")]
    UnknownTeam { team: String },

    #[error("stats request failed: {source}")]
    Http { source: reqwest::Error },

    #[error("stats endpoint returned status {status}")]
    Status { status: reqwest::StatusCode },

    #[error("malformed stats payload: {message}")]
    Malformed { message: String },
}

// ---------------------------------------------------------------------------
// SportradarProvider
// ---------------------------------------------------------------------------

/// Client for the Sportradar NBA seasonal statistics endpoint.
pub struct SportradarProvider {
    http: reqwest::Client,
    base_url: String,
    access_level: String,
    version: String,
    language: String,
    season_year: u32,
    season_type: String,
    teams: HashMap<String, String>,
    api_key: String,
}

impl SportradarProvider {
    /// Build a provider from the application config.
    ///
    /// A missing API key is not an error at construction time. The service
    /// still starts and every fetch reports `MissingApiKey` until a key is
    /// configured.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let api_key = match &config.credentials.sportradar_api_key {
            Some(key) => key.trim().to_string(),
            None => String::new(),
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Http { source: e })?;
        Ok(Self {
            http,
            base_url: config.upstream.base_url.clone(),
            access_level: config.upstream.access_level.clone(),
            version: config.upstream.version.clone(),
            language: config.upstream.language.clone(),
            season_year: config.upstream.season_year,
            season_type: config.upstream.season_type.clone(),
            teams: config.upstream.teams.clone(),
            api_key,
        })
    }

    /// Whether a usable API key was configured.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn seasonal_statistics_url(&self, team_id: &str) -> String {
        format!(
            "{}/nba/{}/{}/{}/seasons/{}/{}/teams/{}/statistics.json",
            self.base_url.trim_end_matches('/'),
            self.access_level,
            self.version,
            self.language,
            self.season_year,
            self.season_type,
            team_id
        )
    }
}

#[async_trait]
impl StatsProvider for SportradarProvider {
    async fn fetch_team_roster(&self, team: &str) -> Result<Vec<RosterEntry>, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        let team_code = team.trim().to_uppercase();
        let team_id = self
            .teams
            .get(&team_code)
            .ok_or_else(|| ProviderError::UnknownTeam { team: team_code.clone() })?;
        let url = self.seasonal_statistics_url(team_id);
        debug!(team = %team_code, %url, "fetching seasonal team statistics");

        let response = self
            .http
            .get(&url)
            .header("accept", "application/json")
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Http { source: e })?;

        if !response.status().is_success() {
            return Err(ProviderError::Status { status: response.status() });
        }

        let payload: TeamStatisticsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed { message: e.to_string() })?;

        Ok(roster_from_response(payload))
    }
}

// ---------------------------------------------------------------------------
// Raw payload serde structs (private)
// ---------------------------------------------------------------------------

/// Top of the seasonal statistics payload. Only the players array matters;
/// everything else (team totals, opponent splits) is ignored.
#[derive(Debug, Deserialize)]
struct TeamStatisticsResponse {
    #[serde(default)]
    players: Vec<ApiPlayer>,
}

#[derive(Debug, Deserialize)]
struct ApiPlayer {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    average: Option<ApiAverages>,
}

#[derive(Debug, Deserialize)]
struct ApiAverages {
    #[serde(default)]
    points: Option<f64>,
    #[serde(default)]
    rebounds: Option<f64>,
    #[serde(default)]
    assists: Option<f64>,
    #[serde(default)]
    three_points_made: Option<f64>,
    #[serde(default)]
    minutes: Value,
}

// ---------------------------------------------------------------------------
// Payload normalization helpers
// ---------------------------------------------------------------------------

/// Flatten the raw payload into roster entries, skipping nameless players.
fn roster_from_response(payload: TeamStatisticsResponse) -> Vec<RosterEntry> {
    let mut roster = Vec::new();
    for player in payload.players {
        let name = match player.full_name.or(player.name) {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => {
                warn!("skipping roster entry with no player name");
                continue;
            }
        };
        let mut season = HashMap::new();
        let mut minutes_raw = Value::Null;
        if let Some(averages) = player.average {
            if let Some(points) = averages.points {
                season.insert(StatCategory::Points, points);
            }
            if let Some(rebounds) = averages.rebounds {
                season.insert(StatCategory::Rebounds, rebounds);
            }
            if let Some(assists) = averages.assists {
                season.insert(StatCategory::Assists, assists);
            }
            if let Some(threes) = averages.three_points_made {
                season.insert(StatCategory::ThreesMade, threes);
            }
            minutes_raw = averages.minutes;
        }
        roster.push(RosterEntry { name, season, minutes_raw });
    }
    roster
}

/// Normalize an upstream minutes value into average minutes per game.
///
/// The feed reports minutes either as a plain number or as an "MM:SS"
/// string. Any other shape yields None.
pub(crate) fn parse_minutes(value: &Value) -> Option<f64> {
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    let text = value.as_str()?;
    let (mins, secs) = text.split_once(':')?;
    let mins: u32 = mins.trim().parse().ok()?;
    let secs: u32 = secs.trim().parse().ok()?;
    Some(mins as f64 + secs as f64 / 60.0)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_provider(base_url: String, timeout_ms: u64) -> SportradarProvider {
        let mut teams = HashMap::new();
        teams.insert("ATL".to_string(), "atl-team-id".to_string());
        SportradarProvider {
            http: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap(),
            base_url,
            access_level: "trial".to_string(),
            version: "v8".to_string(),
            language: "en".to_string(),
            season_year: 2024,
            season_type: "REG".to_string(),
            teams,
            api_key: "test-key".to_string(),
        }
    }

    fn sample_payload() -> String {
        json!({
            "season": { "year": 2024, "type": "REG" },
            "players": [
                {
                    "id": "p1",
                    "full_name": "Jalen Johnson",
                    "average": {
                        "points": 18.9,
                        "rebounds": 10.0,
                        "assists": 7.2,
                        "three_points_made": 1.1,
                        "minutes": "36:05"
                    }
                },
                {
                    "id": "p2",
                    "name": "Bench Guy",
                    "average": { "points": 4.5, "minutes": 11.2 }
                },
                { "id": "p3", "average": { "points": 2.0 } }
            ]
        })
        .to_string()
    }

    /// Minimal HTTP server that answers every connection with the same
    /// canned response.
    async fn spawn_mock_endpoint(
        status_line: &'static str,
        body: String,
    ) -> std::net::SocketAddr {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let body = body.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.flush().await;
                });
            }
        });
        addr
    }

    // -- Minutes normalization --

    #[test]
    fn parse_minutes_plain_number() {
        assert_eq!(parse_minutes(&json!(34.6)), Some(34.6));
        assert_eq!(parse_minutes(&json!(28)), Some(28.0));
        assert_eq!(parse_minutes(&json!(0)), Some(0.0));
    }

    #[test]
    fn parse_minutes_mm_ss_string() {
        let parsed = parse_minutes(&json!("36:30")).unwrap();
        assert!((parsed - 36.5).abs() < 1e-9);
        let parsed = parse_minutes(&json!("34:06")).unwrap();
        assert!((parsed - 34.1).abs() < 1e-9);
    }

    #[test]
    fn parse_minutes_zero_seconds() {
        assert_eq!(parse_minutes(&json!("32:00")), Some(32.0));
    }

    #[test]
    fn parse_minutes_rejects_other_strings() {
        assert_eq!(parse_minutes(&json!("34")), None);
        assert_eq!(parse_minutes(&json!("34.5")), None);
        assert_eq!(parse_minutes(&json!("12:xx")), None);
        assert_eq!(parse_minutes(&json!("a:b")), None);
        assert_eq!(parse_minutes(&json!("12:34:56")), None);
        assert_eq!(parse_minutes(&json!("")), None);
    }

    #[test]
    fn parse_minutes_rejects_other_shapes() {
        assert_eq!(parse_minutes(&Value::Null), None);
        assert_eq!(parse_minutes(&json!(true)), None);
        assert_eq!(parse_minutes(&json!(["36:30"])), None);
        assert_eq!(parse_minutes(&json!({"minutes": 34.0})), None);
    }

    // -- Payload flattening --

    #[test]
    fn roster_from_response_flattens_players() {
        let payload: TeamStatisticsResponse =
            serde_json::from_str(&sample_payload()).unwrap();
        let roster = roster_from_response(payload);

        // The nameless third player is dropped.
        assert_eq!(roster.len(), 2);

        assert_eq!(roster[0].name, "Jalen Johnson");
        assert_eq!(roster[0].season[&StatCategory::Points], 18.9);
        assert_eq!(roster[0].season[&StatCategory::Rebounds], 10.0);
        assert_eq!(roster[0].season[&StatCategory::Assists], 7.2);
        assert_eq!(roster[0].season[&StatCategory::ThreesMade], 1.1);
        assert_eq!(roster[0].minutes_raw, json!("36:05"));

        // Fallback to the short name field, partial averages kept as-is.
        assert_eq!(roster[1].name, "Bench Guy");
        assert_eq!(roster[1].season[&StatCategory::Points], 4.5);
        assert!(!roster[1].season.contains_key(&StatCategory::Rebounds));
        assert_eq!(roster[1].minutes_raw, json!(11.2));
    }

    #[test]
    fn roster_from_response_handles_missing_average_block() {
        let payload: TeamStatisticsResponse = serde_json::from_value(json!({
            "players": [{ "full_name": "No Stats Yet" }]
        }))
        .unwrap();
        let roster = roster_from_response(payload);
        assert_eq!(roster.len(), 1);
        assert!(roster[0].season.is_empty());
        assert_eq!(roster[0].minutes_raw, Value::Null);
    }

    #[test]
    fn roster_from_response_handles_empty_payload() {
        let payload: TeamStatisticsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(roster_from_response(payload).is_empty());
    }

    #[test]
    fn roster_names_trimmed() {
        let payload: TeamStatisticsResponse = serde_json::from_value(json!({
            "players": [{ "full_name": "  Jalen Johnson  ", "average": { "points": 18.9 } }]
        }))
        .unwrap();
        let roster = roster_from_response(payload);
        assert_eq!(roster[0].name, "Jalen Johnson");
    }

    // -- URL construction --

    #[test]
    fn seasonal_statistics_url_shape() {
        let provider = test_provider("https://api.sportradar.com".to_string(), 1000);
        let url = provider.seasonal_statistics_url("atl-team-id");
        assert_eq!(
            url,
            "https://api.sportradar.com/nba/trial/v8/en/seasons/2024/REG/teams/atl-team-id/statistics.json"
        );
    }

    #[test]
    fn seasonal_statistics_url_trims_trailing_slash() {
        let provider = test_provider("https://api.sportradar.com/".to_string(), 1000);
        let url = provider.seasonal_statistics_url("atl-team-id");
        assert!(url.starts_with("https://api.sportradar.com/nba/"));
    }

    // -- Guard rails before any request is made --

    #[tokio::test]
    async fn missing_api_key_fails_without_request() {
        let mut provider = test_provider("http://127.0.0.1:1".to_string(), 1000);
        provider.api_key = String::new();
        let err = provider.fetch_team_roster("ATL").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey));
        assert!(!provider.has_api_key());
    }

    #[tokio::test]
    async fn unknown_team_fails_without_request() {
        let provider = test_provider("http://127.0.0.1:1".to_string(), 1000);
        let err = provider.fetch_team_roster("XYZ").await.unwrap_err();
        match err {
            ProviderError::UnknownTeam { team } => assert_eq!(team, "XYZ"),
            other => panic!("expected UnknownTeam, got: {other:?}"),
        }
    }

    // -- Mock endpoint round trips --

    #[tokio::test]
    async fn fetch_team_roster_parses_mock_payload() {
        let addr = spawn_mock_endpoint("HTTP/1.1 200 OK", sample_payload()).await;
        let provider = test_provider(format!("http://{addr}"), 2000);

        let roster = provider.fetch_team_roster("atl").await.unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].name, "Jalen Johnson");
    }

    #[tokio::test]
    async fn fetch_team_roster_error_status() {
        let addr = spawn_mock_endpoint(
            "HTTP/1.1 401 Unauthorized",
            "{\"message\":\"invalid key\"}".to_string(),
        )
        .await;
        let provider = test_provider(format!("http://{addr}"), 2000);

        let err = provider.fetch_team_roster("ATL").await.unwrap_err();
        match err {
            ProviderError::Status { status } => assert_eq!(status.as_u16(), 401),
            other => panic!("expected Status, got: {other:?}"),
        }
        assert!(format!("{err}").contains("401"));
    }

    #[tokio::test]
    async fn fetch_team_roster_malformed_body() {
        let addr = spawn_mock_endpoint("HTTP/1.1 200 OK", "{not json".to_string()).await;
        let provider = test_provider(format!("http://{addr}"), 2000);

        let err = provider.fetch_team_roster("ATL").await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { .. }));
    }

    #[tokio::test]
    async fn fetch_team_roster_times_out() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        // A server that accepts and then never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let provider = test_provider(format!("http://{addr}"), 200);
        let err = provider.fetch_team_roster("ATL").await.unwrap_err();
        match err {
            ProviderError::Http { source } => assert!(source.is_timeout()),
            other => panic!("expected Http timeout, got: {other:?}"),
        }
    }
}
