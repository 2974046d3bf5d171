// WebSocket server answering pick evaluation and stats lookup requests.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{info, warn};

use crate::protocol::{ClientRequest, PlayerView, ServerResponse};
use crate::rating::engine::RatingEngine;
use crate::stats::cache::normalize_team;

/// Run the WebSocket server on the given port.
///
/// Binds a TCP listener on `127.0.0.1:{port}` and serves each connection in
/// its own task. The server runs forever (until the task is cancelled or the
/// process exits).
pub async fn run(port: u16, engine: Arc<RatingEngine>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    serve(listener, engine).await
}

/// Accept loop over an already-bound listener. Split out from [`run`] so
/// tests can bind port 0 and learn the real address first.
pub async fn serve(listener: TcpListener, engine: Arc<RatingEngine>) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let addr_str = addr.to_string();
        info!("Accepted TCP connection from {addr_str}");

        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let ws_stream = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {addr_str}: {e}");
                    return;
                }
            };

            if let Err(e) = serve_connection(ws_stream, &engine, &addr_str).await {
                warn!("Connection error for {addr_str}: {e}");
            }
            info!("Client {addr_str} disconnected");
        });
    }
}

/// Request/response loop for one client: each text frame holds one request
/// and produces exactly one response frame.
///
/// This function is generic over the stream type so it can be tested with
/// in-memory streams without opening TCP ports.
pub async fn serve_connection<S>(
    ws_stream: WebSocketStream<S>,
    engine: &RatingEngine,
    addr: &str,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg_result) = read.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let response = handle_request(engine, text.as_str()).await;
                let json = serde_json::to_string(&response)?;
                write.send(Message::Text(json.into())).await?;
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    Ok(())
}

/// Parse one request payload and dispatch it. This is a pure-logic function
/// that requires no socket and is the primary unit-test target.
pub async fn handle_request(engine: &RatingEngine, text: &str) -> ServerResponse {
    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejecting malformed request: {e}");
            return ServerResponse::Error {
                message: format!("invalid request: {e}"),
            };
        }
    };

    dispatch(engine, request).await
}

async fn dispatch(engine: &RatingEngine, request: ClientRequest) -> ServerResponse {
    match request {
        ClientRequest::EvaluatePick { pick } => ServerResponse::PickResult {
            result: engine.evaluate_pick(&pick).await,
        },
        ClientRequest::EvaluateCard { picks } => {
            let card = engine.evaluate_card(&picks).await;
            ServerResponse::CardResult {
                summary: card.summary,
                results: card.results,
            }
        }
        ClientRequest::RefreshTeam { team } => match engine.cache().refresh_team(&team).await {
            Ok(count) => {
                info!("Refreshed {count} players for {team}");
                team_players(engine, &team).await
            }
            Err(e) => ServerResponse::Error {
                message: e.to_string(),
            },
        },
        ClientRequest::PlayerStats { player_name, team } => {
            match engine.cache().get(&player_name, &team).await {
                Ok(record) => ServerResponse::PlayerRecord {
                    player: PlayerView::from_record(&record, engine.cache().freshness_window()),
                },
                Err(e) => ServerResponse::Error {
                    message: e.to_string(),
                },
            }
        }
        ClientRequest::ListTeam { team } => team_players(engine, &team).await,
        ClientRequest::ListPlayers => {
            let freshness = engine.cache().freshness_window();
            let players = engine
                .cache()
                .all_players()
                .await
                .iter()
                .map(|record| PlayerView::from_record(record, freshness))
                .collect();
            ServerResponse::AllPlayers { players }
        }
    }
}

async fn team_players(engine: &RatingEngine, team: &str) -> ServerResponse {
    let freshness = engine.cache().freshness_window();
    let players = engine
        .cache()
        .list_team(team)
        .await
        .iter()
        .map(|record| PlayerView::from_record(record, freshness))
        .collect();

    ServerResponse::TeamPlayers {
        team: normalize_team(team),
        players,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::config::{
        MatchupConfig, MinutesConfig, RatingConfig, ThresholdsConfig, WeightsConfig,
    };
    use crate::rating::matchups::{MatchupRow, MatchupTable};
    use crate::stats::cache::PlayerStatsCache;
    use crate::stats::provider::{ProviderError, RosterEntry, StatsProvider};

    /// Provider serving a fixed roster for any known team, counting calls.
    struct FixedProvider {
        rosters: HashMap<String, Vec<RosterEntry>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StatsProvider for FixedProvider {
        async fn fetch_team_roster(&self, team: &str) -> Result<Vec<RosterEntry>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rosters
                .get(team)
                .cloned()
                .ok_or_else(|| ProviderError::UnknownTeam { team: team.into() })
        }
    }

    fn test_config() -> RatingConfig {
        RatingConfig {
            weights: WeightsConfig {
                recent: 0.6,
                season: 0.4,
            },
            matchup: MatchupConfig {
                boost: 1.15,
                penalty: 0.85,
                neutral: 1.0,
            },
            minutes: MinutesConfig {
                high_threshold: 32.0,
                low_threshold: 24.0,
                boost: 1.10,
                penalty: 0.90,
                neutral: 1.0,
            },
            thresholds: ThresholdsConfig {
                strong_edge: 3.0,
                lean_edge: 1.0,
            },
        }
    }

    fn entry(name: &str, pts: f64, minutes: f64) -> RosterEntry {
        RosterEntry {
            name: name.into(),
            season: [(crate::rating::pick::StatCategory::Points, pts)]
                .into_iter()
                .collect(),
            minutes_raw: json!(minutes),
        }
    }

    fn test_engine() -> Arc<RatingEngine> {
        let mut rosters = HashMap::new();
        rosters.insert(
            "DEN".to_string(),
            vec![
                entry("Nikola Jokic", 26.1, 34.5),
                entry("Jamal Murray", 21.0, 33.0),
            ],
        );

        let provider = Arc::new(FixedProvider {
            rosters,
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(PlayerStatsCache::new(provider, Duration::from_secs(21_600)));

        let matchups = MatchupTable::from_rows(vec![MatchupRow {
            team: "LAL".into(),
            pts_allowed_rank: 25,
            reb_allowed_rank: 20,
            ast_allowed_rank: 22,
            three_pm_allowed_rank: 16,
        }]);

        Arc::new(RatingEngine::new(cache, matchups, test_config()))
    }

    async fn respond(engine: &RatingEngine, text: &str) -> Value {
        let response = handle_request(engine, text).await;
        serde_json::to_value(&response).unwrap()
    }

    // -- Request dispatch --

    #[tokio::test]
    async fn evaluate_pick_returns_pick_result() {
        let engine = test_engine();
        let text = r#"{
            "type": "evaluate_pick",
            "pick": {"player_name": "Nikola Jokic", "team": "DEN", "opponent": "LAL",
                     "stat": "PTS", "line": 24.5, "direction": "OVER"}
        }"#;

        let value = respond(&engine, text).await;
        assert_eq!(value["type"], json!("pick_result"));
        assert_eq!(value["result"]["status"], json!("OK"));
        assert_eq!(value["result"]["player_name"], json!("Nikola Jokic"));
        // Soft matchup (rank 25) and heavy minutes both boost the score.
        assert_eq!(value["result"]["matchup_multiplier"], json!(1.15));
        assert_eq!(value["result"]["minutes_multiplier"], json!(1.10));
    }

    #[tokio::test]
    async fn evaluate_card_returns_summary_and_results() {
        let engine = test_engine();
        let text = r#"{
            "type": "evaluate_card",
            "picks": [
                {"player_name": "Nikola Jokic", "team": "DEN", "opponent": "LAL",
                 "stat": "PTS", "line": 24.5, "direction": "OVER"},
                {"player_name": "Nobody", "team": "DEN", "opponent": "LAL",
                 "stat": "PTS", "line": 10.0, "direction": "OVER"}
            ]
        }"#;

        let value = respond(&engine, text).await;
        assert_eq!(value["type"], json!("card_result"));
        assert_eq!(value["summary"]["total"], json!(2));
        assert_eq!(value["summary"]["error"], json!(1));
        let results = value["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["player_name"], json!("Nikola Jokic"));
        assert_eq!(results[1]["status"], json!("ERROR"));
    }

    #[tokio::test]
    async fn refresh_team_returns_team_players() {
        let engine = test_engine();
        let value = respond(&engine, r#"{"type": "refresh_team", "team": "den"}"#).await;

        assert_eq!(value["type"], json!("team_players"));
        assert_eq!(value["team"], json!("DEN"));
        let players = value["players"].as_array().unwrap();
        assert_eq!(players.len(), 2);
        // list_team output is sorted by player name.
        assert_eq!(players[0]["name"], json!("Jamal Murray"));
        assert_eq!(players[1]["name"], json!("Nikola Jokic"));
        assert_eq!(players[1]["fresh"], json!(true));
    }

    #[tokio::test]
    async fn refresh_unknown_team_returns_error() {
        let engine = test_engine();
        let value = respond(&engine, r#"{"type": "refresh_team", "team": "XXX"}"#).await;

        assert_eq!(value["type"], json!("error"));
        assert!(value["message"].as_str().unwrap().contains("XXX"));
    }

    #[tokio::test]
    async fn player_stats_returns_record_view() {
        let engine = test_engine();
        let value = respond(
            &engine,
            r#"{"type": "player_stats", "player_name": "nikola jokic", "team": "DEN"}"#,
        )
        .await;

        assert_eq!(value["type"], json!("player_record"));
        assert_eq!(value["player"]["name"], json!("Nikola Jokic"));
        assert_eq!(value["player"]["season"]["PTS"], json!(26.1));
        assert_eq!(value["player"]["minutes"], json!(34.5));
        assert_eq!(value["player"]["fresh"], json!(true));
    }

    #[tokio::test]
    async fn player_stats_for_unknown_player_returns_error() {
        let engine = test_engine();
        let value = respond(
            &engine,
            r#"{"type": "player_stats", "player_name": "Nobody", "team": "DEN"}"#,
        )
        .await;

        assert_eq!(value["type"], json!("error"));
        assert!(value["message"].as_str().unwrap().contains("Nobody"));
    }

    #[tokio::test]
    async fn list_team_does_not_fetch() {
        let engine = test_engine();
        let value = respond(&engine, r#"{"type": "list_team", "team": "DEN"}"#).await;

        // Nothing cached yet and list_team never hits the provider.
        assert_eq!(value["type"], json!("team_players"));
        assert!(value["players"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_players_returns_whole_cache() {
        let engine = test_engine();
        respond(&engine, r#"{"type": "refresh_team", "team": "DEN"}"#).await;

        let value = respond(&engine, r#"{"type": "list_players"}"#).await;
        assert_eq!(value["type"], json!("all_players"));
        let players = value["players"].as_array().unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0]["team"], json!("DEN"));
    }

    // -- Malformed payloads --

    #[tokio::test]
    async fn malformed_json_returns_error_response() {
        let engine = test_engine();
        let value = respond(&engine, "{not json").await;

        assert_eq!(value["type"], json!("error"));
        assert!(value["message"].as_str().unwrap().contains("invalid request"));
    }

    #[tokio::test]
    async fn unknown_request_type_returns_error_response() {
        let engine = test_engine();
        let value = respond(&engine, r#"{"type": "shutdown"}"#).await;

        assert_eq!(value["type"], json!("error"));
    }

    #[tokio::test]
    async fn invalid_stat_category_returns_error_response() {
        let engine = test_engine();
        let text = r#"{
            "type": "evaluate_pick",
            "pick": {"player_name": "A", "team": "DEN", "opponent": "LAL",
                     "stat": "BLK", "line": 1.5, "direction": "OVER"}
        }"#;

        let value = respond(&engine, text).await;
        assert_eq!(value["type"], json!("error"));
    }
}
