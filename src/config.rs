// Configuration loading and parsing (rating.toml, upstream.toml, credentials.toml).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub rating: RatingConfig,
    pub cache: CacheConfig,
    pub upstream: UpstreamConfig,
    pub credentials: CredentialsConfig,
    pub ws_port: u16,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// rating.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire rating.toml file.
#[derive(Debug, Clone, Deserialize)]
struct RatingFile {
    weights: WeightsConfig,
    matchup: MatchupConfig,
    minutes: MinutesConfig,
    thresholds: ThresholdsConfig,
    cache: CacheConfig,
    websocket: WebsocketSection,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct WebsocketSection {
    port: u16,
}

/// The public rating config assembled from the rating.toml sections that the
/// engine consumes.
#[derive(Debug, Clone)]
pub struct RatingConfig {
    pub weights: WeightsConfig,
    pub matchup: MatchupConfig,
    pub minutes: MinutesConfig,
    pub thresholds: ThresholdsConfig,
}

/// Blend weights for the recent and season terms of the base score.
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    pub recent: f64,
    pub season: f64,
}

/// Multipliers applied from the opponent's defensive rank.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchupConfig {
    pub boost: f64,
    pub penalty: f64,
    pub neutral: f64,
}

/// Minutes-load thresholds and the multipliers they select.
#[derive(Debug, Clone, Deserialize)]
pub struct MinutesConfig {
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub boost: f64,
    pub penalty: f64,
    pub neutral: f64,
}

/// Band edges for the Strong/Lean/Neutral rating labels.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsConfig {
    pub strong_edge: f64,
    pub lean_edge: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub freshness_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub matchups: String,
}

// ---------------------------------------------------------------------------
// upstream.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[upstream]` table in upstream.toml.
#[derive(Debug, Clone, Deserialize)]
struct UpstreamFile {
    upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub access_level: String,
    pub version: String,
    pub language: String,
    pub season_year: u32,
    pub season_type: String,
    pub timeout_secs: u64,
    /// Team abbreviation to upstream team id. The provider refuses to fetch
    /// teams missing from this map.
    #[serde(default)]
    pub teams: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub sportradar_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/rating.toml`,
/// `config/upstream.toml`, and (optionally) `config/credentials.toml`,
/// all relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- rating.toml (required) ---
    let rating_path = config_dir.join("rating.toml");
    let rating_text = read_file(&rating_path)?;
    let rating_file: RatingFile =
        toml::from_str(&rating_text).map_err(|e| ConfigError::ParseError {
            path: rating_path.clone(),
            source: e,
        })?;

    let rating = RatingConfig {
        weights: rating_file.weights,
        matchup: rating_file.matchup,
        minutes: rating_file.minutes,
        thresholds: rating_file.thresholds,
    };
    let cache = rating_file.cache;
    let ws_port = rating_file.websocket.port;
    let data_paths = rating_file.data_paths;

    // --- upstream.toml (required) ---
    let upstream_path = config_dir.join("upstream.toml");
    let upstream_text = read_file(&upstream_path)?;
    let upstream_file: UpstreamFile =
        toml::from_str(&upstream_text).map_err(|e| ConfigError::ParseError {
            path: upstream_path.clone(),
            source: e,
        })?;
    let upstream = upstream_file.upstream;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        rating,
        cache,
        upstream,
        credentials,
        ws_port,
        data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        // If config/ also doesn't exist, the app will fail to load config.
        // Return an error with a clear message about the missing defaults directory.
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        // Skip non-files and entries without a file name
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        // Skip .example template files
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // File already exists in config/, skip it
            }
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    // Blend weights may be zero (disabling a term) but never negative.
    let weights = &config.rating.weights;
    let weight_fields: &[(&str, f64)] =
        &[("weights.recent", weights.recent), ("weights.season", weights.season)];
    for (name, val) in weight_fields {
        if *val < 0.0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be >= 0, got {val}"),
            });
        }
    }

    // All multipliers must be positive; a zero would silently erase scores.
    let matchup = &config.rating.matchup;
    let minutes = &config.rating.minutes;
    let multiplier_fields: &[(&str, f64)] = &[
        ("matchup.boost", matchup.boost),
        ("matchup.penalty", matchup.penalty),
        ("matchup.neutral", matchup.neutral),
        ("minutes.boost", minutes.boost),
        ("minutes.penalty", minutes.penalty),
        ("minutes.neutral", minutes.neutral),
    ];
    for (name, val) in multiplier_fields {
        if *val <= 0.0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be > 0, got {val}"),
            });
        }
    }

    if minutes.high_threshold <= minutes.low_threshold {
        return Err(ConfigError::ValidationError {
            field: "minutes.high_threshold".into(),
            message: format!(
                "must be greater than low_threshold ({} <= {})",
                minutes.high_threshold, minutes.low_threshold
            ),
        });
    }

    // Band edges: 0 < lean_edge < strong_edge.
    let thresholds = &config.rating.thresholds;
    if thresholds.lean_edge <= 0.0 {
        return Err(ConfigError::ValidationError {
            field: "thresholds.lean_edge".into(),
            message: format!("must be > 0, got {}", thresholds.lean_edge),
        });
    }
    if thresholds.strong_edge <= thresholds.lean_edge {
        return Err(ConfigError::ValidationError {
            field: "thresholds.strong_edge".into(),
            message: format!(
                "must be greater than lean_edge ({} <= {})",
                thresholds.strong_edge, thresholds.lean_edge
            ),
        });
    }

    if config.cache.freshness_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "cache.freshness_secs".into(),
            message: "must be > 0".into(),
        });
    }

    if config.upstream.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "upstream.timeout_secs".into(),
            message: "must be > 0".into(),
        });
    }

    if config.upstream.teams.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "upstream.teams".into(),
            message: "must map at least one team abbreviation to an upstream id".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
