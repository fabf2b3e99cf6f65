//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::store::rest::RestConfig;

/// Route the wizard hands off to once a build completes.
pub const DEFAULT_COMPLETION_ROUTE: &str = "/dashboard";

/// Build pipeline simulator settings.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Interval between simulator ticks.
    pub tick_interval: Duration,
    /// Delay between reaching `complete` and navigating away.
    pub settle_delay: Duration,
    /// Smallest per-tick progress increment (inclusive).
    pub min_increment: u8,
    /// Largest per-tick progress increment (inclusive).
    pub max_increment: u8,
    /// Route passed to the navigator on completion.
    pub completion_route: String,
    /// Fixed RNG seed. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(300),
            settle_delay: Duration::from_millis(1000),
            min_increment: 5,
            max_increment: 14,
            completion_route: DEFAULT_COMPLETION_ROUTE.to_string(),
            seed: None,
        }
    }
}

impl RenderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            tick_interval: env_parse::<u64>("STUDIO_RENDER_TICK_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            settle_delay: env_parse::<u64>("STUDIO_RENDER_SETTLE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            ..defaults
        })
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Hosted REST store. When set, replaces the local libSQL database.
    pub rest: Option<RestConfig>,
    /// Base URL used for dashboard links in onboarding emails.
    pub dashboard_url: String,
    pub allowed_emails: Vec<String>,
    pub log_dir: Option<PathBuf>,
    pub render: RenderConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/agent-studio.db"),
            rest: None,
            dashboard_url: "http://localhost:8080".to_string(),
            allowed_emails: vec!["*".to_string()],
            log_dir: None,
            render: RenderConfig::default(),
        }
    }
}

impl StudioConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let allowed_emails = match std::env::var("STUDIO_ALLOWED_EMAILS") {
            Ok(raw) => split_list(&raw),
            Err(_) => defaults.allowed_emails,
        };

        Ok(Self {
            port: env_parse("STUDIO_PORT")?.unwrap_or(defaults.port),
            db_path: std::env::var("STUDIO_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            rest: RestConfig::from_env(),
            dashboard_url: std::env::var("STUDIO_DASHBOARD_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.dashboard_url),
            allowed_emails,
            log_dir: std::env::var("STUDIO_LOG_DIR").ok().map(PathBuf::from),
            render: RenderConfig::from_env()?,
        })
    }
}

/// Parse an optional environment variable. Unset is `Ok(None)`; set but
/// unparseable is an error.
pub(crate) fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

/// Split a comma-separated list, dropping blanks.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
