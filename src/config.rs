//! Process configuration loaded from environment variables.
//!
//! DESIGN
//! ======
//! Read once at startup (after `dotenvy` has loaded `.env`). Every knob
//! except `DATABASE_URL` has a default, and unparseable values fall back to
//! that default instead of aborting startup.

use crate::graph::ToolConfig;
use crate::graph::node::ShapeType;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_HISTORY_LIMIT: usize = 0;
const DEFAULT_PERSIST_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Bound of each connection's outbound peer-frame queue.
    pub client_channel_capacity: usize,
    /// Bound of each connection's pending-write queue. A full queue makes
    /// the editing client wait rather than dropping writes.
    pub persist_queue_capacity: usize,
    /// Maximum history entries per session; 0 keeps everything.
    pub history_limit: usize,
    /// Tool settings new sessions start with.
    pub tool: ToolConfig,
}

impl Config {
    /// # Errors
    ///
    /// Returns `Missing` if `DATABASE_URL` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        Ok(Self { database_url, ..Self::defaults_from_env() })
    }

    /// Everything but the database URL, which is left empty.
    #[must_use]
    pub fn defaults_from_env() -> Self {
        Self {
            database_url: String::new(),
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            client_channel_capacity: env_parse("CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY).max(1),
            persist_queue_capacity: env_parse("PERSIST_QUEUE_CAPACITY", DEFAULT_PERSIST_QUEUE_CAPACITY).max(1),
            history_limit: env_parse("HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT),
            tool: tool_from_env(),
        }
    }
}

fn tool_from_env() -> ToolConfig {
    let defaults = ToolConfig::default();
    let shape_type = std::env::var("TOOL_SHAPE")
        .ok()
        .and_then(|v| v.trim().to_ascii_lowercase().parse::<ShapeType>().ok())
        .unwrap_or(defaults.shape_type);
    ToolConfig {
        shape_type,
        width: env_dimension("TOOL_WIDTH", defaults.width),
        height: env_dimension("TOOL_HEIGHT", defaults.height),
        fill_style: env_string("TOOL_FILL", &defaults.fill_style),
        stroke_style: env_string("TOOL_STROKE", &defaults.stroke_style),
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_dimension(key: &str, default: f64) -> f64 {
    let value = env_parse(key, default);
    if value.is_finite() && value >= 0.0 { value } else { default }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
