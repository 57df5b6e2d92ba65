//! Environment-provided configuration, validated at startup.
//!
//! Every required value is read once at process start; a missing or malformed
//! value aborts the process with a non-zero exit before any network connection
//! is opened.

use serde::Serialize;
use std::path::PathBuf;

/// Default port for the always-200 health responder.
const DEFAULT_HEALTH_PORT: u16 = 8787;

/// Default duplicate-activation cooldown window, in seconds.
const DEFAULT_COOLDOWN_SECS: u64 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Runtime configuration.
///
/// Serializable so `deskrelay doctor`-style diagnostics can dump the resolved
/// values (token redacted by skipping it).
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Bot credential. Never logged or serialized.
    #[serde(skip)]
    pub token: String,
    /// Forum category that receives report threads.
    pub report_forum_id: String,
    /// Text channel used for fallback threads and moderation notices.
    pub support_channel_id: String,
    /// The single designated operator for contact requests.
    pub operator_id: String,
    /// Channel hosting the interactive panel. Defaults to the support channel.
    pub panel_channel_id: String,
    /// Restrict operation to one guild when set.
    pub guild_id: Option<String>,
    /// Port for the health endpoint.
    pub health_port: u16,
    /// Optional sqlite path for promo-claim rows.
    pub claim_db_path: Option<PathBuf>,
    /// Duplicate-activation cooldown window, seconds.
    pub cooldown_secs: u64,
}

impl Config {
    /// Read and validate configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = require("DISCORD_TOKEN")?;
        let report_forum_id = require("REPORT_FORUM_ID")?;
        let support_channel_id = require("SUPPORT_CHANNEL_ID")?;
        let operator_id = require("OPERATOR_ID")?;

        let panel_channel_id = optional("PANEL_CHANNEL_ID")
            .unwrap_or_else(|| support_channel_id.clone());

        let health_port = match optional("HEALTH_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::Invalid("HEALTH_PORT", e.to_string()))?,
            None => DEFAULT_HEALTH_PORT,
        };

        let cooldown_secs = match optional("COOLDOWN_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid("COOLDOWN_SECS", e.to_string()))?,
            None => DEFAULT_COOLDOWN_SECS,
        };

        Ok(Self {
            token,
            report_forum_id,
            support_channel_id,
            operator_id,
            panel_channel_id,
            guild_id: optional("GUILD_ID"),
            health_port,
            claim_db_path: optional("CLAIM_DB_PATH").map(PathBuf::from),
            cooldown_secs,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match optional(name) {
        Some(v) => Ok(v),
        None => Err(ConfigError::Missing(name)),
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
