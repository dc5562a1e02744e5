//! Configuration surface for the monitor daemon.
//!
//! Configuration is one JSON file with camelCase keys. Relative paths in it
//! (track file, roster file) resolve against the directory the config file
//! lives in, so a deployment directory can be moved as a unit.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MonitorError, Result};

/// Shortest allowed poll interval in seconds, to bound the request rate.
pub const MIN_POLL_SECONDS: u64 = 5;

/// Top-level configuration for the monitor daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    /// Base URL of the Traccar server, e.g. `https://tracker.example.com`
    pub traccar_url: String,
    /// Traccar API token, sent as a bearer token
    pub token: String,
    /// GPX file with the planned route
    pub track_file: String,
    /// Roster file mapping device names to phone numbers
    pub participant_map_file: String,
    /// Perpendicular distance in meters beyond which a device is off-route
    pub offroute_threshold_meters: f64,
    /// Positions older than this are ignored and reset the device state
    pub stale_minutes: i64,
    /// Seconds between poll cycles, floored at [`MIN_POLL_SECONDS`]
    pub poll_seconds: u64,
    /// Alert message template; `{name}`, `{time}`, `{lat}`, `{lng}` and
    /// `{deviceId}` are substituted
    pub offroute_message: String,
    /// SMS gateway description
    pub sms_gateway: GatewayConfig,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            traccar_url: String::new(),
            token: String::new(),
            track_file: String::new(),
            participant_map_file: "participants.json".to_string(),
            offroute_threshold_meters: 200.0,
            stale_minutes: 15,
            poll_seconds: 30,
            offroute_message: "{name} is off-route at {time}. Last location: {lat},{lng}"
                .to_string(),
            sms_gateway: GatewayConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl MonitorConfig {
    /// Read and parse the config file. Field validation happens separately
    /// because the SMS test mode needs neither source nor track.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| MonitorError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        let mut config: MonitorConfig =
            serde_json::from_str(&text).map_err(|e| MonitorError::Config {
                message: format!("{}: {}", path.display(), e),
            })?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// Check the fields every mode needs to reach the position source.
    pub fn validate_source(&self) -> Result<()> {
        if self.traccar_url.is_empty() || self.token.is_empty() {
            return Err(MonitorError::Config {
                message: "traccarUrl and token are required".to_string(),
            });
        }
        Ok(())
    }

    /// Absolute or config-relative path to the GPX track.
    pub fn track_path(&self) -> Result<PathBuf> {
        if self.track_file.is_empty() {
            return Err(MonitorError::Config {
                message: "trackFile is required".to_string(),
            });
        }
        Ok(self.base_dir.join(&self.track_file))
    }

    /// Absolute or config-relative path to the participant roster.
    pub fn participants_path(&self) -> Result<PathBuf> {
        if self.participant_map_file.is_empty() {
            return Err(MonitorError::Config {
                message: "participantMapFile is required".to_string(),
            });
        }
        Ok(self.base_dir.join(&self.participant_map_file))
    }

    /// Poll interval with the floor applied.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_seconds.max(MIN_POLL_SECONDS))
    }

    /// Staleness cutoff in milliseconds.
    pub fn stale_ms(&self) -> i64 {
        self.stale_minutes * 60 * 1000
    }
}

/// How to talk to the SMS gateway.
///
/// The gateway is described declaratively: URL, headers, query and body are
/// all templates rendered per message with `{to}`, `{phone}`, `{message}`,
/// `{authorization}`, `{token}` and `{apiKey}`. Unset fields fall back to a
/// conventional JSON POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub base_url: String,
    /// HTTP method, uppercased before use
    pub method: String,
    /// Path joined onto `base_url`; may carry a query string
    pub path: String,
    pub authorization: String,
    pub token: String,
    pub api_key: String,
    /// Extra query parameters; rendered values that come out empty are dropped
    pub query: Value,
    /// Request headers; when empty and a credential is set, a verbatim
    /// `Authorization` header is added
    pub headers: Value,
    /// Body template; `null` means the default `{"to", "message"}` JSON body
    pub body: Option<Value>,
    /// One of `json`, `form` or `text`
    pub body_format: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            method: "POST".to_string(),
            path: "/".to_string(),
            authorization: String::new(),
            token: String::new(),
            api_key: String::new(),
            query: Value::Object(serde_json::Map::new()),
            headers: Value::Object(serde_json::Map::new()),
            body: None,
            body_format: "json".to_string(),
        }
    }
}

impl GatewayConfig {
    /// First configured credential: `authorization`, then `token`, then
    /// `apiKey`. Empty when none is set.
    pub fn credential(&self) -> &str {
        [&self.authorization, &self.token, &self.api_key]
            .into_iter()
            .find(|value| !value.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}
