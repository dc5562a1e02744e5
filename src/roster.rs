//! Participant roster: who owns which tracker, and where to send alerts.
//!
//! The roster file is JSON, either a bare array of entries or an object
//! with a `participants` array. Devices are matched to entries by name,
//! case-insensitively and ignoring surrounding whitespace, so the Traccar
//! device name does not have to match the roster spelling exactly.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MonitorError, Result};

/// One roster entry: display name and the phone number alerts go to.
///
/// An empty phone number is allowed; the device is still monitored and
/// logged, only the SMS delivery is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
}

/// Lookup table from normalized device name to roster entry.
#[derive(Debug, Default)]
pub struct ParticipantDirectory {
    by_name: HashMap<String, Participant>,
}

/// Normalize a device or roster name for matching.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ParticipantDirectory {
    /// Load the roster from a JSON file.
    ///
    /// Fails if the file is unreadable, an entry is malformed, or no entry
    /// has a usable name; monitoring nobody is a configuration mistake.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| MonitorError::Roster {
            message: format!("{}: {}", path.display(), e),
        })?;
        let raw: Value = serde_json::from_str(&text).map_err(|e| MonitorError::Roster {
            message: format!("{}: {}", path.display(), e),
        })?;

        let entries = match raw {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("participants") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        let participants = entries
            .into_iter()
            .map(|item| {
                serde_json::from_value::<Participant>(item).map_err(|e| MonitorError::Roster {
                    message: format!("invalid participant entry: {e}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_entries(&participants)
    }

    /// Build a directory from already-parsed entries.
    ///
    /// Entries with a blank name are dropped; a later entry with the same
    /// normalized name replaces an earlier one.
    pub fn from_entries(entries: &[Participant]) -> Result<Self> {
        let mut by_name = HashMap::new();
        for entry in entries {
            let key = normalize_name(&entry.name);
            if key.is_empty() {
                continue;
            }
            by_name.insert(key, entry.clone());
        }
        if by_name.is_empty() {
            return Err(MonitorError::Roster {
                message: "participantMapFile has no participants".to_string(),
            });
        }
        Ok(Self { by_name })
    }

    /// Find the roster entry for a device name, if any.
    pub fn lookup(&self, device_name: &str) -> Option<&Participant> {
        self.by_name.get(&normalize_name(device_name))
    }

    /// Number of distinct participants.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
