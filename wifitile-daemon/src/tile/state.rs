/*!
 * Tile Visual State
 * What the quick-settings surface shows, plus the events pushed to clients
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Detached,
    Idle,
    Observing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Activation {
    Active,
    #[default]
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TileIcon {
    Signal,
    #[default]
    NoSignal,
}

/// A committed snapshot of the tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileState {
    pub label: String,
    pub activation: Activation,
    pub icon: TileIcon,
    pub subtitle: String,
    pub updated_at: DateTime<Utc>,
}

/// Uncommitted tile properties accumulated by a surface between commits.
#[derive(Debug, Clone, Default)]
pub struct TileDraft {
    pub label: String,
    pub activation: Activation,
    pub icon: TileIcon,
    pub subtitle: String,
}

impl TileDraft {
    pub fn snapshot(&self) -> TileState {
        TileState {
            label: self.label.clone(),
            activation: self.activation,
            icon: self.icon,
            subtitle: self.subtitle.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// Display strings used by the tile.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TileLabels {
    pub wifi: String,
    pub on: String,
    pub off: String,
}

impl Default for TileLabels {
    fn default() -> Self {
        Self {
            wifi: "Wi-Fi".to_string(),
            on: "On".to_string(),
            off: "Off".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum TileEvent {
    StateChanged { tile: TileState },
    AccessRequired,
    UnlockRequested,
    /// The parked toggle ran or was dropped.
    UnlockResolved,
    /// The committed tile was discarded.
    Discarded,
}
