use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::system::connectivity::DEFAULT_SYSFS_NET;
use crate::system::radio::DEFAULT_RFKILL_ROOT;
use crate::tile::state::TileLabels;

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: String,
    pub wifi: WifiConfig,
    pub preferences: PreferencesConfig,
    pub labels: TileLabels,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct WifiConfig {
    pub interface: String,
    pub enable_command: String,
    pub disable_command: String,
    pub use_sudo: bool,
    pub rfkill_root: String,
    pub sysfs_net_root: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PreferencesConfig {
    pub path: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: "/run/wifitile/wifitile.sock".to_string(),
            wifi: WifiConfig::default(),
            preferences: PreferencesConfig::default(),
            labels: TileLabels::default(),
        }
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".to_string(),
            enable_command: "rfkill unblock wifi".to_string(),
            disable_command: "rfkill block wifi".to_string(),
            use_sudo: true,
            rfkill_root: DEFAULT_RFKILL_ROOT.to_string(),
            sysfs_net_root: DEFAULT_SYSFS_NET.to_string(),
            session_id: None,
        }
    }
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: "/var/lib/wifitile/preferences.toml".to_string(),
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &str) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(_) => {
                // Create default config if not found
                let config = Self::default();
                if let Some(parent) = Path::new(path).parent() {
                    let _ = fs::create_dir_all(parent);
                }
                let _ = fs::write(path, toml::to_string_pretty(&config)?);
                Ok(config)
            }
        }
    }
}
