/*!
 * Radio State
 * Wi-Fi is enabled when no wlan rfkill switch is soft or hard blocked
 */

use std::fs;
use std::path::{Path, PathBuf};

use super::{RadioState, SystemError};

pub const DEFAULT_RFKILL_ROOT: &str = "/sys/class/rfkill";

pub struct RfkillRadio {
    root: PathBuf,
}

impl RfkillRadio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn read_state(&self) -> Result<bool, SystemError> {
        let mut found = false;

        for entry in fs::read_dir(&self.root)?.flatten() {
            let switch = entry.path();
            let kind = fs::read_to_string(switch.join("type")).unwrap_or_default();
            if kind.trim() != "wlan" {
                continue;
            }

            found = true;
            if read_flag(&switch.join("soft"))? || read_flag(&switch.join("hard"))? {
                return Ok(false);
            }
        }

        if found {
            Ok(true)
        } else {
            Err(SystemError::NoRadio(self.root.display().to_string()))
        }
    }
}

fn read_flag(path: &Path) -> Result<bool, SystemError> {
    Ok(fs::read_to_string(path)?.trim() == "1")
}

impl RadioState for RfkillRadio {
    fn is_enabled(&self) -> bool {
        match self.read_state() {
            Ok(enabled) => enabled,
            Err(e) => {
                tracing::debug!("Radio state unavailable, reporting disabled: {}", e);
                false
            }
        }
    }
}
