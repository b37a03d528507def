/*!
 * SSID Resolution
 * Reads the associated network name from `iw dev <iface> link`
 */

use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;

use super::SsidResolver;

pub struct IwSsidResolver {
    interface: String,
}

impl IwSsidResolver {
    pub fn new(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
        }
    }
}

/// Extracts the SSID from `iw` link output. `Not connected.` yields `None`.
pub fn parse_ssid(output: &str) -> Option<String> {
    static SSID_LINE: OnceLock<Regex> = OnceLock::new();
    let pattern = SSID_LINE.get_or_init(|| Regex::new(r"(?m)^\s*SSID:[ \t]*(.*?)[ \t]*$").unwrap());

    pattern
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|ssid| ssid.as_str().to_string())
        .filter(|ssid| !ssid.is_empty())
}

impl SsidResolver for IwSsidResolver {
    fn resolve_current_ssid(&self) -> Option<String> {
        let output = match Command::new("iw")
            .args(["dev", &self.interface, "link"])
            .output()
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                tracing::debug!(
                    "iw link failed for {}: {}",
                    self.interface,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                return None;
            }
            Err(e) => {
                tracing::debug!("Unable to run iw: {}", e);
                return None;
            }
        };

        parse_ssid(&String::from_utf8_lossy(&output.stdout))
    }
}
