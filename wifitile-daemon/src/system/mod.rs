/*!
 * System Collaborators
 * Everything the tile controller delegates to the host system
 */

pub mod connectivity;
pub mod logind;
pub mod prefs;
pub mod radio;
pub mod shell;
pub mod ssid;
pub mod surface;
pub mod unlock;

use thiserror::Error;

use crate::tile::state::{Activation, TileIcon};

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },
    #[error("no wlan rfkill switch under {0}")]
    NoRadio(String),
    #[error("preferences error: {0}")]
    Preferences(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkChange {
    Available,
    Lost,
}

pub type ChangeCallback = Box<dyn Fn(NetworkChange) + Send + Sync>;

/// Deferred work handed to the unlock challenge. Runs at most once.
pub type Continuation = Box<dyn FnOnce() + Send>;

/// Elevated command execution. Failures are logged, never returned.
pub trait ShellExecutor: Send + Sync {
    fn has_access(&self) -> bool;
    fn execute(&self, command: &str);
}

pub trait RadioState: Send + Sync {
    fn is_enabled(&self) -> bool;
}

/// Delivers Wi-Fi availability changes. A new subscription replaces the old one.
pub trait ConnectivityNotifier: Send + Sync {
    fn subscribe(&self, callback: ChangeCallback);
    fn unsubscribe(&self);
}

pub trait SsidResolver: Send + Sync {
    fn resolve_current_ssid(&self) -> Option<String>;
}

pub trait PreferenceStore: Send + Sync {
    fn get_bool(&self, key: &str, default: bool) -> bool;
}

pub trait UnlockChallenge: Send + Sync {
    fn request_unlock(&self, on_success: Continuation);
}

/// The surface a tile is drawn on. Setters stage changes until `commit`.
pub trait TileSurface: Send {
    fn set_label(&mut self, label: &str);
    fn set_activation(&mut self, activation: Activation);
    fn set_icon(&mut self, icon: TileIcon);
    fn set_subtitle(&mut self, subtitle: &str);
    fn commit(&mut self);
    /// Drop whatever was last committed.
    fn discard(&mut self);
}

pub trait DialogSurface: Send + Sync {
    fn show_access_required_prompt(&self);
}
