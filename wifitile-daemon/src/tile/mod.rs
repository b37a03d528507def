/*!
 * Wi-Fi Tile Controller
 * Keeps the tile in step with the radio and performs the gated toggle
 */

pub mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info};

use crate::system::{
    ConnectivityNotifier, DialogSurface, NetworkChange, PreferenceStore, RadioState,
    ShellExecutor, SsidResolver, TileSurface, UnlockChallenge,
};
use state::{Activation, Lifecycle, TileIcon, TileLabels};

pub const REQUIRE_UNLOCK_KEY: &str = "require_unlock";

/// External services the controller reaches through.
#[derive(Clone)]
pub struct Services {
    pub shell: Arc<dyn ShellExecutor>,
    pub radio: Arc<dyn RadioState>,
    pub notifier: Arc<dyn ConnectivityNotifier>,
    pub ssid: Arc<dyn SsidResolver>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub unlock: Arc<dyn UnlockChallenge>,
    pub dialog: Arc<dyn DialogSurface>,
}

#[derive(Debug, Clone)]
pub struct ToggleCommands {
    pub enable: String,
    pub disable: String,
}

struct ControllerState {
    lifecycle: Lifecycle,
    wifi_connected: bool,
    // Bumped on every subscription so late notifications from an old one are dropped.
    generation: u64,
    surface: Box<dyn TileSurface>,
}

struct Inner {
    services: Services,
    labels: TileLabels,
    commands: ToggleCommands,
    state: Mutex<ControllerState>,
}

/// Cloneable handle to a single tile.
#[derive(Clone)]
pub struct TileController {
    inner: Arc<Inner>,
}

impl TileController {
    pub fn new(
        services: Services,
        surface: Box<dyn TileSurface>,
        labels: TileLabels,
        commands: ToggleCommands,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                services,
                labels,
                commands,
                state: Mutex::new(ControllerState {
                    lifecycle: Lifecycle::Detached,
                    wifi_connected: false,
                    generation: 0,
                    surface,
                }),
            }),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lock().lifecycle
    }

    pub fn wifi_connected(&self) -> bool {
        self.inner.lock().wifi_connected
    }

    pub fn on_attach(&self) {
        {
            let mut state = self.inner.lock();
            if state.lifecycle == Lifecycle::Detached {
                info!("Wi-Fi tile attached");
                state.lifecycle = Lifecycle::Idle;
            }
        }
        self.start_observing();
    }

    pub fn on_detach(&self) {
        self.stop_observing();

        let mut state = self.inner.lock();
        state.surface.discard();
        state.lifecycle = Lifecycle::Detached;
        info!("Wi-Fi tile detached");
    }

    pub fn on_start_observing(&self) {
        if self.lifecycle() == Lifecycle::Detached {
            debug!("Ignoring start-observing, tile is not attached");
            return;
        }
        self.start_observing();
    }

    pub fn on_stop_observing(&self) {
        self.stop_observing();
    }

    /// Applies a change delivered by the host rather than through our own subscription.
    pub fn on_connectivity_change(&self, change: NetworkChange) {
        self.apply_change(None, change);
    }

    pub fn on_click(&self) {
        if self.lifecycle() == Lifecycle::Detached {
            debug!("Ignoring click, tile is not attached");
            return;
        }

        let services = &self.inner.services;
        if !services.shell.has_access() {
            // Toggling the radio needs root or sudo; nothing else to fall back on.
            info!("Shell access unavailable, asking the user to grant it");
            services.dialog.show_access_required_prompt();
            return;
        }

        if services.preferences.get_bool(REQUIRE_UNLOCK_KEY, true) {
            let weak = Arc::downgrade(&self.inner);
            services.unlock.request_unlock(Box::new(move || {
                let Some(controller) = Self::upgrade(&weak) else {
                    return;
                };
                if controller.lifecycle() == Lifecycle::Detached {
                    debug!("Dropping unlocked toggle, tile was detached meanwhile");
                    return;
                }
                controller.toggle_and_sync();
            }));
        } else {
            self.toggle_and_sync();
        }
    }

    pub fn synchronize(&self) {
        let mut state = self.inner.lock();
        self.inner.synchronize(&mut state);
    }

    fn start_observing(&self) {
        debug!("Setting listeners");

        let services = &self.inner.services;
        if self.lifecycle() == Lifecycle::Observing {
            services.notifier.unsubscribe();
        }

        let generation = {
            let mut state = self.inner.lock();
            state.wifi_connected = false;
            state.generation += 1;
            state.lifecycle = Lifecycle::Observing;
            state.generation
        };

        let weak = Arc::downgrade(&self.inner);
        services.notifier.subscribe(Box::new(move |change| {
            if let Some(controller) = Self::upgrade(&weak) {
                controller.apply_change(Some(generation), change);
            }
        }));

        self.synchronize();
    }

    fn stop_observing(&self) {
        let was_observing = {
            let mut state = self.inner.lock();
            let observing = state.lifecycle == Lifecycle::Observing;
            if observing {
                state.lifecycle = Lifecycle::Idle;
            }
            observing
        };

        if was_observing {
            debug!("Removing listeners");
            self.inner.services.notifier.unsubscribe();
        }
    }

    fn apply_change(&self, generation: Option<u64>, change: NetworkChange) {
        let mut state = self.inner.lock();
        if state.lifecycle != Lifecycle::Observing
            || generation.is_some_and(|g| g != state.generation)
        {
            debug!(?change, "Dropping stale connectivity change");
            return;
        }

        state.wifi_connected = change == NetworkChange::Available;
        debug!(connected = state.wifi_connected, "Connectivity changed");
        self.inner.synchronize(&mut state);
    }

    fn toggle_and_sync(&self) {
        let services = &self.inner.services;
        let command = if services.radio.is_enabled() {
            &self.inner.commands.disable
        } else {
            &self.inner.commands.enable
        };

        info!("Toggling Wi-Fi: {}", command);
        services.shell.execute(command);
        self.synchronize();
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn synchronize(&self, state: &mut ControllerState) {
        if state.lifecycle == Lifecycle::Detached {
            return;
        }

        let surface = &mut state.surface;
        if self.services.radio.is_enabled() {
            let ssid = if state.wifi_connected {
                self.services
                    .ssid
                    .resolve_current_ssid()
                    .filter(|ssid| !ssid.trim().is_empty())
            } else {
                None
            };

            surface.set_label(ssid.as_deref().unwrap_or(&self.labels.wifi));
            surface.set_activation(Activation::Active);
            surface.set_icon(TileIcon::Signal);
            surface.set_subtitle(&self.labels.on);
        } else {
            surface.set_label(&self.labels.wifi);
            surface.set_activation(Activation::Inactive);
            surface.set_icon(TileIcon::NoSignal);
            surface.set_subtitle(&self.labels.off);
        }

        surface.commit();
    }
}

#[cfg(test)]
#[path = "../tests/tile_tests.rs"]
mod tests;
