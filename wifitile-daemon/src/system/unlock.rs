/*!
 * Session Unlock Challenge
 * Holds a deferred toggle until logind reports the session unlocked
 */

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use super::{Continuation, UnlockChallenge};
use crate::tile::state::TileEvent;

/// Tracks the session lock state fed in from logind. Until a reading arrives
/// the session counts as locked.
pub struct SessionUnlock {
    locked: Mutex<Option<bool>>,
    pending: Mutex<Option<Continuation>>,
    events: broadcast::Sender<TileEvent>,
}

impl SessionUnlock {
    pub fn new(events: broadcast::Sender<TileEvent>) -> Self {
        Self {
            locked: Mutex::new(None),
            pending: Mutex::new(None),
            events,
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<Continuation>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unlocked(&self) -> bool {
        *self.locked.lock().unwrap_or_else(PoisonError::into_inner) == Some(false)
    }

    pub fn is_pending(&self) -> bool {
        self.pending().is_some()
    }

    /// Records a `LockedHint` reading. An unlocked reading releases the pending toggle.
    pub fn on_lock_hint(&self, locked: bool) {
        *self.locked.lock().unwrap_or_else(PoisonError::into_inner) = Some(locked);
        tracing::debug!(locked, "Session lock state");
        if locked {
            return;
        }

        let Some(continuation) = self.pending().take() else {
            return;
        };
        tracing::info!("Session unlocked, running pending toggle");
        continuation();
        let _ = self.events.send(TileEvent::UnlockResolved);
    }

    /// Drops the pending continuation. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let abandoned = self.pending().take().is_some();
        if abandoned {
            tracing::info!("Unlock abandoned, toggle dropped");
            let _ = self.events.send(TileEvent::UnlockResolved);
        }
        abandoned
    }
}

impl UnlockChallenge for SessionUnlock {
    fn request_unlock(&self, on_success: Continuation) {
        if self.unlocked() {
            tracing::debug!("Session unlocked, running immediately");
            on_success();
            return;
        }

        if self.pending().replace(on_success).is_some() {
            tracing::debug!("Replacing an unlock request that was never answered");
        }
        let _ = self.events.send(TileEvent::UnlockRequested);
    }
}
