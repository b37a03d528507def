/*!
 * Client-facing Surfaces
 * Committed tile state and dialogs are published to IPC subscribers
 */

use tokio::sync::{broadcast, watch};

use super::{DialogSurface, TileSurface};
use crate::tile::state::{Activation, TileDraft, TileEvent, TileIcon, TileState};

pub struct WatchSurface {
    draft: TileDraft,
    state_tx: watch::Sender<Option<TileState>>,
    events: broadcast::Sender<TileEvent>,
}

impl WatchSurface {
    pub fn new(
        state_tx: watch::Sender<Option<TileState>>,
        events: broadcast::Sender<TileEvent>,
    ) -> Self {
        Self {
            draft: TileDraft::default(),
            state_tx,
            events,
        }
    }
}

impl TileSurface for WatchSurface {
    fn set_label(&mut self, label: &str) {
        self.draft.label = label.to_string();
    }

    fn set_activation(&mut self, activation: Activation) {
        self.draft.activation = activation;
    }

    fn set_icon(&mut self, icon: TileIcon) {
        self.draft.icon = icon;
    }

    fn set_subtitle(&mut self, subtitle: &str) {
        self.draft.subtitle = subtitle.to_string();
    }

    fn commit(&mut self) {
        let tile = self.draft.snapshot();
        tracing::debug!(label = %tile.label, activation = ?tile.activation, "Tile updated");

        self.state_tx.send_replace(Some(tile.clone()));
        // No subscribers is fine.
        let _ = self.events.send(TileEvent::StateChanged { tile });
    }

    fn discard(&mut self) {
        self.draft = TileDraft::default();
        self.state_tx.send_replace(None);
        let _ = self.events.send(TileEvent::Discarded);
    }
}

pub struct EventDialog {
    events: broadcast::Sender<TileEvent>,
}

impl EventDialog {
    pub fn new(events: broadcast::Sender<TileEvent>) -> Self {
        Self { events }
    }
}

impl DialogSurface for EventDialog {
    fn show_access_required_prompt(&self) {
        tracing::warn!("Toggling Wi-Fi requires root or passwordless sudo");
        let _ = self.events.send(TileEvent::AccessRequired);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_publishes_state_and_event() {
        let (state_tx, state_rx) = watch::channel(None);
        let (events, mut rx) = broadcast::channel(8);
        let mut surface = WatchSurface::new(state_tx, events);

        surface.set_label("MyNet");
        surface.set_activation(Activation::Active);
        surface.set_icon(TileIcon::Signal);
        surface.set_subtitle("On");
        assert!(state_rx.borrow().is_none());

        surface.commit();
        let tile = state_rx.borrow().clone().unwrap();
        assert_eq!(tile.label, "MyNet");
        assert_eq!(tile.icon, TileIcon::Signal);
        assert!(matches!(rx.try_recv(), Ok(TileEvent::StateChanged { tile }) if tile.subtitle == "On"));

        surface.discard();
        assert!(state_rx.borrow().is_none());
    }

    #[test]
    fn discard_tells_subscribers() {
        let (state_tx, _state_rx) = watch::channel(None);
        let (events, mut rx) = broadcast::channel(8);
        let mut surface = WatchSurface::new(state_tx, events);

        surface.commit();
        assert!(matches!(rx.try_recv(), Ok(TileEvent::StateChanged { .. })));

        surface.discard();
        assert!(matches!(rx.try_recv(), Ok(TileEvent::Discarded)));
    }

    #[test]
    fn dialog_broadcasts_access_required() {
        let (events, mut rx) = broadcast::channel(8);
        EventDialog::new(events).show_access_required_prompt();
        assert!(matches!(rx.try_recv(), Ok(TileEvent::AccessRequired)));
    }
}
