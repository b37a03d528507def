use anyhow::Result;

use crate::client::{
    ClientMessage, Lifecycle, Request, Response, TileClient, TileEvent, TileState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialog {
    AccessRequired,
    Unlock,
}

pub struct App {
    pub tile: Option<TileState>,
    pub lifecycle: Option<Lifecycle>,
    pub dialog: Option<Dialog>,
    pub status: String,
    pub connected: bool,
    client: Option<TileClient>,
}

impl App {
    pub fn new(client: Option<TileClient>) -> Self {
        let connected = client.is_some();
        Self {
            tile: None,
            lifecycle: None,
            dialog: None,
            status: if connected {
                "Connected to wifitiled".to_string()
            } else {
                "Daemon not reachable".to_string()
            },
            connected,
            client,
        }
    }

    pub fn handle_message(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Response(response) => self.handle_response(response),
            ClientMessage::Disconnected(reason) => {
                self.connected = false;
                self.client = None;
                self.status = reason.to_string();
            }
        }
    }

    fn handle_response(&mut self, response: Response) {
        match response {
            Response::State { lifecycle, tile } => {
                self.lifecycle = Some(lifecycle);
                self.tile = tile;
            }
            Response::Success { message }
            | Response::Error { message }
            | Response::Pending { message } => self.status = message,
            Response::Event { event } => match event {
                TileEvent::StateChanged { tile } => self.tile = Some(tile),
                TileEvent::AccessRequired => self.dialog = Some(Dialog::AccessRequired),
                TileEvent::UnlockRequested => self.dialog = Some(Dialog::Unlock),
                TileEvent::UnlockResolved => {
                    if self.dialog == Some(Dialog::Unlock) {
                        self.dialog = None;
                    }
                }
                TileEvent::Discarded => {
                    self.tile = None;
                    self.status = "Tile removed".to_string();
                }
            },
        }
    }

    pub async fn click(&mut self) -> Result<()> {
        if self.dialog.is_some() {
            return Ok(());
        }
        self.send(Request::Click).await
    }

    /// Esc/n: abandons a pending unlock or closes the access prompt.
    pub async fn dismiss_dialog(&mut self) -> Result<()> {
        match self.dialog.take() {
            Some(Dialog::Unlock) => self.send(Request::CancelUnlock).await,
            Some(Dialog::AccessRequired) | None => Ok(()),
        }
    }

    pub async fn refresh(&mut self) -> Result<()> {
        self.send(Request::GetState).await
    }

    async fn send(&mut self, request: Request) -> Result<()> {
        match self.client.as_mut() {
            Some(client) => client.send(&request).await,
            None => {
                self.status = "Not connected to wifitiled".to_string();
                Ok(())
            }
        }
    }
}
