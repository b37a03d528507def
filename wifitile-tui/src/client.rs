/*!
 * WIFITILE Daemon Client
 * JSON IPC communication with wifitiled
 */

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::mpsc;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    GetState,
    Click,
    CancelUnlock,
    Subscribe,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    State {
        lifecycle: Lifecycle,
        tile: Option<TileState>,
    },
    Success {
        message: String,
    },
    Error {
        message: String,
    },
    Pending {
        message: String,
    },
    Event {
        event: TileEvent,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Detached,
    Idle,
    Observing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileIcon {
    Signal,
    NoSignal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileState {
    pub label: String,
    pub activation: Activation,
    pub icon: TileIcon,
    pub subtitle: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum TileEvent {
    StateChanged { tile: TileState },
    AccessRequired,
    UnlockRequested,
    UnlockResolved,
    Discarded,
}

/// What the reader task hands to the UI loop.
#[derive(Debug)]
pub enum ClientMessage {
    Response(Response),
    Disconnected(ClientError),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon closed the connection")]
    Closed,
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

/// A subscribed connection. Responses and events arrive on the channel given to
/// [`TileClient::subscribe`]; requests go out through [`TileClient::send`].
pub struct TileClient {
    writer: OwnedWriteHalf,
}

impl TileClient {
    pub async fn subscribe(
        socket_path: &str,
        tx: mpsc::UnboundedSender<ClientMessage>,
    ) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).await?;
        let (reader, writer) = stream.into_split();
        let mut client = Self { writer };
        client.send(&Request::Subscribe).await?;

        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            let reason = loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match serde_json::from_str::<Response>(&line) {
                        Ok(response) => {
                            if tx.send(ClientMessage::Response(response)).is_err() {
                                return;
                            }
                        }
                        // Unknown messages from a newer daemon are skipped
                        Err(_) => continue,
                    },
                    Ok(None) => break ClientError::Closed,
                    Err(e) => break ClientError::Io(e),
                }
            };
            let _ = tx.send(ClientMessage::Disconnected(reason));
        });

        Ok(client)
    }

    pub async fn send(&mut self, request: &Request) -> Result<()> {
        let mut json = serde_json::to_string(request)?;
        json.push('\n');
        self.writer.write_all(json.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_daemon_event() {
        let line = r#"{"type":"Event","event":{"event":"StateChanged","tile":{"label":"MyNet","activation":"Active","icon":"Signal","subtitle":"On","updated_at":"2026-10-19T08:30:00Z"}}}"#;

        match serde_json::from_str::<Response>(line).unwrap() {
            Response::Event {
                event: TileEvent::StateChanged { tile },
            } => {
                assert_eq!(tile.label, "MyNet");
                assert_eq!(tile.activation, Activation::Active);
                assert_eq!(tile.icon, TileIcon::Signal);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn parses_pending_click_and_discard() {
        let pending = r#"{"type":"Pending","message":"Unlock your session to toggle Wi-Fi"}"#;
        assert!(matches!(
            serde_json::from_str::<Response>(pending).unwrap(),
            Response::Pending { .. }
        ));

        let discarded = r#"{"type":"Event","event":{"event":"Discarded"}}"#;
        assert!(matches!(
            serde_json::from_str::<Response>(discarded).unwrap(),
            Response::Event { event: TileEvent::Discarded }
        ));
    }

    #[test]
    fn serializes_requests_with_type_tag() {
        assert_eq!(
            serde_json::to_string(&Request::CancelUnlock).unwrap(),
            r#"{"type":"CancelUnlock"}"#
        );
    }
}
