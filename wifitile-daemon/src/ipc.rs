/*!
 * IPC Server for WIFITILE Daemon
 * JSON protocol over Unix socket
 */

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, watch, Mutex};
use uuid::Uuid;

use crate::system::unlock::SessionUnlock;
use crate::tile::state::{Lifecycle, TileEvent, TileState};
use crate::tile::TileController;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    GetState,
    Click,
    Attach,
    Detach,
    StartObserving,
    StopObserving,
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
    /// The request is parked until something outside the client happens.
    Pending {
        message: String,
    },
    Event {
        event: TileEvent,
    },
}

impl Response {
    fn success(message: impl Into<String>) -> Self {
        Response::Success {
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}

#[derive(Clone)]
struct Context {
    controller: TileController,
    unlock: Arc<SessionUnlock>,
    state_rx: watch::Receiver<Option<TileState>>,
    events: broadcast::Sender<TileEvent>,
    // Held across the observation change so joins and leaves apply in order
    subscribers: Arc<Mutex<usize>>,
}

pub struct IpcServer {
    listener: UnixListener,
    context: Context,
}

impl IpcServer {
    pub fn new(
        listener: UnixListener,
        controller: TileController,
        unlock: Arc<SessionUnlock>,
        state_rx: watch::Receiver<Option<TileState>>,
        events: broadcast::Sender<TileEvent>,
    ) -> Self {
        Self {
            listener,
            context: Context {
                controller,
                unlock,
                state_rx,
                events,
                subscribers: Arc::new(Mutex::new(0)),
            },
        }
    }

    pub async fn run(self) -> Result<()> {
        tracing::info!("IPC server listening for connections...");

        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let client_id = Uuid::new_v4();
                    tracing::debug!(%client_id, "New client connected");
                    let context = self.context.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, client_id, context).await {
                            tracing::error!(%client_id, "Client error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

async fn handle_client(stream: UnixStream, client_id: Uuid, context: Context) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let request = line.trim();
        if request.is_empty() {
            continue;
        }
        tracing::debug!(%client_id, "Received request: {}", request);

        match serde_json::from_str::<Request>(request) {
            Ok(Request::Subscribe) => {
                return subscribe(&mut lines, &mut writer, client_id, &context).await;
            }
            Ok(request) => {
                let response = context.dispatch(request).await;
                write_response(&mut writer, &response).await?;
            }
            Err(e) => {
                write_response(&mut writer, &Response::error(format!("Invalid request: {e}")))
                    .await?;
            }
        }
    }

    tracing::debug!(%client_id, "Client disconnected");
    Ok(())
}

/// Streams tile events to a client. Subscribed clients count as the tile being
/// visible: the first one starts observation and the last one stops it.
async fn subscribe<R>(
    lines: &mut tokio::io::Lines<BufReader<R>>,
    writer: &mut OwnedWriteHalf,
    client_id: Uuid,
    context: &Context,
) -> Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut events = context.events.subscribe();

    let result = match context.join().await {
        Ok(()) => {
            tracing::info!(%client_id, "Client subscribed");
            stream_events(lines, writer, &mut events, context).await
        }
        Err(e) => Err(e),
    };

    // Runs on every path, the count was raised by join either way
    let left = context.leave().await;
    tracing::info!(%client_id, "Client unsubscribed");

    result.and(left)
}

async fn stream_events<R>(
    lines: &mut tokio::io::Lines<BufReader<R>>,
    writer: &mut OwnedWriteHalf,
    events: &mut broadcast::Receiver<TileEvent>,
    context: &Context,
) -> Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let current = context.state_rx.borrow().clone();
    if let Some(tile) = current {
        let event = TileEvent::StateChanged { tile };
        write_response(writer, &Response::Event { event }).await?;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => write_response(writer, &Response::Event { event }).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = match serde_json::from_str::<Request>(line.trim()) {
                    Ok(Request::Subscribe) => Response::error("Already subscribed"),
                    Ok(request) => context.dispatch(request).await,
                    Err(e) => Response::error(format!("Invalid request: {e}")),
                };
                write_response(writer, &response).await?;
            }
        }
    }
}

impl Context {
    async fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::GetState => Response::State {
                lifecycle: self.controller.lifecycle(),
                tile: self.state_rx.borrow().clone(),
            },
            Request::Click => self.click().await,
            Request::Attach => self.on_controller(|c| c.on_attach(), "Tile attached").await,
            Request::Detach => self.on_controller(|c| c.on_detach(), "Tile detached").await,
            Request::StartObserving => {
                self.on_controller(|c| c.on_start_observing(), "Observing connectivity")
                    .await
            }
            Request::StopObserving => {
                self.on_controller(|c| c.on_stop_observing(), "Stopped observing")
                    .await
            }
            Request::CancelUnlock => {
                if self.unlock.cancel() {
                    Response::success("Toggle cancelled")
                } else {
                    Response::error("No unlock pending")
                }
            }
            Request::Subscribe => Response::error("Subscribe must be sent on its own connection"),
        }
    }

    /// Clicks the tile and reports what the click led to. The controller only
    /// tells dialogs about missing access or a parked toggle, so those are
    /// collected from the event stream.
    async fn click(&self) -> Response {
        if self.controller.lifecycle() == Lifecycle::Detached {
            return Response::error("Tile is not attached");
        }

        let mut events = self.events.subscribe();
        if let Err(e) = self.run_blocking(|c| c.on_click()).await {
            return Response::error(format!("Tile action failed: {e}"));
        }

        let mut response = Response::success("Wi-Fi toggled");
        loop {
            match events.try_recv() {
                Ok(TileEvent::AccessRequired) => {
                    return Response::error(
                        "Shell access required: run wifitiled as root or allow passwordless sudo",
                    );
                }
                Ok(TileEvent::UnlockRequested) => {
                    response = Response::Pending {
                        message: "Unlock your session to toggle Wi-Fi".to_string(),
                    };
                }
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        response
    }

    async fn join(&self) -> Result<()> {
        let mut count = self.subscribers.lock().await;
        *count += 1;
        if *count == 1 {
            self.run_blocking(|c| c.on_start_observing()).await?;
        }
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        let mut count = self.subscribers.lock().await;
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.run_blocking(|c| c.on_stop_observing()).await?;
        }
        Ok(())
    }

    async fn on_controller<F>(&self, action: F, message: &str) -> Response
    where
        F: FnOnce(&TileController) + Send + 'static,
    {
        match self.run_blocking(action).await {
            Ok(()) => Response::success(message),
            Err(e) => Response::error(format!("Tile action failed: {e}")),
        }
    }

    async fn run_blocking<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&TileController) + Send + 'static,
    {
        let controller = self.controller.clone();
        tokio::task::spawn_blocking(move || action(&controller)).await?;
        Ok(())
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<()> {
    let mut json = serde_json::to_string(response)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    Ok(())
}

/// One-shot request used by the `status` and `toggle` subcommands.
pub async fn send_request(socket_path: &str, request: &Request) -> Result<Response> {
    let stream = UnixStream::connect(socket_path).await?;
    let (reader, mut writer) = stream.into_split();

    let mut json = serde_json::to_string(request)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;

    let mut lines = BufReader::new(reader).lines();
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow!("daemon closed the connection without replying"))?;

    Ok(serde_json::from_str(&line)?)
}

#[cfg(test)]
#[path = "tests/ipc_tests.rs"]
mod tests;
