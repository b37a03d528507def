use super::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::system::surface::{EventDialog, WatchSurface};
use crate::system::{
    ChangeCallback, ConnectivityNotifier, PreferenceStore, RadioState, ShellExecutor,
    SsidResolver,
};
use crate::tile::state::{Activation, TileLabels};
use crate::tile::{Services, ToggleCommands};

struct StubHost {
    radio_enabled: AtomicBool,
    access: bool,
    commands: std::sync::Mutex<Vec<String>>,
}

impl ShellExecutor for StubHost {
    fn has_access(&self) -> bool {
        self.access
    }

    fn execute(&self, command: &str) {
        self.commands.lock().unwrap().push(command.to_string());
        self.radio_enabled
            .store(command == "radio on", Ordering::SeqCst);
    }
}

impl RadioState for StubHost {
    fn is_enabled(&self) -> bool {
        self.radio_enabled.load(Ordering::SeqCst)
    }
}

impl ConnectivityNotifier for StubHost {
    fn subscribe(&self, _callback: ChangeCallback) {}
    fn unsubscribe(&self) {}
}

impl SsidResolver for StubHost {
    fn resolve_current_ssid(&self) -> Option<String> {
        None
    }
}

impl PreferenceStore for StubHost {
    fn get_bool(&self, _key: &str, default: bool) -> bool {
        default
    }
}

struct Daemon {
    socket: String,
    host: Arc<StubHost>,
    unlock: Arc<SessionUnlock>,
    _dir: tempfile::TempDir,
}

async fn start_daemon(access: bool) -> Daemon {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("wifitile.sock").to_str().unwrap().to_string();

    let host = Arc::new(StubHost {
        radio_enabled: AtomicBool::new(true),
        access,
        commands: std::sync::Mutex::new(Vec::new()),
    });
    let (state_tx, state_rx) = watch::channel(None);
    let (events, _) = broadcast::channel(16);
    // No logind reading yet, so every toggle waits for an unlock.
    let unlock = Arc::new(SessionUnlock::new(events.clone()));

    let services = Services {
        shell: host.clone(),
        radio: host.clone(),
        notifier: host.clone(),
        ssid: host.clone(),
        preferences: host.clone(),
        unlock: unlock.clone(),
        dialog: Arc::new(EventDialog::new(events.clone())),
    };
    let controller = TileController::new(
        services,
        Box::new(WatchSurface::new(state_tx, events.clone())),
        TileLabels::default(),
        ToggleCommands {
            enable: "radio on".to_string(),
            disable: "radio off".to_string(),
        },
    );

    let listener = UnixListener::bind(&socket).unwrap();
    let server = IpcServer::new(listener, controller, unlock.clone(), state_rx, events);
    tokio::spawn(server.run());

    Daemon {
        socket,
        host,
        unlock,
        _dir: dir,
    }
}

async fn next_response(lines: &mut tokio::io::Lines<BufReader<tokio::net::unix::OwnedReadHalf>>) -> Response {
    let line = lines.next_line().await.unwrap().expect("response line");
    serde_json::from_str(&line).unwrap()
}

async fn subscribe(socket: &str) -> (tokio::net::unix::OwnedWriteHalf, tokio::io::Lines<BufReader<tokio::net::unix::OwnedReadHalf>>) {
    let stream = UnixStream::connect(socket).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    writer.write_all(b"{\"type\":\"Subscribe\"}\n").await.unwrap();

    // The current tile arrives once the subscription is counted.
    assert!(matches!(
        next_response(&mut lines).await,
        Response::Event { event: TileEvent::StateChanged { .. } }
    ));
    (writer, lines)
}

async fn wait_for_lifecycle(socket: &str, expected: Lifecycle) {
    for _ in 0..100 {
        if let Response::State { lifecycle, .. } = send_request(socket, &Request::GetState).await.unwrap() {
            if lifecycle == expected {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("tile never reached {expected:?}");
}

#[test]
fn requests_use_tagged_json() {
    assert_eq!(serde_json::to_string(&Request::Click).unwrap(), r#"{"type":"Click"}"#);
    assert!(matches!(
        serde_json::from_str::<Request>(r#"{"type":"CancelUnlock"}"#).unwrap(),
        Request::CancelUnlock
    ));

    let event = Response::Event {
        event: TileEvent::AccessRequired,
    };
    assert_eq!(
        serde_json::to_string(&event).unwrap(),
        r#"{"type":"Event","event":{"event":"AccessRequired"}}"#
    );
}

#[tokio::test]
async fn get_state_reflects_lifecycle() {
    let daemon = start_daemon(true).await;

    let response = send_request(&daemon.socket, &Request::GetState).await.unwrap();
    assert!(matches!(
        response,
        Response::State { lifecycle: Lifecycle::Detached, tile: None }
    ));

    let response = send_request(&daemon.socket, &Request::Attach).await.unwrap();
    assert!(matches!(response, Response::Success { .. }));

    match send_request(&daemon.socket, &Request::GetState).await.unwrap() {
        Response::State { lifecycle, tile: Some(tile) } => {
            assert_eq!(lifecycle, Lifecycle::Observing);
            assert_eq!(tile.label, "Wi-Fi");
            assert_eq!(tile.activation, Activation::Active);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_request_reports_error() {
    let daemon = start_daemon(true).await;

    let stream = UnixStream::connect(&daemon.socket).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    writer.write_all(b"{\"type\":\"Reboot\"}\n").await.unwrap();
    // Only logind can answer an unlock.
    writer.write_all(b"{\"type\":\"ConfirmUnlock\"}\n").await.unwrap();

    let mut lines = BufReader::new(reader).lines();
    assert!(matches!(next_response(&mut lines).await, Response::Error { .. }));
    assert!(matches!(next_response(&mut lines).await, Response::Error { .. }));
}

#[tokio::test]
async fn click_without_access_reports_error() {
    let daemon = start_daemon(false).await;
    send_request(&daemon.socket, &Request::Attach).await.unwrap();

    match send_request(&daemon.socket, &Request::Click).await.unwrap() {
        Response::Error { message } => assert!(message.contains("Shell access required")),
        other => panic!("unexpected response: {other:?}"),
    }
    assert!(daemon.host.commands.lock().unwrap().is_empty());
}

#[tokio::test]
async fn click_on_detached_tile_reports_error() {
    let daemon = start_daemon(true).await;

    let response = send_request(&daemon.socket, &Request::Click).await.unwrap();
    assert!(matches!(response, Response::Error { .. }));
}

#[tokio::test]
async fn subscriber_sees_access_prompt() {
    let daemon = start_daemon(false).await;
    send_request(&daemon.socket, &Request::Attach).await.unwrap();
    let (mut writer, mut lines) = subscribe(&daemon.socket).await;

    writer.write_all(b"{\"type\":\"Click\"}\n").await.unwrap();
    // The reply and the broadcast prompt may arrive in either order.
    let (mut prompted, mut refused) = (false, false);
    while !(prompted && refused) {
        match next_response(&mut lines).await {
            Response::Event { event: TileEvent::AccessRequired } => prompted = true,
            Response::Event { event: TileEvent::StateChanged { .. } } => continue,
            Response::Error { .. } => refused = true,
            other => panic!("unexpected response: {other:?}"),
        }
    }
    assert!(daemon.host.commands.lock().unwrap().is_empty());
}

#[tokio::test]
async fn locked_session_parks_click_until_unlocked() {
    let daemon = start_daemon(true).await;
    send_request(&daemon.socket, &Request::Attach).await.unwrap();

    let response = send_request(&daemon.socket, &Request::Click).await.unwrap();
    assert!(matches!(response, Response::Pending { .. }));
    assert!(daemon.host.commands.lock().unwrap().is_empty());

    daemon.unlock.on_lock_hint(true);
    assert!(daemon.host.commands.lock().unwrap().is_empty());

    daemon.unlock.on_lock_hint(false);
    assert_eq!(*daemon.host.commands.lock().unwrap(), vec!["radio off".to_string()]);

    match send_request(&daemon.socket, &Request::GetState).await.unwrap() {
        Response::State { tile: Some(tile), .. } => assert_eq!(tile.subtitle, "Off"),
        other => panic!("unexpected response: {other:?}"),
    }

    // Unlocked now, so the next click runs at once.
    let response = send_request(&daemon.socket, &Request::Click).await.unwrap();
    assert!(matches!(response, Response::Success { .. }));
    assert_eq!(daemon.host.commands.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn cancelled_unlock_leaves_radio_alone() {
    let daemon = start_daemon(true).await;
    send_request(&daemon.socket, &Request::Attach).await.unwrap();
    send_request(&daemon.socket, &Request::Click).await.unwrap();

    let response = send_request(&daemon.socket, &Request::CancelUnlock).await.unwrap();
    assert!(matches!(response, Response::Success { .. }));
    let response = send_request(&daemon.socket, &Request::CancelUnlock).await.unwrap();
    assert!(matches!(response, Response::Error { .. }));

    daemon.unlock.on_lock_hint(false);
    assert!(daemon.host.commands.lock().unwrap().is_empty());
}

#[tokio::test]
async fn last_subscriber_leaving_stops_observation() {
    let daemon = start_daemon(true).await;
    send_request(&daemon.socket, &Request::Attach).await.unwrap();

    let first = subscribe(&daemon.socket).await;
    let second = subscribe(&daemon.socket).await;

    drop(first);
    tokio::time::sleep(Duration::from_millis(50)).await;
    match send_request(&daemon.socket, &Request::GetState).await.unwrap() {
        Response::State { lifecycle, .. } => assert_eq!(lifecycle, Lifecycle::Observing),
        other => panic!("unexpected response: {other:?}"),
    }

    drop(second);
    wait_for_lifecycle(&daemon.socket, Lifecycle::Idle).await;

    // A new subscriber starts observing again.
    let _third = subscribe(&daemon.socket).await;
    wait_for_lifecycle(&daemon.socket, Lifecycle::Observing).await;
}
