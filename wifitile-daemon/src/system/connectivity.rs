/*!
 * Connectivity Watcher
 * Follows rtnetlink link notifications for the Wi-Fi interface
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use netlink_packet_core::{NetlinkMessage, NetlinkPayload};
use netlink_packet_route::link::{LinkAttribute, State};
use netlink_packet_route::RouteNetlinkMessage;
use netlink_sys::{protocols::NETLINK_ROUTE, AsyncSocket, AsyncSocketExt, SocketAddr, TokioSocket};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::{ChangeCallback, ConnectivityNotifier, NetworkChange};

pub const DEFAULT_SYSFS_NET: &str = "/sys/class/net";

// Multicast group for link up/down notifications
const RTMGRP_LINK: u32 = 1;

pub struct LinkWatcher {
    interface: String,
    operstate_path: PathBuf,
    runtime: Handle,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LinkWatcher {
    pub fn new(sysfs_net: impl AsRef<Path>, interface: &str, runtime: Handle) -> Self {
        Self {
            interface: interface.to_string(),
            operstate_path: sysfs_net.as_ref().join(interface).join("operstate"),
            runtime,
            task: Mutex::new(None),
        }
    }

    fn replace_task(&self, task: Option<JoinHandle<()>>) {
        let mut current = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *current, task) {
            previous.abort();
        }
    }
}

fn link_up(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|state| state.trim() == "up")
        .unwrap_or(false)
}

fn open_link_socket() -> std::io::Result<TokioSocket> {
    let mut socket = TokioSocket::new(NETLINK_ROUTE)?;
    socket.socket_mut().bind(&SocketAddr::new(0, RTMGRP_LINK))?;
    Ok(socket)
}

/// Maps two consecutive link readings to the change they represent.
/// A link that is already down on the first reading reports nothing.
pub fn transition(previous: Option<bool>, current: bool) -> Option<NetworkChange> {
    match (previous, current) {
        (Some(was_up), is_up) if was_up == is_up => None,
        (None, false) => None,
        (_, true) => Some(NetworkChange::Available),
        (_, false) => Some(NetworkChange::Lost),
    }
}

/// Operstates reported for `interface` in one netlink datagram, in order.
/// A removed link counts as down.
pub fn link_states(mut buffer: &[u8], interface: &str) -> Vec<bool> {
    let mut states = Vec::new();

    while !buffer.is_empty() {
        let message = match NetlinkMessage::<RouteNetlinkMessage>::deserialize(buffer) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Skipping undecodable netlink message: {}", e);
                break;
            }
        };
        let length = message.header.length as usize;

        if let NetlinkPayload::InnerMessage(inner) = message.payload {
            let (link, removed) = match inner {
                RouteNetlinkMessage::NewLink(link) => (link, false),
                RouteNetlinkMessage::DelLink(link) => (link, true),
                _ => (Default::default(), false),
            };

            let matches = link
                .attributes
                .iter()
                .any(|attr| matches!(attr, LinkAttribute::IfName(name) if name == interface));
            if matches {
                let up = !removed
                    && link
                        .attributes
                        .iter()
                        .any(|attr| matches!(attr, LinkAttribute::OperState(State::Up)));
                states.push(up);
            }
        }

        if length == 0 || length > buffer.len() {
            break;
        }
        buffer = &buffer[length..];
    }

    states
}

impl ConnectivityNotifier for LinkWatcher {
    fn subscribe(&self, callback: ChangeCallback) {
        let callback: Arc<dyn Fn(NetworkChange) + Send + Sync> = Arc::from(callback);
        let interface = self.interface.clone();
        let operstate_path = self.operstate_path.clone();

        tracing::debug!("Watching link state of {}", interface);
        let task = self.runtime.spawn(async move {
            let deliver = |change: NetworkChange| {
                let callback = Arc::clone(&callback);
                async move {
                    tracing::debug!(?change, "Wi-Fi link changed");
                    if let Err(e) = tokio::task::spawn_blocking(move || callback(change)).await {
                        tracing::warn!("Connectivity callback panicked: {}", e);
                    }
                }
            };

            // Join the multicast group before the initial reading so no edge slips between them
            let socket = open_link_socket();
            let initial = link_up(&operstate_path);
            if let Some(change) = transition(None, initial) {
                deliver(change).await;
            }
            let mut previous = Some(initial);

            let mut socket = match socket {
                Ok(socket) => socket,
                Err(e) => {
                    tracing::warn!("Unable to open rtnetlink socket: {}", e);
                    return;
                }
            };

            loop {
                let buffer = match socket.recv_from_full().await {
                    Ok((buffer, _)) => buffer,
                    Err(e) => {
                        tracing::warn!("rtnetlink receive failed: {}", e);
                        return;
                    }
                };

                for up in link_states(&buffer, &interface) {
                    if let Some(change) = transition(previous, up) {
                        deliver(change).await;
                    }
                    previous = Some(up);
                }
            }
        });

        self.replace_task(Some(task));
    }

    fn unsubscribe(&self) {
        self.replace_task(None);
    }
}

impl Drop for LinkWatcher {
    fn drop(&mut self) {
        self.replace_task(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlink_packet_core::NetlinkHeader;
    use netlink_packet_route::link::LinkMessage;
    use tokio::sync::mpsc;

    fn datagram(links: Vec<RouteNetlinkMessage>) -> Vec<u8> {
        let mut buffer = Vec::new();
        for inner in links {
            let mut message = NetlinkMessage::new(NetlinkHeader::default(), NetlinkPayload::InnerMessage(inner));
            message.finalize();
            let start = buffer.len();
            buffer.resize(start + message.buffer_len(), 0);
            message.serialize(&mut buffer[start..]);
        }
        buffer
    }

    fn link(name: &str, state: State) -> LinkMessage {
        let mut link = LinkMessage::default();
        link.attributes.push(LinkAttribute::IfName(name.to_string()));
        link.attributes.push(LinkAttribute::OperState(state));
        link
    }

    #[test]
    fn transitions_only_report_edges() {
        assert_eq!(transition(None, true), Some(NetworkChange::Available));
        assert_eq!(transition(None, false), None);
        assert_eq!(transition(Some(true), true), None);
        assert_eq!(transition(Some(true), false), Some(NetworkChange::Lost));
        assert_eq!(transition(Some(false), true), Some(NetworkChange::Available));
    }

    #[test]
    fn link_messages_for_other_interfaces_are_ignored() {
        let buffer = datagram(vec![
            RouteNetlinkMessage::NewLink(link("eth0", State::Up)),
            RouteNetlinkMessage::NewLink(link("wlan0", State::Dormant)),
            RouteNetlinkMessage::NewLink(link("wlan0", State::Up)),
            RouteNetlinkMessage::DelLink(link("wlan0", State::Up)),
        ]);

        assert_eq!(link_states(&buffer, "wlan0"), vec![false, true, false]);
        assert_eq!(link_states(&buffer, "wlp2s0"), Vec::<bool>::new());
    }

    #[tokio::test]
    async fn reports_initial_link_until_unsubscribed() {
        let sysfs = tempfile::tempdir().unwrap();
        let iface = sysfs.path().join("wlan0");
        fs::create_dir_all(&iface).unwrap();
        fs::write(iface.join("operstate"), "up\n").unwrap();

        let watcher = LinkWatcher::new(sysfs.path(), "wlan0", Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();
        watcher.subscribe(Box::new(move |change| {
            let _ = tx.send(change);
        }));

        assert_eq!(rx.recv().await, Some(NetworkChange::Available));

        watcher.unsubscribe();
        // The task owned the only sender.
        assert_eq!(rx.recv().await, None);
    }
}
