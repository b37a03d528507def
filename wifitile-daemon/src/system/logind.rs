/*!
 * logind Session Lock Watcher
 * Reads LockedHint over the system bus and follows its PropertiesChanged signal
 */

use anyhow::Result;
use dbus::arg::{prop_cast, PropMap};
use dbus::message::SignalArgs;
use dbus::nonblock::stdintf::org_freedesktop_dbus::{Properties, PropertiesPropertiesChanged};
use dbus::nonblock::{MsgMatch, Proxy, SyncConnection};
use dbus::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::unlock::SessionUnlock;

const LOGIN1: &str = "org.freedesktop.login1";
const MANAGER_PATH: &str = "/org/freedesktop/login1";
const MANAGER_IFACE: &str = "org.freedesktop.login1.Manager";
const SESSION_IFACE: &str = "org.freedesktop.login1.Session";
const AUTO_SESSION_PATH: &str = "/org/freedesktop/login1/session/auto";
const TIMEOUT: Duration = Duration::from_secs(5);

/// Keeps the bus connection and signal match alive.
pub struct SessionLockWatch {
    _connection: Arc<SyncConnection>,
    _signal: MsgMatch,
}

pub async fn watch_session_lock(
    session_id: Option<String>,
    unlock: Arc<SessionUnlock>,
) -> Result<SessionLockWatch> {
    let (resource, connection) = dbus_tokio::connection::new_system_sync()?;
    tokio::spawn(async move {
        let err = resource.await;
        tracing::warn!("Lost connection to the system bus: {}", err);
    });

    // Readings are applied in order on the blocking pool; an unlock may run the toggle.
    let (tx, mut rx) = mpsc::unbounded_channel::<bool>();
    tokio::spawn(async move {
        while let Some(locked) = rx.recv().await {
            let unlock = unlock.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || unlock.on_lock_hint(locked)).await {
                tracing::warn!("Applying lock state failed: {}", e);
            }
        }
    });

    let session = session_path(&connection, session_id.as_deref()).await?;

    let rule = PropertiesPropertiesChanged::match_rule(Some(&LOGIN1.into()), Some(&session))
        .static_clone();
    let changes = tx.clone();
    let signal = connection
        .add_match(rule)
        .await?
        .cb(move |_, changed: PropertiesPropertiesChanged| {
            if changed.interface_name == SESSION_IFACE {
                if let Some(locked) = locked_hint(&changed.changed_properties) {
                    let _ = changes.send(locked);
                }
            }
            true
        });

    let proxy = Proxy::new(LOGIN1, session.clone(), TIMEOUT, connection.clone());
    let locked: bool = proxy.get(SESSION_IFACE, "LockedHint").await?;
    let _ = tx.send(locked);

    tracing::info!("Watching lock state of session {}", session);
    Ok(SessionLockWatch {
        _connection: connection,
        _signal: signal,
    })
}

async fn session_path(
    connection: &Arc<SyncConnection>,
    session_id: Option<&str>,
) -> Result<Path<'static>> {
    let id = match session_id {
        Some(id) => id.to_string(),
        None => {
            let auto = Proxy::new(LOGIN1, AUTO_SESSION_PATH, TIMEOUT, connection.clone());
            auto.get::<String>(SESSION_IFACE, "Id").await?
        }
    };

    let manager = Proxy::new(LOGIN1, MANAGER_PATH, TIMEOUT, connection.clone());
    let (path,): (Path<'static>,) = manager.method_call(MANAGER_IFACE, "GetSession", (id,)).await?;
    Ok(path)
}

pub fn locked_hint(properties: &PropMap) -> Option<bool> {
    prop_cast::<bool>(properties, "LockedHint").copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbus::arg::{RefArg, Variant};

    #[test]
    fn extracts_locked_hint_from_changed_properties() {
        let mut properties = PropMap::new();
        properties.insert("Active".to_string(), Variant(Box::new(true) as Box<dyn RefArg>));
        assert_eq!(locked_hint(&properties), None);

        properties.insert("LockedHint".to_string(), Variant(Box::new(false) as Box<dyn RefArg>));
        assert_eq!(locked_hint(&properties), Some(false));
    }
}
