/*!
 * WIFITILE Quick-Toggle Wi-Fi Tile Daemon
 * One tile, one radio, no bloat
 * Onyx Digital Intelligence Development LLC
 */

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

mod config;
mod ipc;
mod system;
mod tile;

use config::DaemonConfig;
use ipc::{IpcServer, Request, Response};
use system::connectivity::LinkWatcher;
use system::logind::watch_session_lock;
use system::prefs::TomlPreferences;
use system::radio::RfkillRadio;
use system::shell::PrivilegedShell;
use system::ssid::IwSsidResolver;
use system::surface::{EventDialog, WatchSurface};
use system::unlock::SessionUnlock;
use tile::{Services, TileController, ToggleCommands};

#[derive(Parser)]
#[command(name = "wifitiled")]
#[command(about = "WIFITILE Quick-Toggle Wi-Fi Tile Daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "/etc/wifitile/wifitiled.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon
    Run,
    /// Show the current tile
    Status,
    /// Click the tile
    Toggle,
    /// Write a boolean preference
    Pref {
        key: String,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("wifitile_daemon={}", log_level))
        .init();

    // Load configuration
    let config = DaemonConfig::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(config).await,
        Commands::Status => check_status(&config).await,
        Commands::Toggle => toggle(&config).await,
        Commands::Pref { key, value } => set_preference(&config, &key, value),
    }
}

async fn run_daemon(config: DaemonConfig) -> Result<()> {
    info!("WIFITILE daemon starting...");

    let (state_tx, state_rx) = watch::channel(None);
    let (events_tx, _) = broadcast::channel(32);

    let unlock = Arc::new(SessionUnlock::new(events_tx.clone()));
    // Without logind the session stays locked as far as the tile knows
    let _session_watch = match watch_session_lock(config.wifi.session_id.clone(), unlock.clone()).await {
        Ok(watch) => Some(watch),
        Err(e) => {
            warn!("Session lock state unavailable, toggles needing unlock will wait: {}", e);
            None
        }
    };
    let services = Services {
        shell: Arc::new(PrivilegedShell::new(config.wifi.use_sudo)),
        radio: Arc::new(RfkillRadio::new(&config.wifi.rfkill_root)),
        notifier: Arc::new(LinkWatcher::new(
            &config.wifi.sysfs_net_root,
            &config.wifi.interface,
            Handle::current(),
        )),
        ssid: Arc::new(IwSsidResolver::new(&config.wifi.interface)),
        preferences: Arc::new(TomlPreferences::new(&config.preferences.path)),
        unlock: unlock.clone(),
        dialog: Arc::new(EventDialog::new(events_tx.clone())),
    };
    let controller = TileController::new(
        services,
        Box::new(WatchSurface::new(state_tx, events_tx.clone())),
        config.labels.clone(),
        ToggleCommands {
            enable: config.wifi.enable_command.clone(),
            disable: config.wifi.disable_command.clone(),
        },
    );

    // A stale socket from an unclean shutdown blocks bind
    let socket_path = Path::new(&config.socket_path);
    if socket_path.exists() {
        fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(socket_path)?;

    let attached = controller.clone();
    tokio::task::spawn_blocking(move || attached.on_attach()).await?;

    let ipc_server = IpcServer::new(listener, controller.clone(), unlock, state_rx, events_tx);
    info!("WIFITILE daemon ready on socket: {}", config.socket_path);

    tokio::select! {
        result = ipc_server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    tokio::task::spawn_blocking(move || controller.on_detach()).await?;
    let _ = fs::remove_file(socket_path);

    Ok(())
}

async fn check_status(config: &DaemonConfig) -> Result<()> {
    match ipc::send_request(&config.socket_path, &Request::GetState).await? {
        Response::State { lifecycle, tile } => {
            println!("Tile: {:?}", lifecycle);
            match tile {
                Some(tile) => {
                    println!("Label: {}", tile.label);
                    println!("State: {:?} ({})", tile.activation, tile.subtitle);
                    println!("Updated: {}", tile.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
                None => println!("Nothing committed yet"),
            }
            Ok(())
        }
        Response::Error { message } => bail!(message),
        other => bail!("Unexpected response: {:?}", other),
    }
}

async fn toggle(config: &DaemonConfig) -> Result<()> {
    match ipc::send_request(&config.socket_path, &Request::Click).await? {
        Response::Success { message } | Response::Pending { message } => {
            println!("{}", message);
            Ok(())
        }
        Response::Error { message } => bail!(message),
        other => bail!("Unexpected response: {:?}", other),
    }
}

fn set_preference(config: &DaemonConfig, key: &str, value: bool) -> Result<()> {
    let preferences = TomlPreferences::new(&config.preferences.path);
    preferences.set_bool(key, value)?;
    println!("{} = {} ({})", key, value, preferences.path().display());
    Ok(())
}
