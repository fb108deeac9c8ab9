//! CLI entry point for the WiFi car remote.
//!
//! Provides:
//! - `drive`: interactive terminal client (status, movement, camera, settings)
//! - `send`: connect, send one wire command, disconnect
//! - `endpoints`: print the URLs derived from the configured host
//! - `config`: print the effective configuration
//!
//! # Usage
//!
//! ```bash
//! wificar --host 192.168.4.1 drive
//! wificar send forward-left --wait 10s
//! WIFICAR_DEVICE__HOST=car.local wificar endpoints
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use wificar_remote::config::{ControlConfig, DEFAULT_CONFIG_PATH};
use wificar_remote::endpoint::DeviceEndpoint;
use wificar_remote::input::console::HELP;
use wificar_remote::input::{CameraDrag, ConsoleAction, MovementController, MovementInput};
use wificar_remote::logging;
use wificar_remote::protocol::Command;
use wificar_remote::settings::WifiModeAction;
use wificar_remote::status::{ConsoleView, StatusPresenter};
use wificar_remote::stream::StreamSlot;
use wificar_remote::transport::websocket::WebSocketConnector;
use wificar_remote::{ConnectionManager, ControlHandle};

/// Time given to the socket writer to flush before the runtime exits.
const FLUSH_GRACE: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "wificar")]
#[command(about = "Remote control for the ESP32 WiFi camera car", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Car host name or address (overrides the configuration)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Log level (overrides the configuration; RUST_LOG wins over both)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal client
    Drive,

    /// Send one wire command (e.g. `forward`, `toggleFlash`, `cameraDrag_10_-5`)
    Send {
        /// Wire command
        command: String,

        /// How long to wait for the connection
        #[arg(long, default_value = "5s", value_parser = humantime_serde::re::humantime::parse_duration)]
        wait: Duration,
    },

    /// Print the control, stream and WiFi setup URLs
    Endpoints,

    /// Print the effective configuration
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ControlConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(host) = cli.host {
        config.device.host = host;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;
    logging::init_from_config(&config)?;

    match cli.command {
        Commands::Drive => drive(&config).await,
        Commands::Send { command, wait } => send_one(&config, &command, wait).await,
        Commands::Endpoints => {
            let endpoint = config.endpoint()?;
            println!("🎮 Control:    {}", endpoint.control_url()?);
            println!("🎥 Stream:     {}", endpoint.stream_url()?);
            println!("📡 WiFi setup: {}", endpoint.wifi_setup_url()?);
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn send_one(config: &ControlConfig, command: &str, wait: Duration) -> Result<()> {
    let command: Command = command.parse()?;
    let endpoint = config.endpoint()?;

    let (manager, handle) = ConnectionManager::new(
        config.manager_config(),
        &endpoint,
        WebSocketConnector::new(),
        StreamSlot::new(),
    )?;
    let task = manager.spawn();

    handle.start()?;
    handle
        .wait_connected(wait)
        .await
        .with_context(|| format!("connecting to {endpoint}"))?;
    handle.send(command)?;
    println!("✅ Sent '{}' to {}", command, endpoint);

    handle.stop()?;
    drop(handle);
    task.await?;
    tokio::time::sleep(FLUSH_GRACE).await;
    Ok(())
}

async fn drive(config: &ControlConfig) -> Result<()> {
    let endpoint = config.endpoint()?;
    let stream = StreamSlot::new();
    let mut stream_source = stream.subscribe();

    let (manager, handle) = ConnectionManager::new(
        config.manager_config(),
        &endpoint,
        WebSocketConnector::new(),
        stream,
    )?;
    let manager_task = manager.spawn();

    let presenter = StatusPresenter::new(ConsoleView::stdout(), config.timing.status_hide_delay);
    let presenter_task = tokio::spawn(presenter.run(handle.subscribe(), handle.watch_status()));

    let stream_task = tokio::spawn(async move {
        while stream_source.changed().await.is_ok() {
            if let Some(url) = stream_source.borrow_and_update().clone() {
                println!("🎥 Video stream: {url}");
            }
        }
    });

    let (movement_tx, movement_rx) = mpsc::channel(32);
    let movement = MovementController::new(handle.clone(), config.timing.movement_repeat);
    let movement_task = tokio::spawn(movement.run(movement_rx));
    let mut camera = CameraDrag::new(handle.clone(), config.input.drag_sensitivity);

    println!("🚗 WiFi car remote, connecting to {}", endpoint);
    println!("{HELP}");
    handle.start()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let action = match line.parse::<ConsoleAction>() {
            Ok(action) => action,
            Err(e) => {
                eprintln!("❌ {e} (type 'help')");
                continue;
            }
        };

        match action {
            ConsoleAction::Press(direction) => {
                movement_tx.send(MovementInput::Press(direction)).await?;
            }
            ConsoleAction::Release(direction) => {
                movement_tx.send(MovementInput::Release(direction)).await?;
            }
            ConsoleAction::Stop => movement_tx.send(MovementInput::ReleaseAll).await?,
            ConsoleAction::Flash => handle.send(Command::ToggleFlash)?,
            ConsoleAction::Frame(size) => handle.send(Command::SetFrameSize(size))?,
            ConsoleAction::Pan { dx, dy } => {
                camera.nudge(dx, dy);
            }
            ConsoleAction::Center => {
                camera.reset();
            }
            ConsoleAction::Wifi => switch_wifi_mode(&handle, &endpoint)?,
            ConsoleAction::Raw(command) => handle.send(command)?,
            ConsoleAction::Status => print_status(&handle),
            ConsoleAction::Help => println!("{HELP}"),
            ConsoleAction::Quit => break,
        }
    }

    println!("👋 Stopping");
    drop(movement_tx);
    movement_task.await?;
    handle.stop()?;
    drop(camera);
    drop(handle);
    manager_task.await?;
    presenter_task.await?;
    stream_task.await?;
    tokio::time::sleep(FLUSH_GRACE).await;
    Ok(())
}

fn switch_wifi_mode(handle: &ControlHandle, endpoint: &DeviceEndpoint) -> Result<()> {
    match handle.settings().wifi_mode_action(endpoint)? {
        WifiModeAction::Send(command) => {
            handle.send(command)?;
            println!("📡 Car is forgetting its network and rebooting as an access point");
        }
        WifiModeAction::OpenSetupPage(url) => {
            println!("🌐 Choose a network for the car at {url}");
            if let Err(e) = opener::open(url.as_str()) {
                tracing::warn!("Could not open a browser: {}", e);
            }
        }
        WifiModeAction::Unavailable => {
            println!("⏳ The car has not reported its WiFi mode yet");
        }
    }
    Ok(())
}

fn print_status(handle: &ControlHandle) {
    let status = handle.status();
    let settings = handle.settings();
    println!("🔌 Link: {}", handle.state());
    match status.signal {
        Some(signal) => println!("📶 Signal: {}dBm", signal.dbm()),
        None => println!("📶 Signal: n/a"),
    }
    println!(
        "💡 Flash: {}",
        settings.flash.map_or("n/a", |on| if on { "ON" } else { "OFF" })
    );
    match settings.frame_size {
        Some(size) => println!("🖼️  Frame size: {size}"),
        None => println!("🖼️  Frame size: n/a"),
    }
    match settings.wifi_mode {
        Some(mode) => println!("📡 WiFi: {mode:?}"),
        None => println!("📡 WiFi: n/a"),
    }
}
