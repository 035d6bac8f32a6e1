use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Input;
use huddle_client::media::{MediaSourceKind, SyntheticCapture};
use huddle_client::room::{ChatMessage, RoomHandle, RoomSnapshot};
use huddle_client::{ClientConfig, RoomSession, default_deps};
use huddle_core::RoomId;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Peer-to-peer meeting client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh room id.
    NewRoom,

    /// Join a room and read commands from stdin.
    Join {
        room: String,

        /// Relay WebSocket URL.
        #[arg(long)]
        server: Option<String>,

        /// Display name shown to other participants.
        #[arg(long)]
        name: Option<String>,

        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::NewRoom => {
            println!("{}", RoomId::new().to_string().green().bold());
        }
        Commands::Join {
            room,
            server,
            name,
            config,
        } => {
            let mut config = match config {
                Some(path) => ClientConfig::load(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => ClientConfig::default(),
            };
            if let Some(server) = server {
                config.signaling_url = server;
            }
            config.display_name = match name {
                Some(name) => name,
                None => Input::<String>::new()
                    .with_prompt("Your name")
                    .default(config.display_name.clone())
                    .interact_text()
                    .context("Failed to read display name")?,
            };
            join(RoomId::from(room), config).await?;
        }
    }

    Ok(())
}

async fn join(room: RoomId, config: ClientConfig) -> Result<()> {
    let capture = Arc::new(SyntheticCapture::new());
    capture.set_frame_pump(true);
    let deps = default_deps(&config, capture);

    println!("{} {}", "Joining room".cyan(), room.to_string().bold());
    let (session, handle) = RoomSession::join(room, config, deps)
        .await
        .context("Failed to join room")?;
    let room_task = session.spawn();

    let printer = tokio::spawn(print_updates(handle.clone()));
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !run_command(&handle, line.trim()).await {
            break;
        }
    }

    if let Err(e) = handle.leave().await {
        warn!("Leave did not complete cleanly: {}", e);
    }
    printer.abort();
    let _ = room_task.await;
    println!("{}", "Left the room.".yellow());
    Ok(())
}

/// Returns false once the user asked to leave.
async fn run_command(handle: &RoomHandle, line: &str) -> bool {
    let result = match line {
        "" => Ok(()),
        "/leave" | "/quit" => return false,
        "/help" => {
            print_help();
            Ok(())
        }
        "/mic" => handle.toggle_microphone().await,
        "/cam" => handle.toggle_camera().await,
        "/share" => handle.share_screen().await,
        "/unshare" => handle.stop_screen_share().await,
        "/rec" => handle.start_recording().await.map(|path| {
            println!("{} {}", "Recording to".magenta(), path.display());
        }),
        "/stoprec" => handle.stop_recording().await.map(|path| {
            println!("{} {}", "Recording saved:".magenta(), path.display());
        }),
        "/peers" => {
            print_peers(handle);
            Ok(())
        }
        text => handle.send_chat(text).await,
    };

    if let Err(e) = result {
        println!("{} {}", "error:".red().bold(), e);
    }
    true
}

fn print_help() {
    println!(
        "{}",
        "/mic /cam /share /unshare /rec /stoprec /peers /leave; anything else is chat".dimmed()
    );
}

fn print_peers(handle: &RoomHandle) {
    let peers = handle.peers().list();
    if peers.is_empty() {
        println!("{}", "Nobody else is here yet.".dimmed());
        return;
    }
    for peer in peers {
        let tracks: Vec<String> = peer.remote_tracks.iter().map(|k| k.to_string()).collect();
        println!(
            "  {} ({}) {:?}/{:?} [{}]",
            peer.display_name.bold(),
            peer.id,
            peer.state,
            peer.link,
            tracks.join(", ")
        );
    }
}

fn print_chat(message: &ChatMessage) {
    if message.is_system {
        println!("{}", message.text.dimmed());
    } else if message.is_local {
        println!("{}: {}", message.sender.green(), message.text);
    } else {
        println!("{}: {}", message.sender.cyan(), message.text);
    }
}

fn describe_media(snapshot: &RoomSnapshot) -> String {
    let source = match snapshot.media.source {
        Some(MediaSourceKind::Camera) => "camera",
        Some(MediaSourceKind::Screen) => "screen",
        None => "none",
    };
    format!(
        "source={} mic={} cam={}",
        source,
        if snapshot.media.audio_enabled { "on" } else { "off" },
        if snapshot.media.video_enabled { "on" } else { "off" },
    )
}

async fn print_updates(handle: RoomHandle) {
    let mut updates = handle.watch();
    let mut shown = 0;
    let mut media = String::new();
    let mut connected = true;

    loop {
        let snapshot = updates.borrow_and_update().clone();

        for message in snapshot.chat.iter().skip(shown) {
            print_chat(message);
        }
        shown = snapshot.chat.len();

        let now = describe_media(&snapshot);
        if now != media {
            println!("{}", now.blue());
            media = now;
        }

        if snapshot.signaling_connected != connected {
            connected = snapshot.signaling_connected;
            if connected {
                info!("Signaling restored");
            } else {
                println!("{}", "Relay connection lost, reconnecting...".yellow());
            }
        }

        if updates.changed().await.is_err() {
            break;
        }
    }
}
