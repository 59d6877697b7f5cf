//! Streamview client binary entry point
//!
//! Connects to a streaming device's signaling endpoint, negotiates a media
//! session and logs arriving tracks. The presentation surface is external;
//! this binary is the process bootstrap around the signaling core.
//!
//! # Usage
//!
//! ```bash
//! # Connect with defaults (ws://localhost:9000/ws, Google STUN)
//! cargo run --bin streamview_client
//!
//! # Custom signaling endpoint
//! cargo run --bin streamview_client -- --signaling-url ws://camera.local:9000/ws
//!
//! # Or via environment
//! STREAMVIEW_SIGNALING_URL="wss://camera.example.com/ws" cargo run --bin streamview_client
//! ```
//!
//! # Environment Variables
//!
//! - `STREAMVIEW_SIGNALING_URL`: signaling WebSocket URL (default: `ws://localhost:9000/ws`)
//! - `STREAMVIEW_STUN_SERVERS`: comma-separated STUN server URLs
//! - `STREAMVIEW_TURN_SERVERS`: comma-separated `turn:host:port:username:credential` entries
//! - `STREAMVIEW_ICE_TIMEOUT_SECS`: ICE connection timeout (default: `30`)
//! - `RUST_LOG`: logging level (default: `info`)

use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamview_signaling::{
    MediaPeer, SessionConfig, SessionController, SignalingTransport, TurnServerConfig, WebRtcPeer,
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "streamview_client", version, about = "Signaling client for live camera streams")]
struct Args {
    /// Signaling endpoint (ws:// or wss://)
    #[arg(
        long,
        env = "STREAMVIEW_SIGNALING_URL",
        default_value = "ws://localhost:9000/ws"
    )]
    signaling_url: String,

    /// STUN server URLs
    #[arg(
        long,
        env = "STREAMVIEW_STUN_SERVERS",
        default_value = "stun:stun.l.google.com:19302",
        value_delimiter = ','
    )]
    stun_servers: Vec<String>,

    /// TURN servers as turn:host:port:username:credential entries
    #[arg(long, env = "STREAMVIEW_TURN_SERVERS", value_delimiter = ',')]
    turn_servers: Vec<String>,

    /// ICE connection timeout in seconds
    #[arg(long, env = "STREAMVIEW_ICE_TIMEOUT_SECS", default_value_t = 30)]
    ice_timeout_secs: u32,
}

fn main() -> anyhow::Result<()> {
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_handler = Arc::clone(&shutdown_flag);

    ctrlc::set_handler(move || {
        let was_already_set = shutdown_flag_handler.swap(true, Ordering::SeqCst);
        if was_already_set {
            eprintln!("Shutdown already in progress, forcing immediate exit");
            std::process::exit(0);
        }

        eprintln!("Shutdown requested, closing session...");

        // Give it a moment for graceful shutdown
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(3));
            eprintln!("Graceful shutdown timeout (3s), forcing exit");
            std::process::exit(0);
        });
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("streamview-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(shutdown_flag))
}

async fn async_main(shutdown_flag: Arc<AtomicBool>) -> anyhow::Result<()> {
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Streamview client starting"
    );

    let config = load_config(Args::parse())?;

    info!(
        signaling_url = %config.signaling_url,
        stun_servers = config.stun_servers.len(),
        turn_servers = config.turn_servers.len(),
        ice_timeout_secs = config.ice_timeout_secs,
        "Configuration loaded"
    );

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (peer_events_tx, mut peer_events_rx) = mpsc::unbounded_channel();
    let (track_tx, mut track_rx) = mpsc::unbounded_channel();

    let peer = Arc::new(WebRtcPeer::new(&config, peer_events_tx).await?);

    // Peer notifications join the session's single event stream
    let forward_tx = events_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = peer_events_rx.recv().await {
            if forward_tx.send(event.into()).is_err() {
                break;
            }
        }
    });

    let transport = SignalingTransport::connect(&config.signaling_url, events_tx.clone()).await?;

    let peer_handle: Arc<dyn MediaPeer> = peer.clone();
    let (controller, mut state_rx) =
        SessionController::new(peer_handle, transport.sender(), events_tx, track_tx);

    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            info!(state = ?*state_rx.borrow(), "Session state");
        }
    });

    // The presentation surface is external; arriving tracks are logged here
    tokio::spawn(async move {
        while let Some(track) = track_rx.recv().await {
            info!(
                id = %track.id,
                kind = %track.kind,
                mime_type = %track.mime_type,
                "Media track available"
            );
        }
    });

    let session = tokio::spawn(controller.run(events_rx));

    info!("Session running. Press Ctrl+C to shutdown.");

    while !shutdown_flag.load(Ordering::SeqCst) && !session.is_finished() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    info!("Cleaning up...");

    session.abort();
    transport.close();
    if let Err(e) = peer.close().await {
        warn!(error = %e, "Peer teardown failed");
    }

    info!("Session ended");

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(args: Args) -> anyhow::Result<SessionConfig> {
    // TURN entry format: turn:host:port:username:credential
    let turn_servers = args
        .turn_servers
        .iter()
        .filter_map(|entry| {
            let parts: Vec<&str> = entry.trim().split(':').collect();
            if parts.len() >= 5 {
                Some(TurnServerConfig {
                    url: format!("{}:{}:{}", parts[0], parts[1], parts[2]),
                    username: parts[3].to_string(),
                    credential: parts[4].to_string(),
                })
            } else {
                warn!(%entry, "Skipping malformed TURN server entry");
                None
            }
        })
        .collect();

    let config = SessionConfig {
        signaling_url: args.signaling_url,
        stun_servers: args
            .stun_servers
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        turn_servers,
        ice_timeout_secs: args.ice_timeout_secs,
    };

    config.validate()?;

    Ok(config)
}
