//! Signaling session client for receiving live camera streams over WebRTC
//!
//! This crate establishes a real-time media session with a streaming device
//! by exchanging session descriptions and connectivity candidates over a
//! WebSocket signaling channel, then hands control to the WebRTC transport
//! for the actual media flow. The core is the signaling state machine: which
//! messages are legal when, how descriptions are sequenced, how candidates
//! that race the offer are buffered, and how failures stay isolated from the
//! session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Streaming device (signaling endpoint)               │
//! │  ↕ (WebSocket text envelopes)                        │
//! │  SignalingTransport                                  │
//! │  ↕ (SessionEvent stream)                             │
//! │  SessionController  ── state machine, one per peer   │
//! │  ↕ (MediaPeer contract)                              │
//! │  WebRtcPeer  ── webrtc::RTCPeerConnection adapter    │
//! │     ↓                                                 │
//! │  remote media tracks → presentation sink             │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use streamview_signaling::{
//!     SessionConfig, SessionController, SignalingTransport, WebRtcPeer,
//! };
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! let config = SessionConfig::default();
//! config.validate()?;
//!
//! let (events_tx, events_rx) = mpsc::unbounded_channel();
//! let (peer_tx, peer_rx) = mpsc::unbounded_channel();
//! let (track_tx, track_rx) = mpsc::unbounded_channel();
//!
//! let peer = Arc::new(WebRtcPeer::new(&config, peer_tx).await?);
//! let transport = SignalingTransport::connect(&config.signaling_url, events_tx.clone()).await?;
//!
//! let (controller, state) =
//!     SessionController::new(peer, transport.sender(), events_tx, track_tx);
//! let final_state = controller.run(events_rx).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::{SessionConfig, TurnServerConfig};
pub use error::{Error, Result};
pub use peer::{MediaPeer, PeerEvent, RemoteTrack, WebRtcPeer};
pub use protocol::{ActionKind, IceCandidate, SessionDescription, SignalingEnvelope};
pub use session::{NegotiationStep, SessionController, SessionEvent, SessionState};
pub use transport::SignalingTransport;

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
