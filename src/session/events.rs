//! Events driving the session state machine
//!
//! Every state transition is caused by exactly one [`SessionEvent`] handled
//! on the controller's single event stream: transport lifecycle, incoming
//! wire text, media peer notifications, and the completions of peer
//! operations the controller spawned earlier.

use crate::peer::{PeerEvent, RemoteTrack};
use crate::protocol::{IceCandidate, SessionDescription};
use crate::Result;

/// One unit of input for [`SessionController::handle_event`]
///
/// [`SessionController::handle_event`]: crate::session::SessionController::handle_event
#[derive(Debug)]
pub enum SessionEvent {
    /// The signaling channel is open
    TransportOpened,
    /// Raw wire text delivered by the signaling channel
    TransportMessage(String),
    /// The signaling channel closed (remote close frame, error, or EOF)
    TransportClosed {
        /// WebSocket close code, when the remote sent one
        code: Option<u16>,
        /// Close reason or error description, when available
        reason: Option<String>,
    },
    /// Completion of `set_remote_description` for the tagged negotiation
    RemoteOfferApplied {
        /// Negotiation epoch the operation belongs to
        epoch: u64,
        /// Outcome reported by the media peer
        result: Result<()>,
    },
    /// Completion of `create_answer` for the tagged negotiation
    AnswerCreated {
        /// Negotiation epoch the operation belongs to
        epoch: u64,
        /// The produced answer, or the peer's rejection
        result: Result<SessionDescription>,
    },
    /// Completion of `set_local_description` for the tagged negotiation
    LocalAnswerApplied {
        /// Negotiation epoch the operation belongs to
        epoch: u64,
        /// Outcome reported by the media peer
        result: Result<()>,
    },
    /// The media peer discovered a local candidate (`None` = end of gathering)
    LocalCandidate(Option<IceCandidate>),
    /// A remote media track arrived
    RemoteTrack(RemoteTrack),
    /// The media peer reached its transport-level connected state
    PeerConnected,
}

impl From<PeerEvent> for SessionEvent {
    fn from(event: PeerEvent) -> Self {
        match event {
            PeerEvent::LocalCandidate(candidate) => SessionEvent::LocalCandidate(candidate),
            PeerEvent::Track(track) => SessionEvent::RemoteTrack(track),
            PeerEvent::Connected => SessionEvent::PeerConnected,
        }
    }
}
