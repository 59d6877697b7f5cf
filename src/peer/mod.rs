//! Media peer contract and notifications
//!
//! The session core drives the media engine exclusively through the
//! [`MediaPeer`] trait and observes it through [`PeerEvent`]s. The engine
//! itself (encoding, NAT traversal, packet transmission) is an external
//! collaborator; [`WebRtcPeer`] adapts the `webrtc` crate to this contract.

pub mod webrtc;

pub use webrtc::WebRtcPeer;

use crate::protocol::{IceCandidate, SessionDescription};
use crate::Result;
use async_trait::async_trait;

/// Control surface of the media engine
///
/// All four operations may complete asynchronously; callers must not issue a
/// dependent call (e.g. `create_answer` before `set_remote_description` has
/// resolved) out of order.
#[async_trait]
pub trait MediaPeer: Send + Sync {
    /// Apply the remote peer's session description
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Produce a local answer to the applied remote offer
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Apply the locally produced description
    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    /// Apply one remote connectivity candidate
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;
}

/// Notifications emitted by the media engine
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A local connectivity candidate was discovered; `None` marks the end
    /// of gathering and is forwarded on the wire as a null payload
    LocalCandidate(Option<IceCandidate>),
    /// A remote media track arrived
    Track(RemoteTrack),
    /// The peer-level transport reached its connected state
    Connected,
}

/// Metadata handle for an arrived remote media track, forwarded to the
/// presentation collaborator
#[derive(Debug, Clone)]
pub struct RemoteTrack {
    /// Track identifier assigned by the remote peer
    pub id: String,
    /// Track kind ("audio" or "video")
    pub kind: String,
    /// Negotiated payload MIME type
    pub mime_type: String,
}
