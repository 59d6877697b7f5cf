//! The session controller state machine

use crate::peer::{MediaPeer, RemoteTrack};
use crate::protocol::{ActionKind, IceCandidate, SignalingEnvelope};
use crate::session::SessionEvent;
use crate::Result;
use serde_json::Value;
use std::mem;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Pending media peer operation within a negotiation
///
/// Peer operations resolve asynchronously; the step currently outstanding is
/// carried in [`SessionState::AnsweringLocally`] so ordering and
/// cancellation-after-close are plain data checks, not closure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStep {
    /// `set_remote_description` has been issued and has not resolved
    ApplyingRemoteOffer,
    /// `create_answer` has been issued and has not resolved
    CreatingAnswer,
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, transport not yet open
    Idle,
    /// `session-start` sent, waiting for the device's offer
    AwaitingRemoteOffer,
    /// Remote offer received, local answer in progress
    AnsweringLocally(NegotiationStep),
    /// Answer sent and local description issued (optimistic; peer-level
    /// connectivity is reported separately)
    Connected,
    /// Terminal: transport closed or fatal error
    Closed,
}

/// Owns one peer session: interprets incoming envelopes, drives the media
/// peer through the offer/answer and candidate exchange, and emits outgoing
/// envelopes
///
/// All transitions happen in [`handle_event`], called from a single task
/// ([`run`]); asynchronous peer operations are spawned and their completions
/// delivered back as epoch-tagged [`SessionEvent`]s, so a completion from a
/// superseded negotiation or a closed session is ignored rather than applied.
///
/// Candidates received before the remote description has been applied are
/// buffered and replayed in receipt order once it resolves; candidates can
/// legitimately race the offer on many networks.
///
/// [`handle_event`]: SessionController::handle_event
/// [`run`]: SessionController::run
pub struct SessionController {
    session_id: String,
    state: SessionState,
    epoch: u64,
    peer: Option<Arc<dyn MediaPeer>>,
    outbound: mpsc::UnboundedSender<String>,
    completions: mpsc::UnboundedSender<SessionEvent>,
    track_sink: mpsc::UnboundedSender<RemoteTrack>,
    pending_candidates: Vec<IceCandidate>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionController {
    /// Create a controller for one peer session
    ///
    /// # Arguments
    ///
    /// * `peer` - media engine handle; released on close
    /// * `outbound` - sink for encoded outgoing envelopes (transport sender)
    /// * `completions` - the session's own event sender, used by spawned
    ///   peer operations to deliver their completions
    /// * `track_sink` - presentation collaborator receiving arrived tracks
    ///
    /// Returns the controller and a watch receiver observing state
    /// transitions.
    pub fn new(
        peer: Arc<dyn MediaPeer>,
        outbound: mpsc::UnboundedSender<String>,
        completions: mpsc::UnboundedSender<SessionEvent>,
        track_sink: mpsc::UnboundedSender<RemoteTrack>,
    ) -> (Self, watch::Receiver<SessionState>) {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let controller = Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            state: SessionState::Idle,
            epoch: 0,
            peer: Some(peer),
            outbound,
            completions,
            track_sink,
            pending_candidates: Vec::new(),
            state_tx,
        };
        (controller, state_rx)
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Consume events until the session closes or the stream ends
    ///
    /// Returns the final state.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) -> SessionState {
        while let Some(event) = events.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        self.state
    }

    /// Apply one event; returns `false` once the session is closed
    ///
    /// Never panics on malformed input: undecodable or unknown envelopes are
    /// logged and dropped without a state change.
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        if self.state == SessionState::Closed {
            debug!(session = %self.session_id, event = ?event, "Event ignored after close");
            return false;
        }

        match event {
            SessionEvent::TransportOpened => self.on_transport_opened(),
            SessionEvent::TransportMessage(text) => self.on_message(&text),
            SessionEvent::TransportClosed { code, reason } => {
                self.close(code, reason);
                return false;
            }
            SessionEvent::RemoteOfferApplied { epoch, result } => {
                self.on_remote_offer_applied(epoch, result)
            }
            SessionEvent::AnswerCreated { epoch, result } => self.on_answer_created(epoch, result),
            SessionEvent::LocalAnswerApplied { epoch, result } => {
                self.on_local_answer_applied(epoch, result)
            }
            SessionEvent::LocalCandidate(candidate) => {
                self.send_envelope(SignalingEnvelope::candidate(candidate))
            }
            SessionEvent::RemoteTrack(track) => self.on_remote_track(track),
            SessionEvent::PeerConnected => {
                info!(session = %self.session_id, "Media transport connected");
            }
        }
        true
    }

    fn on_transport_opened(&mut self) {
        if self.state != SessionState::Idle {
            warn!(state = ?self.state, "Transport open event outside Idle, ignoring");
            return;
        }
        self.send_envelope(SignalingEnvelope::session_start());
        self.set_state(SessionState::AwaitingRemoteOffer);
    }

    fn on_message(&mut self, text: &str) {
        let envelope = match SignalingEnvelope::from_json(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(session = %self.session_id, error = %e, "Dropping undecodable envelope");
                return;
            }
        };

        debug!(action = envelope.action.as_str(), "Envelope received");
        match envelope.action {
            ActionKind::SessionStart => {
                warn!("Unexpected session-start from remote, dropping");
            }
            ActionKind::OfferAnswer => self.on_remote_offer(envelope.params),
            ActionKind::Candidate => {
                self.on_remote_candidate(envelope.params.unwrap_or(Value::Null))
            }
        }
    }

    /// A fresh offer (re)starts negotiation from any non-closed state; the
    /// epoch bump invalidates completions of a superseded chain.
    fn on_remote_offer(&mut self, params: Option<Value>) {
        let Some(offer) = params else {
            warn!("Offer envelope without a description, dropping");
            return;
        };
        let Some(peer) = self.peer.clone() else {
            return;
        };

        self.epoch += 1;
        let epoch = self.epoch;
        debug!(session = %self.session_id, epoch, "Applying remote offer");
        self.set_state(SessionState::AnsweringLocally(
            NegotiationStep::ApplyingRemoteOffer,
        ));

        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = peer.set_remote_description(offer).await;
            let _ = completions.send(SessionEvent::RemoteOfferApplied { epoch, result });
        });
    }

    fn on_remote_offer_applied(&mut self, epoch: u64, result: Result<()>) {
        if epoch != self.epoch
            || self.state != SessionState::AnsweringLocally(NegotiationStep::ApplyingRemoteOffer)
        {
            debug!(epoch, "Stale remote-description completion ignored");
            return;
        }
        if let Err(e) = result {
            warn!(session = %self.session_id, error = %e, "Remote offer rejected, awaiting a fresh offer");
            return;
        }
        let Some(peer) = self.peer.clone() else {
            return;
        };

        let buffered = mem::take(&mut self.pending_candidates);
        if !buffered.is_empty() {
            info!(count = buffered.len(), "Replaying buffered remote candidates");
        }

        let completions = self.completions.clone();
        tokio::spawn(async move {
            for candidate in buffered {
                if let Err(e) = peer.add_ice_candidate(candidate).await {
                    warn!(error = %e, "Buffered candidate rejected");
                }
            }
            let result = peer.create_answer().await;
            let _ = completions.send(SessionEvent::AnswerCreated { epoch, result });
        });
        self.set_state(SessionState::AnsweringLocally(NegotiationStep::CreatingAnswer));
    }

    fn on_answer_created(&mut self, epoch: u64, result: Result<Value>) {
        if epoch != self.epoch
            || self.state != SessionState::AnsweringLocally(NegotiationStep::CreatingAnswer)
        {
            debug!(epoch, "Stale answer completion ignored");
            return;
        }
        let answer = match result {
            Ok(answer) => answer,
            Err(e) => {
                warn!(session = %self.session_id, error = %e, "Answer creation failed, awaiting a fresh offer");
                return;
            }
        };

        self.send_envelope(SignalingEnvelope::offer_answer(answer.clone()));

        let Some(peer) = self.peer.clone() else {
            return;
        };
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = peer.set_local_description(answer).await;
            let _ = completions.send(SessionEvent::LocalAnswerApplied { epoch, result });
        });
        self.set_state(SessionState::Connected);
    }

    fn on_local_answer_applied(&mut self, epoch: u64, result: Result<()>) {
        match result {
            Ok(()) if epoch == self.epoch => debug!("Local description applied"),
            Ok(()) => debug!(epoch, "Stale local-description completion ignored"),
            Err(e) => {
                warn!(session = %self.session_id, error = %e, "Local description rejected")
            }
        }
    }

    fn on_remote_candidate(&mut self, candidate: IceCandidate) {
        if !self.remote_description_applied() {
            debug!(
                session = %self.session_id,
                buffered = self.pending_candidates.len() + 1,
                "Candidate ahead of the remote offer, buffering"
            );
            self.pending_candidates.push(candidate);
            return;
        }
        let Some(peer) = self.peer.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = peer.add_ice_candidate(candidate).await {
                warn!(error = %e, "Remote candidate rejected");
            }
        });
    }

    fn on_remote_track(&mut self, track: RemoteTrack) {
        info!(
            session = %self.session_id,
            id = %track.id,
            kind = %track.kind,
            "Forwarding remote track"
        );
        if self.track_sink.send(track).is_err() {
            debug!("Presentation sink is gone, track dropped");
        }
    }

    fn remote_description_applied(&self) -> bool {
        matches!(
            self.state,
            SessionState::AnsweringLocally(NegotiationStep::CreatingAnswer)
                | SessionState::Connected
        )
    }

    fn close(&mut self, code: Option<u16>, reason: Option<String>) {
        info!(
            session = %self.session_id,
            code = ?code,
            reason = ?reason,
            "Signaling transport closed, tearing down session"
        );
        self.pending_candidates.clear();
        self.peer = None;
        self.set_state(SessionState::Closed);
    }

    fn send_envelope(&self, envelope: SignalingEnvelope) {
        match envelope.to_json() {
            Ok(text) => {
                if self.outbound.send(text).is_err() {
                    warn!("Transport sender is gone, envelope dropped");
                }
            }
            Err(e) => warn!(error = %e, "Envelope not serializable"),
        }
    }

    fn set_state(&mut self, new_state: SessionState) {
        if self.state != new_state {
            debug!(
                session = %self.session_id,
                from = ?self.state,
                to = ?new_state,
                "Session state transition"
            );
            self.state = new_state;
            let _ = self.state_tx.send(new_state);
        }
    }
}
