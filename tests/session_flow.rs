//! End-to-end session scenarios against the controller event loop
//!
//! Drives a full `SessionController::run` task with a recording mock peer:
//! the signaling side is scripted through the event channel, outgoing
//! envelopes and state transitions are observed from the outside.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use streamview_signaling::{
    ActionKind, MediaPeer, RemoteTrack, Result, SessionController, SessionEvent, SessionState,
    SignalingEnvelope,
};
use tokio::sync::{mpsc, watch};
use tokio_test::assert_ok;
use tokio::task::JoinHandle;
use tokio::time::timeout;

#[derive(Debug, Clone, PartialEq)]
enum PeerCall {
    SetRemote(Value),
    CreateAnswer,
    SetLocal(Value),
    AddCandidate(Value),
}

#[derive(Default)]
struct RecordingPeer {
    calls: Mutex<Vec<PeerCall>>,
}

#[async_trait]
impl MediaPeer for RecordingPeer {
    async fn set_remote_description(&self, description: Value) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(PeerCall::SetRemote(description));
        Ok(())
    }

    async fn create_answer(&self) -> Result<Value> {
        self.calls.lock().unwrap().push(PeerCall::CreateAnswer);
        Ok(json!({"type": "answer", "sdp": "v=0 viewer-answer"}))
    }

    async fn set_local_description(&self, description: Value) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(PeerCall::SetLocal(description));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: Value) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(PeerCall::AddCandidate(candidate));
        Ok(())
    }
}

struct Session {
    peer: Arc<RecordingPeer>,
    events: mpsc::UnboundedSender<SessionEvent>,
    outbound: mpsc::UnboundedReceiver<String>,
    tracks: mpsc::UnboundedReceiver<RemoteTrack>,
    state: watch::Receiver<SessionState>,
    running: JoinHandle<SessionState>,
}

fn start_session() -> Session {
    let peer = Arc::new(RecordingPeer::default());
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (track_tx, track_rx) = mpsc::unbounded_channel();

    let (controller, state_rx) = SessionController::new(
        peer.clone(),
        outbound_tx,
        events_tx.clone(),
        track_tx,
    );
    let running = tokio::spawn(controller.run(events_rx));

    Session {
        peer,
        events: events_tx,
        outbound: outbound_rx,
        tracks: track_rx,
        state: state_rx,
        running,
    }
}

impl Session {
    fn deliver(&self, text: &str) {
        self.events
            .send(SessionEvent::TransportMessage(text.to_string()))
            .unwrap();
    }

    async fn next_sent(&mut self) -> SignalingEnvelope {
        let text = timeout(Duration::from_secs(5), self.outbound.recv())
            .await
            .expect("timed out waiting for an outgoing envelope")
            .expect("outbound channel closed");
        SignalingEnvelope::from_json(&text).unwrap()
    }

    async fn wait_for_state(&mut self, target: SessionState) {
        timeout(
            Duration::from_secs(5),
            self.state.wait_for(|state| *state == target),
        )
        .await
        .expect("timed out waiting for state")
        .unwrap();
    }
}

fn offer_envelope() -> String {
    SignalingEnvelope::offer_answer(json!({"type": "offer", "sdp": "v=0 device-offer"}))
        .to_json()
        .unwrap()
}

#[tokio::test]
async fn test_happy_path_reaches_connected() {
    let mut session = start_session();

    session.events.send(SessionEvent::TransportOpened).unwrap();
    let hello = session.next_sent().await;
    assert_eq!(hello.action, ActionKind::SessionStart);
    assert_eq!(hello.params, None);
    session.wait_for_state(SessionState::AwaitingRemoteOffer).await;

    session.deliver(&offer_envelope());
    let answer = session.next_sent().await;
    assert_eq!(answer.action, ActionKind::OfferAnswer);
    assert_eq!(
        answer.params.unwrap().get("type").and_then(Value::as_str),
        Some("answer")
    );
    session.wait_for_state(SessionState::Connected).await;

    session
        .events
        .send(SessionEvent::TransportClosed {
            code: Some(1000),
            reason: None,
        })
        .unwrap();
    let final_state = session.running.await.unwrap();
    assert_eq!(final_state, SessionState::Closed);
}

#[tokio::test]
async fn test_candidates_racing_the_offer_are_not_dropped() {
    let mut session = start_session();
    session.events.send(SessionEvent::TransportOpened).unwrap();
    let _hello = session.next_sent().await;

    for seq in 1..=4 {
        session.deliver(
            &SignalingEnvelope::candidate(Some(json!({"candidate": format!("candidate:{seq}")})))
                .to_json()
                .unwrap(),
        );
    }
    session.deliver(&offer_envelope());

    let _answer = session.next_sent().await;
    session.wait_for_state(SessionState::Connected).await;

    let calls = session.peer.calls.lock().unwrap().clone();
    let candidates: Vec<&PeerCall> = calls
        .iter()
        .filter(|call| matches!(call, PeerCall::AddCandidate(_)))
        .collect();
    assert_eq!(candidates.len(), 4);
    for (index, call) in candidates.iter().enumerate() {
        assert_eq!(
            **call,
            PeerCall::AddCandidate(json!({"candidate": format!("candidate:{}", index + 1)}))
        );
    }
    // all buffered candidates were applied before the answer was created
    assert!(matches!(calls[0], PeerCall::SetRemote(_)));
    assert_eq!(calls[5], PeerCall::CreateAnswer);
}

#[tokio::test]
async fn test_garbage_on_the_wire_does_not_derail_negotiation() {
    let mut session = start_session();
    session.events.send(SessionEvent::TransportOpened).unwrap();
    let _hello = session.next_sent().await;

    tokio_test::assert_ok!(SignalingEnvelope::from_json(r#"{"action": "session-start"}"#));

    session.deliver("not json");
    session.deliver(r#"{"action": "warp-drive"}"#);
    session.deliver(r#"{"no_action": true}"#);

    // the session still answers a valid offer afterwards
    session.deliver(&offer_envelope());
    let answer = session.next_sent().await;
    assert_eq!(answer.action, ActionKind::OfferAnswer);
    session.wait_for_state(SessionState::Connected).await;
}

#[tokio::test]
async fn test_local_candidates_are_forwarded_in_report_order() {
    let mut session = start_session();
    session.events.send(SessionEvent::TransportOpened).unwrap();
    let _hello = session.next_sent().await;

    for name in ["host", "srflx"] {
        session
            .events
            .send(SessionEvent::LocalCandidate(Some(
                json!({"candidate": name}),
            )))
            .unwrap();
    }
    session.events.send(SessionEvent::LocalCandidate(None)).unwrap();

    let first = session.next_sent().await;
    assert_eq!(first.action, ActionKind::Candidate);
    assert_eq!(first.params, Some(json!({"candidate": "host"})));

    let second = session.next_sent().await;
    assert_eq!(second.params, Some(json!({"candidate": "srflx"})));

    let last = session.next_sent().await;
    assert_eq!(last.params, Some(Value::Null));
}

#[tokio::test]
async fn test_remote_track_reaches_the_presentation_sink() {
    let mut session = start_session();
    session.events.send(SessionEvent::TransportOpened).unwrap();
    let _hello = session.next_sent().await;

    session
        .events
        .send(SessionEvent::RemoteTrack(RemoteTrack {
            id: "cam0".to_string(),
            kind: "video".to_string(),
            mime_type: "video/VP8".to_string(),
        }))
        .unwrap();

    let track = timeout(Duration::from_secs(5), session.tracks.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(track.id, "cam0");
    assert_eq!(track.kind, "video");
}

#[tokio::test]
async fn test_close_mid_negotiation_wins_over_late_completions() {
    let mut session = start_session();
    session.events.send(SessionEvent::TransportOpened).unwrap();
    let _hello = session.next_sent().await;

    session.deliver(&offer_envelope());
    session
        .events
        .send(SessionEvent::TransportClosed {
            code: None,
            reason: Some("device went away".to_string()),
        })
        .unwrap();

    let final_state = session.running.await.unwrap();
    assert_eq!(final_state, SessionState::Closed);

    // no answer was emitted once the transport was gone
    assert!(session.outbound.try_recv().is_err());
}
