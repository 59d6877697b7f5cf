//! `webrtc` crate adapter for the media peer contract

use crate::config::SessionConfig;
use crate::peer::{MediaPeer, PeerEvent, RemoteTrack};
use crate::protocol::{IceCandidate, SessionDescription};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// Media peer backed by a `webrtc::RTCPeerConnection`
///
/// Descriptions and candidates cross this boundary as opaque JSON and are
/// interpreted only here: `{type, sdp}` objects for descriptions, candidate
/// init objects (browser field names) for candidates.
pub struct WebRtcPeer {
    connection: Arc<RTCPeerConnection>,
}

impl WebRtcPeer {
    /// Create a peer connection from session configuration
    ///
    /// Engine notifications (discovered candidates, arrived tracks, the
    /// connected transition) are delivered on `events`.
    pub async fn new(
        config: &SessionConfig,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Self> {
        let mut media = MediaEngine::default();
        media
            .register_default_codecs()
            .map_err(|e| Error::Negotiation(format!("Failed to register codecs: {e}")))?;

        let registry = register_default_interceptors(Registry::new(), &mut media)
            .map_err(|e| Error::Negotiation(format!("Failed to register interceptors: {e}")))?;

        let mut setting = SettingEngine::default();
        let ice_timeout = Duration::from_secs(u64::from(config.ice_timeout_secs));
        setting.set_ice_timeouts(Some(ice_timeout), Some(ice_timeout), None);

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting)
            .build();

        let connection = Arc::new(
            api.new_peer_connection(rtc_config(config))
                .await
                .map_err(|e| Error::Negotiation(format!("Failed to create peer connection: {e}")))?,
        );

        let tx = events.clone();
        connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let tx = tx.clone();
            Box::pin(async move {
                match candidate {
                    Some(c) => match c.to_json().map(|init| serde_json::to_value(&init)) {
                        Ok(Ok(value)) => {
                            let _ = tx.send(PeerEvent::LocalCandidate(Some(value)));
                        }
                        Ok(Err(e)) => warn!(error = %e, "Local candidate not serializable"),
                        Err(e) => warn!(error = %e, "Local candidate not serializable"),
                    },
                    None => {
                        debug!("Local candidate gathering complete");
                        let _ = tx.send(PeerEvent::LocalCandidate(None));
                    }
                }
            })
        }));

        let tx = events.clone();
        connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let remote = RemoteTrack {
                    id: track.id(),
                    kind: track.kind().to_string(),
                    mime_type: track.codec().capability.mime_type.clone(),
                };
                info!(
                    id = %remote.id,
                    kind = %remote.kind,
                    mime_type = %remote.mime_type,
                    "Remote track arrived"
                );
                let tx = tx.clone();
                Box::pin(async move {
                    let _ = tx.send(PeerEvent::Track(remote));
                })
            },
        ));

        connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                debug!(state = ?state, "Peer connection state changed");
                if state == RTCPeerConnectionState::Connected {
                    let _ = events.send(PeerEvent::Connected);
                }
                Box::pin(async {})
            },
        ));

        Ok(Self { connection })
    }

    /// Tear down the underlying peer connection
    pub async fn close(&self) -> Result<()> {
        self.connection
            .close()
            .await
            .map_err(|e| Error::Negotiation(format!("Peer teardown failed: {e}")))
    }
}

#[async_trait]
impl MediaPeer for WebRtcPeer {
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let description = description_from_value(&description)?;
        self.connection
            .set_remote_description(description)
            .await
            .map_err(|e| Error::Negotiation(format!("set_remote_description rejected: {e}")))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .connection
            .create_answer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("create_answer rejected: {e}")))?;
        serde_json::to_value(&answer)
            .map_err(|e| Error::Negotiation(format!("Answer not serializable: {e}")))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        let description = description_from_value(&description)?;
        self.connection
            .set_local_description(description)
            .await
            .map_err(|e| Error::Negotiation(format!("set_local_description rejected: {e}")))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        if candidate.is_null() {
            debug!("End of remote candidates");
            return Ok(());
        }
        let init = candidate_init_from_value(&candidate)?;
        self.connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::Negotiation(format!("add_ice_candidate rejected: {e}")))
    }
}

fn rtc_config(config: &SessionConfig) -> RTCConfiguration {
    let mut ice_servers = vec![RTCIceServer {
        urls: config.stun_servers.clone(),
        ..Default::default()
    }];

    for turn in &config.turn_servers {
        ice_servers.push(RTCIceServer {
            urls: vec![turn.url.clone()],
            username: turn.username.clone(),
            credential: turn.credential.clone(),
            ..Default::default()
        });
    }

    RTCConfiguration {
        ice_servers,
        ..Default::default()
    }
}

fn description_from_value(value: &Value) -> Result<RTCSessionDescription> {
    let sdp = value
        .get("sdp")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Negotiation("Description has no sdp field".to_string()))?
        .to_string();

    match value.get("type").and_then(Value::as_str) {
        Some("offer") => RTCSessionDescription::offer(sdp)
            .map_err(|e| Error::Negotiation(format!("Invalid offer: {e}"))),
        Some("answer") => RTCSessionDescription::answer(sdp)
            .map_err(|e| Error::Negotiation(format!("Invalid answer: {e}"))),
        Some("pranswer") => RTCSessionDescription::pranswer(sdp)
            .map_err(|e| Error::Negotiation(format!("Invalid pranswer: {e}"))),
        other => Err(Error::Negotiation(format!(
            "Unsupported description type: {other:?}"
        ))),
    }
}

fn candidate_init_from_value(value: &Value) -> Result<RTCIceCandidateInit> {
    let candidate = value
        .get("candidate")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Negotiation("Candidate has no candidate field".to_string()))?
        .to_string();

    Ok(RTCIceCandidateInit {
        candidate,
        sdp_mid: value
            .get("sdpMid")
            .and_then(Value::as_str)
            .map(str::to_string),
        sdp_mline_index: value
            .get("sdpMLineIndex")
            .and_then(Value::as_u64)
            .map(|index| index as u16),
        username_fragment: value
            .get("usernameFragment")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

    async fn test_peer() -> (WebRtcPeer, mpsc::UnboundedReceiver<PeerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = WebRtcPeer::new(&SessionConfig::default(), tx).await.unwrap();
        (peer, rx)
    }

    /// A second, raw peer connection stands in for the offering device.
    async fn remote_offer() -> Value {
        let mut media = MediaEngine::default();
        media.register_default_codecs().unwrap();
        let registry = register_default_interceptors(Registry::new(), &mut media).unwrap();
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();
        let pc = api
            .new_peer_connection(RTCConfiguration::default())
            .await
            .unwrap();
        pc.add_transceiver_from_kind(RTPCodecType::Video, None)
            .await
            .unwrap();
        let offer = pc.create_offer(None).await.unwrap();
        serde_json::to_value(&offer).unwrap()
    }

    #[tokio::test]
    async fn test_answer_negotiation() {
        let (peer, _events) = test_peer().await;
        let offer = remote_offer().await;

        peer.set_remote_description(offer).await.unwrap();
        let answer = peer.create_answer().await.unwrap();

        assert_eq!(answer.get("type").and_then(Value::as_str), Some("answer"));
        let sdp = answer.get("sdp").and_then(Value::as_str).unwrap();
        assert!(sdp.starts_with("v=0"));

        peer.set_local_description(answer).await.unwrap();
        peer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_null_candidate_is_a_no_op() {
        let (peer, _events) = test_peer().await;
        peer.add_ice_candidate(Value::Null).await.unwrap();
        peer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_description_without_sdp_is_rejected() {
        let (peer, _events) = test_peer().await;
        let err = peer
            .set_remote_description(json!({"type": "offer"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Negotiation(_)));
        peer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_answer_before_offer_is_rejected() {
        let (peer, _events) = test_peer().await;
        assert!(peer.create_answer().await.is_err());
        peer.close().await.unwrap();
    }

    #[test]
    fn test_candidate_init_mapping() {
        let init = candidate_init_from_value(&json!({
            "candidate": "candidate:1 1 udp 2113937151 192.0.2.1 54400 typ host",
            "sdpMid": "0",
            "sdpMLineIndex": 0
        }))
        .unwrap();

        assert!(init.candidate.starts_with("candidate:1"));
        assert_eq!(init.sdp_mid.as_deref(), Some("0"));
        assert_eq!(init.sdp_mline_index, Some(0));
        assert_eq!(init.username_fragment, None);
    }

    #[test]
    fn test_candidate_without_candidate_field_is_rejected() {
        assert!(candidate_init_from_value(&json!({"sdpMid": "0"})).is_err());
    }
}
