//! Wire protocol for signaling envelopes
//!
//! Every signaling message is one JSON object with a fixed two-key shape:
//! `{"action": <kind>, "params": <opaque payload>}`. The payload is carried
//! verbatim as [`serde_json::Value`]; this module never interprets it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque media-capability description (offer or answer), passed through
/// unmodified between the wire and the media peer.
pub type SessionDescription = Value;

/// Opaque connectivity candidate, passed through unmodified. `Value::Null`
/// is the end-of-gathering marker and is a legal wire payload.
pub type IceCandidate = Value;

/// The closed set of signaling actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Client-to-server request to start streaming
    #[serde(rename = "session-start")]
    SessionStart,
    /// SDP offer or answer exchange
    #[serde(rename = "offer-answer-exchange")]
    OfferAnswer,
    /// ICE candidate exchange
    #[serde(rename = "candidate-exchange")]
    Candidate,
}

impl ActionKind {
    /// Wire spelling of this action
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SessionStart => "session-start",
            ActionKind::OfferAnswer => "offer-answer-exchange",
            ActionKind::Candidate => "candidate-exchange",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "session-start" => Some(ActionKind::SessionStart),
            "offer-answer-exchange" => Some(ActionKind::OfferAnswer),
            "candidate-exchange" => Some(ActionKind::Candidate),
            _ => None,
        }
    }
}

/// One signaling message, immutable once constructed
///
/// `params` distinguishes a present-null payload (`Some(Value::Null)`, used
/// by candidate envelopes to mark the end of gathering) from an absent one
/// (`None`, as in `session-start`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalingEnvelope {
    /// What this envelope carries
    pub action: ActionKind,
    /// Opaque structured payload, forwarded verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl SignalingEnvelope {
    /// The session-initiation request (no payload)
    pub fn session_start() -> Self {
        Self {
            action: ActionKind::SessionStart,
            params: None,
        }
    }

    /// An offer/answer envelope carrying a session description
    pub fn offer_answer(description: SessionDescription) -> Self {
        Self {
            action: ActionKind::OfferAnswer,
            params: Some(description),
        }
    }

    /// A candidate envelope; `None` is forwarded as a literal `null` payload
    pub fn candidate(candidate: Option<IceCandidate>) -> Self {
        Self {
            action: ActionKind::Candidate,
            params: Some(candidate.unwrap_or(Value::Null)),
        }
    }

    /// Serialize to wire text
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Decode(format!("Envelope serialization failed: {e}")))
    }

    /// Deserialize from wire text
    ///
    /// Classifies failures: text that is not a JSON object or lacks the
    /// `action` key yields [`Error::Decode`]; a well-formed envelope whose
    /// action is not part of the protocol yields [`Error::UnknownAction`].
    /// Never panics, regardless of input.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::Decode(format!("Not well-formed JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| Error::Decode("Envelope is not a JSON object".to_string()))?;

        let action = object
            .get("action")
            .ok_or_else(|| Error::Decode("Envelope has no action field".to_string()))?;

        let action = action
            .as_str()
            .ok_or_else(|| Error::Decode("Envelope action is not a string".to_string()))?;

        let action =
            ActionKind::parse(action).ok_or_else(|| Error::UnknownAction(action.to_string()))?;

        Ok(Self {
            action,
            params: object.get("params").cloned(),
        })
    }
}
