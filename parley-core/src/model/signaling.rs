use crate::model::candidate::IceCandidate;
use crate::model::description::{SdpType, SessionDescription};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            username: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Offer,
    Answer,
    IceCandidate,
    Hangup,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Offer => "offer",
            MessageKind::Answer => "answer",
            MessageKind::IceCandidate => "ice-candidate",
            MessageKind::Hangup => "hangup",
        }
    }

    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "offer" => Some(MessageKind::Offer),
            "answer" => Some(MessageKind::Answer),
            "ice-candidate" => Some(MessageKind::IceCandidate),
            "hangup" => Some(MessageKind::Hangup),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed signalling frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unknown signalling message kind `{0}`")]
    UnknownKind(String),

    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{kind}` message carries a `{found}` description")]
    DescriptionMismatch { kind: MessageKind, found: SdpType },
}

/// The only thing peers exchange through the relay.
///
/// On the wire this is `{"type": <kind>, "data": <payload>}` where the payload
/// shape is fixed by the kind. There is no recipient field: the relay hands
/// every message to every other connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Envelope", into = "Envelope")]
pub enum SignallingMessage {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
    Hangup,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl SignallingMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            SignallingMessage::Offer(_) => MessageKind::Offer,
            SignallingMessage::Answer(_) => MessageKind::Answer,
            SignallingMessage::IceCandidate(_) => MessageKind::IceCandidate,
            SignallingMessage::Hangup => MessageKind::Hangup,
        }
    }

    /// Parse one text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(DecodeError::Malformed)?;
        Self::try_from(envelope)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn payload<T: serde::de::DeserializeOwned>(
    kind: MessageKind,
    data: Value,
) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::InvalidPayload { kind, source })
}

impl TryFrom<Envelope> for SignallingMessage {
    type Error = DecodeError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let kind = MessageKind::parse(&envelope.kind)
            .ok_or_else(|| DecodeError::UnknownKind(envelope.kind.clone()))?;

        match kind {
            MessageKind::Offer => {
                let desc: SessionDescription = payload(kind, envelope.data)?;
                if desc.sdp_type != SdpType::Offer {
                    return Err(DecodeError::DescriptionMismatch {
                        kind,
                        found: desc.sdp_type,
                    });
                }
                Ok(SignallingMessage::Offer(desc))
            }
            MessageKind::Answer => {
                let desc: SessionDescription = payload(kind, envelope.data)?;
                if !matches!(desc.sdp_type, SdpType::Answer | SdpType::Pranswer) {
                    return Err(DecodeError::DescriptionMismatch {
                        kind,
                        found: desc.sdp_type,
                    });
                }
                Ok(SignallingMessage::Answer(desc))
            }
            MessageKind::IceCandidate => Ok(SignallingMessage::IceCandidate(payload(
                kind,
                envelope.data,
            )?)),
            // Browsers send `data: ''`; whatever is there is ignored.
            MessageKind::Hangup => Ok(SignallingMessage::Hangup),
        }
    }
}

impl From<SignallingMessage> for Envelope {
    fn from(msg: SignallingMessage) -> Self {
        let kind = msg.kind().as_str().to_owned();
        let data = match msg {
            SignallingMessage::Offer(desc) | SignallingMessage::Answer(desc) => {
                serde_json::to_value(desc).unwrap_or(Value::Null)
            }
            SignallingMessage::IceCandidate(candidate) => {
                serde_json::to_value(candidate).unwrap_or(Value::Null)
            }
            SignallingMessage::Hangup => Value::String(String::new()),
        };
        Envelope { kind, data }
    }
}
