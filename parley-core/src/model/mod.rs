mod candidate;
mod channel;
mod description;
mod signaling;

pub use candidate::IceCandidate;
pub use channel::{ChannelId, ChannelStatus};
pub use description::{SdpType, SessionDescription};
pub use signaling::{DecodeError, IceServerConfig, MessageKind, SignallingMessage};
