mod channel;
mod config;
mod error;
mod media;
mod negotiation;
mod rtc;
mod session;

pub use channel::*;
pub use config::*;
pub use error::*;
pub use media::*;
pub use negotiation::*;
pub use rtc::*;
pub use session::*;
