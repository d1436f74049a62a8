use crate::model::IceServerConfig;

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun.kundenserver.de:3478";

/// Port the relay listens on when nothing else is configured.
pub const DEFAULT_RELAY_PORT: u16 = 8081;

pub const DEFAULT_RELAY_URL: &str = "ws://localhost:8081";

/// STUN-only server list used when the caller does not provide one.
pub fn default_ice_servers() -> Vec<IceServerConfig> {
    vec![IceServerConfig::stun([DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2])]
}
