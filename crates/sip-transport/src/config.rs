use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default SIP UDP port (spec §6.1).
pub const DEFAULT_SIP_PORT: u16 = 5060;

/// `ES_TRANSPORT_MAX_BUFFER_SIZE` in the original `estransport.c` this
/// layer is grounded on: any datagram larger than this is truncated
/// (spec §4.2, §6.1).
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 2048;

/// Bind address, buffer sizing and DSCP marking for a [`crate::Transport`].
///
/// Mirrors `rvoip_dialog_core::api::config::ServerConfig`'s `::new(addr)`
/// plus chainable `with_*` setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub bind_addr: SocketAddr,
    pub max_datagram_size: usize,
    pub dscp: Option<u8>,
}

impl TransportConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self { bind_addr, max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE, dscp: None }
    }

    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    pub fn with_dscp(mut self, dscp: u8) -> Self {
        self.dscp = Some(dscp);
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_SIP_PORT))
    }
}
