//! UDP transport for the SIP core, bound to [`sip_reactor::Reactor`].
//!
//! Implements exactly spec §4.2: a non-blocking socket that reads
//! datagrams into a bounded buffer and hands `(bytes, remote)` upstream,
//! and accepts fire-and-forget outbound sends. Reliability (retransmission)
//! is the transaction layer's job, not this crate's.

pub mod config;
pub mod error;
mod transport;

pub use config::{TransportConfig, DEFAULT_MAX_DATAGRAM_SIZE, DEFAULT_SIP_PORT};
pub use error::{Error, Result};
pub use transport::{Callbacks, Transport};
