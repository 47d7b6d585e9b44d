//! Structural SIP message model, parser contract and serializer.
//!
//! This crate implements exactly the contract spec §6.2 asks of an
//! external message-parsing library — structural decomposition of a SIP
//! datagram, not a validating RFC 3261 grammar. It is consumed by
//! `sip-transport` (to hand parsed [`Message`]s upstream) and
//! `sip-transaction` (to classify and drive the transaction state
//! machines).

pub mod builder;
pub mod error;
pub mod message;
pub mod parser;
pub mod types;

pub use builder::{init_request, init_response};
pub use error::{Error, Result};
pub use message::{Message, StartLine};
pub use parser::{message_to_bytes, parse_message, random_number, Parser, StructuralParser};
pub use types::{Address, Method, StatusCode, Uri, Via};
