//! The four RFC 3261 §17 state machines (spec §4.3).
//!
//! Each submodule is pure: it reads and mutates one [`crate::Transaction`]
//! and returns the [`crate::EngineAction`]s its owner should carry out. No
//! submodule talks to the transport, the reactor, or another transaction
//! directly — that indirection is what keeps a transition function
//! testable without a running engine.

pub mod ict;
pub mod ist;
pub mod nict;
pub mod nist;
