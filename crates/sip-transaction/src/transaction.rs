//! The per-transaction data shape (spec §3 "Transaction").
//!
//! Grounded on `rvoip_dialog_core::transaction::{client,server}::data`'s
//! `ClientTransactionData`/`ServerTransactionData` field layout (id, state,
//! request, last_response, remote_addr) — narrowed to what the state
//! machines in [`crate::sm`] actually need, since there is no async runtime
//! or command channel here to store alongside it.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use sip_message::Message;

use crate::event::Event;
use crate::key::{TransactionKey, TransactionKind};
use crate::timer::TimerType;

/// A transaction's current position in its RFC 3261 state machine.
///
/// Not every state applies to every kind (e.g. `Confirmed` only exists for
/// IST) — [`crate::sm`] enforces which transitions are legal per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Calling,
    Trying,
    Proceeding,
    Completed,
    Confirmed,
    Terminated,
}

/// One transaction: its identity, its state, the messages it needs to
/// retransmit or match against, and its pending work (spec §3
/// "Transaction").
pub struct Transaction {
    pub key: TransactionKey,
    pub state: State,
    /// The request that created this transaction — kept for retransmit
    /// matching and, on IST, for building the eventual dialog.
    pub request: Message,
    /// The last response sent (IST/NIST retransmit it on a duplicate
    /// request) or received (ICT/NICT keep it for the ACK/TU notify).
    pub last_response: Option<Message>,
    /// The peer address datagrams for this transaction go to and came
    /// from. Resolved once, from the transport's `recvfrom` peer address
    /// or the Request-URI, and reused for every send.
    pub remote: SocketAddr,
    pub events: VecDeque<Event>,
    pub timer_events: VecDeque<TimerType>,
    /// Current retransmit interval for A/E/G, doubled on each firing.
    pub retransmit_interval: Duration,
}

impl Transaction {
    pub fn new(key: TransactionKey, state: State, request: Message, remote: SocketAddr, retransmit_interval: Duration) -> Self {
        Self {
            key,
            state,
            request,
            last_response: None,
            remote,
            events: VecDeque::new(),
            timer_events: VecDeque::new(),
            retransmit_interval,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.key.kind
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, State::Terminated)
    }
}
