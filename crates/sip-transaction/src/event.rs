//! Events delivered into a transaction's FIFO, and the actions a state
//! machine transition hands back to its owner (spec §3 "Event", §4.3
//! "Operations").
//!
//! A transition function never calls back into the transport or the
//! reactor directly — it returns a `Vec<EngineAction>` describing what
//! should happen, which `SipCore` then carries out. This is the handle
//! discipline spec §9 asks for ("never as an ownership cycle"): nothing
//! here holds a reference back to its owner.

use std::net::SocketAddr;
use std::time::Duration;

use sip_message::Message;

use crate::key::TransactionKey;
use crate::timer::TimerType;

/// A unit of work delivered into exactly one transaction's queue (spec §3
/// "Event").
#[derive(Debug, Clone)]
pub enum Event {
    ReceivedRequest(Message),
    ReceivedResponse(Message),
    OutgoingMessage(Message),
}

/// Something a transition wants its owner to do, in emission order.
///
/// Callers MUST apply these in order: e.g. an ICT's 2xx transition emits
/// `CancelTimer`s before `Killed`, so the ACK the caller sends in response
/// to `Notify` lands before the transaction is torn down (spec §8
/// testable property: "the corresponding ACK is emitted before the
/// transaction transitions to Terminated").
#[derive(Debug, Clone)]
pub enum EngineAction {
    Send { key: TransactionKey, destination: SocketAddr, message: Box<Message> },
    ScheduleTimer { key: TransactionKey, timer: TimerType, after: Duration },
    CancelTimer { key: TransactionKey, timer: TimerType },
    CancelAllTimers { key: TransactionKey },
    Killed { key: TransactionKey },
    Notify(TuEvent),
}

/// Notifications aimed at the TU (here, `SipCore`) rather than at the
/// wire — the engine has no opinion on what the TU does with these.
#[derive(Debug, Clone)]
pub enum TuEvent {
    /// An IST sent the 2xx response to an INVITE; the TU should build a
    /// dialog and insert it into the Dialog Table (spec §4.4 "On
    /// IST_STATUS_2XX_SENT").
    Ist2xxSent { key: TransactionKey, request: Box<Message>, response: Box<Message> },
    /// An ICT received the 2xx response to an INVITE; the TU must
    /// construct and send the ACK itself (2xx ACK is not a transaction
    /// event per RFC 3261 §13.2.2.4, spec §4.3 "An ACK to a 2xx is NOT an
    /// IST event").
    Ict2xxReceived { key: TransactionKey, remote: SocketAddr, request: Box<Message>, response: Box<Message> },
}
