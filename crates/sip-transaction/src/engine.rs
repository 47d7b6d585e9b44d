//! The transaction engine: four ordered transaction sequences and the
//! execute cycle that drains them (spec §4.3 "Operations").
//!
//! Grounded on `esosip.c`'s `_es_osip_loop` for the exact five-stage
//! execute order (ICT, IST, NICT, NIST, then their timer FIFOs) — an
//! engine invariant per spec §4.3 ("this order ... so that e.g. a 2xx sent
//! on IST schedules its G-timer before the same cycle's timer pass
//! evaluates G") and per spec §5's ordering guarantees.

use std::net::SocketAddr;

use sip_message::{Message, Method};

use crate::event::{Event, EngineAction};
use crate::key::{TransactionKey, TransactionKind};
use crate::sm;
use crate::timer::{TimerSettings, TimerType};
use crate::transaction::{State, Transaction};

/// Owns the four kind-ordered transaction sequences (spec §3 "Transaction
/// Table": "Four ordered sequences (one per kind). Lookup is linear").
pub struct TransactionEngine {
    ict: Vec<Transaction>,
    ist: Vec<Transaction>,
    nict: Vec<Transaction>,
    nist: Vec<Transaction>,
    settings: TimerSettings,
}

impl TransactionEngine {
    pub fn new(settings: TimerSettings) -> Self {
        Self { ict: Vec::new(), ist: Vec::new(), nict: Vec::new(), nist: Vec::new(), settings }
    }

    fn sequence(&self, kind: TransactionKind) -> &Vec<Transaction> {
        match kind {
            TransactionKind::Ict => &self.ict,
            TransactionKind::Ist => &self.ist,
            TransactionKind::Nict => &self.nict,
            TransactionKind::Nist => &self.nist,
        }
    }

    fn sequence_mut(&mut self, kind: TransactionKind) -> &mut Vec<Transaction> {
        match kind {
            TransactionKind::Ict => &mut self.ict,
            TransactionKind::Ist => &mut self.ist,
            TransactionKind::Nict => &mut self.nict,
            TransactionKind::Nist => &mut self.nist,
        }
    }

    /// Creates a client transaction (ICT/NICT) for an outbound request and
    /// returns its key together with the actions needed to send it and
    /// arm its initial timers (spec §4.3 `create(kind, request)`).
    pub fn create_client(&mut self, request: Message, remote: SocketAddr) -> (TransactionKey, Vec<EngineAction>) {
        let method = request.cseq_method.clone();
        let kind = TransactionKind::for_request(&method, false);
        let branch = request.branch().unwrap_or_default().to_string();
        let sent_by = request.top_via().map(sip_message::Via::sent_by).unwrap_or_default();
        let key = TransactionKey::new(branch, sent_by, method, kind);
        let initial_state = if kind.is_invite() { State::Calling } else { State::Trying };

        let mut actions = vec![EngineAction::Send { key: key.clone(), destination: remote, message: Box::new(request.clone()) }];
        let tx = Transaction::new(key.clone(), initial_state, request, remote, self.settings.t1);
        actions.extend(match kind {
            TransactionKind::Ict => sm::ict::on_create(&tx, &self.settings),
            TransactionKind::Nict => sm::nict::on_create(&tx, &self.settings),
            _ => unreachable!("for_request(method, is_server=false) only yields ICT/NICT"),
        });
        tracing::info!(key = %key, "created client transaction");
        self.sequence_mut(kind).push(tx);
        (key, actions)
    }

    /// Creates a server transaction (IST/NIST) for an inbound request
    /// (spec §4.3 `create`, §4.4 steps 5-6). Returns only the key: a
    /// server transaction has nothing to send until the TU provides a
    /// response via [`TransactionEngine::add_event`].
    pub fn create_server(&mut self, request: &Message, remote: SocketAddr) -> TransactionKey {
        let method = request.cseq_method.clone();
        let kind = TransactionKind::for_request(&method, true);
        let branch = request.branch().unwrap_or_default().to_string();
        let sent_by = request.top_via().map(sip_message::Via::sent_by).unwrap_or_default();
        let key = TransactionKey::new(branch, sent_by, method, kind);
        let initial_state = if kind.is_invite() { State::Proceeding } else { State::Trying };

        let tx = Transaction::new(key.clone(), initial_state, request.clone(), remote, self.settings.t1);
        tracing::info!(key = %key, "created server transaction");
        self.sequence_mut(kind).push(tx);
        key
    }

    /// Matches an incoming request or response by (branch, sent-by, CSeq
    /// method, kind) (spec §4.3 `find(kind, event)`).
    pub fn find_key(&self, kind: TransactionKind, branch: &str, sent_by: &str, cseq_method: &Method) -> Option<TransactionKey> {
        self.sequence(kind)
            .iter()
            .find(|tx| tx.key.branch == branch && tx.key.sent_by == sent_by && &tx.key.cseq_method == cseq_method)
            .map(|tx| tx.key.clone())
    }

    /// Matches a transaction of `kind` by (branch, sent-by) alone, ignoring
    /// CSeq method. Used for ACK (whose own CSeq method is ACK, not INVITE)
    /// and CANCEL (whose own CSeq method is CANCEL) matching against the
    /// INVITE server transaction they target by branch (spec §4.3 "An ACK
    /// to a non-2xx final response is absorbed by IST"; "A CANCEL matches
    /// an existing INVITE server transaction by branch").
    pub fn find_key_by_branch(&self, kind: TransactionKind, branch: &str, sent_by: &str) -> Option<TransactionKey> {
        self.sequence(kind)
            .iter()
            .find(|tx| tx.key.branch == branch && tx.key.sent_by == sent_by)
            .map(|tx| tx.key.clone())
    }

    /// Pushes an event into a transaction's FIFO without executing it
    /// (spec §4.3 `add_event(tx, event)`).
    pub fn add_event(&mut self, key: &TransactionKey, event: Event) {
        if let Some(tx) = self.sequence_mut(key.kind).iter_mut().find(|tx| &tx.key == key) {
            tx.events.push_back(event);
        } else {
            tracing::info!(%key, "dropped event for unknown transaction");
        }
    }

    pub fn add_timer_event(&mut self, key: &TransactionKey, timer: TimerType) {
        if let Some(tx) = self.sequence_mut(key.kind).iter_mut().find(|tx| &tx.key == key) {
            tx.timer_events.push_back(timer);
        }
    }

    pub fn state_of(&self, key: &TransactionKey) -> Option<State> {
        self.sequence(key.kind).iter().find(|tx| &tx.key == key).map(|tx| tx.state)
    }

    pub fn request_of(&self, key: &TransactionKey) -> Option<Message> {
        self.sequence(key.kind).iter().find(|tx| &tx.key == key).map(|tx| tx.request.clone())
    }

    /// Confirms an IST out of band, for a 2xx ACK matched via the Dialog
    /// Table rather than delivered into the IST's own FIFO (spec §4.4 step
    /// 3: "stop 2xx retransmissions ... discard the event").
    pub fn confirm_ist(&mut self, key: &TransactionKey) -> Vec<EngineAction> {
        match self.ist.iter_mut().find(|tx| &tx.key == key) {
            Some(tx) if tx.state == State::Completed => {
                tracing::debug!(key = %tx.key, "IST_ACK_RECEIVED");
                sm::ist::confirm(tx, &self.settings)
            }
            Some(tx) if tx.state == State::Confirmed => {
                tracing::debug!(key = %tx.key, "IST_ACK_RECEIVED_AGAIN");
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Drains every transaction's event FIFO for one kind, applying the
    /// matching state machine, and removes any transaction that reached
    /// Terminated (spec §4.3 `execute_kind(kind)`, kill callback).
    fn execute_kind(&mut self, kind: TransactionKind) -> Vec<EngineAction> {
        let settings = self.settings;
        let txs = self.sequence_mut(kind);
        let mut actions = Vec::new();

        for tx in txs.iter_mut() {
            while let Some(event) = tx.events.pop_front() {
                let emitted = match kind {
                    TransactionKind::Ict => sm::ict::on_event(tx, &settings, event),
                    TransactionKind::Ist => sm::ist::on_event(tx, &settings, event),
                    TransactionKind::Nict => sm::nict::on_event(tx, &settings, event),
                    TransactionKind::Nist => sm::nist::on_event(tx, &settings, event),
                };
                actions.extend(emitted);
                if tx.is_terminated() {
                    break;
                }
            }
        }

        txs.retain(|tx| !tx.is_terminated());
        actions
    }

    /// Drains every transaction's timer FIFO for one kind (spec §4.3
    /// "Timer event FIFOs are drained by the four timer-`execute_kind`
    /// variants").
    fn execute_timers(&mut self, kind: TransactionKind) -> Vec<EngineAction> {
        let settings = self.settings;
        let txs = self.sequence_mut(kind);
        let mut actions = Vec::new();

        for tx in txs.iter_mut() {
            while let Some(timer) = tx.timer_events.pop_front() {
                let emitted = match kind {
                    TransactionKind::Ict => sm::ict::on_timer(tx, &settings, timer),
                    TransactionKind::Ist => sm::ist::on_timer(tx, &settings, timer),
                    TransactionKind::Nict => sm::nict::on_timer(tx, &settings, timer),
                    TransactionKind::Nist => sm::nist::on_timer(tx, &settings, timer),
                };
                actions.extend(emitted);
                if tx.is_terminated() {
                    break;
                }
            }
        }

        txs.retain(|tx| !tx.is_terminated());
        actions
    }

    /// The number of live transactions of one kind, exposed for diagnostics
    /// and tests (spec §4.3 "Transaction Table").
    pub fn count(&self, kind: TransactionKind) -> usize {
        self.sequence(kind).len()
    }

    /// The engine invariant execute cycle (spec §4.3 "Execute cycle"):
    /// `execute(ICT); execute(IST); execute(NICT); execute(NIST);
    /// execute_timers(ICT,IST,NICT,NIST)`.
    pub fn run_cycle(&mut self) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        for kind in [TransactionKind::Ict, TransactionKind::Ist, TransactionKind::Nict, TransactionKind::Nist] {
            actions.extend(self.execute_kind(kind));
        }
        for kind in [TransactionKind::Ict, TransactionKind::Ist, TransactionKind::Nict, TransactionKind::Nist] {
            actions.extend(self.execute_timers(kind));
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_message::{init_request, Uri, Via};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn remote() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5060)
    }

    #[test]
    fn create_client_arms_a_and_b_and_sends_the_request() {
        let mut engine = TransactionEngine::new(TimerSettings::default());
        let mut req = init_request(Method::Invite, Uri::parse("sip:bob@example.com").unwrap());
        req.via.push(Via::new("UDP", "alice.example.com", "z9hG4bK-1"));

        let (key, actions) = engine.create_client(req, remote());
        assert_eq!(key.kind, TransactionKind::Ict);
        assert_eq!(engine.state_of(&key), Some(State::Calling));
        assert!(actions.iter().any(|a| matches!(a, EngineAction::Send { .. })));
        assert!(actions.iter().any(|a| matches!(a, EngineAction::ScheduleTimer { timer: TimerType::A, .. })));
        assert!(actions.iter().any(|a| matches!(a, EngineAction::ScheduleTimer { timer: TimerType::B, .. })));
    }

    #[test]
    fn duplicate_invite_does_not_create_a_second_server_transaction() {
        let mut engine = TransactionEngine::new(TimerSettings::default());
        let mut req = init_request(Method::Invite, Uri::parse("sip:bob@example.com").unwrap());
        req.via.push(Via::new("UDP", "alice.example.com", "z9hG4bK-2"));

        let key1 = engine.create_server(&req, remote());
        let existing = engine.find_key(TransactionKind::Ist, "z9hG4bK-2", "alice.example.com", &Method::Invite);
        assert_eq!(existing, Some(key1));
        assert_eq!(engine.sequence(TransactionKind::Ist).len(), 1);
    }

    #[test]
    fn stray_response_matches_nothing() {
        let engine = TransactionEngine::new(TimerSettings::default());
        assert_eq!(engine.find_key(TransactionKind::Ict, "z9hG4bK-nonexistent", "host", &Method::Invite), None);
    }
}
