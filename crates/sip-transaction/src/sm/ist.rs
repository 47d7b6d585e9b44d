//! INVITE Server Transaction: Proceeding → Completed → Confirmed →
//! Terminated (spec §4.3 "INVITE Server (IST)").
//!
//! Both 2xx and non-2xx final responses arm G (response retransmit) and H
//! (wait for ACK), matching spec §4.3's literal state list. For a 2xx this
//! diverges from RFC 6026 (where the 2xx ACK bypasses the transaction
//! entirely) — see `DESIGN.md` for why that divergence is intentional here.
//! The 2xx path out of Completed normally runs through the Dialog Table
//! (`SipCore::confirm_ist`, spec §4.4 step 3), not through this module;
//! the non-2xx ACK path below exists for when no dialog match is found.

use sip_message::Method;

use crate::event::{EngineAction, Event, TuEvent};
use crate::timer::{TimerSettings, TimerType};
use crate::transaction::{State, Transaction};

pub(crate) fn on_create(_tx: &Transaction, _settings: &TimerSettings) -> Vec<EngineAction> {
    Vec::new()
}

pub(crate) fn on_event(tx: &mut Transaction, settings: &TimerSettings, event: Event) -> Vec<EngineAction> {
    match event {
        Event::ReceivedRequest(request) => match request.method() {
            Some(Method::Invite) => on_request_retransmit(tx),
            Some(Method::Ack) => on_ack(tx, settings),
            _ => {
                tracing::debug!(key = %tx.key, "IST ignores unrelated request");
                Vec::new()
            }
        },
        Event::OutgoingMessage(response) => on_outgoing_response(tx, settings, response),
        Event::ReceivedResponse(_) => {
            tracing::debug!(key = %tx.key, "IST ignores responses, it is a server transaction");
            Vec::new()
        }
    }
}

fn on_request_retransmit(tx: &Transaction) -> Vec<EngineAction> {
    match (tx.state, &tx.last_response) {
        (State::Completed, Some(response)) => {
            tracing::debug!(key = %tx.key, "IST_INVITE_RECEIVED_AGAIN");
            vec![EngineAction::Send { key: tx.key.clone(), destination: tx.remote, message: Box::new(response.clone()) }]
        }
        _ => Vec::new(),
    }
}

/// Absorbs an ACK to a non-2xx final response (spec §4.3: "An ACK to a
/// non-2xx final response is absorbed by IST"). A 2xx ACK never reaches
/// here under normal dispatch — it's matched via the Dialog Table instead
/// — but if no dialog matched, `SipCore` falls back to delivering it here
/// too, and the unified Completed state handles it the same way either way.
fn on_ack(tx: &mut Transaction, settings: &TimerSettings) -> Vec<EngineAction> {
    match tx.state {
        State::Completed => {
            tracing::debug!(key = %tx.key, "IST_ACK_RECEIVED");
            confirm(tx, settings)
        }
        State::Confirmed => {
            tracing::debug!(key = %tx.key, "IST_ACK_RECEIVED_AGAIN");
            Vec::new()
        }
        _ => {
            tracing::debug!(key = %tx.key, state = ?tx.state, "IST dropped an ACK outside Completed");
            Vec::new()
        }
    }
}

/// Moves a Completed IST to Confirmed, whether the ACK arrived through
/// this module's own FIFO (a non-2xx ACK) or was matched out of band via
/// the Dialog Table (a 2xx ACK, spec §4.4 step 3). Shared so both paths
/// arm Timer I identically.
pub(crate) fn confirm(tx: &mut Transaction, settings: &TimerSettings) -> Vec<EngineAction> {
    tx.state = State::Confirmed;
    vec![
        EngineAction::CancelTimer { key: tx.key.clone(), timer: TimerType::G },
        EngineAction::CancelTimer { key: tx.key.clone(), timer: TimerType::H },
        EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::I, after: settings.i() },
    ]
}

fn on_outgoing_response(tx: &mut Transaction, settings: &TimerSettings, response: sip_message::Message) -> Vec<EngineAction> {
    let Some(status) = response.status().cloned() else { return Vec::new() };

    if status.is_provisional() {
        tx.last_response = Some(response.clone());
        return vec![EngineAction::Send { key: tx.key.clone(), destination: tx.remote, message: Box::new(response) }];
    }

    let mut actions = vec![EngineAction::Send { key: tx.key.clone(), destination: tx.remote, message: Box::new(response.clone()) }];
    if status.is_success() {
        actions.push(EngineAction::Notify(TuEvent::Ist2xxSent {
            key: tx.key.clone(),
            request: Box::new(tx.request.clone()),
            response: Box::new(response.clone()),
        }));
    }
    tx.last_response = Some(response);
    tx.state = State::Completed;
    actions.push(EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::G, after: settings.t1 });
    actions.push(EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::H, after: settings.h() });
    actions
}

pub(crate) fn on_timer(tx: &mut Transaction, settings: &TimerSettings, timer: TimerType) -> Vec<EngineAction> {
    match (tx.state, timer) {
        (State::Completed, TimerType::G) => {
            tx.retransmit_interval = settings.next_g(tx.retransmit_interval);
            let response = tx.last_response.clone().expect("Completed state always has a last_response");
            vec![
                EngineAction::Send { key: tx.key.clone(), destination: tx.remote, message: Box::new(response) },
                EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::G, after: tx.retransmit_interval },
            ]
        }
        (State::Completed, TimerType::H) => {
            tx.state = State::Terminated;
            tracing::warn!(key = %tx.key, "IST timed out waiting for ACK");
            vec![EngineAction::CancelAllTimers { key: tx.key.clone() }, EngineAction::Killed { key: tx.key.clone() }]
        }
        (State::Confirmed, TimerType::I) => {
            tx.state = State::Terminated;
            vec![EngineAction::Killed { key: tx.key.clone() }]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{TransactionKey, TransactionKind};
    use sip_message::{init_request, init_response, Uri, Via};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    fn new_tx() -> Transaction {
        let mut req = init_request(Method::Invite, Uri::parse("sip:bob@example.com").unwrap());
        req.via.push(Via::new("UDP", "alice.example.com", "z9hG4bK-2"));
        let key = TransactionKey::new("z9hG4bK-2", "alice.example.com", Method::Invite, TransactionKind::Ist);
        let remote = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5060);
        Transaction::new(key, State::Proceeding, req, remote, Duration::from_millis(500))
    }

    #[test]
    fn sending_2xx_arms_g_and_h_and_notifies() {
        let mut tx = new_tx();
        let settings = TimerSettings::default();
        let resp = init_response(&tx.request, 200);
        let actions = on_event(&mut tx, &settings, Event::OutgoingMessage(resp));
        assert_eq!(tx.state, State::Completed);
        assert!(actions.iter().any(|a| matches!(a, EngineAction::Notify(TuEvent::Ist2xxSent { .. }))));
        assert!(actions.iter().any(|a| matches!(a, EngineAction::ScheduleTimer { timer: TimerType::G, .. })));
        assert!(actions.iter().any(|a| matches!(a, EngineAction::ScheduleTimer { timer: TimerType::H, .. })));
    }

    #[test]
    fn retransmitted_invite_in_completed_resends_last_response() {
        let mut tx = new_tx();
        let settings = TimerSettings::default();
        let resp = init_response(&tx.request, 486);
        on_event(&mut tx, &settings, Event::OutgoingMessage(resp));

        let retransmit = tx.request.clone();
        let actions = on_event(&mut tx, &settings, Event::ReceivedRequest(retransmit));
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], EngineAction::Send { .. }));
    }

    #[test]
    fn ack_in_completed_moves_to_confirmed_and_arms_timer_i() {
        let mut tx = new_tx();
        let settings = TimerSettings::default();
        let resp = init_response(&tx.request, 486);
        on_event(&mut tx, &settings, Event::OutgoingMessage(resp.clone()));

        let ack = crate::messages::ack_for_non_2xx(&tx.request, &resp);
        let actions = on_event(&mut tx, &settings, Event::ReceivedRequest(ack));
        assert_eq!(tx.state, State::Confirmed);
        assert!(actions.iter().any(|a| matches!(a, EngineAction::ScheduleTimer { timer: TimerType::I, .. })));
    }

    #[test]
    fn timer_i_terminates_from_confirmed() {
        let mut tx = new_tx();
        tx.state = State::Confirmed;
        let settings = TimerSettings::default();
        let actions = on_timer(&mut tx, &settings, TimerType::I);
        assert_eq!(tx.state, State::Terminated);
        assert!(actions.iter().any(|a| matches!(a, EngineAction::Killed { .. })));
    }
}
