//! INVITE Client Transaction: Calling → Proceeding → Terminated, or
//! Calling/Proceeding → Completed → Terminated on a non-2xx final (spec
//! §4.3 "INVITE Client (ICT)").
//!
//! A 2xx final response skips Completed entirely: RFC 3261 §13.2.2.4
//! hands the ACK to the TU, not the transaction, so once it's notified
//! there's nothing left for this transaction to do. This is the
//! `Ict2xxReceived` TU event the open-questions note in spec §9 points
//! at ("route responses to the corresponding client table").

use crate::event::{EngineAction, Event, TuEvent};
use crate::messages::ack_for_non_2xx;
use crate::timer::{TimerSettings, TimerType};
use crate::transaction::{State, Transaction};

pub(crate) fn on_create(tx: &Transaction, settings: &TimerSettings) -> Vec<EngineAction> {
    vec![
        EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::A, after: settings.t1 },
        EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::B, after: settings.timeout() },
    ]
}

pub(crate) fn on_event(tx: &mut Transaction, _settings: &TimerSettings, event: Event) -> Vec<EngineAction> {
    let Event::ReceivedResponse(response) = event else {
        tracing::debug!(key = %tx.key, "ICT ignores non-response event");
        return Vec::new();
    };
    let Some(status) = response.status() else { return Vec::new() };

    match tx.state {
        State::Calling | State::Proceeding if status.is_provisional() => {
            let mut actions = Vec::new();
            if tx.state == State::Calling {
                actions.push(EngineAction::CancelTimer { key: tx.key.clone(), timer: TimerType::A });
            }
            tx.state = State::Proceeding;
            tx.last_response = Some(response);
            actions
        }
        State::Calling | State::Proceeding if status.is_success() => {
            let mut actions = vec![
                EngineAction::CancelTimer { key: tx.key.clone(), timer: TimerType::A },
                EngineAction::CancelTimer { key: tx.key.clone(), timer: TimerType::B },
                EngineAction::Notify(TuEvent::Ict2xxReceived {
                    key: tx.key.clone(),
                    remote: tx.remote,
                    request: Box::new(tx.request.clone()),
                    response: Box::new(response),
                }),
            ];
            tx.state = State::Terminated;
            actions.push(EngineAction::Killed { key: tx.key.clone() });
            actions
        }
        State::Calling | State::Proceeding => {
            // Final non-2xx: ACK is the transaction's own responsibility.
            let ack = ack_for_non_2xx(&tx.request, &response);
            let mut actions = vec![
                EngineAction::CancelTimer { key: tx.key.clone(), timer: TimerType::A },
                EngineAction::CancelTimer { key: tx.key.clone(), timer: TimerType::B },
                EngineAction::Send { key: tx.key.clone(), destination: tx.remote, message: Box::new(ack) },
            ];
            tx.last_response = Some(response);
            tx.state = State::Completed;
            actions.push(EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::D, after: _settings.d() });
            actions
        }
        State::Completed if status.is_final() => {
            // Retransmitted final response: re-ACK, stay in Completed.
            let ack = ack_for_non_2xx(&tx.request, &response);
            vec![EngineAction::Send { key: tx.key.clone(), destination: tx.remote, message: Box::new(ack) }]
        }
        _ => {
            tracing::debug!(key = %tx.key, state = ?tx.state, "ICT dropped response in this state");
            Vec::new()
        }
    }
}

pub(crate) fn on_timer(tx: &mut Transaction, settings: &TimerSettings, timer: TimerType) -> Vec<EngineAction> {
    match (tx.state, timer) {
        (State::Calling, TimerType::A) => {
            tx.retransmit_interval = settings.next_a(tx.retransmit_interval);
            vec![
                EngineAction::Send { key: tx.key.clone(), destination: tx.remote, message: Box::new(tx.request.clone()) },
                EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::A, after: tx.retransmit_interval },
            ]
        }
        (State::Calling | State::Proceeding, TimerType::B) => {
            tx.state = State::Terminated;
            tracing::warn!(key = %tx.key, "ICT timed out waiting for a final response");
            vec![EngineAction::CancelAllTimers { key: tx.key.clone() }, EngineAction::Killed { key: tx.key.clone() }]
        }
        (State::Completed, TimerType::D) => {
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
    use sip_message::{init_request, init_response, Method, Uri, Via};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    fn new_tx() -> Transaction {
        let mut req = init_request(Method::Invite, Uri::parse("sip:bob@example.com").unwrap());
        req.via.push(Via::new("UDP", "alice.example.com", "z9hG4bK-1"));
        let key = TransactionKey::new("z9hG4bK-1", "alice.example.com", Method::Invite, TransactionKind::Ict);
        let remote = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5060);
        Transaction::new(key, State::Calling, req, remote, Duration::from_millis(500))
    }

    #[test]
    fn provisional_cancels_timer_a_and_moves_to_proceeding() {
        let mut tx = new_tx();
        let settings = TimerSettings::default();
        let resp = init_response(&tx.request, 180);
        let actions = on_event(&mut tx, &settings, Event::ReceivedResponse(resp));
        assert_eq!(tx.state, State::Proceeding);
        assert!(actions.iter().any(|a| matches!(a, EngineAction::CancelTimer { timer: TimerType::A, .. })));
    }

    #[test]
    fn two_xx_emits_notify_before_killed_and_terminates() {
        let mut tx = new_tx();
        let settings = TimerSettings::default();
        let resp = init_response(&tx.request, 200);
        let actions = on_event(&mut tx, &settings, Event::ReceivedResponse(resp));
        assert_eq!(tx.state, State::Terminated);
        let notify_idx = actions.iter().position(|a| matches!(a, EngineAction::Notify(_))).unwrap();
        let killed_idx = actions.iter().position(|a| matches!(a, EngineAction::Killed { .. })).unwrap();
        assert!(notify_idx < killed_idx, "ACK notification must precede transaction teardown");
    }

    #[test]
    fn final_non_2xx_sends_ack_and_arms_timer_d() {
        let mut tx = new_tx();
        let settings = TimerSettings::default();
        let resp = init_response(&tx.request, 486);
        let actions = on_event(&mut tx, &settings, Event::ReceivedResponse(resp));
        assert_eq!(tx.state, State::Completed);
        assert!(actions.iter().any(|a| matches!(a, EngineAction::Send { .. })));
        assert!(actions.iter().any(|a| matches!(a, EngineAction::ScheduleTimer { timer: TimerType::D, .. })));
    }

    #[test]
    fn timer_b_times_out_the_transaction() {
        let mut tx = new_tx();
        let settings = TimerSettings::default();
        let actions = on_timer(&mut tx, &settings, TimerType::B);
        assert_eq!(tx.state, State::Terminated);
        assert!(actions.iter().any(|a| matches!(a, EngineAction::Killed { .. })));
    }
}
