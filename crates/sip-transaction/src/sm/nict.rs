//! Non-INVITE Client Transaction: Trying → Proceeding → Completed →
//! Terminated (spec §4.3 "Non-INVITE Client (NICT)").

use crate::event::{EngineAction, Event};
use crate::timer::{TimerSettings, TimerType};
use crate::transaction::{State, Transaction};

pub(crate) fn on_create(tx: &Transaction, settings: &TimerSettings) -> Vec<EngineAction> {
    vec![
        EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::E, after: settings.t1 },
        EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::F, after: settings.timeout() },
    ]
}

pub(crate) fn on_event(tx: &mut Transaction, settings: &TimerSettings, event: Event) -> Vec<EngineAction> {
    let Event::ReceivedResponse(response) = event else {
        tracing::debug!(key = %tx.key, "NICT ignores non-response event");
        return Vec::new();
    };
    let Some(status) = response.status() else { return Vec::new() };

    match tx.state {
        State::Trying | State::Proceeding if status.is_provisional() => {
            tx.state = State::Proceeding;
            tx.last_response = Some(response);
            Vec::new()
        }
        State::Trying | State::Proceeding if status.is_final() => {
            tx.last_response = Some(response);
            tx.state = State::Completed;
            vec![
                EngineAction::CancelTimer { key: tx.key.clone(), timer: TimerType::E },
                EngineAction::CancelTimer { key: tx.key.clone(), timer: TimerType::F },
                EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::K, after: settings.k() },
            ]
        }
        _ => {
            tracing::debug!(key = %tx.key, state = ?tx.state, "NICT dropped response in this state");
            Vec::new()
        }
    }
}

pub(crate) fn on_timer(tx: &mut Transaction, settings: &TimerSettings, timer: TimerType) -> Vec<EngineAction> {
    match (tx.state, timer) {
        (State::Trying | State::Proceeding, TimerType::E) => {
            tx.retransmit_interval = settings.next_e(tx.retransmit_interval);
            vec![
                EngineAction::Send { key: tx.key.clone(), destination: tx.remote, message: Box::new(tx.request.clone()) },
                EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::E, after: tx.retransmit_interval },
            ]
        }
        (State::Trying | State::Proceeding, TimerType::F) => {
            tx.state = State::Terminated;
            tracing::warn!(key = %tx.key, "NICT timed out waiting for a final response");
            vec![EngineAction::CancelAllTimers { key: tx.key.clone() }, EngineAction::Killed { key: tx.key.clone() }]
        }
        (State::Completed, TimerType::K) => {
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
        let mut req = init_request(Method::Register, Uri::parse("sip:example.com").unwrap());
        req.via.push(Via::new("UDP", "alice.example.com", "z9hG4bK-1"));
        let key = TransactionKey::new("z9hG4bK-1", "alice.example.com", Method::Register, TransactionKind::Nict);
        let remote = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5060);
        Transaction::new(key, State::Trying, req, remote, Duration::from_millis(500))
    }

    #[test]
    fn final_response_arms_timer_k_and_cancels_e_f() {
        let mut tx = new_tx();
        let settings = TimerSettings::default();
        let resp = init_response(&tx.request, 200);
        let actions = on_event(&mut tx, &settings, Event::ReceivedResponse(resp));
        assert_eq!(tx.state, State::Completed);
        assert!(actions.iter().any(|a| matches!(a, EngineAction::ScheduleTimer { timer: TimerType::K, .. })));
        assert!(actions.iter().any(|a| matches!(a, EngineAction::CancelTimer { timer: TimerType::E, .. })));
    }

    #[test]
    fn timer_e_retransmits_and_backs_off_capped_at_t2() {
        let mut tx = new_tx();
        let settings = TimerSettings::default();
        for _ in 0..20 {
            on_timer(&mut tx, &settings, TimerType::E);
        }
        assert_eq!(tx.retransmit_interval, settings.t2);
    }
}
