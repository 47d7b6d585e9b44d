//! Non-INVITE Server Transaction: Trying → Proceeding → Completed →
//! Terminated (spec §4.3 "Non-INVITE Server (NIST)").

use crate::event::{EngineAction, Event};
use crate::timer::{TimerSettings, TimerType};
use crate::transaction::{State, Transaction};

pub(crate) fn on_create(_tx: &Transaction, _settings: &TimerSettings) -> Vec<EngineAction> {
    Vec::new()
}

pub(crate) fn on_event(tx: &mut Transaction, settings: &TimerSettings, event: Event) -> Vec<EngineAction> {
    match event {
        Event::ReceivedRequest(_retransmit) => match (tx.state, &tx.last_response) {
            (State::Proceeding | State::Completed, Some(response)) => {
                tracing::debug!(key = %tx.key, "NIST_REQUEST_RECEIVED_AGAIN");
                vec![EngineAction::Send { key: tx.key.clone(), destination: tx.remote, message: Box::new(response.clone()) }]
            }
            _ => Vec::new(),
        },
        Event::OutgoingMessage(response) => on_outgoing_response(tx, settings, response),
        Event::ReceivedResponse(_) => {
            tracing::debug!(key = %tx.key, "NIST ignores responses, it is a server transaction");
            Vec::new()
        }
    }
}

fn on_outgoing_response(tx: &mut Transaction, settings: &TimerSettings, response: sip_message::Message) -> Vec<EngineAction> {
    let Some(status) = response.status() else { return Vec::new() };

    if status.is_provisional() {
        tx.state = State::Proceeding;
        tx.last_response = Some(response.clone());
        return vec![EngineAction::Send { key: tx.key.clone(), destination: tx.remote, message: Box::new(response) }];
    }

    tx.last_response = Some(response.clone());
    tx.state = State::Completed;
    vec![
        EngineAction::Send { key: tx.key.clone(), destination: tx.remote, message: Box::new(response) },
        EngineAction::ScheduleTimer { key: tx.key.clone(), timer: TimerType::J, after: settings.j() },
    ]
}

pub(crate) fn on_timer(tx: &mut Transaction, _settings: &TimerSettings, timer: TimerType) -> Vec<EngineAction> {
    match (tx.state, timer) {
        (State::Completed, TimerType::J) => {
            tx.state = State::Terminated;
            vec![EngineAction::Killed { key: tx.key.clone() }]
        }
        _ => Vec::new(),
    }
}
