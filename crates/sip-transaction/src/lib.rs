//! Transaction engine, dialog table, and SIP Core glue (spec §4.3-§4.5).
//!
//! Mirrors `rvoip_dialog_core::transaction::{client,server}::data` plus
//! `rvoip_transaction_core`'s transaction-table/timer split, bundled with a
//! dialog store and the receive-path glue the teacher splits across its
//! `dialog-core` manager. Everything that needs to see more than one of
//! Transport/Engine/DialogTable lives in [`core::SipCore`]; everything else
//! only knows about the layer directly below it.

pub mod config;
pub mod core;
pub mod dialog;
pub mod engine;
pub mod error;
pub mod event;
pub mod key;
mod messages;
pub mod sm;
pub mod timer;
pub mod transaction;

pub use config::EngineConfig;
pub use core::SipCore;
pub use dialog::{Dialog, DialogId, DialogState, DialogTable};
pub use engine::TransactionEngine;
pub use error::{Error, Result};
pub use event::{EngineAction, Event, TuEvent};
pub use key::{TransactionKey, TransactionKind};
pub use timer::{TimerSettings, TimerType};
pub use transaction::{State, Transaction};
