//! One-shot timer bookkeeping for the reactor.
//!
//! `mio` has no native timer support (it is a thin wrapper over
//! epoll/kqueue/IOCP, all of which are I/O-readiness APIs only), so the
//! reactor keeps its own min-heap of deadlines and turns the earliest one
//! into the `poll()` timeout.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

use crate::{Priority, Token};

pub(crate) struct TimerWheel {
    // BinaryHeap is a max-heap; Reverse(deadline) turns it into the
    // earliest-deadline-first order we actually want. Entries cancelled
    // before they fire are dropped from `live` but left as tombstones
    // here, discarded lazily as they reach the top.
    heap: BinaryHeap<(Reverse<Instant>, Token)>,
    live: HashMap<Token, Priority>,
}

impl TimerWheel {
    pub(crate) fn new() -> Self {
        Self { heap: BinaryHeap::new(), live: HashMap::new() }
    }

    pub(crate) fn schedule(&mut self, token: Token, deadline: Instant, priority: Priority) {
        self.live.insert(token, priority);
        self.heap.push((Reverse(deadline), token));
    }

    pub(crate) fn cancel(&mut self, token: Token) -> bool {
        self.live.remove(&token).is_some()
    }

    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_tombstones();
        self.heap.peek().map(|(Reverse(deadline), _)| *deadline)
    }

    /// Pop every live timer whose deadline has passed.
    pub(crate) fn drain_due(&mut self, now: Instant) -> Vec<(Token, Priority)> {
        let mut due = Vec::new();
        loop {
            self.discard_tombstones();
            match self.heap.peek() {
                Some(&(Reverse(deadline), token)) if deadline <= now => {
                    self.heap.pop();
                    if let Some(priority) = self.live.remove(&token) {
                        due.push((token, priority));
                    }
                }
                _ => break,
            }
        }
        due
    }

    fn discard_tombstones(&mut self) {
        while let Some(&(_, token)) = self.heap.peek() {
            if self.live.contains_key(&token) {
                break;
            }
            self.heap.pop();
        }
    }
}
