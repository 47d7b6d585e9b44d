//! A small, single-threaded, priority-aware event loop.
//!
//! This is the Rust stand-in for the libevent `event_base` the original
//! C implementation this system was distilled from is built on (spec
//! §4.1): register interest in a readable/writable fd, a one-shot timer,
//! or a manual "wake" token; the loop invokes the matching callback on
//! its own thread, in FIFO order within a priority, never preempting one
//! callback with another.
//!
//! Built directly on [`mio`] rather than an async runtime: spec §5
//! requires a single OS thread with *no* locks between transactions,
//! which a work-stealing executor does not give you by construction.

pub mod error;
mod timers;

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use mio::event::Source;
use mio::{Events, Interest, Poll, Token as MioToken};

pub use error::{Error, Result};
use timers::TimerWheel;

/// Two priority levels are enough to let transport I/O run ahead of
/// transaction-engine work without starving the engine (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Io = 0,
    Engine = 1,
}

const PRIORITY_LEVELS: usize = 2;

/// Opaque registration handle returned by `register_io`/`schedule_timer`/
/// `wake`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(usize);

/// What woke a registration up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Readable,
    Writable,
    Timer,
    Wake,
}

#[derive(Debug, Clone, Copy)]
struct Ready {
    token: Token,
    priority: Priority,
    readiness: Readiness,
}

/// The event loop itself.
///
/// Owns the OS poller and the bookkeeping needed to turn its readiness
/// notifications into priority-ordered callback dispatch.
pub struct Reactor {
    poll: Poll,
    events: Events,
    next_token: usize,
    io_priority: HashMap<Token, Priority>,
    timers: TimerWheel,
    /// At-most-one pending manual wake per priority (spec §9: "a correct
    /// re-implementation should coalesce pending wakes into a single
    /// token").
    pending_wake: [Option<Token>; PRIORITY_LEVELS],
    running: bool,
}

impl Reactor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(256),
            next_token: 1,
            io_priority: HashMap::new(),
            timers: TimerWheel::new(),
            pending_wake: [None, None],
            running: true,
        })
    }

    fn alloc_token(&mut self) -> Token {
        let t = Token(self.next_token);
        self.next_token += 1;
        t
    }

    /// Register a pollable I/O source (e.g. a UDP socket) as readable
    /// and/or writable, persistent until explicitly deregistered.
    pub fn register_io<S: Source>(
        &mut self,
        source: &mut S,
        priority: Priority,
        interest: Interest,
    ) -> Result<Token> {
        let token = self.alloc_token();
        self.poll.registry().register(source, MioToken(token.0), interest)?;
        self.io_priority.insert(token, priority);
        tracing::debug!(?token, ?priority, ?interest, "registered I/O source");
        Ok(token)
    }

    pub fn deregister_io<S: Source>(&mut self, source: &mut S, token: Token) -> Result<()> {
        if self.io_priority.remove(&token).is_none() {
            return Err(Error::UnknownToken(token));
        }
        self.poll.registry().deregister(source)?;
        tracing::debug!(?token, "deregistered I/O source");
        Ok(())
    }

    /// Schedule a one-shot timer. Re-arm by scheduling again from inside
    /// the fired callback (this mirrors the transaction timers, which
    /// always decide their own next interval, e.g. Timer A's exponential
    /// backoff).
    pub fn schedule_timer(&mut self, after: Duration, priority: Priority) -> Token {
        let token = self.alloc_token();
        self.timers.schedule(token, Instant::now() + after, priority);
        token
    }

    pub fn cancel_timer(&mut self, token: Token) -> Result<()> {
        if self.timers.cancel(token) {
            Ok(())
        } else {
            Err(Error::UnknownToken(token))
        }
    }

    /// Post a manual wake at the given priority. If one is already
    /// pending for that priority it is reused — calling `wake()` from
    /// inside a callback queues the next cycle rather than recursing
    /// into it (spec §4.4).
    pub fn wake(&mut self, priority: Priority) -> Token {
        if let Some(existing) = self.pending_wake[priority as usize] {
            return existing;
        }
        let token = self.alloc_token();
        self.pending_wake[priority as usize] = Some(token);
        token
    }

    /// Ask `run` to return once the current turn's callbacks have all
    /// been dispatched.
    pub fn request_exit(&mut self) {
        self.running = false;
    }

    /// Run until `request_exit` is called. `handler` is invoked once per
    /// ready registration, highest priority first, FIFO within a
    /// priority; it must not block.
    pub fn run<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&mut Reactor, Token, Readiness),
    {
        self.running = true;
        while self.running {
            self.turn(&mut handler)?;
        }
        Ok(())
    }

    /// Run a single turn: one `poll()` (or none, if a wake is already
    /// pending), then dispatch everything that became ready, I/O
    /// priority before engine priority.
    pub fn turn<F>(&mut self, handler: &mut F) -> Result<()>
    where
        F: FnMut(&mut Reactor, Token, Readiness),
    {
        let mut buckets: [VecDeque<Ready>; PRIORITY_LEVELS] = [VecDeque::new(), VecDeque::new()];

        for p in [Priority::Io, Priority::Engine] {
            if let Some(token) = self.pending_wake[p as usize].take() {
                buckets[p as usize].push_back(Ready { token, priority: p, readiness: Readiness::Wake });
            }
        }

        let has_pending_wake = !buckets[0].is_empty() || !buckets[1].is_empty();
        let timeout = if has_pending_wake {
            Some(Duration::ZERO)
        } else {
            self.timers.next_deadline().map(|deadline| deadline.saturating_duration_since(Instant::now()))
        };

        self.poll.poll(&mut self.events, timeout)?;

        for event in self.events.iter() {
            let token = Token(event.token().0);
            if let Some(&priority) = self.io_priority.get(&token) {
                if event.is_readable() {
                    buckets[priority as usize].push_back(Ready { token, priority, readiness: Readiness::Readable });
                }
                if event.is_writable() {
                    buckets[priority as usize].push_back(Ready { token, priority, readiness: Readiness::Writable });
                }
            }
        }

        for (token, priority) in self.timers.drain_due(Instant::now()) {
            buckets[priority as usize].push_back(Ready { token, priority, readiness: Readiness::Timer });
        }

        for priority_bucket in &mut buckets {
            while let Some(ready) = priority_bucket.pop_front() {
                tracing::trace!(token = ?ready.token, readiness = ?ready.readiness, "dispatch");
                handler(self, ready.token, ready.readiness);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_coalesces_within_a_priority() {
        let mut reactor = Reactor::new().unwrap();
        let t1 = reactor.wake(Priority::Engine);
        let t2 = reactor.wake(Priority::Engine);
        assert_eq!(t1, t2, "a second wake before dispatch must reuse the pending token");
    }

    #[test]
    fn wake_is_dispatched_then_cleared() {
        let mut reactor = Reactor::new().unwrap();
        reactor.wake(Priority::Io);

        let mut seen = Vec::new();
        reactor.turn(&mut |_, token, readiness| seen.push((token, readiness))).unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, Readiness::Wake);

        // A second turn with no new wake should not redeliver it.
        let mut seen_again = Vec::new();
        reactor.schedule_timer(Duration::from_millis(1), Priority::Io);
        std::thread::sleep(Duration::from_millis(5));
        reactor.turn(&mut |_, token, readiness| seen_again.push((token, readiness))).unwrap();
        assert!(seen_again.iter().all(|(_, r)| *r != Readiness::Wake));
    }

    #[test]
    fn timer_fires_once_and_not_again() {
        let mut reactor = Reactor::new().unwrap();
        let token = reactor.schedule_timer(Duration::from_millis(1), Priority::Engine);
        std::thread::sleep(Duration::from_millis(5));

        let mut fired = 0;
        reactor
            .turn(&mut |_, t, readiness| {
                if t == token && readiness == Readiness::Timer {
                    fired += 1;
                }
            })
            .unwrap();
        assert_eq!(fired, 1);

        let mut fired_again = 0;
        reactor
            .turn(&mut |_, t, readiness| {
                if t == token && readiness == Readiness::Timer {
                    fired_again += 1;
                }
            })
            .unwrap();
        assert_eq!(fired_again, 0, "a one-shot timer must not refire on a later turn");
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut reactor = Reactor::new().unwrap();
        let token = reactor.schedule_timer(Duration::from_millis(1), Priority::Io);
        reactor.cancel_timer(token).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let mut fired = false;
        reactor.turn(&mut |_, _, _| fired = true).unwrap();
        assert!(!fired);
    }

    #[test]
    fn io_priority_is_dispatched_before_engine_priority() {
        let mut reactor = Reactor::new().unwrap();
        // Engine is woken first but Io must still be dispatched first.
        let engine_token = reactor.wake(Priority::Engine);
        let io_token = reactor.wake(Priority::Io);

        let mut seen = Vec::new();
        reactor.turn(&mut |_, token, _| seen.push(token)).unwrap();
        assert_eq!(seen, vec![io_token, engine_token]);
    }

    #[test]
    fn cancel_unknown_timer_errors() {
        let mut reactor = Reactor::new().unwrap();
        let bogus = Token(999_999);
        assert!(matches!(reactor.cancel_timer(bogus), Err(Error::UnknownToken(_))));
    }
}
