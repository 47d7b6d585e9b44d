//! RFC 3261 §17 timers: types and the standard durations derived from
//! T1/T2/T4 (spec §3 "Supplemental types": mirrors
//! `rvoip_dialog_core::transaction::timer::TimerSettings` down to the `t1`
//! default).

use std::time::Duration;

/// One of the ten named RFC 3261 transaction timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerType {
    /// ICT: request retransmit, exponential backoff.
    A,
    /// ICT: transaction timeout.
    B,
    /// ICT: wait for response retransmissions after a final response.
    D,
    /// NICT: request retransmit, exponential backoff capped at T2.
    E,
    /// NICT: transaction timeout.
    F,
    /// NICT: wait for response retransmissions after a final response.
    K,
    /// IST: final response retransmit, exponential backoff capped at T2.
    G,
    /// IST: wait for ACK on a non-2xx final response.
    H,
    /// IST: wait in Confirmed before terminating.
    I,
    /// NIST: wait for request retransmissions after a final response.
    J,
}

/// RFC 3261 §17 default intervals and the durations derived from them.
///
/// `t1`/`t2`/`t4` are independently configurable (spec §6.7 `EngineConfig`);
/// everything else is computed from them exactly as RFC 3261 specifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    pub t1: Duration,
    pub t2: Duration,
    pub t4: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self { t1: Duration::from_millis(500), t2: Duration::from_secs(4), t4: Duration::from_secs(5) }
    }
}

impl TimerSettings {
    /// Timer B / F: 64*T1.
    pub fn timeout(&self) -> Duration {
        self.t1 * 64
    }

    /// Timer D: max(32s, 64*T1) for unreliable transports.
    pub fn d(&self) -> Duration {
        std::cmp::max(Duration::from_secs(32), self.timeout())
    }

    /// Timer H: 64*T1.
    pub fn h(&self) -> Duration {
        self.timeout()
    }

    /// Timer I: T4, for unreliable transports.
    pub fn i(&self) -> Duration {
        self.t4
    }

    /// Timer J: 64*T1, for unreliable transports.
    pub fn j(&self) -> Duration {
        self.timeout()
    }

    /// Timer K: T4, for unreliable transports.
    pub fn k(&self) -> Duration {
        self.t4
    }

    /// Next Timer A/E interval: double, capped at T2 (INVITE) — callers
    /// that need the non-INVITE variant use [`TimerSettings::next_e`].
    pub fn next_a(&self, previous: Duration) -> Duration {
        previous * 2
    }

    /// Timer E is capped at T2 once the non-INVITE request enters
    /// Proceeding; before that it behaves like A.
    pub fn next_e(&self, previous: Duration) -> Duration {
        std::cmp::min(previous * 2, self.t2)
    }

    /// Timer G doubles every retransmit, capped at T2.
    pub fn next_g(&self, previous: Duration) -> Duration {
        std::cmp::min(previous * 2, self.t2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_durations_match_rfc3261_defaults() {
        let s = TimerSettings::default();
        assert_eq!(s.timeout(), Duration::from_millis(32_000));
        assert_eq!(s.d(), Duration::from_secs(32));
        assert_eq!(s.h(), Duration::from_millis(32_000));
        assert_eq!(s.i(), Duration::from_secs(5));
        assert_eq!(s.j(), Duration::from_millis(32_000));
    }

    #[test]
    fn timer_g_backoff_caps_at_t2() {
        let s = TimerSettings::default();
        let mut interval = s.t1;
        for _ in 0..10 {
            interval = s.next_g(interval);
        }
        assert_eq!(interval, s.t2);
    }
}
