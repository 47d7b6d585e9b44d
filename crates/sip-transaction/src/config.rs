//! Engine-wide configuration (spec §6.7 "Ambient: Configuration").
//!
//! Mirrors `rvoip_dialog_core::api::config::{ClientConfig, ServerConfig}`'s
//! builder style: `::new()` plus chainable `with_*` setters.

use crate::timer::TimerSettings;

const DEFAULT_USER_AGENT: &str = "sip-core-engine/0.1";

/// Timer overrides and the `User-Agent` string [`crate::core::SipCore`]
/// stamps onto responses it builds.
///
/// No file-based config format is mandated by the spec; overrides are
/// programmatic, same as the teacher's `DialogConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub timers: TimerSettings,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { timers: TimerSettings::default(), user_agent: DEFAULT_USER_AGENT.to_string() }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timers(mut self, timers: TimerSettings) -> Self {
        self.timers = timers;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
