// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity Monitor: per-terminal byte-traffic classification with a
//! debounce (§4.6).
//!
//! One `ActivityMonitor` is owned per terminal by the Registry and torn down
//! with it. It holds no timer of its own: the registry's per-terminal task
//! calls [`ActivityMonitor::on_output`]/[`on_input`]/[`poll`] as bytes
//! arrive and on a periodic tick, translating byte traffic into
//! [`crate::state_machine`] events.

use std::time::{Duration, Instant};

use crate::state_machine::{StateEvent, Trigger};

/// Default window during which further bytes are still considered "busy".
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Byte-traffic classification tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityTier {
    Busy,
    Prompt,
    Exited,
}

/// Tracks the most recent byte arrival for one terminal and classifies tier
/// changes into state-machine events.
pub struct ActivityMonitor {
    debounce: Duration,
    last_activity: Option<Instant>,
    tier: ActivityTier,
}

impl ActivityMonitor {
    pub fn new(debounce: Duration) -> Self {
        Self { debounce, last_activity: None, tier: ActivityTier::Prompt }
    }

    pub fn current_tier(&self) -> ActivityTier {
        self.tier
    }

    /// Bytes arrived from the PTY (agent/process output).
    pub fn on_output(&mut self, now: Instant) -> Option<(StateEvent, Trigger, f64)> {
        self.last_activity = Some(now);
        self.set_tier(ActivityTier::Busy, Trigger::Output)
    }

    /// The user typed into the terminal.
    pub fn on_input(&mut self, now: Instant) -> Option<(StateEvent, Trigger, f64)> {
        self.last_activity = Some(now);
        self.set_tier(ActivityTier::Busy, Trigger::Input)
    }

    /// The underlying process exited.
    pub fn on_exit(&mut self, code: Option<i32>) -> (StateEvent, Trigger, f64) {
        self.tier = ActivityTier::Exited;
        (StateEvent::Exit { code }, Trigger::Output, 1.0)
    }

    /// Periodic debounce check: if no bytes have arrived for at least
    /// `debounce`, classify as `prompt`. Confidence scales with how far past
    /// the debounce window the silence has run, capped at 1.0.
    pub fn poll(&mut self, now: Instant) -> Option<(StateEvent, Trigger, f64)> {
        if self.tier == ActivityTier::Exited {
            return None;
        }
        let Some(last) = self.last_activity else {
            return None;
        };
        let silence = now.saturating_duration_since(last);
        if silence >= self.debounce {
            let confidence = (silence.as_secs_f64() / self.debounce.as_secs_f64()).min(1.0);
            self.set_tier_with_confidence(ActivityTier::Prompt, Trigger::Activity, confidence)
        } else {
            None
        }
    }

    fn set_tier(&mut self, tier: ActivityTier, trigger: Trigger) -> Option<(StateEvent, Trigger, f64)> {
        self.set_tier_with_confidence(tier, trigger, 1.0)
    }

    fn set_tier_with_confidence(
        &mut self,
        tier: ActivityTier,
        trigger: Trigger,
        confidence: f64,
    ) -> Option<(StateEvent, Trigger, f64)> {
        if tier == self.tier {
            return None;
        }
        self.tier = tier;
        let event = match tier {
            ActivityTier::Busy => StateEvent::Busy,
            ActivityTier::Prompt => StateEvent::Prompt,
            ActivityTier::Exited => return None,
        };
        Some((event, trigger, confidence))
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
