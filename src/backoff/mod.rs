//! Anti-automation backoff: per-strategy failure tracking, randomized
//! pacing, and bot-challenge detection.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::models::StrategyKind;

/// Phrases that mark an automated-traffic challenge page.
const BOT_CHALLENGE_MARKERS: &[&str] = &["captcha", "robot", "unusual traffic"];

/// Case-insensitive scan of rendered content for challenge markers.
pub fn is_bot_challenge(content: &str) -> bool {
    let lowered = content.to_lowercase();
    BOT_CHALLENGE_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Availability of a single strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Available,
    /// At least one consecutive failure; still usable.
    Degraded,
    /// Hit the consecutive-failure threshold; off for the rest of the run.
    Disabled,
}

#[derive(Debug)]
struct StrategyHealth {
    consecutive_failures: u32,
    disable_threshold: u32,
    state: StrategyState,
}

impl StrategyHealth {
    fn new(disable_threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            disable_threshold: disable_threshold.max(1),
            state: StrategyState::Available,
        }
    }

    fn record_failure(&mut self) -> StrategyState {
        if self.state == StrategyState::Disabled {
            return StrategyState::Disabled;
        }
        self.consecutive_failures += 1;
        self.state = if self.consecutive_failures >= self.disable_threshold {
            StrategyState::Disabled
        } else {
            StrategyState::Degraded
        };
        self.state
    }

    fn record_success(&mut self) {
        // Disabled is permanent for the run; a late success does not revive it.
        if self.state == StrategyState::Disabled {
            return;
        }
        self.consecutive_failures = 0;
        self.state = StrategyState::Available;
    }
}

/// Consecutive-failure counters and availability state per strategy.
#[derive(Debug)]
pub struct FailureRegistry {
    states: HashMap<StrategyKind, StrategyHealth>,
    default_threshold: u32,
}

impl FailureRegistry {
    pub fn new(default_threshold: u32) -> Self {
        Self {
            states: HashMap::new(),
            default_threshold: default_threshold.max(1),
        }
    }

    /// Override the disable threshold for one strategy.
    pub fn with_threshold(mut self, kind: StrategyKind, threshold: u32) -> Self {
        self.states.insert(kind, StrategyHealth::new(threshold));
        self
    }

    pub fn state(&self, kind: StrategyKind) -> StrategyState {
        self.states
            .get(&kind)
            .map(|h| h.state)
            .unwrap_or(StrategyState::Available)
    }

    pub fn is_disabled(&self, kind: StrategyKind) -> bool {
        self.state(kind) == StrategyState::Disabled
    }

    pub fn consecutive_failures(&self, kind: StrategyKind) -> u32 {
        self.states
            .get(&kind)
            .map(|h| h.consecutive_failures)
            .unwrap_or(0)
    }

    pub fn record_failure(&mut self, kind: StrategyKind) -> StrategyState {
        let threshold = self.default_threshold;
        let health = self
            .states
            .entry(kind)
            .or_insert_with(|| StrategyHealth::new(threshold));
        let state = health.record_failure();
        if state == StrategyState::Disabled {
            warn!(
                strategy = %kind,
                failures = health.consecutive_failures,
                "strategy disabled for the rest of the run"
            );
        }
        state
    }

    pub fn record_success(&mut self, kind: StrategyKind) {
        if let Some(health) = self.states.get_mut(&kind) {
            health.record_success();
        }
    }
}

/// Random duration from an inclusive millisecond range.
pub fn jitter_ms(range: (u64, u64)) -> Duration {
    let (lo, hi) = range;
    if hi <= lo {
        return Duration::from_millis(lo);
    }
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

/// Pacing applied around navigations to look less mechanical.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Delay drawn before each strategy navigation, milliseconds.
    pub pre_navigation_ms: (u64, u64),
    /// Extended pause after a bot challenge.
    pub bot_cooldown: Duration,
}

impl Pacing {
    pub fn pre_navigation_delay(&self) -> Duration {
        jitter_ms(self.pre_navigation_ms)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            pre_navigation_ms: (1000, 3000),
            bot_cooldown: Duration::from_secs(15),
        }
    }
}
