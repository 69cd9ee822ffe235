//! Failure-isolation circuit breaker.
//!
//! # State Transitions
//! ```text
//! Closed ──(requests >= min_requests && failure ratio >= threshold)──► Open
//! Open ──(open_cooldown elapsed, on next allow())──► HalfOpen
//! HalfOpen ──(half_open_successes_to_close consecutive successes)──► Closed
//! HalfOpen ──(any failure)──► Open (fresh cooldown)
//! ```
//!
//! All state lives behind a single mutex: admission checks, counter updates
//! and transitions observe a consistent snapshot even when many invocations
//! report concurrently.
//!
//! Every admission is a [`Permit`] stamped with the breaker's generation. The
//! generation advances on each state transition and each closed-window roll,
//! and a result carrying an older generation is discarded. A permit dropped
//! without a result gives back its half-open trial slot.

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::BreakerConfig;

/// State of the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerState {
    /// Normal operation, every call is admitted.
    Closed,

    /// The dependency is considered down, calls are rejected immediately.
    Open,

    /// Probing recovery with a limited number of trial calls.
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rolling counters for the current evaluation window.
///
/// Reset on every state transition and, while closed, whenever the
/// configured window elapses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerCounts {
    pub requests: u32,
    pub failures: u32,
    pub successes: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl BreakerCounts {
    /// Failures divided by requests; zero when nothing has been recorded.
    pub fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        f64::from(self.failures) / f64::from(self.requests)
    }

    fn record(&mut self, success: bool) {
        self.requests = self.requests.saturating_add(1);
        if success {
            self.successes = self.successes.saturating_add(1);
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
            self.consecutive_failures = 0;
        } else {
            self.failures = self.failures.saturating_add(1);
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.consecutive_successes = 0;
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    counts: BreakerCounts,
    opened_at: Option<Instant>,
    window_ends_at: Option<Instant>,
    trials_in_flight: u32,
    generation: u64,
}

impl Inner {
    fn new(generation: u64) -> Self {
        Self {
            state: BreakerState::Closed,
            counts: BreakerCounts::default(),
            opened_at: None,
            window_ends_at: None,
            trials_in_flight: 0,
            generation,
        }
    }
}

/// Permission to run one call, obtained from [`FailureIsolationBreaker::allow`].
///
/// Report the outcome with [`record`](Self::record). A permit dropped
/// without a result (the caller gave up on the call) changes no counters but
/// releases its half-open trial slot, so abandoned calls cannot hold the
/// breaker half-open forever.
#[must_use = "a permit must be recorded or dropped"]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a FailureIsolationBreaker,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    /// Generation of the breaker when this call was admitted.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true if this call holds a half-open trial slot.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Records the outcome of the admitted call.
    pub fn record(mut self, success: bool) {
        self.settled = true;
        self.breaker.settle(self.generation, self.trial, Some(success));
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.settle(self.generation, self.trial, None);
        }
    }
}

/// Tracks recent outcomes for one downstream dependency and decides, per
/// call, whether execution is permitted.
#[derive(Debug)]
pub struct FailureIsolationBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl FailureIsolationBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Asks for permission to run one call.
    ///
    /// Closed always admits. Open rejects until the cooldown has elapsed, then
    /// moves to half-open and admits the first trial. Half-open admits while
    /// fewer than `half_open_trial_cap` trials are in flight; each admitted
    /// trial holds its slot until its permit is recorded or dropped.
    ///
    /// Admission never touches the rolling counters.
    pub fn allow(&self) -> Option<Permit<'_>> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let trial = match inner.state {
            BreakerState::Closed => {
                self.roll_window(&mut inner, now);
                false
            }
            BreakerState::Open => {
                if !self.cooldown_elapsed(&inner, now) {
                    return None;
                }
                self.transition(&mut inner, BreakerState::HalfOpen, now);
                inner.trials_in_flight = 1;
                true
            }
            BreakerState::HalfOpen => {
                if inner.trials_in_flight >= self.config.half_open_trial_cap {
                    return None;
                }
                inner.trials_in_flight += 1;
                true
            }
        };

        Some(Permit {
            breaker: self,
            generation: inner.generation,
            trial,
            settled: false,
        })
    }

    /// Applies the outcome of a permit. `None` means the call was abandoned.
    fn settle(&self, generation: u64, trial: bool, outcome: Option<bool>) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if inner.state == BreakerState::Closed {
            self.roll_window(&mut inner, now);
        }
        if inner.generation != generation {
            tracing::trace!(
                breaker = %self.config.name,
                generation,
                current = inner.generation,
                "discarding result from an earlier generation"
            );
            return;
        }

        match inner.state {
            BreakerState::Closed => {
                let Some(success) = outcome else {
                    return;
                };
                inner.counts.record(success);

                let counts = inner.counts;
                if counts.requests >= self.config.min_requests
                    && counts.failure_ratio() >= self.config.failure_ratio_threshold
                {
                    tracing::warn!(
                        breaker = %self.config.name,
                        requests = counts.requests,
                        failures = counts.failures,
                        "circuit opened after failure ratio crossed threshold"
                    );
                    self.transition(&mut inner, BreakerState::Open, now);
                }
            }
            BreakerState::HalfOpen => {
                if trial {
                    inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
                }
                let Some(success) = outcome else {
                    tracing::debug!(breaker = %self.config.name, "recovery trial abandoned");
                    return;
                };
                inner.counts.record(success);

                if !success {
                    tracing::warn!(
                        breaker = %self.config.name,
                        "circuit reopened after failed recovery trial"
                    );
                    self.transition(&mut inner, BreakerState::Open, now);
                } else if inner.counts.consecutive_successes
                    >= self.config.half_open_successes_to_close
                {
                    tracing::info!(
                        breaker = %self.config.name,
                        "circuit closed after successful recovery"
                    );
                    self.transition(&mut inner, BreakerState::Closed, now);
                }
            }
            // Every transition into Open advances the generation, so no
            // live permit belongs to it.
            BreakerState::Open => {}
        }
    }

    /// Current state. An open breaker whose cooldown has elapsed reports
    /// `HalfOpen`, although the transition itself happens on the next `allow`.
    pub fn state(&self) -> BreakerState {
        let inner = self.inner.lock();
        match inner.state {
            BreakerState::Open if self.cooldown_elapsed(&inner, Instant::now()) => {
                BreakerState::HalfOpen
            }
            state => state,
        }
    }

    /// Snapshot of the rolling counters.
    pub fn counts(&self) -> BreakerCounts {
        self.inner.lock().counts
    }

    /// Current generation. Advances on every transition and window roll.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Forces the breaker back to closed with empty counters. Outstanding
    /// permits become stale.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let generation = inner.generation.wrapping_add(1);
        *inner = Inner::new(generation);
    }

    fn cooldown_elapsed(&self, inner: &Inner, now: Instant) -> bool {
        inner
            .opened_at
            .is_none_or(|opened_at| now.duration_since(opened_at) >= self.config.open_cooldown)
    }

    fn roll_window(&self, inner: &mut Inner, now: Instant) {
        let Some(window) = self.config.window else {
            return;
        };
        match inner.window_ends_at {
            Some(ends_at) if now < ends_at => {}
            Some(_) => {
                inner.counts = BreakerCounts::default();
                inner.window_ends_at = Some(now + window);
                inner.generation = inner.generation.wrapping_add(1);
            }
            None => inner.window_ends_at = Some(now + window),
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState, now: Instant) {
        let from = inner.state;
        inner.state = to;
        inner.counts = BreakerCounts::default();
        inner.trials_in_flight = 0;
        inner.generation = inner.generation.wrapping_add(1);

        match to {
            BreakerState::Open => inner.opened_at = Some(now),
            BreakerState::HalfOpen => {}
            BreakerState::Closed => {
                inner.opened_at = None;
                inner.window_ends_at = self.config.window.map(|window| now + window);
            }
        }

        tracing::debug!(
            breaker = %self.config.name,
            from = %from,
            to = %to,
            "breaker state transition"
        );
        metrics::counter!(
            "resilience_breaker_transitions_total",
            "breaker" => self.config.name.clone(),
            "to" => to.as_str()
        )
        .increment(1);
    }
}

impl Default for FailureIsolationBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
