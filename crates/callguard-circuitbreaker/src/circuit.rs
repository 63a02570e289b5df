use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is half-open and a single probe call is allowed at a time.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Returns the state name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// Point-in-time snapshot of a circuit breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitMetrics {
    /// Current state.
    pub state: CircuitState,
    /// Failures recorded within the trailing monitoring period.
    pub failures: usize,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Successes since the last failure.
    pub consecutive_successes: u32,
    /// When the breaker last changed state.
    pub last_state_change: Instant,
    /// Time elapsed since the last state change.
    pub time_since_state_change: Duration,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    failure_timestamps: VecDeque<Instant>,
    consecutive_successes: u32,
    consecutive_failures: u32,
    probe_successes: u32,
    probe_in_flight: bool,
    /// Bumped on every transition and reset. Calls carry the generation they
    /// were admitted under so that outcomes from an earlier state never
    /// decide the current one.
    generation: u64,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: Instant::now(),
            failure_timestamps: VecDeque::new(),
            consecutive_successes: 0,
            consecutive_failures: 0,
            probe_successes: 0,
            probe_in_flight: false,
            generation: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn metrics(&self, config: &CircuitBreakerConfig) -> CircuitMetrics {
        let now = Instant::now();
        let failures = self
            .failure_timestamps
            .iter()
            .filter(|ts| now.duration_since(**ts) <= config.monitoring_period)
            .count();

        CircuitMetrics {
            state: self.state,
            failures,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            last_state_change: self.last_state_change,
            time_since_state_change: now.duration_since(self.last_state_change),
        }
    }

    /// Decides whether a call may proceed, returning the generation it was
    /// admitted under. Never counts a rejection as a failure and never moves
    /// `last_state_change` while rejecting.
    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig) -> Option<u64> {
        let permitted = match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.timeout {
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.probe_in_flight {
                    false
                } else {
                    self.probe_in_flight = true;
                    true
                }
            }
        };

        if permitted {
            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallPermitted {
                    pattern_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    state: self.state,
                });
        } else {
            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallRejected {
                    pattern_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                });

            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);
        }

        permitted.then_some(self.generation)
    }

    pub(crate) fn record_success(&mut self, config: &CircuitBreakerConfig, admitted_in: u64) {
        self.consecutive_failures = 0;
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                pattern_name: config.name.clone(),
                timestamp: std::time::Instant::now(),
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);

        if self.state == CircuitState::HalfOpen && admitted_in == self.generation {
            self.probe_in_flight = false;
            self.probe_successes = self.probe_successes.saturating_add(1);
            if self.probe_successes as usize >= config.success_threshold {
                self.transition_to(CircuitState::Closed, config);
            }
        }
    }

    pub(crate) fn record_failure(&mut self, config: &CircuitBreakerConfig, admitted_in: u64) {
        self.consecutive_successes = 0;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                pattern_name: config.name.clone(),
                timestamp: std::time::Instant::now(),
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);

        // late outcome of a call admitted under an earlier state
        if admitted_in != self.generation {
            return;
        }

        match self.state {
            CircuitState::Closed => {
                let now = Instant::now();
                self.failure_timestamps.push_back(now);
                self.prune(now, config.monitoring_period);
                if self.failure_timestamps.len() >= config.failure_threshold {
                    self.transition_to(CircuitState::Open, config);
                }
            }
            CircuitState::HalfOpen => {
                self.probe_in_flight = false;
                self.transition_to(CircuitState::Open, config);
            }
            // reported without an admission
            CircuitState::Open => {}
        }
    }

    /// Releases the probe slot of a call whose outcome will never be recorded.
    pub(crate) fn abandon(&mut self, admitted_in: u64) {
        if self.state == CircuitState::HalfOpen && admitted_in == self.generation {
            self.probe_in_flight = false;
        }
    }

    pub(crate) fn force_open(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Open, config);
    }

    pub(crate) fn reset(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config);
        self.failure_timestamps.clear();
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.probe_in_flight = false;
        self.generation = self.generation.wrapping_add(1);

        config.event_listeners.emit(&CircuitBreakerEvent::Reset {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
        });
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.failure_timestamps.front() {
            if now.duration_since(*oldest) > window {
                self.failure_timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                pattern_name: config.name.clone(),
                timestamp: std::time::Instant::now(),
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = from_state.as_str(),
            to = state.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);

            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.generation = self.generation.wrapping_add(1);

        match state {
            CircuitState::Closed => self.failure_timestamps.clear(),
            CircuitState::HalfOpen => {
                self.consecutive_successes = 0;
                self.probe_successes = 0;
            }
            CircuitState::Open => self.probe_in_flight = false,
        }
    }
}
