//! Execution Simulator
//!
//! Randomized step outcomes for the mock engine: uniform per-step delay,
//! configurable failure probability, a concurrency gate, and a stats
//! snapshot. All randomness is decided synchronously so the async loop
//! never holds a thread-local RNG across an await.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::config::MockConfig;
use crate::error::WorkflowError;

/// Counters describing everything the simulator has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    pub simulations_started: u64,
    pub simulations_completed: u64,
    pub simulations_failed: u64,
    pub steps_executed: u64,
    pub retries: u64,
}

/// RAII guard for one concurrency slot. Owns its simulator so it can
/// travel into a spawned task.
pub struct SimulationSlot {
    simulator: Arc<MockExecutionSimulator>,
}

impl Drop for SimulationSlot {
    fn drop(&mut self) {
        self.simulator.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockExecutionSimulator {
    config: MockConfig,
    in_flight: AtomicUsize,
    stats: Mutex<SimulatorStats>,
}

impl MockExecutionSimulator {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            in_flight: AtomicUsize::new(0),
            stats: Mutex::new(SimulatorStats::default()),
        }
    }

    /// Claims a concurrency slot, or reports the limit as exceeded.
    pub fn acquire(self: &Arc<Self>) -> Result<SimulationSlot, WorkflowError> {
        let mut current = self.in_flight.load(Ordering::SeqCst);
        loop {
            if current >= self.config.max_concurrent {
                return Err(WorkflowError::ResourceLimit {
                    message: format!(
                        "Mock engine already running {} of {} allowed simulations",
                        current, self.config.max_concurrent
                    ),
                });
            }
            match self.in_flight.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    self.lock_stats().simulations_started += 1;
                    return Ok(SimulationSlot {
                        simulator: Arc::clone(self),
                    });
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Draws the delay for one simulated step, in milliseconds.
    pub fn step_delay_ms(&self) -> u64 {
        let (min, max) = self.config.delay_range_ms;
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    /// Decides whether one simulated attempt fails.
    pub fn attempt_fails(&self) -> bool {
        if self.config.failure_rate <= 0.0 {
            return false;
        }
        if self.config.failure_rate >= 1.0 {
            return true;
        }
        rand::thread_rng().gen_bool(self.config.failure_rate)
    }

    pub fn record_step(&self) {
        self.lock_stats().steps_executed += 1;
    }

    pub fn record_retry(&self) {
        self.lock_stats().retries += 1;
    }

    pub fn record_outcome(&self, success: bool) {
        let mut stats = self.lock_stats();
        if success {
            stats.simulations_completed += 1;
        } else {
            stats.simulations_failed += 1;
        }
    }

    pub fn stats(&self) -> SimulatorStats {
        self.lock_stats().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, SimulatorStats> {
        self.stats.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(failure_rate: f64, max_concurrent: usize) -> MockConfig {
        MockConfig {
            failure_rate,
            delay_range_ms: (1, 3),
            max_concurrent,
        }
    }

    #[test]
    fn test_concurrency_gate() {
        let simulator = Arc::new(MockExecutionSimulator::new(config(0.0, 2)));

        let slot_a = simulator.acquire().unwrap();
        let _slot_b = simulator.acquire().unwrap();
        assert!(matches!(
            simulator.acquire(),
            Err(WorkflowError::ResourceLimit { .. })
        ));

        // Dropping a slot frees capacity
        drop(slot_a);
        assert!(simulator.acquire().is_ok());
    }

    #[test]
    fn test_delay_within_bounds() {
        let simulator = MockExecutionSimulator::new(MockConfig {
            failure_rate: 0.0,
            delay_range_ms: (5, 9),
            max_concurrent: 1,
        });
        for _ in 0..50 {
            let delay = simulator.step_delay_ms();
            assert!((5..=9).contains(&delay));
        }
    }

    #[test]
    fn test_failure_rate_extremes() {
        let never = MockExecutionSimulator::new(config(0.0, 1));
        let always = MockExecutionSimulator::new(config(1.0, 1));
        for _ in 0..20 {
            assert!(!never.attempt_fails());
            assert!(always.attempt_fails());
        }
    }

    #[test]
    fn test_stats_accumulate() {
        let simulator = Arc::new(MockExecutionSimulator::new(config(0.0, 4)));
        {
            let _slot = simulator.acquire().unwrap();
            simulator.record_step();
            simulator.record_step();
            simulator.record_retry();
            simulator.record_outcome(true);
        }
        {
            let _slot = simulator.acquire().unwrap();
            simulator.record_step();
            simulator.record_outcome(false);
        }

        let stats = simulator.stats();
        assert_eq!(stats.simulations_started, 2);
        assert_eq!(stats.simulations_completed, 1);
        assert_eq!(stats.simulations_failed, 1);
        assert_eq!(stats.steps_executed, 3);
        assert_eq!(stats.retries, 1);
        assert_eq!(simulator.in_flight(), 0);
    }
}
