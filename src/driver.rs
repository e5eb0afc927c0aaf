//! Run loops over [`Heun::step`]
//!
//! A run can be cut short from another thread through a [`StopHandle`]. The
//! flag is only looked at between steps, so a stopped run always leaves the
//! state at an accepted step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::IntegrationError;
use crate::heun::Heun;
use crate::system::System;

/// Cooperative stop request shared between a running solver and its
/// controllers
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Create a handle with no pending request
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the solver to stop before its next step
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop is pending
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The requested duration or step count was reached
    Completed,
    /// A stop was requested through the [`StopHandle`]
    Stopped,
}

impl<'a, S: System> Heun<'a, S> {
    /// Handle that stops a running [`advance`](Heun::advance) or
    /// [`run_steps`](Heun::run_steps) between two steps.
    ///
    /// A request made while no run is active stops the next one before its
    /// first step. Requests are consumed by the run that honors them.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Step until the elapsed time has grown by `duration`.
    ///
    /// The run ends at or past the target; the overshoot is smaller than the
    /// last accepted step. Fails on the first step error, or when more than
    /// [`max_steps`](Heun::max_steps) steps would be needed.
    pub fn advance(&mut self, duration: f64) -> Result<RunOutcome, IntegrationError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(IntegrationError::InvalidInput {
                message: format!("duration must be finite and non-negative, got {}", duration),
            });
        }
        log::info!("heun solver: {} s", duration);

        let stop = self.elapsed() + duration;
        let mut steps = 0u64;
        while self.elapsed() < stop {
            if self.stop.take() {
                return Ok(self.stopped());
            }
            if let Some(max_steps) = self.max_steps {
                if steps >= max_steps {
                    return Err(IntegrationError::MaxStepsExceeded { steps: max_steps });
                }
            }
            self.step()?;
            steps += 1;
        }
        self.done();
        Ok(RunOutcome::Completed)
    }

    /// Call [`step`](Heun::step) exactly `steps` times.
    ///
    /// Rejected steps count, so fewer than `steps` steps may be accepted and
    /// the elapsed time may be less than `steps` times the step size.
    pub fn run_steps(&mut self, steps: u64) -> Result<RunOutcome, IntegrationError> {
        log::info!("heun solver: {} steps", steps);
        for _ in 0..steps {
            if self.stop.take() {
                return Ok(self.stopped());
            }
            self.step()?;
        }
        self.done();
        Ok(RunOutcome::Completed)
    }

    fn stopped(&self) -> RunOutcome {
        log::info!("heun solver: stopped at t = {:e} s", self.elapsed());
        RunOutcome::Stopped
    }

    fn done(&self) {
        let stats = self.stats();
        log::info!(
            "heun solver: done, t = {:e} s, {} accepted, {} rejected",
            self.elapsed(),
            stats.accepted_steps,
            stats.rejected_steps
        );
    }
}
