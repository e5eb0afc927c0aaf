//! Adaptive step-size control
//!
//! The controller owns everything that changes from step to step apart from
//! the state itself: the current step size, the elapsed time and the
//! accept/reject counters.
//!
//! After an accepted step the step size is scaled by
//!
//! ```text
//! corr = headroom * (max_error / err)^(1/2)
//! ```
//!
//! and after a rejected step by
//!
//! ```text
//! corr = headroom * (max_error / err)^(1/3)
//! ```
//!
//! with `corr` clamped to `[min_factor, max_factor]` and the result clamped
//! to `[min_step, max_step]`. The shrink exponent is smaller than the growth
//! exponent so that a rejected step loses more than an accepted one gains.

use crate::error::IntegrationError;

/// Exponent applied to `max_error / err` after an accepted step
pub const GROWTH_EXPONENT: f64 = 1.0 / 2.0;

/// Exponent applied to `max_error / err` after a rejected step
pub const SHRINK_EXPONENT: f64 = 1.0 / 3.0;

/// Integration statistics for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Total number of derivative evaluations
    pub fn_evals: u64,
    /// Number of accepted steps
    pub accepted_steps: u64,
    /// Number of rejected steps
    pub rejected_steps: u64,
}

impl Stats {
    /// Number of `step()` calls that reached a decision
    pub fn total_steps(&self) -> u64 {
        self.accepted_steps + self.rejected_steps
    }
}

/// Step-size controller and run bookkeeping
///
/// Every setter checks its range, so the step size stays positive and
/// finite for the whole run.
#[derive(Debug, Clone)]
pub struct StepController {
    max_error: f64,
    min_step: f64,
    max_step: Option<f64>,
    headroom: f64,
    min_factor: f64,
    max_factor: f64,
    fixed_step: bool,
    step_size: f64,
    multiplier: f64,
    elapsed: f64,
    last_step: Option<f64>,
    stats: Stats,
}

impl StepController {
    /// Create a controller with the given physical step size and unit
    /// multiplier. Both must be strictly positive and finite.
    pub fn new(step_size: f64, multiplier: f64) -> Result<Self, IntegrationError> {
        check_positive("step size", step_size)?;
        check_positive("unit multiplier", multiplier)?;
        Ok(Self {
            max_error: 1e-5,
            min_step: 0.0,
            max_step: None,
            headroom: 0.8,
            min_factor: 0.5,
            max_factor: 2.0,
            fixed_step: false,
            step_size,
            multiplier,
            elapsed: 0.0,
            last_step: None,
            stats: Stats::default(),
        })
    }

    /// Error tolerance per step, in units of state change
    pub fn max_error(&self) -> f64 {
        self.max_error
    }

    /// Set the error tolerance (positive and finite)
    pub fn set_max_error(&mut self, max_error: f64) -> Result<(), IntegrationError> {
        check_positive("max_error", max_error)?;
        self.max_error = max_error;
        Ok(())
    }

    /// Step-size floor. Steps at or below it are always accepted
    pub fn min_step(&self) -> f64 {
        self.min_step
    }

    /// Set the step-size floor (non-negative, finite, not above `max_step`)
    pub fn set_min_step(&mut self, min_step: f64) -> Result<(), IntegrationError> {
        if !(min_step.is_finite() && min_step >= 0.0) {
            return Err(IntegrationError::invalid_config(format!(
                "min_step must be non-negative and finite, got {}",
                min_step
            )));
        }
        check_step_limits(min_step, self.max_step)?;
        self.min_step = min_step;
        Ok(())
    }

    /// Optional step-size ceiling
    pub fn max_step(&self) -> Option<f64> {
        self.max_step
    }

    /// Set or clear the step-size ceiling (positive, not below `min_step`)
    pub fn set_max_step(&mut self, max_step: Option<f64>) -> Result<(), IntegrationError> {
        check_step_limits(self.min_step, max_step)?;
        self.max_step = max_step;
        Ok(())
    }

    /// Safety factor applied to every correction
    pub fn headroom(&self) -> f64 {
        self.headroom
    }

    /// Set the safety factor, in (0, 1]
    pub fn set_headroom(&mut self, headroom: f64) -> Result<(), IntegrationError> {
        if !(headroom > 0.0 && headroom <= 1.0) {
            return Err(IntegrationError::invalid_config(format!(
                "headroom must be in (0, 1], got {}",
                headroom
            )));
        }
        self.headroom = headroom;
        Ok(())
    }

    /// Smallest and largest correction applied in one adaptation
    pub fn factor_limits(&self) -> (f64, f64) {
        (self.min_factor, self.max_factor)
    }

    /// Set the correction clamp. Needs `0 < min_factor <= 1 <= max_factor`,
    /// both finite.
    pub fn set_factor_limits(
        &mut self,
        min_factor: f64,
        max_factor: f64,
    ) -> Result<(), IntegrationError> {
        let ok = min_factor > 0.0 && min_factor <= 1.0;
        if !(ok && max_factor >= 1.0 && max_factor.is_finite()) {
            return Err(IntegrationError::invalid_config(format!(
                "factor limits must satisfy 0 < min <= 1 <= max, got [{}, {}]",
                min_factor, max_factor
            )));
        }
        self.min_factor = min_factor;
        self.max_factor = max_factor;
        Ok(())
    }

    /// Fixed step mode: no error estimate, no rejection, no adaptation
    pub fn is_fixed_step(&self) -> bool {
        self.fixed_step
    }

    /// Switch fixed step mode on or off
    pub fn set_fixed_step(&mut self, fixed_step: bool) {
        self.fixed_step = fixed_step;
    }

    /// Current physical step size
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Override the current step size
    pub fn set_step_size(&mut self, step_size: f64) -> Result<(), IntegrationError> {
        check_positive("step size", step_size)?;
        self.step_size = step_size;
        Ok(())
    }

    /// Unit-conversion factor fixed at construction
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Step size in the units of the derivative function
    pub fn internal_step(&self) -> f64 {
        self.step_size * self.multiplier
    }

    /// Physical time advanced by accepted steps
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Size of the most recently accepted step
    pub fn last_step(&self) -> Option<f64> {
        self.last_step
    }

    /// Accept/reject counters
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Reset counters. Elapsed time and step size are kept.
    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    /// Whether the step size has reached the floor
    pub fn at_floor(&self) -> bool {
        self.step_size <= self.floor()
    }

    /// Smallest step size `adapt` will produce
    fn floor(&self) -> f64 {
        self.min_step.max(f64::MIN_POSITIVE)
    }

    /// Correction for the next step after an accepted step with error `err`
    pub fn growth_factor(&self, err: f64) -> f64 {
        self.correction(err, GROWTH_EXPONENT)
    }

    /// Correction for the retry after a rejected step with error `err`
    pub fn shrink_factor(&self, err: f64) -> f64 {
        self.correction(err, SHRINK_EXPONENT)
    }

    fn correction(&self, err: f64, exponent: f64) -> f64 {
        if err == 0.0 {
            return f64::INFINITY;
        }
        (self.max_error / err).powf(exponent)
    }

    /// Scale the step size by `corr`, clamped, and enforce the step limits.
    /// Does nothing in fixed step mode or when `corr` is NaN.
    pub fn adapt(&mut self, corr: f64) {
        if self.fixed_step || corr.is_nan() {
            return;
        }
        let corr = (corr * self.headroom).clamp(self.min_factor, self.max_factor);
        let mut step = self.step_size * corr;
        if let Some(max_step) = self.max_step {
            step = step.min(max_step);
        }
        self.step_size = step.max(self.floor());
    }

    pub(crate) fn record_accept(&mut self) {
        self.elapsed += self.step_size;
        self.last_step = Some(self.step_size);
        self.stats.accepted_steps += 1;
    }

    pub(crate) fn record_reject(&mut self) {
        self.stats.rejected_steps += 1;
    }

    pub(crate) fn record_evals(&mut self, n: u64) {
        self.stats.fn_evals += n;
    }
}

fn check_step_limits(min_step: f64, max_step: Option<f64>) -> Result<(), IntegrationError> {
    if let Some(max_step) = max_step {
        if !(max_step.is_finite() && max_step > 0.0 && max_step >= min_step) {
            return Err(IntegrationError::invalid_config(format!(
                "max_step {} must be positive, finite and not below min_step {}",
                max_step, min_step
            )));
        }
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<(), IntegrationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(IntegrationError::invalid_config(format!(
            "{} must be positive and finite, got {}",
            name, value
        )));
    }
    Ok(())
}
