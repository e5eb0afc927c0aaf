//! Adaptive Heun–Euler integrator
//!
//! Two derivative evaluations per step form an embedded pair: the Euler
//! predictor (order 1) and the Heun corrector (order 2). Their difference
//! controls the step size.
//!
//! Both evaluations use the time at the start of the step; time only moves
//! when a step is accepted. This is exact for autonomous systems and a
//! first-order approximation in the time dependence of the right-hand side
//! otherwise.

use crate::config::SolverConfig;
use crate::controller::{Stats, StepController};
use crate::driver::StopHandle;
use crate::error::IntegrationError;
use crate::estimator::{estimate, ErrorNorm};
use crate::system::System;

/// Outcome of a single call to [`Heun::step`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    /// Whether the step was committed
    pub accepted: bool,
    /// The step was accepted only because the step size sits at the floor,
    /// with an error estimate at or above the tolerance
    pub forced: bool,
    /// Local error estimate (zero in fixed step mode)
    pub error: f64,
    /// Physical size of the attempted step
    pub step_size: f64,
}

/// Adaptive Heun integrator advancing a caller-owned state in place.
///
/// The state is borrowed for the lifetime of the integrator. Two work
/// buffers of the same length are allocated once at construction: the
/// stage-1 derivative and a copy of the state taken at the start of every
/// step, from which a rejected step is undone exactly.
///
/// # Example
///
/// ```
/// use heun::{FnSystem, Heun};
///
/// let mut y = vec![1.0];
/// let sys = FnSystem::new(1, |y: &[f64], _t: f64, dy: &mut [f64]| dy[0] = -y[0]);
///
/// let mut solver = Heun::new(&mut y, sys, 0.01, 1.0).unwrap();
/// solver.controller_mut().set_max_error(1e-4).unwrap();
/// solver.advance(1.0).unwrap();
///
/// assert!((solver.state()[0] - (-solver.elapsed()).exp()).abs() < 1e-3);
/// ```
pub struct Heun<'a, S> {
    y: &'a mut [f64],
    system: S,
    /// Stage-1 derivative, kept across the second evaluation
    dy0: Vec<f64>,
    /// State at the start of the current step
    y0: Vec<f64>,
    controller: StepController,
    norm: ErrorNorm,
    /// Step budget for a single `advance` call
    pub max_steps: Option<u64>,
    pub(crate) stop: StopHandle,
}

impl<'a, S: System> Heun<'a, S> {
    /// Create an integrator with initial physical step size `step_size` and
    /// unit multiplier `multiplier`. The internal step used in the update
    /// formulas is `step_size * multiplier`.
    ///
    /// Fails if either value is not strictly positive.
    pub fn new(
        y: &'a mut [f64],
        system: S,
        step_size: f64,
        multiplier: f64,
    ) -> Result<Self, IntegrationError> {
        let controller = StepController::new(step_size, multiplier)?;
        Ok(Self::with_controller(y, system, controller))
    }

    /// Create an integrator from a validated configuration
    pub fn from_config(
        y: &'a mut [f64],
        system: S,
        config: &SolverConfig,
    ) -> Result<Self, IntegrationError> {
        let controller = config.controller()?;
        config.error_norm.validate(y.len())?;
        let mut solver = Self::with_controller(y, system, controller);
        solver.norm = config.error_norm;
        solver.max_steps = config.max_steps;
        Ok(solver)
    }

    fn with_controller(y: &'a mut [f64], system: S, controller: StepController) -> Self {
        let n = y.len();
        Self {
            y,
            system,
            dy0: vec![0.0; n],
            y0: vec![0.0; n],
            controller,
            norm: ErrorNorm::default(),
            max_steps: None,
            stop: StopHandle::new(),
        }
    }

    /// Take one step.
    ///
    /// On return the state either holds the accepted, normalized new value
    /// or is bit-for-bit equal to its value before the call. The same holds
    /// when an error is returned.
    pub fn step(&mut self) -> Result<StepResult, IntegrationError> {
        let dt = self.controller.internal_step();
        let t = self.controller.elapsed();
        let step_size = self.controller.step_size();
        let n = self.y.len();

        self.y0.copy_from_slice(&*self.y);

        // stage 1: y = y + dt * dy
        let dy = self.system.derivative(&*self.y, t);
        if dy.len() != n {
            return Err(IntegrationError::ShapeMismatch {
                expected: n,
                found: dy.len(),
            });
        }
        for (y, &d) in self.y.iter_mut().zip(dy) {
            *y += dt * d;
        }
        self.dy0.copy_from_slice(dy);

        // stage 2
        let dy = self.system.derivative(&*self.y, t);
        self.controller.record_evals(2);
        if dy.len() != n {
            let found = dy.len();
            self.y.copy_from_slice(&self.y0);
            return Err(IntegrationError::ShapeMismatch { expected: n, found });
        }

        let fixed = self.controller.is_fixed_step();
        let err = if fixed {
            let bad = self.dy0.iter().chain(dy).find(|d| !d.is_finite());
            if let Some(&value) = bad {
                self.y.copy_from_slice(&self.y0);
                return Err(IntegrationError::NonFiniteError { t, error: value });
            }
            0.0
        } else {
            match estimate(self.norm, &self.dy0, dy, dt, t) {
                Ok(err) => err,
                Err(e) => {
                    self.y.copy_from_slice(&self.y0);
                    return Err(e);
                }
            }
        };

        let max_error = self.controller.max_error();
        let accepted = fixed || err < max_error || self.controller.at_floor();
        let mut forced = false;

        if accepted {
            let half = 0.5 * dt;
            for ((y, &d), &d0) in self.y.iter_mut().zip(dy).zip(&self.dy0) {
                *y += half * d - half * d0;
            }
            self.system.normalize(&mut *self.y);
            self.controller.record_accept();
            if !fixed {
                forced = err >= max_error;
                let corr = self.controller.growth_factor(err);
                self.controller.adapt(corr);
            }
        } else {
            // undo
            self.y.copy_from_slice(&self.y0);
            self.controller.record_reject();
            let corr = self.controller.shrink_factor(err);
            self.controller.adapt(corr);
        }

        let stats = self.controller.stats();
        log::debug!(
            "step: {:8} ({:6}) t: {:12.6e}s dt: {:12.6e}s err: {:12.6e}",
            stats.accepted_steps,
            stats.rejected_steps,
            self.controller.elapsed(),
            step_size,
            err
        );
        if forced {
            log::warn!(
                "step size at floor {:e}s, accepted error {:e} above tolerance {:e}",
                step_size,
                err,
                max_error
            );
        }

        Ok(StepResult {
            accepted,
            forced,
            error: err,
            step_size,
        })
    }

    /// Current value of the state
    pub fn state(&self) -> &[f64] {
        &*self.y
    }

    /// Mutable access to the state between steps
    pub fn state_mut(&mut self) -> &mut [f64] {
        &mut *self.y
    }

    /// The wrapped system
    pub fn system(&self) -> &S {
        &self.system
    }

    /// Mutable access to the wrapped system
    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    /// Drop the work buffers and hand the system back
    pub fn into_system(self) -> S {
        self.system
    }

    /// Step-size controller
    pub fn controller(&self) -> &StepController {
        &self.controller
    }

    /// Mutable step-size controller, to change tolerance, floor or mode
    pub fn controller_mut(&mut self) -> &mut StepController {
        &mut self.controller
    }

    /// Physical time advanced so far
    pub fn elapsed(&self) -> f64 {
        self.controller.elapsed()
    }

    /// Current physical step size
    pub fn step_size(&self) -> f64 {
        self.controller.step_size()
    }

    /// Run statistics
    pub fn stats(&self) -> &Stats {
        self.controller.stats()
    }

    /// Norm used by the error estimate
    pub fn error_norm(&self) -> ErrorNorm {
        self.norm
    }

    /// Change the norm used by the error estimate
    pub fn set_error_norm(&mut self, norm: ErrorNorm) -> Result<(), IntegrationError> {
        norm.validate(self.y.len())?;
        self.norm = norm;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::FnSystem;
    use approx::assert_relative_eq;

    /// Returns `first` on odd calls and `second` on even calls
    struct Alternating {
        first: Vec<f64>,
        second: Vec<f64>,
        calls: usize,
        normalized: usize,
    }

    impl Alternating {
        fn new(first: Vec<f64>, second: Vec<f64>) -> Self {
            Self {
                first,
                second,
                calls: 0,
                normalized: 0,
            }
        }
    }

    impl System for Alternating {
        fn derivative(&mut self, _y: &[f64], _t: f64) -> &[f64] {
            self.calls += 1;
            if self.calls % 2 == 1 {
                &self.first
            } else {
                &self.second
            }
        }

        fn normalize(&mut self, _y: &mut [f64]) {
            self.normalized += 1;
        }
    }

    #[test]
    fn test_accepted_step_is_heun_update() {
        // y' = -y from y = 1, dt = 0.1:
        // predictor 0.9, d2 = -0.9, y = 0.9 + 0.05 * (-0.9) - 0.05 * (-1) = 0.905
        let mut y = vec![1.0];
        let sys = FnSystem::new(1, |y: &[f64], _t: f64, dy: &mut [f64]| dy[0] = -y[0]);
        let mut solver = Heun::new(&mut y, sys, 0.1, 1.0).unwrap();
        solver.controller_mut().set_max_error(1.0).unwrap();

        let result = solver.step().unwrap();
        assert!(result.accepted);
        assert!(!result.forced);
        assert_relative_eq!(result.error, 0.01, epsilon = 1e-15);
        assert_eq!(result.step_size, 0.1);
        assert_relative_eq!(solver.state()[0], 0.905, epsilon = 1e-15);
        assert_relative_eq!(solver.elapsed(), 0.1);
        assert_eq!(solver.stats().fn_evals, 2);
    }

    #[test]
    fn test_rejected_step_restores_state_exactly() {
        let before = vec![0.1, -0.3, 1e-7, 123.456];
        let mut y = before.clone();
        let sys = Alternating::new(vec![0.7, 1.3, -2.9, 1e-3], vec![1e6, -1e6, 1e6, -1e6]);
        let mut solver = Heun::new(&mut y, sys, 0.3, 1.0).unwrap();
        solver.controller_mut().set_max_error(1e-3).unwrap();

        let result = solver.step().unwrap();
        assert!(!result.accepted);
        assert_eq!(solver.state(), &before[..]);
        assert_eq!(solver.elapsed(), 0.0);
        assert_eq!(solver.stats().rejected_steps, 1);
        assert_eq!(solver.stats().accepted_steps, 0);
        assert!(solver.step_size() < 0.3);
    }

    #[test]
    fn test_unit_multiplier_scales_update_not_time() {
        let mut y = vec![0.0];
        let sys = FnSystem::new(1, |_: &[f64], _: f64, dy: &mut [f64]| dy[0] = 1.0);
        let mut solver = Heun::new(&mut y, sys, 0.5, 4.0).unwrap();

        solver.step().unwrap();
        assert_relative_eq!(solver.state()[0], 2.0, epsilon = 1e-15);
        assert_relative_eq!(solver.elapsed(), 0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_normalize_only_after_acceptance() {
        let mut y = vec![1.0, 0.0, 0.0];
        let sys = Alternating::new(vec![0.0, 1.0, 0.0], vec![0.0, 100.0, 0.0]);
        let mut solver = Heun::new(&mut y, sys, 0.1, 1.0).unwrap();
        solver.controller_mut().set_max_error(1e-3).unwrap();

        assert!(!solver.step().unwrap().accepted);
        assert_eq!(solver.system().normalized, 0);
        assert_eq!(solver.state(), &[1.0, 0.0, 0.0]);

        solver.controller_mut().set_max_error(1e3).unwrap();
        assert!(solver.step().unwrap().accepted);
        assert_eq!(solver.system().normalized, 1);
    }

    #[test]
    fn test_forced_acceptance_at_floor() {
        let mut y = vec![0.0];
        let sys = Alternating::new(vec![1.0], vec![-1.0]);
        let mut solver = Heun::new(&mut y, sys, 0.01, 1.0).unwrap();
        solver.controller_mut().set_max_error(1e-6).unwrap();
        solver.controller_mut().set_min_step(0.01).unwrap();

        let result = solver.step().unwrap();
        assert!(result.accepted);
        assert!(result.forced);
        assert_eq!(solver.step_size(), 0.01);
    }

    #[test]
    fn test_nan_derivative_aborts_and_restores() {
        let mut y = vec![2.0, 3.0];
        let sys = Alternating::new(vec![1.0, 1.0], vec![f64::NAN, 1.0]);
        let mut solver = Heun::new(&mut y, sys, 0.1, 1.0).unwrap();

        let result = solver.step();
        assert!(matches!(
            result,
            Err(IntegrationError::NonFiniteError { .. })
        ));
        assert_eq!(solver.state(), &[2.0, 3.0]);
        assert_eq!(solver.stats().total_steps(), 0);
    }

    #[test]
    fn test_fixed_step_non_finite_derivative_aborts() {
        for bad in [f64::NAN, f64::INFINITY] {
            let mut y = vec![1.0, 2.0];
            let sys = Alternating::new(vec![0.5, 0.5], vec![0.5, bad]);
            let mut solver = Heun::new(&mut y, sys, 0.1, 1.0).unwrap();
            solver.controller_mut().set_fixed_step(true);

            let result = solver.step();
            assert!(matches!(
                result,
                Err(IntegrationError::NonFiniteError { t, .. }) if t == 0.0
            ));
            assert_eq!(solver.state(), &[1.0, 2.0]);
            assert_eq!(solver.stats().total_steps(), 0);
        }
    }

    #[test]
    fn test_zero_tolerance_cannot_stall_time() {
        let mut y = vec![0.0];
        let sys = Alternating::new(vec![1.0], vec![-1.0]);
        let mut solver = Heun::new(&mut y, sys, 0.1, 1.0).unwrap();
        assert!(solver.controller_mut().set_max_error(0.0).is_err());
        assert!(solver.controller_mut().set_max_error(f64::NAN).is_err());

        // the smallest valid tolerance drives the step toward the floor
        solver.controller_mut().set_max_error(1e-300).unwrap();
        solver.run_steps(3000).unwrap();

        assert!(solver.step_size() > 0.0);
        assert!(solver.step_size().is_finite());
        assert!(solver.stats().accepted_steps > 0);
        assert!(solver.elapsed() > 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut y = vec![1.0, 2.0, 3.0];
        let sys = FnSystem::new(2, |_: &[f64], _: f64, dy: &mut [f64]| dy.fill(1.0));
        let mut solver = Heun::new(&mut y, sys, 0.1, 1.0).unwrap();

        assert_eq!(
            solver.step(),
            Err(IntegrationError::ShapeMismatch {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(solver.state(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_invalid_construction() {
        let mut y = vec![1.0];
        let sys = FnSystem::new(1, |_: &[f64], _: f64, dy: &mut [f64]| dy[0] = 0.0);
        assert!(matches!(
            Heun::new(&mut y, sys, 0.0, 1.0),
            Err(IntegrationError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_vector_norm_must_fit_state() {
        let mut y = vec![0.0; 4];
        let sys = FnSystem::new(4, |_: &[f64], _: f64, dy: &mut [f64]| dy.fill(0.0));
        let mut solver = Heun::new(&mut y, sys, 0.1, 1.0).unwrap();
        assert!(solver
            .set_error_norm(ErrorNorm::MaxVector { components: 3 })
            .is_err());
        assert!(solver
            .set_error_norm(ErrorNorm::MaxVector { components: 2 })
            .is_ok());
        assert_eq!(solver.error_norm(), ErrorNorm::MaxVector { components: 2 });
    }
}
