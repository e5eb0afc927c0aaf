//! # heun: adaptive Heun–Euler integrator
//!
//! An embedded-pair time stepper for large state vectors that are advanced
//! in place, such as a magnetization field on a mesh.
//!
//! ## Features
//!
//! - Two derivative evaluations per step: Euler predictor, Heun corrector
//! - Adaptive step size from the predictor/corrector difference
//! - Exact undo of rejected steps; the state is never left half-updated
//! - Step-size floor below which steps are force-accepted, so the solver
//!   cannot get stuck rejecting
//! - Post-step normalization hook for constrained states (unit vectors)
//! - Fixed-step mode
//! - No allocation after construction
//!
//! ## Basic Usage
//!
//! ```rust
//! use heun::{Heun, System};
//!
//! // y' = -k y over a whole array
//! struct Decay {
//!     k: f64,
//!     dy: Vec<f64>,
//! }
//!
//! impl System for Decay {
//!     fn derivative(&mut self, y: &[f64], _t: f64) -> &[f64] {
//!         for (d, v) in self.dy.iter_mut().zip(y) {
//!             *d = -self.k * v;
//!         }
//!         &self.dy
//!     }
//! }
//!
//! let mut y = vec![1.0; 64];
//! let sys = Decay { k: 2.0, dy: vec![0.0; 64] };
//!
//! let mut solver = Heun::new(&mut y, sys, 1e-3, 1.0).unwrap();
//! solver.controller_mut().set_max_error(1e-5).unwrap();
//! solver.advance(0.5).unwrap();
//!
//! println!("t = {}, steps = {:?}", solver.elapsed(), solver.stats());
//! ```
//!
//! ## Step-size control
//!
//! The local error is `max |d1 - d2| * dt`, where `d1` and `d2` are the
//! derivatives at the start of the step and at the Euler prediction. A step
//! is accepted when this is below `max_error`, or when the step size already
//! sits at `min_step`. The step grows by `(max_error/err)^(1/2)` after an
//! acceptance and shrinks by `(max_error/err)^(1/3)` after a rejection, both
//! scaled by a headroom factor and clamped. See [`controller`].
//!
//! ## Units
//!
//! The step size and elapsed time are physical. The derivative function may
//! work in scaled time; the unit multiplier converts a physical step into
//! the step used in the update formulas.
//!
//! ## Logging
//!
//! Progress goes through the [`log`] facade: one `debug` line per step, a
//! `warn` line whenever a step is force-accepted at the floor, and `info`
//! lines at the start and end of each run.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod estimator;
pub mod heun;
pub mod system;

pub use config::{ConfigError, SolverConfig};
pub use controller::{Stats, StepController};
pub use driver::{RunOutcome, StopHandle};
pub use error::IntegrationError;
pub use estimator::ErrorNorm;
pub use heun::{Heun, StepResult};
pub use system::{normalize_vectors, FnSystem, System};
