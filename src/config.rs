//! Solver configuration
//!
//! All tunables of a run live in one [`SolverConfig`] value handed to
//! [`Heun::from_config`](crate::Heun::from_config). It can be built in code
//! or read from a TOML file:
//!
//! ```toml
//! initial_step = 1e-13
//! unit_multiplier = 1.7595e11
//! max_error = 1e-5
//! min_step = 1e-16
//! max_step = 1e-11
//!
//! [error_norm]
//! kind = "max_vector"
//! components = 3
//! ```
//!
//! Missing keys take their [`Default`] value.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::controller::StepController;
use crate::error::IntegrationError;
use crate::estimator::ErrorNorm;

/// Errors while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// The file is not valid TOML or has unknown keys
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// The values are out of range
    #[error(transparent)]
    Invalid(#[from] IntegrationError),
}

/// Configuration consumed when constructing a solver
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Initial physical step size (> 0)
    pub initial_step: f64,
    /// Factor converting physical time to the time unit of the derivative
    /// (> 0)
    pub unit_multiplier: f64,
    /// Error tolerance per step
    pub max_error: f64,
    /// Step-size floor; steps at the floor are always accepted
    pub min_step: f64,
    /// Optional step-size ceiling
    pub max_step: Option<f64>,
    /// Safety factor on every step-size correction, in (0, 1]
    pub headroom: f64,
    /// Run with a fixed step size and no error control
    pub fixed_step: bool,
    /// Optional step budget for a single `advance` call
    pub max_steps: Option<u64>,
    /// Norm of the error estimate
    pub error_norm: ErrorNorm,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            initial_step: 1e-3,
            unit_multiplier: 1.0,
            max_error: 1e-5,
            min_step: 0.0,
            max_step: None,
            headroom: 0.8,
            fixed_step: false,
            max_steps: None,
            error_norm: ErrorNorm::MaxAbs,
        }
    }
}

impl SolverConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SolverConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check every value for range
    pub fn validate(&self) -> Result<(), IntegrationError> {
        self.controller().map(|_| ())
    }

    /// Build a step controller carrying these settings.
    ///
    /// The range checks are those of the controller's setters. The
    /// tolerance is ignored in fixed step mode.
    pub fn controller(&self) -> Result<StepController, IntegrationError> {
        let mut controller = StepController::new(self.initial_step, self.unit_multiplier)?;
        if !self.fixed_step {
            controller.set_max_error(self.max_error)?;
        }
        controller.set_min_step(self.min_step)?;
        controller.set_max_step(self.max_step)?;
        controller.set_headroom(self.headroom)?;
        controller.set_fixed_step(self.fixed_step);
        Ok(controller)
    }
}
