//! Errors raised while constructing or running the integrator.

use thiserror::Error;

/// Errors that can occur during integration
///
/// Every variant is fatal for the running solve: the driver loop stops and
/// the state is left at the last accepted step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    /// Non-positive or non-finite step size, multiplier or tolerance
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of the offending parameter
        message: String,
    },
    /// The local error estimate, or a derivative value in fixed step mode,
    /// was NaN or infinite
    #[error("non-finite error estimate {error} at t = {t}")]
    NonFiniteError {
        /// Elapsed time at which the step was attempted
        t: f64,
        /// The offending value
        error: f64,
    },
    /// The derivative buffer does not have the shape of the state
    #[error("derivative has {found} elements, state has {expected}")]
    ShapeMismatch {
        /// Length of the state vector
        expected: usize,
        /// Length of the returned derivative
        found: usize,
    },
    /// Invalid argument passed to a driver method
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the invalid input
        message: String,
    },
    /// The configured step budget was exhausted before the run finished
    #[error("maximum number of steps ({steps}) exceeded")]
    MaxStepsExceeded {
        /// The budget that was exceeded
        steps: u64,
    },
}

impl IntegrationError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        IntegrationError::InvalidConfiguration {
            message: message.into(),
        }
    }
}
