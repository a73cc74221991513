// 8.0: bounded Newton-Raphson for the few places without a closed form.
// never loops past max_iterations; running out surfaces NonConvergence with the
// last residual instead of a partial estimate.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RiskError, RiskResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverParams {
    pub max_iterations: u32,
    /// Absolute tolerance on |f(x)|.
    pub tolerance: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
        }
    }
}

impl SolverParams {
    pub fn validate(&self) -> RiskResult<()> {
        if self.max_iterations == 0 {
            return Err(RiskError::config("solver needs at least one iteration"));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(RiskError::config("solver tolerance must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverResult {
    pub root: f64,
    pub iterations: u32,
    pub residual: f64,
}

// 8.1: `f` returns (value, derivative) at x.
pub fn newton<F>(f: F, initial_guess: f64, params: &SolverParams) -> RiskResult<SolverResult>
where
    F: Fn(f64) -> (f64, f64),
{
    params.validate()?;
    let mut x = initial_guess;
    let mut residual = f64::NAN;

    for iteration in 0..params.max_iterations {
        let (value, slope) = f(x);
        residual = value;
        if !value.is_finite() || !slope.is_finite() {
            break;
        }
        if value.abs() <= params.tolerance {
            return Ok(SolverResult {
                root: x,
                iterations: iteration,
                residual: value,
            });
        }
        if slope == 0.0 {
            break;
        }
        x -= value / slope;
    }

    warn!(
        max_iterations = params.max_iterations,
        residual, "newton solver did not converge"
    );
    Err(RiskError::NonConvergence {
        iterations: params.max_iterations,
        residual,
    })
}
