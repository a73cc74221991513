// 2.0: error kinds for every pricing/risk entry point. each call either returns
// a valid result or one of these; nothing is retried or treated as fatal here.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("solver did not converge after {iterations} iterations (residual {residual})")]
    NonConvergence { iterations: u32, residual: f64 },

    #[error("domain violation: {reason}")]
    DomainViolation { reason: String },
}

impl RiskError {
    pub fn config(reason: impl Into<String>) -> Self {
        RiskError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub fn domain(reason: impl Into<String>) -> Self {
        RiskError::DomainViolation {
            reason: reason.into(),
        }
    }
}

pub type RiskResult<T> = Result<T, RiskError>;
