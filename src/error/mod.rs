//! # Errors
//!
//! Every fallible operation in the crate returns [`VbpcaError`]. Shape problems are reported once
//! at the boundary (construction, projection), numeric problems at the step that produced them.

use std::fmt;
use thiserror::Error;

/// The posterior factor (or read-only operation) a numeric problem was detected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factor {
    Mean,
    Loading,
    Latent,
    Relevance,
    Noise,
    Projection,
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Factor::Mean => "mean vector",
            Factor::Loading => "loading matrix",
            Factor::Latent => "latent coordinates",
            Factor::Relevance => "relevance precision",
            Factor::Noise => "noise precision",
            Factor::Projection => "projection",
        };
        f.write_str(name)
    }
}

/// What exactly went wrong numerically.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Degeneracy {
    #[error("matrix is not square ({0}x{1})")]
    NotSquare(usize, usize),
    #[error("non-finite values encountered")]
    NonFinite,
    #[error("matrix is not positive-definite (smallest eigenvalue {0:e})")]
    NotPositiveDefinite(f64),
    #[error("condition number {condition:e} exceeds threshold {threshold:e}")]
    IllConditioned { condition: f64, threshold: f64 },
    #[error("Cholesky factorization failed")]
    FactorizationFailed,
    #[error("Gamma rate {0} is not strictly positive and finite")]
    InvalidRate(f64),
}

/// The error type for VBPCA operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VbpcaError {
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("numeric degeneracy in {factor}: {cause}")]
    NumericDegeneracy {
        factor: Factor,
        #[source]
        cause: Degeneracy,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl VbpcaError {
    pub(crate) fn degenerate(factor: Factor, cause: Degeneracy) -> Self {
        VbpcaError::NumericDegeneracy { factor, cause }
    }
}
