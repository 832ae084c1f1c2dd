//! Error types shared across the galvani crates.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bad parameter '{param}' on {entity}: {reason}")]
    BadParameter {
        entity: String,
        param: String,
        reason: String,
    },

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("duplicate variable: {0}")]
    DuplicateVariable(String),

    #[error("singular matrix at row {row}{}", fmt_tag(.tag))]
    SingularMatrix { row: usize, tag: Option<String> },

    #[error("no convergence after {iterations} iterations (residual {residual:.3e}, step {step:.3e})")]
    NoConvergence {
        iterations: usize,
        residual: f64,
        step: f64,
    },

    #[error("simulation cancelled")]
    Cancelled,
}

fn fmt_tag(tag: &Option<String>) -> String {
    match tag {
        Some(t) => format!(" (last stamped by {t})"),
        None => String::new(),
    }
}

impl Error {
    /// Shorthand for a `BadParameter` error.
    pub fn bad_parameter(
        entity: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::BadParameter {
            entity: entity.into(),
            param: param.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
