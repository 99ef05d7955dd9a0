//! Error kinds raised by the solver core.
//!
//! Validation failures (`InvalidOrder`, `InvalidInput`, `UnknownMethod`) and
//! compile-time equation failures (`Parse`, `Evaluation` for unbound names) are
//! reported before the stepping loop starts. Anything that fails while stepping
//! is wrapped in [`SolverError::Solve`] together with the partial trajectory.

use crate::solve::Trajectory;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("failed to parse equation `{expression}` at position {position}: {message}")]
    Parse {
        expression: String,
        position: usize,
        message: String,
    },

    #[error("failed to evaluate equation `{expression}`: {failure}")]
    Evaluation {
        expression: String,
        failure: EvalFailure,
    },

    #[error("equation order must be at least 1, got {0}")]
    InvalidOrder(usize),

    #[error("invalid input: {0}")]
    InvalidInput(InvalidInput),

    #[error("unknown integration method `{0}`; expected one of euler, midpoint, heun, rungeKutta, dormandPrince")]
    UnknownMethod(String),

    #[error("solve aborted at x = {x} after {} completed steps: {source}", .trajectory.len())]
    Solve {
        x: f64,
        #[source]
        source: Box<SolverError>,
        trajectory: Trajectory,
    },
}

impl SolverError {
    /// Partial trajectory computed before a mid-solve failure, if any.
    pub fn partial_trajectory(&self) -> Option<&Trajectory> {
        match self {
            SolverError::Solve { trajectory, .. } => Some(trajectory),
            _ => None,
        }
    }

    /// The innermost error, unwrapping a `Solve` wrapper.
    pub fn root_cause(&self) -> &SolverError {
        match self {
            SolverError::Solve { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Reasons a compiled expression can fail to produce a number.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalFailure {
    #[error("unbound variable `{0}`")]
    UnboundVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("non-finite result {0}")]
    NonFinite(f64),

    #[error("expected {expected} variable bindings, got {got}")]
    BindingCount { expected: usize, got: usize },

    #[error("malformed bytecode")]
    StackUnderflow,
}

/// Rejected numeric inputs, each carrying the offending value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    #[error("step size must be positive, got {0}")]
    NonPositiveStep(f64),

    #[error("step size {step} does not advance x beyond {x} in floating point")]
    StepTooSmall { step: f64, x: f64 },

    #[error("target x ({target}) must be ahead of the initial x ({initial})")]
    TargetNotAhead { initial: f64, target: f64 },

    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    #[error("initial state has {got} components but the equation has order {expected}")]
    StateDimension { expected: usize, got: usize },

    #[error("{points} calculation points requested, at most {max} allowed")]
    TooManyPoints { points: u64, max: u64 },
}

impl From<InvalidInput> for SolverError {
    fn from(value: InvalidInput) -> Self {
        SolverError::InvalidInput(value)
    }
}
