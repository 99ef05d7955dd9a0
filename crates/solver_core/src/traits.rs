use crate::error::SolverError;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars by the evaluator and the steppers.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + Send + Sync + 'static {
    /// Converts an `f64` constant into the scalar type.
    fn constant(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }
}

impl<T: Float + FromPrimitive + Debug + Send + Sync + 'static> Scalar for T {}

/// The right-hand side of a first-order system y' = f(x, y).
///
/// Implementations must be pure: identical `(x, y)` always yields the identical
/// derivative. Evaluation returns a fresh vector instead of writing into a
/// caller-owned buffer, so a field can be shared between independent solves.
pub trait VectorField<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the derivative at `(x, y)`.
    fn eval(&self, x: T, y: &[T]) -> Result<Vec<T>, SolverError>;
}

/// A single explicit step of a fixed-step scheme.
pub trait Steppable<T: Scalar> {
    /// Advances `(x, y)` by `h`, returning the new point without touching `y`.
    fn step<F: VectorField<T> + ?Sized>(
        &self,
        system: &F,
        x: T,
        y: &[T],
        h: T,
    ) -> Result<(T, Vec<T>), SolverError>;
}
