pub mod config;
pub mod equation_engine;
pub mod error;
pub mod report;
pub mod request;
pub mod solve;
pub mod solvers;
/// The `solver_core` crate integrates initial value problems given as text.
/// An equation `y^(n) = f(x, y0, ..., y{n-1})` is compiled once, reduced to a
/// first-order system and stepped with one of five fixed-step explicit schemes.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `VectorField` (right-hand sides), `Steppable` (single steps).
/// - **Equation Engine**: A parser and bytecode VM for evaluating user-defined equations.
/// - **Vector Field**: Order reduction and a shared cache of compiled equations.
/// - **Solvers**: Euler, midpoint, Heun, RK4 and Dormand-Prince steps behind the `Method` enum.
/// - **Solve**: The stepping loop producing a `SolutionRecord`.
pub mod traits;
pub mod vector_field;

pub use error::SolverError;
pub use solve::{solve, solve_with, SolutionRecord, Trajectory};
pub use solvers::Method;
pub use vector_field::{build, EquationField};
