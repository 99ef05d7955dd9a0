//! The stepping loop and the values it produces.

use crate::config::SolverSettings;
use crate::error::{EvalFailure, InvalidInput, SolverError};
use crate::solvers::Method;
use crate::traits::VectorField;
use serde::{Deserialize, Serialize};

// Preallocation cap; longer solves grow the buffers as usual.
const MAX_PREALLOCATED_STEPS: usize = 1 << 16;

/// Points `(x_i, y_i)` produced by each completed step, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    #[serde(rename = "xvalues")]
    x_values: Vec<f64>,
    #[serde(rename = "yvalues")]
    y_values: Vec<Vec<f64>>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            x_values: Vec::with_capacity(capacity),
            y_values: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, x: f64, y: Vec<f64>) {
        self.x_values.push(x);
        self.y_values.push(y);
    }

    pub fn len(&self) -> usize {
        self.x_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x_values.is_empty()
    }

    pub fn x_values(&self) -> &[f64] {
        &self.x_values
    }

    pub fn y_values(&self) -> &[Vec<f64>] {
        &self.y_values
    }

    pub fn last(&self) -> Option<(f64, &[f64])> {
        Some((*self.x_values.last()?, self.y_values.last()?.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &[f64])> + '_ {
        self.x_values
            .iter()
            .copied()
            .zip(self.y_values.iter().map(Vec::as_slice))
    }
}

/// Outcome of a successful solve: the final state and every step taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "SolutionWire", try_from = "SolutionWire")]
pub struct SolutionRecord {
    pub final_x: f64,
    pub final_y: Vec<f64>,
    pub trajectory: Trajectory,
}

impl SolutionRecord {
    /// Serializes as `{"solution": [x, y0, ...], "xvalues": [...], "yvalues": [[...], ...]}`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn steps(&self) -> usize {
        self.trajectory.len()
    }
}

#[derive(Serialize, Deserialize)]
struct SolutionWire {
    solution: Vec<f64>,
    #[serde(flatten)]
    trajectory: Trajectory,
}

impl From<SolutionRecord> for SolutionWire {
    fn from(record: SolutionRecord) -> Self {
        let mut solution = Vec::with_capacity(record.final_y.len() + 1);
        solution.push(record.final_x);
        solution.extend(record.final_y);
        Self {
            solution,
            trajectory: record.trajectory,
        }
    }
}

impl TryFrom<SolutionWire> for SolutionRecord {
    type Error = String;

    fn try_from(wire: SolutionWire) -> Result<Self, Self::Error> {
        let (&final_x, final_y) = wire
            .solution
            .split_first()
            .ok_or("solution must contain the final x")?;
        if wire.trajectory.x_values.len() != wire.trajectory.y_values.len() {
            return Err(format!(
                "xvalues has {} entries but yvalues has {}",
                wire.trajectory.x_values.len(),
                wire.trajectory.y_values.len()
            ));
        }
        Ok(Self {
            final_x,
            final_y: final_y.to_vec(),
            trajectory: wire.trajectory,
        })
    }
}

/// Integrates from `(x0, y0)` to `x_target` with the method named `method`.
///
/// `method` must be one of `euler`, `midpoint`, `heun`, `rungeKutta`,
/// `dormandPrince`.
pub fn solve<F: VectorField<f64> + ?Sized>(
    f: &F,
    x0: f64,
    y0: &[f64],
    h: f64,
    x_target: f64,
    method: &str,
) -> Result<SolutionRecord, SolverError> {
    let method: Method = method.parse()?;
    solve_with(f, x0, y0, h, x_target, method, &SolverSettings::default())
}

/// Checks everything the stepping loop relies on, before any step is taken.
pub fn validate_inputs(
    dimension: usize,
    x0: f64,
    y0: &[f64],
    h: f64,
    x_target: f64,
    epsilon: f64,
) -> Result<(), InvalidInput> {
    for (name, value) in [("initial x", x0), ("step size", h), ("target x", x_target)] {
        if !value.is_finite() {
            return Err(InvalidInput::NonFinite { name, value });
        }
    }
    if let Some(&value) = y0.iter().find(|value| !value.is_finite()) {
        return Err(InvalidInput::NonFinite {
            name: "initial state",
            value,
        });
    }
    if y0.len() != dimension {
        return Err(InvalidInput::StateDimension {
            expected: dimension,
            got: y0.len(),
        });
    }
    if h <= 0.0 {
        return Err(InvalidInput::NonPositiveStep(h));
    }
    // A target within epsilon of the start would finish without taking a step.
    if x_target - epsilon <= x0 {
        return Err(InvalidInput::TargetNotAhead {
            initial: x0,
            target: x_target,
        });
    }
    // Float spacing grows with magnitude, so checking both ends covers the range.
    for x in [x0, x_target] {
        if x + h <= x {
            return Err(InvalidInput::StepTooSmall { step: h, x });
        }
    }
    Ok(())
}

/// Integrates from `(x0, y0)` to `x_target` with an already resolved method.
///
/// Steps of exactly `h` are taken while `x < x_target - epsilon`; the last
/// step may overshoot the target. A failure inside a step aborts the solve
/// with [`SolverError::Solve`], carrying every point computed before it.
pub fn solve_with<F: VectorField<f64> + ?Sized>(
    f: &F,
    x0: f64,
    y0: &[f64],
    h: f64,
    x_target: f64,
    method: Method,
    settings: &SolverSettings,
) -> Result<SolutionRecord, SolverError> {
    validate_inputs(f.dimension(), x0, y0, h, x_target, settings.epsilon)?;

    log::debug!(
        "Starting solve with method: {method}, order: {}, from x = {x0} to x = {x_target}, h = {h}",
        f.dimension()
    );

    let expected_steps = ((x_target - x0) / h).ceil() as usize;
    let mut trajectory = Trajectory::with_capacity(expected_steps.min(MAX_PREALLOCATED_STEPS));
    let mut x = x0;
    let mut y = y0.to_vec();

    while x < x_target - settings.epsilon {
        let (next_x, next_y) = match method.step(f, x, &y, h) {
            Ok(next) => next,
            Err(source) => {
                log::error!(
                    "Solve aborted at x = {x} after {} steps: {source}",
                    trajectory.len()
                );
                return Err(SolverError::Solve {
                    x,
                    source: Box::new(source),
                    trajectory,
                });
            }
        };
        if let Some(&value) = next_y.iter().find(|value| !value.is_finite()) {
            let source = SolverError::Evaluation {
                expression: format!("{method} step"),
                failure: EvalFailure::NonFinite(value),
            };
            log::error!(
                "Solve aborted at x = {x} after {} steps: {source}",
                trajectory.len()
            );
            return Err(SolverError::Solve {
                x,
                source: Box::new(source),
                trajectory,
            });
        }
        trajectory.push(next_x, next_y.clone());
        x = next_x;
        y = next_y;
    }

    log::debug!("Completed solve with {} steps", trajectory.len());
    Ok(SolutionRecord {
        final_x: x,
        final_y: y,
        trajectory,
    })
}
