use crate::config::SolverSettings;
use crate::error::{InvalidInput, SolverError};
use crate::solve::{solve_with, SolutionRecord};
use crate::solvers::Method;
use crate::vector_field::ExpressionCache;
use serde::{Deserialize, Serialize};

/// A solve as submitted by a client.
///
/// `user_equation` is kept for display only; `formatted_equation` is the text
/// that gets compiled, with state components written as `y0 .. y{order-1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub method: String,
    #[serde(default)]
    pub user_equation: String,
    pub formatted_equation: String,
    pub order: usize,
    pub initial_x: f64,
    pub initial_y: Vec<f64>,
    pub reach_point: f64,
    pub step_size: f64,
}

impl SolveRequest {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Number of steps the request implies, rounded up.
    pub fn point_count(&self) -> f64 {
        ((self.reach_point - self.initial_x).abs() / self.step_size).ceil()
    }

    /// Rejects requests that would exceed `settings.max_points`.
    pub fn check_size(&self, settings: &SolverSettings) -> Result<(), SolverError> {
        let points = self.point_count();
        if self.step_size > 0.0 && points.is_finite() && points > settings.max_points as f64 {
            return Err(InvalidInput::TooManyPoints {
                points: points as u64,
                max: settings.max_points,
            }
            .into());
        }
        Ok(())
    }

    /// Compiles the equation through `cache` and runs the solve.
    pub fn solve(
        &self,
        cache: &ExpressionCache,
        settings: &SolverSettings,
    ) -> Result<SolutionRecord, SolverError> {
        let method: Method = self.method.parse()?;
        self.check_size(settings)?;
        let field = cache.field(&self.formatted_equation, self.order)?;
        solve_with(
            &field,
            self.initial_x,
            &self.initial_y,
            self.step_size,
            self.reach_point,
            method,
            settings,
        )
    }
}
