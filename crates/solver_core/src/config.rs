use serde::{Deserialize, Serialize};

/// Tolerance absorbing floating accumulation of `x` when checking the target.
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// Upper bound on `|reach_point - initial_x| / step_size` for a single request.
pub const DEFAULT_MAX_POINTS: u64 = 100_000;

/// Tunables shared by every solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct SolverSettings {
    /// The loop stops once `x >= x_target - epsilon`.
    pub epsilon: f64,
    /// Requests needing more steps than this are rejected before solving.
    pub max_points: u64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            max_points: DEFAULT_MAX_POINTS,
        }
    }
}

impl SolverSettings {
    /// Reads settings from a JSON object; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
