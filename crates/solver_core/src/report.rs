use crate::solve::SolutionRecord;

/// Digit count stored for "no rounding"; an f64 carries about 16 significant digits.
pub const FULL_PRECISION_DIGITS: usize = 16;

/// How many decimals to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Digits(usize),
    Full,
}

impl Rounding {
    /// Maps the stored digit count to a rounding; [`FULL_PRECISION_DIGITS`] or more prints every digit.
    pub fn from_digits(digits: usize) -> Self {
        if digits >= FULL_PRECISION_DIGITS {
            Rounding::Full
        } else {
            Rounding::Digits(digits)
        }
    }

    fn format(self, value: f64) -> String {
        match self {
            Rounding::Digits(digits) => format!("{value:.digits$}"),
            Rounding::Full => format!("{value}"),
        }
    }
}

impl Default for Rounding {
    fn default() -> Self {
        Rounding::Digits(4)
    }
}

/// Display name of the `index`-th state component: `y`, `y'`, `y''`, `y'''`, `y^(4)`, ...
pub fn derivative_name(index: usize) -> String {
    match index {
        0..=3 => format!("y{}", "'".repeat(index)),
        _ => format!("y^({index})"),
    }
}

/// Renders the final state, one `name = value` line per component.
pub fn format_solution(record: &SolutionRecord, rounding: Rounding) -> String {
    let mut out = format!("x = {}", rounding.format(record.final_x));
    for (index, value) in record.final_y.iter().enumerate() {
        out.push_str(&format!(
            "\n{} = {}",
            derivative_name(index),
            rounding.format(*value)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solve::Trajectory;

    fn record() -> SolutionRecord {
        SolutionRecord {
            final_x: 1.0,
            final_y: vec![0.348678440100, -1.5, 2.0, 0.25, 3.0],
            trajectory: Trajectory::new(),
        }
    }

    #[test]
    fn names_derivatives() {
        let names: Vec<String> = (0..6).map(derivative_name).collect();
        assert_eq!(names, vec!["y", "y'", "y''", "y'''", "y^(4)", "y^(5)"]);
    }

    #[test]
    fn formats_with_rounding() {
        let text = format_solution(&record(), Rounding::Digits(4));
        assert_eq!(
            text,
            "x = 1.0000\ny = 0.3487\ny' = -1.5000\ny'' = 2.0000\ny''' = 0.2500\ny^(4) = 3.0000"
        );
    }

    #[test]
    fn formats_without_rounding() {
        assert_eq!(Rounding::from_digits(8), Rounding::Digits(8));
        assert_eq!(Rounding::from_digits(FULL_PRECISION_DIGITS), Rounding::Full);
        let text = format_solution(&record(), Rounding::from_digits(FULL_PRECISION_DIGITS));
        assert!(text.starts_with("x = 1\ny = 0.3486784401\n"));
    }
}
