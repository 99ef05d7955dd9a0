use crate::error::SolverError;
use crate::traits::{Scalar, Steppable, VectorField};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returns `y + h * sum(coef * k)` as a new vector.
fn combine<T: Scalar>(y: &[T], h: T, stages: &[(T, &[T])]) -> Vec<T> {
    y.iter()
        .enumerate()
        .map(|(i, &yi)| {
            let slope = stages
                .iter()
                .fold(T::zero(), |acc, (coef, k)| acc + *coef * k[i]);
            yi + h * slope
        })
        .collect()
}

/// Forward Euler, first order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euler;

impl<T: Scalar> Steppable<T> for Euler {
    fn step<F: VectorField<T> + ?Sized>(
        &self,
        system: &F,
        x: T,
        y: &[T],
        h: T,
    ) -> Result<(T, Vec<T>), SolverError> {
        let k1 = system.eval(x, y)?;
        Ok((x + h, combine(y, h, &[(T::one(), &k1[..])])))
    }
}

/// Explicit midpoint rule (RK2).
#[derive(Debug, Clone, Copy, Default)]
pub struct Midpoint;

impl<T: Scalar> Steppable<T> for Midpoint {
    fn step<F: VectorField<T> + ?Sized>(
        &self,
        system: &F,
        x: T,
        y: &[T],
        h: T,
    ) -> Result<(T, Vec<T>), SolverError> {
        let half = T::constant(0.5);

        // k1 = f(x, y)
        let k1 = system.eval(x, y)?;
        // k2 = f(x + h/2, y + h*k1/2)
        let mid = combine(y, h, &[(half, &k1[..])]);
        let k2 = system.eval(x + h * half, &mid)?;

        Ok((x + h, combine(y, h, &[(T::one(), &k2[..])])))
    }
}

/// Heun's predictor-corrector method (explicit trapezoid).
#[derive(Debug, Clone, Copy, Default)]
pub struct Heun;

impl<T: Scalar> Steppable<T> for Heun {
    fn step<F: VectorField<T> + ?Sized>(
        &self,
        system: &F,
        x: T,
        y: &[T],
        h: T,
    ) -> Result<(T, Vec<T>), SolverError> {
        let half = T::constant(0.5);

        let k1 = system.eval(x, y)?;
        let predicted = combine(y, h, &[(T::one(), &k1[..])]);
        let k2 = system.eval(x + h, &predicted)?;

        Ok((x + h, combine(y, h, &[(half, &k1[..]), (half, &k2[..])])))
    }
}

/// Classic Runge-Kutta 4th Order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RK4;

impl<T: Scalar> Steppable<T> for RK4 {
    fn step<F: VectorField<T> + ?Sized>(
        &self,
        system: &F,
        x: T,
        y: &[T],
        h: T,
    ) -> Result<(T, Vec<T>), SolverError> {
        let half = T::constant(0.5);
        let sixth = T::constant(1.0 / 6.0);
        let third = T::constant(1.0 / 3.0);

        // k1 = f(x, y)
        let k1 = system.eval(x, y)?;

        // k2 = f(x + h/2, y + h*k1/2)
        let tmp = combine(y, h, &[(half, &k1[..])]);
        let k2 = system.eval(x + h * half, &tmp)?;

        // k3 = f(x + h/2, y + h*k2/2)
        let tmp = combine(y, h, &[(half, &k2[..])]);
        let k3 = system.eval(x + h * half, &tmp)?;

        // k4 = f(x + h, y + h*k3)
        let tmp = combine(y, h, &[(T::one(), &k3[..])]);
        let k4 = system.eval(x + h, &tmp)?;

        // y_next = y + h/6 * (k1 + 2k2 + 2k3 + k4)
        let next = combine(
            y,
            h,
            &[(sixth, &k1[..]), (third, &k2[..]), (third, &k3[..]), (sixth, &k4[..])],
        );
        Ok((x + h, next))
    }
}

/// Dormand-Prince 5(4), run as a fixed-step 5th order method.
///
/// Only the 5th order solution is formed. The seventh tableau stage would be
/// evaluated at `(x + h, y_next)` for the embedded estimate; it is skipped since
/// no error control is performed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DormandPrince;

impl<T: Scalar> Steppable<T> for DormandPrince {
    fn step<F: VectorField<T> + ?Sized>(
        &self,
        system: &F,
        x: T,
        y: &[T],
        h: T,
    ) -> Result<(T, Vec<T>), SolverError> {
        let c = |v: f64| T::constant(v);

        let c2 = c(1.0 / 5.0);
        let c3 = c(3.0 / 10.0);
        let c4 = c(4.0 / 5.0);
        let c5 = c(8.0 / 9.0);

        let a21 = c(1.0 / 5.0);

        let a31 = c(3.0 / 40.0);
        let a32 = c(9.0 / 40.0);

        let a41 = c(44.0 / 45.0);
        let a42 = c(-56.0 / 15.0);
        let a43 = c(32.0 / 9.0);

        let a51 = c(19372.0 / 6561.0);
        let a52 = c(-25360.0 / 2187.0);
        let a53 = c(64448.0 / 6561.0);
        let a54 = c(-212.0 / 729.0);

        let a61 = c(9017.0 / 3168.0);
        let a62 = c(-355.0 / 33.0);
        let a63 = c(46732.0 / 5247.0);
        let a64 = c(49.0 / 176.0);
        let a65 = c(-5103.0 / 18656.0);

        // b coefficients (5th order); b2 is zero
        let b1 = c(35.0 / 384.0);
        let b3 = c(500.0 / 1113.0);
        let b4 = c(125.0 / 192.0);
        let b5 = c(-2187.0 / 6784.0);
        let b6 = c(11.0 / 84.0);

        let k1 = system.eval(x, y)?;

        let tmp = combine(y, h, &[(a21, &k1[..])]);
        let k2 = system.eval(x + c2 * h, &tmp)?;

        let tmp = combine(y, h, &[(a31, &k1[..]), (a32, &k2[..])]);
        let k3 = system.eval(x + c3 * h, &tmp)?;

        let tmp = combine(y, h, &[(a41, &k1[..]), (a42, &k2[..]), (a43, &k3[..])]);
        let k4 = system.eval(x + c4 * h, &tmp)?;

        let tmp = combine(y, h, &[(a51, &k1[..]), (a52, &k2[..]), (a53, &k3[..]), (a54, &k4[..])]);
        let k5 = system.eval(x + c5 * h, &tmp)?;

        let tmp = combine(
            y,
            h,
            &[(a61, &k1[..]), (a62, &k2[..]), (a63, &k3[..]), (a64, &k4[..]), (a65, &k5[..])],
        );
        let k6 = system.eval(x + h, &tmp)?;

        let next = combine(
            y,
            h,
            &[(b1, &k1[..]), (b3, &k3[..]), (b4, &k4[..]), (b5, &k5[..]), (b6, &k6[..])],
        );
        Ok((x + h, next))
    }
}

/// The supported integration schemes.
///
/// Resolved once per solve from its wire name, then dispatched directly on
/// every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    Euler,
    Midpoint,
    Heun,
    RungeKutta,
    DormandPrince,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Euler,
        Method::Midpoint,
        Method::Heun,
        Method::RungeKutta,
        Method::DormandPrince,
    ];

    /// Wire name, as accepted by `FromStr`.
    pub fn name(self) -> &'static str {
        match self {
            Method::Euler => "euler",
            Method::Midpoint => "midpoint",
            Method::Heun => "heun",
            Method::RungeKutta => "rungeKutta",
            Method::DormandPrince => "dormandPrince",
        }
    }

    /// Order of accuracy.
    pub fn order(self) -> u32 {
        match self {
            Method::Euler => 1,
            Method::Midpoint | Method::Heun => 2,
            Method::RungeKutta => 4,
            Method::DormandPrince => 5,
        }
    }

    /// Vector field evaluations per step.
    pub fn evaluations(self) -> usize {
        match self {
            Method::Euler => 1,
            Method::Midpoint | Method::Heun => 2,
            Method::RungeKutta => 4,
            Method::DormandPrince => 6,
        }
    }

    /// Advances `(x, y)` by one step of size `h`. Never adjusts `h`.
    pub fn step<T: Scalar, F: VectorField<T> + ?Sized>(
        self,
        system: &F,
        x: T,
        y: &[T],
        h: T,
    ) -> Result<(T, Vec<T>), SolverError> {
        match self {
            Method::Euler => Euler.step(system, x, y, h),
            Method::Midpoint => Midpoint.step(system, x, y, h),
            Method::Heun => Heun.step(system, x, y, h),
            Method::RungeKutta => RK4.step(system, x, y, h),
            Method::DormandPrince => DormandPrince.step(system, x, y, h),
        }
    }
}

impl FromStr for Method {
    type Err = SolverError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.name() == name)
            .ok_or_else(|| SolverError::UnknownMethod(name.to_string()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
