use solver_core::error::{InvalidInput, SolverError};
use solver_core::{build, solve, Method};
use std::thread;

#[test]
fn exponential_growth_matches_analytic_solution_per_method() {
    let field = build("y0", 1).expect("field should build");
    let tolerances = [
        (Method::Euler, 2e-2),
        (Method::Midpoint, 1e-4),
        (Method::Heun, 1e-4),
        (Method::RungeKutta, 1e-8),
        (Method::DormandPrince, 1e-11),
    ];
    let mut previous_error = f64::INFINITY;
    for (method, tolerance) in tolerances {
        let record = solve(&field, 0.0, &[1.0], 0.01, 1.0, method.name()).expect("solve");
        assert_eq!(record.steps(), 100, "{method}");
        let error = (record.final_y[0] - record.final_x.exp()).abs();
        assert!(error < tolerance, "{method}: error {error} exceeds {tolerance}");
        if method != Method::Heun {
            assert!(error <= previous_error, "{method} should beat lower-order schemes");
            previous_error = error;
        }
    }
}

#[test]
fn zero_equation_only_advances_x() {
    let field = build("0", 3).expect("field should build");
    for method in Method::ALL {
        let record = solve(&field, 0.0, &[1.0, 0.0, 0.0], 0.25, 2.0, method.name()).expect("solve");
        assert_eq!(record.steps(), 8);
        for (_, y) in record.trajectory.iter() {
            assert_eq!(y, &[1.0, 0.0, 0.0], "{method}");
        }
    }
}

#[test]
fn constant_highest_derivative_keeps_lower_components_unchanged() {
    // y'' = 0 with y'(0) = 0 keeps y constant.
    let field = build("0", 2).expect("field should build");
    let record = solve(&field, 0.0, &[3.0, 0.0], 0.1, 1.0, "dormandPrince").expect("solve");
    assert_eq!(record.final_y, vec![3.0, 0.0]);
}

#[test]
fn trajectory_advances_by_exactly_one_step_each_time() {
    let field = build("sin(x) - y0", 1).expect("field should build");
    let h = 0.07;
    let record = solve(&field, -1.0, &[0.5], h, 2.0, "heun").expect("solve");
    let xs = record.trajectory.x_values();
    assert_eq!(xs[0], -1.0 + h);
    for pair in xs.windows(2) {
        assert_eq!(pair[1], pair[0] + h);
        assert!(pair[1] > pair[0]);
    }
    assert!(record.final_x >= 2.0 - 1e-10);
    assert!(record.final_x - h < 2.0 - 1e-10);
    for (_, y) in record.trajectory.iter() {
        assert_eq!(y.len(), 1);
    }
}

#[test]
fn harmonic_oscillator_stays_on_unit_circle() {
    let field = build("-y0", 2).expect("field should build");
    let record = solve(&field, 0.0, &[1.0, 0.0], 0.01, std::f64::consts::PI, "rungeKutta")
        .expect("solve");
    let x = record.final_x;
    assert!((record.final_y[0] - x.cos()).abs() < 1e-8);
    assert!((record.final_y[1] + x.sin()).abs() < 1e-8);
}

#[test]
fn repeated_solves_are_bit_identical() {
    let field = build("x * y1 - y0 ^ 2", 2).expect("field should build");
    let first = solve(&field, 0.0, &[1.0, 0.5], 0.05, 1.5, "dormandPrince").expect("solve");
    let second = solve(&field, 0.0, &[1.0, 0.5], 0.05, 1.5, "dormandPrince").expect("solve");
    let bits = |values: &[f64]| values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(first.trajectory.x_values()), bits(second.trajectory.x_values()));
    for (a, b) in first.trajectory.iter().zip(second.trajectory.iter()) {
        assert_eq!(bits(a.1), bits(b.1));
    }
}

#[test]
fn invalid_inputs_fail_with_specific_kinds() {
    let field = build("y0", 1).expect("field should build");
    assert!(matches!(
        solve(&field, 0.0, &[1.0], 0.0, 1.0, "euler"),
        Err(SolverError::InvalidInput(InvalidInput::NonPositiveStep(_)))
    ));
    assert!(matches!(
        solve(&field, 0.0, &[1.0], -1.0, 1.0, "euler"),
        Err(SolverError::InvalidInput(InvalidInput::NonPositiveStep(_)))
    ));
    assert!(matches!(
        solve(&field, 0.0, &[1.0], 0.1, 0.0, "euler"),
        Err(SolverError::InvalidInput(InvalidInput::TargetNotAhead { .. }))
    ));
    assert!(matches!(
        solve(&field, 0.0, &[1.0], 0.1, 1.0, "simpson"),
        Err(SolverError::UnknownMethod(_))
    ));
    assert!(matches!(build("y0", 0), Err(SolverError::InvalidOrder(0))));
}

#[test]
fn decay_with_euler_reproduces_known_approximation() {
    let field = build("-y0", 1).expect("field should build");
    let record = solve(&field, 0.0, &[1.0], 0.1, 1.0, "euler").expect("solve");
    assert_eq!(record.steps(), 10);
    assert!((record.final_x - 1.0).abs() <= 1e-10);
    assert!((record.final_y[0] - 0.3487).abs() < 1e-4);
    assert!((record.final_y[0] - (-1.0_f64).exp()).abs() > 0.01);
}

#[test]
fn evaluation_failure_aborts_with_partial_trajectory() {
    let field = build("sqrt(1 - x)", 1).expect("field should build");
    let err = solve(&field, 0.0, &[0.0], 0.5, 3.0, "euler").expect_err("sqrt of negative");
    let trajectory = err.partial_trajectory().expect("partial trajectory");
    assert_eq!(trajectory.x_values(), &[0.5, 1.0, 1.5]);
    assert!(err.to_string().contains("sqrt(1 - x)"));
}

#[test]
fn independent_solves_run_concurrently() {
    let field = build("-2 * y0", 1).expect("field should build");
    let expected = solve(&field, 0.0, &[1.0], 0.01, 1.0, "rungeKutta").expect("solve");
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let field = field.clone();
            thread::spawn(move || solve(&field, 0.0, &[1.0], 0.01, 1.0, "rungeKutta"))
        })
        .collect();
    for handle in handles {
        let record = handle.join().expect("thread").expect("solve");
        assert_eq!(record, expected);
    }
}
