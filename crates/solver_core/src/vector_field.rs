//! Order reduction of `y^(n) = f(x, y0, ..., y{n-1})` into a first-order system.
//!
//! The state vector holds the unknown function and its first `n - 1`
//! derivatives. The reduced field is `dy[i] = y[i + 1]` for `i < n - 1`, and the
//! last component is the compiled equation evaluated at `(x, y)`.

use crate::equation_engine::Expression;
use crate::error::SolverError;
use crate::traits::{Scalar, VectorField};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Variable names bound by an equation of the given order: `x, y0, ..., y{n-1}`.
pub fn state_variable_names(order: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(order + 1);
    names.push("x".to_string());
    names.extend((0..order).map(|i| format!("y{i}")));
    names
}

/// Compiles `equation` for an equation of the given order.
pub fn compile_equation(equation: &str, order: usize) -> Result<Expression, SolverError> {
    if order < 1 {
        return Err(SolverError::InvalidOrder(order));
    }
    Expression::compile(equation, &state_variable_names(order))
}

/// The right-hand side of the reduced first-order system.
///
/// Holds only the immutable compiled equation, so clones are cheap and the
/// field can be used from several solves at once.
#[derive(Debug, Clone)]
pub struct EquationField {
    order: usize,
    equation: Arc<Expression>,
}

impl EquationField {
    /// Wraps an already compiled equation. The expression must bind
    /// `x, y0, ..., y{order-1}` in that order.
    pub fn from_expression(equation: Arc<Expression>, order: usize) -> Result<Self, SolverError> {
        if order < 1 {
            return Err(SolverError::InvalidOrder(order));
        }
        Ok(Self { order, equation })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn equation(&self) -> &Expression {
        &self.equation
    }
}

impl<T: Scalar> VectorField<T> for EquationField {
    fn dimension(&self) -> usize {
        self.order
    }

    fn eval(&self, x: T, y: &[T]) -> Result<Vec<T>, SolverError> {
        let mut bindings = Vec::with_capacity(y.len() + 1);
        bindings.push(x);
        bindings.extend_from_slice(y);
        let highest = self.equation.eval(&bindings)?;

        let mut dy = Vec::with_capacity(self.order);
        dy.extend_from_slice(&y[1..]);
        dy.push(highest);
        Ok(dy)
    }
}

/// Builds the vector field for `equation` of the given order.
///
/// The equation is parsed and compiled here, once; every later evaluation runs
/// the compiled bytecode.
pub fn build(equation: &str, order: usize) -> Result<EquationField, SolverError> {
    let compiled = compile_equation(equation, order)?;
    EquationField::from_expression(Arc::new(compiled), order)
}

/// Compiled equations keyed by `(text, order)`, shared between solves.
///
/// Lookups take the read lock; the write lock is held only to insert a newly
/// compiled entry. Failed compilations are not cached.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    entries: RwLock<HashMap<(String, usize), Arc<Expression>>>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the vector field for `equation`, compiling it on first use.
    pub fn field(&self, equation: &str, order: usize) -> Result<EquationField, SolverError> {
        let compiled = self.get_or_compile(equation, order)?;
        EquationField::from_expression(compiled, order)
    }

    pub fn get_or_compile(&self, equation: &str, order: usize) -> Result<Arc<Expression>, SolverError> {
        let key = (equation.to_string(), order);
        if let Some(found) = self.read_entries().get(&key) {
            log::trace!("expression cache hit for `{equation}` (order {order})");
            return Ok(Arc::clone(found));
        }

        let compiled = Arc::new(compile_equation(equation, order)?);
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another solve may have compiled the same equation meanwhile; keep the first.
        let entry = entries.entry(key).or_insert(compiled);
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<(String, usize), Arc<Expression>>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalFailure;
    use std::thread;

    #[test]
    fn names_state_variables_by_order() {
        assert_eq!(state_variable_names(3), vec!["x", "y0", "y1", "y2"]);
    }

    #[test]
    fn build_rejects_order_zero() {
        assert_eq!(build("y0", 0).unwrap_err(), SolverError::InvalidOrder(0));
    }

    #[test]
    fn first_order_field_is_the_equation() {
        let field = build("x + y0", 1).unwrap();
        assert_eq!(VectorField::<f64>::dimension(&field), 1);
        assert_eq!(field.eval(2.0, &[3.0]).unwrap(), vec![5.0]);
    }

    #[test]
    fn order_reduction_shifts_derivatives_exactly() {
        let field = build("-y0 + x * y2", 3).unwrap();
        let y = [0.1_f64, 0.2_f64 / 3.0, 1e-17];
        let dy = field.eval(2.0, &y).unwrap();
        assert_eq!(dy.len(), 3);
        assert_eq!(dy[0].to_bits(), y[1].to_bits());
        assert_eq!(dy[1].to_bits(), y[2].to_bits());
        assert_eq!(dy[2], -0.1 + 2.0 * 1e-17);
    }

    #[test]
    fn build_surfaces_equation_errors() {
        assert!(matches!(build("y0 +", 1), Err(SolverError::Parse { .. })));
        assert!(matches!(
            build("y1", 1),
            Err(SolverError::Evaluation {
                failure: EvalFailure::UnboundVariable(_),
                ..
            })
        ));
    }

    #[test]
    fn field_is_pure() {
        let field = build("sin(x) * y1 - y0", 2).unwrap();
        let first = field.eval(0.3, &[1.0, 2.0]).unwrap();
        let second = field.eval(0.3, &[1.0, 2.0]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cache_reuses_compiled_equations() {
        let cache = ExpressionCache::new();
        let a = cache.get_or_compile("y0", 1).unwrap();
        let b = cache.get_or_compile("y0", 1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = cache.get_or_compile("y0", 2).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
        assert!(cache.get_or_compile("y0 +", 1).is_err());
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_is_shared_across_threads() {
        let cache = Arc::new(ExpressionCache::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let field = cache.field("x * y0", 1).unwrap();
                    field.eval(i as f64, &[2.0]).unwrap()[0]
                })
            })
            .collect();
        let results: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, vec![0.0, 2.0, 4.0, 6.0]);
        assert_eq!(cache.len(), 1);
    }
}
