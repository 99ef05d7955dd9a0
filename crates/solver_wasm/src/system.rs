//! Interactive stepping wrapper around a compiled equation.

use solver_core::traits::VectorField;
use solver_core::{build, EquationField, Method};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmSolver {
    pub(crate) field: EquationField,
    state: Vec<f64>,
    x: f64,
    pub(crate) method: Method,
}

pub(crate) fn to_js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
impl WasmSolver {
    #[wasm_bindgen(constructor)]
    pub fn new(equation: &str, order: usize, method_name: &str) -> Result<WasmSolver, JsValue> {
        console_error_panic_hook::set_once();

        let field = build(equation, order).map_err(to_js_error)?;
        let method: Method = method_name.parse().map_err(to_js_error)?;

        Ok(WasmSolver {
            field,
            state: vec![0.0; order],
            x: 0.0,
            method,
        })
    }

    pub fn set_state(&mut self, state: &[f64]) {
        self.state = state.to_vec();
    }

    pub fn get_state(&self) -> Vec<f64> {
        self.state.clone()
    }

    pub fn set_x(&mut self, x: f64) {
        self.x = x;
    }

    pub fn get_x(&self) -> f64 {
        self.x
    }

    pub fn order(&self) -> usize {
        self.field.order()
    }

    pub fn method(&self) -> String {
        self.method.name().to_string()
    }

    /// Takes one step of size `h`. The state is left untouched on failure.
    pub fn step(&mut self, h: f64) -> Result<(), JsValue> {
        let (x, state) = self
            .method
            .step(&self.field, self.x, &self.state, h)
            .map_err(to_js_error)?;
        self.x = x;
        self.state = state;
        Ok(())
    }

    /// Derivative of the reduced system at the current point.
    pub fn derivative(&self) -> Result<Vec<f64>, JsValue> {
        self.field.eval(self.x, &self.state).map_err(to_js_error)
    }
}
