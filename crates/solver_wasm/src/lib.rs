use anyhow::Context;
use solver_core::config::SolverSettings;
use solver_core::request::SolveRequest;
use solver_core::vector_field::ExpressionCache;
use solver_core::{Method, SolutionRecord};
use std::sync::OnceLock;
use wasm_bindgen::prelude::*;

mod system;

pub use system::WasmSolver;
use system::to_js_error;

fn shared_cache() -> &'static ExpressionCache {
    static CACHE: OnceLock<ExpressionCache> = OnceLock::new();
    CACHE.get_or_init(ExpressionCache::new)
}

pub(crate) fn run_request(request: &SolveRequest, settings: &SolverSettings) -> anyhow::Result<SolutionRecord> {
    request
        .solve(shared_cache(), settings)
        .with_context(|| format!("Error solving equation `{}`", request.user_equation))
}

pub(crate) fn run_request_json(json: &str) -> anyhow::Result<String> {
    let request = SolveRequest::from_json(json).context("Invalid solve request")?;
    let record = run_request(&request, &SolverSettings::default())?;
    record.to_json().context("Failed to serialize solution")
}

/// Solves a request object and returns the solution record
/// (`{ solution, xvalues, yvalues }`).
#[wasm_bindgen]
pub fn solve_request(request: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let request: SolveRequest = serde_wasm_bindgen::from_value(request)
        .map_err(|err| JsValue::from_str(&format!("Invalid solve request: {err}")))?;
    let record = run_request(&request, &SolverSettings::default())
        .map_err(|err| to_js_error(format!("{err:#}")))?;
    serde_wasm_bindgen::to_value(&record)
        .map_err(|err| JsValue::from_str(&format!("Failed to serialize solution: {err}")))
}

/// Same as `solve_request`, over JSON text.
#[wasm_bindgen]
pub fn solve_request_json(request: &str) -> Result<String, JsValue> {
    run_request_json(request).map_err(|err| to_js_error(format!("{err:#}")))
}

/// Wire names of the supported integration methods.
#[wasm_bindgen]
pub fn supported_methods() -> js_sys::Array {
    Method::ALL
        .iter()
        .map(|method| JsValue::from_str(method.name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECAY: &str = r#"{
        "method": "euler",
        "userEquation": "y' = -y",
        "formattedEquation": "-y0",
        "order": 1,
        "initialX": 0,
        "initialY": [1],
        "reachPoint": 1,
        "stepSize": 0.1
    }"#;

    #[test]
    fn run_request_json_returns_solution_record() {
        let json = run_request_json(DECAY).expect("request should solve");
        let record = SolutionRecord::from_json(&json).expect("record should parse");
        assert_eq!(record.steps(), 10);
        assert!((record.final_y[0] - 0.3487).abs() < 1e-4);
        assert!(json.starts_with("{\"solution\":["));
    }

    #[test]
    fn run_request_json_adds_context_to_errors() {
        let err = run_request_json("{}").expect_err("missing fields");
        assert!(format!("{err:#}").contains("Invalid solve request"));

        let bad_method = DECAY.replace("\"euler\"", "\"rk45\"");
        let err = run_request_json(&bad_method).expect_err("unknown method");
        let message = format!("{err:#}");
        assert!(message.contains("Error solving equation `y' = -y`"), "{message}");
        assert!(message.contains("unknown integration method `rk45`"), "{message}");
    }

    #[test]
    fn run_request_reuses_compiled_equations() {
        let request = SolveRequest::from_json(DECAY).expect("request");
        let before = shared_cache().len();
        run_request(&request, &SolverSettings::default()).expect("first solve");
        run_request(&request, &SolverSettings::default()).expect("second solve");
        assert!(shared_cache().len() <= before + 1);
        assert!(shared_cache().get_or_compile("-y0", 1).is_ok());
    }

    #[cfg(target_arch = "wasm32")]
    mod wasm {
        use super::super::*;
        use wasm_bindgen_test::*;

        #[wasm_bindgen_test]
        fn supported_methods_lists_wire_names() {
            let methods = supported_methods();
            assert_eq!(methods.length(), 5);
            assert_eq!(methods.get(3).as_string().as_deref(), Some("rungeKutta"));
        }

        #[wasm_bindgen_test]
        fn solve_request_json_rejects_bad_input() {
            assert!(solve_request_json("not json").is_err());
        }
    }
}
