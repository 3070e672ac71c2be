use ferment_core::integrator::Method;
use ferment_core::scenario::Scenario;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

mod simulation;
mod steady_state;
mod sweep;

pub use simulation::WasmSimulation;
pub use steady_state::steady_state_curve;
pub use sweep::WasmMutationSweepRunner;

/// Runs a serialized `Scenario` and returns its report.
#[wasm_bindgen]
pub fn run_scenario(scenario: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let scenario: Scenario = from_value(scenario)
        .map_err(|e| JsValue::from_str(&format!("Invalid scenario: {}", e)))?;
    let outcome = scenario
        .run()
        .map_err(|e| JsValue::from_str(&format!("Scenario failed: {}", e)))?;

    to_value(&outcome).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

pub(crate) fn parse_method(name: &str) -> Result<Method, String> {
    match name {
        "" | "dopri5" => Ok(Method::Dopri5),
        "tsit5" => Ok(Method::Tsit5),
        other => Err(format!("Unknown solver \"{}\"", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_method;
    use ferment_core::integrator::Method;

    #[test]
    fn solver_names_map_to_methods() {
        assert_eq!(parse_method("dopri5"), Ok(Method::Dopri5));
        assert_eq!(parse_method(""), Ok(Method::Dopri5));
        assert_eq!(parse_method("tsit5"), Ok(Method::Tsit5));
        assert!(parse_method("rk4").is_err());
    }
}
