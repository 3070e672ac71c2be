use ferment_core::kinetics::{steady_state_curve as core_steady_state_curve, KineticParams};
use ferment_core::report::SteadyStateReport;
use ferment_core::FermentError;
use ferment_core::integrator::sample_grid;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

/// X-D diagram over `d_start, d_start + d_step, ...` below `d_stop`.
#[wasm_bindgen]
pub fn steady_state_curve(
    param_names: Vec<String>,
    params: Vec<f64>,
    d_start: f64,
    d_stop: f64,
    d_step: f64,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let report = build_report(&param_names, &params, d_start, d_stop, d_step)
        .map_err(|e| JsValue::from_str(&format!("Steady-state curve failed: {}", e)))?;
    to_value(&report).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn build_report(
    param_names: &[String],
    params: &[f64],
    d_start: f64,
    d_stop: f64,
    d_step: f64,
) -> Result<SteadyStateReport, FermentError> {
    let params = KineticParams::from_named(KineticParams::chemostat(), param_names, params)?;
    let dilutions = sample_grid(d_start, d_stop, d_step)?;
    let curve = core_steady_state_curve(&params, &dilutions)?;
    Ok(SteadyStateReport::from_curve(&curve))
}
