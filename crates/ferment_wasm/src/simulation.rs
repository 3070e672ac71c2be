//! Single fermentation runs sampled on a regular grid.

use crate::parse_method;
use ferment_core::integrator::{integrate, sample_grid, IntegratorSettings};
use ferment_core::kinetics::{KineticParams, Regime};
use ferment_core::report::TrajectoryReport;
use ferment_core::FermentError;
use js_sys::Float64Array;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmSimulation {
    report: TrajectoryReport,
}

#[wasm_bindgen]
impl WasmSimulation {
    /// Parameters not named in `param_names` keep the regime's preset value.
    #[wasm_bindgen(constructor)]
    pub fn new(
        regime: &str,
        param_names: Vec<String>,
        params: Vec<f64>,
        horizon: f64,
        sample_step: f64,
        solver_name: &str,
    ) -> Result<WasmSimulation, JsValue> {
        console_error_panic_hook::set_once();

        let method = parse_method(solver_name).map_err(|e| JsValue::from_str(&e))?;
        let report = simulate(regime, &param_names, &params, horizon, sample_step, method)
            .map_err(|e| JsValue::from_str(&format!("Simulation failed: {}", e)))?;
        Ok(WasmSimulation { report })
    }

    pub fn times(&self) -> Vec<f64> {
        self.report.t.clone()
    }

    pub fn series_count(&self) -> usize {
        self.report.series.len()
    }

    pub fn series_names(&self) -> Vec<String> {
        self.report.series.iter().map(|s| s.name.clone()).collect()
    }

    /// Values of one series; empty when `index` is out of range.
    pub fn series(&self, index: usize) -> Vec<f64> {
        self.report
            .series
            .get(index)
            .map(|s| s.values.clone())
            .unwrap_or_default()
    }

    /// Same as `series`, without the intermediate copy into a JS array.
    pub fn series_buffer(&self, index: usize) -> Float64Array {
        match self.report.series.get(index) {
            Some(s) => Float64Array::from(s.values.as_slice()),
            None => Float64Array::new_with_length(0),
        }
    }

    pub fn report(&self) -> Result<JsValue, JsValue> {
        to_value(&self.report)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

fn simulate(
    regime: &str,
    param_names: &[String],
    params: &[f64],
    horizon: f64,
    sample_step: f64,
    method: ferment_core::integrator::Method,
) -> Result<TrajectoryReport, FermentError> {
    let regime = Regime::parse(regime)?;
    let params = KineticParams::from_named(regime.preset(), param_names, params)?;
    let model = regime.build(&params)?;
    let times = sample_grid(0.0, horizon, sample_step)?;
    let settings = IntegratorSettings {
        method,
        ..IntegratorSettings::default()
    };
    let trajectory = integrate(
        &*model,
        &model.initial_state(),
        (0.0, horizon),
        Some(&times),
        &settings,
    )?;
    TrajectoryReport::from_trajectory(&*model, &trajectory)
}

#[cfg(test)]
mod tests {
    use super::{simulate, WasmSimulation};
    use ferment_core::integrator::Method;
    use ferment_core::FermentError;

    #[test]
    fn simulation_exposes_named_series() {
        let simulation = WasmSimulation::new(
            "chemostat",
            vec!["D".to_string()],
            vec![0.1],
            20.0,
            0.5,
            "tsit5",
        )
        .expect("simulation");

        assert_eq!(simulation.times().len(), 40);
        assert_eq!(simulation.series_count(), 3);
        assert_eq!(simulation.series_names()[0], "Cell concentration");
        assert_eq!(simulation.series(0).len(), 40);
        assert!(simulation.series(7).is_empty());
    }

    #[test]
    fn unknown_inputs_are_rejected() {
        assert!(matches!(
            simulate("bioreactor", &[], &[], 10.0, 0.1, Method::Dopri5),
            Err(FermentError::InvalidParameters(_))
        ));
        assert!(matches!(
            simulate("batch", &["Yield".to_string()], &[1.0], 10.0, 0.1, Method::Dopri5),
            Err(FermentError::InvalidParameters(_))
        ));
        assert!(matches!(
            simulate("batch", &["Yxs".to_string()], &[0.0], 10.0, 0.1, Method::Dopri5),
            Err(FermentError::InvalidParameters(_))
        ));
    }

    #[cfg(target_arch = "wasm32")]
    #[test]
    fn constructor_reports_errors_as_strings() {
        let result = WasmSimulation::new("batch", vec![], vec![], 10.0, 0.1, "euler");
        assert!(result.is_err(), "expected error for unknown solver");
    }
}
