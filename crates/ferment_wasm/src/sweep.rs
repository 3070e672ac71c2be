//! Mutation-rate sweep runner, evaluated a few rates per call.

use ferment_core::kinetics::{mutant_dominates, CompetitionModel, KineticModel, KineticParams};
use ferment_core::report::SweepReport;
use ferment_core::sweep::{
    evaluate, log_outcome, mutation_rate_grid, SweepEntry, SweepRequest, SweepResult,
};
use ferment_core::FermentError;
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

/// Progress payload for the stepped sweep.
#[derive(Debug, Serialize)]
struct SweepProgress {
    done: bool,
    completed: usize,
    total: usize,
    not_reached: usize,
}

struct SweepRunnerState {
    params: KineticParams,
    rates: Vec<f64>,
    y0: Vec<f64>,
    request: SweepRequest,
    result: SweepResult,
    done: bool,
}

impl SweepRunnerState {
    fn new(
        param_names: &[String],
        params: &[f64],
        rate_start: f64,
        rate_stop: f64,
        rate_step: f64,
        horizon: f64,
        sample_step: f64,
    ) -> Result<Self, FermentError> {
        let params = KineticParams::from_named(KineticParams::competition(), param_names, params)?;
        let rates = mutation_rate_grid(rate_start, rate_stop, rate_step)?;
        let y0 = CompetitionModel::new(&params)?.initial_state();
        let request = SweepRequest::sampled(horizon, sample_step)?;
        let done = rates.is_empty();
        Ok(Self {
            params,
            rates,
            y0,
            request,
            result: SweepResult::default(),
            done,
        })
    }

    fn advance(&mut self, batch_size: usize) -> Result<SweepProgress, FermentError> {
        for _ in 0..batch_size {
            let index = self.result.entries.len();
            if index >= self.rates.len() {
                self.done = true;
                break;
            }
            let rate = self.rates[index];
            let model = CompetitionModel::with_mutation_rate(&self.params, rate)?;
            let outcome = evaluate(&model, &self.y0, &self.request, mutant_dominates);
            log_outcome(rate, &outcome);
            self.result.entries.push(SweepEntry {
                parameter: rate,
                outcome,
            });
        }
        if self.result.entries.len() >= self.rates.len() {
            self.done = true;
        }
        Ok(self.progress())
    }

    fn progress(&self) -> SweepProgress {
        SweepProgress {
            done: self.done,
            completed: self.result.entries.len(),
            total: self.rates.len(),
            not_reached: self.result.missing().len(),
        }
    }
}

#[wasm_bindgen]
pub struct WasmMutationSweepRunner {
    state: SweepRunnerState,
}

#[wasm_bindgen]
impl WasmMutationSweepRunner {
    #[wasm_bindgen(constructor)]
    pub fn new(
        param_names: Vec<String>,
        params: Vec<f64>,
        rate_start: f64,
        rate_stop: f64,
        rate_step: f64,
        horizon: f64,
        sample_step: f64,
    ) -> Result<WasmMutationSweepRunner, JsValue> {
        console_error_panic_hook::set_once();

        let state = SweepRunnerState::new(
            &param_names,
            &params,
            rate_start,
            rate_stop,
            rate_step,
            horizon,
            sample_step,
        )
        .map_err(|e| JsValue::from_str(&format!("Sweep setup failed: {}", e)))?;
        Ok(WasmMutationSweepRunner { state })
    }

    pub fn is_done(&self) -> bool {
        self.state.done
    }

    pub fn run_steps(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        let progress = self
            .state
            .advance(batch_size as usize)
            .map_err(|e| JsValue::from_str(&format!("{}", e)))?;
        to_value(&progress).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn get_progress(&self) -> Result<JsValue, JsValue> {
        to_value(&self.state.progress())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Final report; incomplete sweeps carry no points and an advisory message.
    pub fn get_result(&self) -> Result<JsValue, JsValue> {
        if !self.state.done {
            return Err(JsValue::from_str("Sweep has not finished."));
        }
        let report = SweepReport::from_result(&self.state.result);
        to_value(&report).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::{SweepRunnerState, WasmMutationSweepRunner};
    use ferment_core::report::{SweepReport, SweepStatus};
    use std::sync::Mutex;

    fn runner_state(horizon: f64) -> SweepRunnerState {
        SweepRunnerState::new(&[], &[], 3e-6, 3.5e-4, 3e-4, horizon, 0.5).expect("state")
    }

    #[test]
    fn runner_advances_in_batches() {
        let mut state = runner_state(400.0);
        assert!(!state.done);

        let progress = state.advance(1).expect("advance");
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.total, 2);
        assert!(!progress.done);

        let progress = state.advance(5).expect("advance");
        assert!(progress.done);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.not_reached, 0);

        let report = SweepReport::from_result(&state.result);
        assert_eq!(report.status, SweepStatus::Complete);
        assert_eq!(report.points.len(), 2);
    }

    #[test]
    fn short_horizon_leaves_sweep_incomplete() {
        let mut state = runner_state(200.0);
        let progress = state.advance(10).expect("advance");
        assert!(progress.done);
        assert_eq!(progress.not_reached, 1);
        let report = SweepReport::from_result(&state.result);
        assert_eq!(report.status, SweepStatus::Incomplete);
    }

    struct CapturedWarnings {
        messages: Mutex<Vec<String>>,
    }

    impl log::Log for CapturedWarnings {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                if let Ok(mut messages) = self.messages.lock() {
                    messages.push(record.args().to_string());
                }
            }
        }

        fn flush(&self) {}
    }

    static WARNINGS: CapturedWarnings = CapturedWarnings {
        messages: Mutex::new(Vec::new()),
    };

    #[test]
    fn missing_values_are_logged_like_the_core_sweep() {
        let _ = log::set_logger(&WARNINGS);
        log::set_max_level(log::LevelFilter::Warn);

        let mut state = runner_state(200.0);
        state.advance(10).expect("advance");

        let messages = WARNINGS.messages.lock().expect("lock");
        assert!(
            messages
                .iter()
                .any(|m| m == "Threshold not reached for parameter value 3e-6."),
            "{messages:?}"
        );
    }

    #[test]
    fn constructor_accepts_named_parameters() {
        let runner = WasmMutationSweepRunner::new(
            vec!["mut_fitness".to_string()],
            vec![1.5],
            1e-5,
            2e-5,
            1e-5,
            50.0,
            1.0,
        )
        .expect("runner");
        assert!(!runner.is_done());
        assert_eq!(runner.state.params.mutant_fitness, 1.5);
    }

    #[test]
    fn invalid_setup_is_rejected() {
        assert!(SweepRunnerState::new(&[], &[], -1.0, 1e-3, 1e-4, 100.0, 1.0).is_err());
        assert!(SweepRunnerState::new(&[], &[], 1e-6, 1e-3, 1e-4, 100.0, 0.0).is_err());
    }
}
