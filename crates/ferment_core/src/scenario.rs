//! Serde-described runs: a regime, its parameters and the sampling to use.
//!
//! Parameters start from the regime's preset. A full `params` record replaces the
//! preset; `overrides` then patches individual constants by name, e.g.
//!
//! ```json
//! { "regime": "chemostat", "overrides": { "D": 0.2 }, "horizon": 200 }
//! ```

use crate::error::{FermentError, Result};
use crate::integrator::{integrate, sample_grid, IntegratorSettings};
use crate::kinetics::{
    mutant_dominates, steady_state_curve, CompetitionModel, KineticModel, KineticParams, Regime,
};
use crate::report::{SteadyStateReport, SweepReport, TrajectoryReport};
use crate::sweep::{mutation_rate_grid, sweep_threshold, SweepRequest};
use anyhow::Context;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const DEFAULT_HORIZON: f64 = 50.0;
const COMPETITION_HORIZON: f64 = 400.0;
const DEFAULT_SAMPLE_STEP: f64 = 0.01;

/// Half-open range `start, start + step, ...` below `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Grid {
    pub fn values(&self) -> Result<Vec<f64>> {
        sample_grid(self.start, self.stop, self.step)
    }
}

/// Parameter record assembled from a preset, an optional replacement and overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamSource {
    pub params: Option<KineticParams>,
    pub overrides: BTreeMap<String, f64>,
}

impl ParamSource {
    pub fn resolve(&self, preset: KineticParams) -> Result<KineticParams> {
        let base = self.params.unwrap_or(preset);
        let names: Vec<String> = self.overrides.keys().cloned().collect();
        let values: Vec<f64> = self.overrides.values().copied().collect();
        KineticParams::from_named(base, &names, &values)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationScenario {
    #[serde(flatten)]
    pub source: ParamSource,
    pub horizon: Option<f64>,
    pub sample_step: Option<f64>,
    pub settings: IntegratorSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteadyStateScenario {
    #[serde(flatten)]
    pub source: ParamSource,
    /// Dilution rates; defaults to `0.001, 0.002, ...` below `mumax`.
    pub dilution: Option<Grid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationSweepScenario {
    #[serde(flatten)]
    pub source: ParamSource,
    pub horizon: Option<f64>,
    pub sample_step: Option<f64>,
    /// Mutation rates per hour; defaults to `1e-6, 1.1e-5, ...` below `1e-3`.
    pub rates: Option<Grid>,
    pub settings: IntegratorSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "regime", rename_all = "snake_case")]
pub enum Scenario {
    Batch(SimulationScenario),
    FedBatch(SimulationScenario),
    Chemostat(SimulationScenario),
    Competition(SimulationScenario),
    SteadyState(SteadyStateScenario),
    MutationSweep(MutationSweepScenario),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Trajectory(TrajectoryReport),
    SteadyState(SteadyStateReport),
    Sweep(SweepReport),
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| FermentError::invalid(format!("Malformed scenario: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FermentError::invalid(format!("Unserializable scenario: {e}")))
    }

    /// Scenario reproducing the preset of `regime` with default sampling.
    pub fn preset(regime: Regime) -> Self {
        let simulation = SimulationScenario::default();
        match regime {
            Regime::Batch => Scenario::Batch(simulation),
            Regime::FedBatch => Scenario::FedBatch(simulation),
            Regime::Chemostat => Scenario::Chemostat(simulation),
            Regime::Competition => Scenario::Competition(simulation),
        }
    }

    pub fn run(&self) -> Result<ScenarioOutcome> {
        match self {
            Scenario::Batch(s) => run_simulation(Regime::Batch, s),
            Scenario::FedBatch(s) => run_simulation(Regime::FedBatch, s),
            Scenario::Chemostat(s) => run_simulation(Regime::Chemostat, s),
            Scenario::Competition(s) => run_simulation(Regime::Competition, s),
            Scenario::SteadyState(s) => run_steady_state(s),
            Scenario::MutationSweep(s) => run_mutation_sweep(s),
        }
    }
}

fn default_horizon(regime: Regime) -> f64 {
    match regime {
        Regime::Competition => COMPETITION_HORIZON,
        _ => DEFAULT_HORIZON,
    }
}

fn run_simulation(regime: Regime, scenario: &SimulationScenario) -> Result<ScenarioOutcome> {
    let params = scenario.source.resolve(regime.preset())?;
    let model = regime.build(&params)?;
    let horizon = scenario.horizon.unwrap_or_else(|| default_horizon(regime));
    let times = sample_grid(
        0.0,
        horizon,
        scenario.sample_step.unwrap_or(DEFAULT_SAMPLE_STEP),
    )?;
    debug!(
        "Running {} scenario over {} h with {} samples.",
        model.name(),
        horizon,
        times.len()
    );
    let trajectory = integrate(
        &*model,
        &model.initial_state(),
        (0.0, horizon),
        Some(&times),
        &scenario.settings,
    )?;
    Ok(ScenarioOutcome::Trajectory(TrajectoryReport::from_trajectory(
        &*model,
        &trajectory,
    )?))
}

fn run_steady_state(scenario: &SteadyStateScenario) -> Result<ScenarioOutcome> {
    let params = scenario.source.resolve(KineticParams::chemostat())?;
    let grid = scenario.dilution.unwrap_or(Grid {
        start: 0.001,
        stop: params.mumax,
        step: 0.001,
    });
    let curve = steady_state_curve(&params, &grid.values()?)?;
    Ok(ScenarioOutcome::SteadyState(SteadyStateReport::from_curve(
        &curve,
    )))
}

fn run_mutation_sweep(scenario: &MutationSweepScenario) -> Result<ScenarioOutcome> {
    let params = scenario.source.resolve(KineticParams::competition())?;
    let grid = scenario.rates.unwrap_or(Grid {
        start: 1e-6,
        stop: 1e-3,
        step: 1e-5,
    });
    let rates = mutation_rate_grid(grid.start, grid.stop, grid.step)?;
    let horizon = scenario.horizon.unwrap_or(COMPETITION_HORIZON);
    let request = SweepRequest {
        settings: scenario.settings,
        ..SweepRequest::sampled(
            horizon,
            scenario.sample_step.unwrap_or(DEFAULT_SAMPLE_STEP),
        )?
    };
    let y0 = CompetitionModel::new(&params)?.initial_state();
    let result = sweep_threshold(
        &rates,
        |rate| CompetitionModel::with_mutation_rate(&params, rate),
        &y0,
        &request,
        mutant_dominates,
    )?;
    Ok(ScenarioOutcome::Sweep(SweepReport::from_result(&result)))
}

#[cfg(test)]
mod tests {
    use super::{Grid, Scenario, ScenarioOutcome, SimulationScenario};
    use crate::error::FermentError;
    use crate::kinetics::{KineticParams, Regime};
    use crate::report::SweepStatus;

    #[test]
    fn presets_round_trip_through_json() {
        for regime in [
            Regime::Batch,
            Regime::FedBatch,
            Regime::Chemostat,
            Regime::Competition,
        ] {
            let scenario = Scenario::preset(regime);
            let json = scenario.to_json_string().expect("serialize");
            let parsed = Scenario::from_json_str(&json).expect("parse");
            assert_eq!(parsed, scenario);
        }

        let explicit = Scenario::Chemostat(SimulationScenario {
            horizon: Some(100.0),
            ..SimulationScenario::default()
        });
        let mut with_params = explicit.clone();
        if let Scenario::Chemostat(s) = &mut with_params {
            s.source.params = Some(KineticParams::chemostat());
        }
        let json = with_params.to_json_string().expect("serialize");
        assert_eq!(Scenario::from_json_str(&json).expect("parse"), with_params);
    }

    #[test]
    fn overrides_accept_conventional_symbols() {
        let scenario = Scenario::from_json_str(
            r#"{ "regime": "chemostat", "overrides": { "D": 0.2, "Sf": 12.0 }, "horizon": 5 }"#,
        )
        .expect("parse");
        let Scenario::Chemostat(simulation) = &scenario else {
            panic!("expected chemostat scenario");
        };
        let params = simulation
            .source
            .resolve(KineticParams::chemostat())
            .expect("resolve");
        assert_eq!(params.dilution, 0.2);
        assert_eq!(params.sf, 12.0);
        assert_eq!(params.ks, KineticParams::chemostat().ks);
    }

    #[test]
    fn batch_scenario_produces_labelled_trajectory() {
        let scenario = Scenario::from_json_str(r#"{ "regime": "batch", "sample_step": 0.5 }"#)
            .expect("parse");
        match scenario.run().expect("run") {
            ScenarioOutcome::Trajectory(report) => {
                assert_eq!(report.title, "batch");
                assert_eq!(report.t.len(), 100);
                assert_eq!(report.series.len(), 3);
                assert_eq!(report.series[0].name, "Cell concentration");
            }
            other => panic!("expected trajectory, got {other:?}"),
        }
    }

    #[test]
    fn steady_state_scenario_uses_default_dilution_grid() {
        let scenario = Scenario::from_json_str(r#"{ "regime": "steady_state" }"#).expect("parse");
        match scenario.run().expect("run") {
            ScenarioOutcome::SteadyState(report) => {
                assert_eq!(report.dilution.len(), 299);
                assert!(report.optimum.is_some());
            }
            other => panic!("expected steady-state report, got {other:?}"),
        }
    }

    #[test]
    fn short_mutation_sweep_is_incomplete() {
        let scenario = Scenario::MutationSweep(super::MutationSweepScenario {
            horizon: Some(200.0),
            sample_step: Some(0.5),
            rates: Some(Grid {
                start: 3e-6,
                stop: 3.5e-4,
                step: 3e-4,
            }),
            ..Default::default()
        });
        match scenario.run().expect("run") {
            ScenarioOutcome::Sweep(report) => {
                assert_eq!(report.status, SweepStatus::Incomplete);
                assert_eq!(report.missing, vec![3e-6]);
                assert_eq!(report.reached.len(), 1);
            }
            other => panic!("expected sweep report, got {other:?}"),
        }
    }

    #[test]
    fn malformed_and_missing_files_are_reported() {
        assert!(matches!(
            Scenario::from_json_str(r#"{ "regime": "bioreactor" }"#),
            Err(FermentError::InvalidParameters(_))
        ));
        let error = Scenario::from_path("/nonexistent/scenario.json").expect_err("missing file");
        assert!(error.to_string().contains("Failed to read scenario"));
    }
}
