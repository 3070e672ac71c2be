//! Threshold detection over repeated simulations.
//!
//! Each parameter value gets a freshly built model, one integration and one forward
//! scan of the resulting trajectory. Values whose runs never reach the threshold, or
//! whose integration fails, stay in the result with their own outcome so that callers
//! can tell "all reached" apart from "re-run with a longer horizon".

use crate::error::{FermentError, Result};
use crate::integrator::{integrate, sample_grid, IntegratorSettings, Trajectory};
use crate::traits::DynamicalSystem;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Integration setup shared by every value of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRequest {
    pub t_span: (f64, f64),
    /// Sample times; `None` keeps the integrator's own step grid.
    #[serde(default)]
    pub eval_times: Option<Vec<f64>>,
    #[serde(default)]
    pub settings: IntegratorSettings,
}

impl SweepRequest {
    /// Span `[0, horizon]` sampled every `sample_step` hours.
    pub fn sampled(horizon: f64, sample_step: f64) -> Result<Self> {
        Ok(Self {
            t_span: (0.0, horizon),
            eval_times: Some(sample_grid(0.0, horizon, sample_step)?),
            settings: IntegratorSettings::default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrossingOutcome {
    Reached { time: f64, index: usize },
    NotReached,
    Failed(FermentError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepEntry {
    pub parameter: f64,
    pub outcome: CrossingOutcome,
}

/// Per-value outcomes in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepResult {
    pub entries: Vec<SweepEntry>,
}

impl SweepResult {
    pub fn is_complete(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| matches!(entry.outcome, CrossingOutcome::Reached { .. }))
    }

    /// `(parameter, crossing time)` for every value that reached the threshold.
    pub fn reached(&self) -> Vec<(f64, f64)> {
        self.entries
            .iter()
            .filter_map(|entry| match entry.outcome {
                CrossingOutcome::Reached { time, .. } => Some((entry.parameter, time)),
                _ => None,
            })
            .collect()
    }

    pub fn not_reached(&self) -> Vec<f64> {
        self.entries
            .iter()
            .filter(|entry| entry.outcome == CrossingOutcome::NotReached)
            .map(|entry| entry.parameter)
            .collect()
    }

    pub fn failed(&self) -> Vec<(f64, &FermentError)> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.outcome {
                CrossingOutcome::Failed(error) => Some((entry.parameter, error)),
                _ => None,
            })
            .collect()
    }

    /// Values without a crossing, whether they failed or ran out of time.
    pub fn missing(&self) -> Vec<f64> {
        self.entries
            .iter()
            .filter(|entry| !matches!(entry.outcome, CrossingOutcome::Reached { .. }))
            .map(|entry| entry.parameter)
            .collect()
    }

    /// Crossing times of a complete sweep.
    pub fn crossing_times(&self) -> Result<Vec<(f64, f64)>> {
        if self.is_complete() {
            Ok(self.reached())
        } else {
            Err(FermentError::ThresholdNotReached {
                values: self.missing(),
            })
        }
    }
}

/// First sample of `trajectory` satisfying `predicate`, as `(time, index)`.
pub fn first_crossing<P>(trajectory: &Trajectory, mut predicate: P) -> Option<(f64, usize)>
where
    P: FnMut(&[f64]) -> bool,
{
    trajectory
        .iter()
        .enumerate()
        .find(|(_, (_, state))| predicate(*state))
        .map(|(index, (time, _))| (time, index))
}

/// Integrates one model and classifies its trajectory.
pub fn evaluate<S, P>(
    system: &S,
    y0: &[f64],
    request: &SweepRequest,
    predicate: P,
) -> CrossingOutcome
where
    S: DynamicalSystem<f64> + ?Sized,
    P: FnMut(&[f64]) -> bool,
{
    let trajectory = match integrate(
        system,
        y0,
        request.t_span,
        request.eval_times.as_deref(),
        &request.settings,
    ) {
        Ok(trajectory) => trajectory,
        Err(error) => return CrossingOutcome::Failed(error),
    };
    match first_crossing(&trajectory, predicate) {
        Some((time, index)) => CrossingOutcome::Reached { time, index },
        None => CrossingOutcome::NotReached,
    }
}

/// Runs `build(value)` for every value and records when `predicate` first holds.
///
/// A construction error aborts the sweep; an integration error is recorded for that
/// value only.
pub fn sweep_threshold<M, B, P>(
    param_values: &[f64],
    mut build: B,
    y0: &[f64],
    request: &SweepRequest,
    mut predicate: P,
) -> Result<SweepResult>
where
    M: DynamicalSystem<f64>,
    B: FnMut(f64) -> Result<M>,
    P: FnMut(&[f64]) -> bool,
{
    let mut result = SweepResult {
        entries: Vec::with_capacity(param_values.len()),
    };

    for &parameter in param_values {
        let model = build(parameter)?;
        let outcome = evaluate(&model, y0, request, &mut predicate);
        log_outcome(parameter, &outcome);
        result.entries.push(SweepEntry { parameter, outcome });
    }

    if result.is_complete() {
        info!("Sweep of {} values reached the threshold.", result.entries.len());
    } else {
        info!(
            "Sweep finished incomplete: {} of {} values without a crossing.",
            result.missing().len(),
            result.entries.len()
        );
    }
    Ok(result)
}

/// Logs values that ended without a crossing.
pub fn log_outcome(parameter: f64, outcome: &CrossingOutcome) {
    match outcome {
        CrossingOutcome::Reached { .. } => {}
        CrossingOutcome::NotReached => {
            warn!("Threshold not reached for parameter value {parameter:e}.")
        }
        CrossingOutcome::Failed(error) => {
            warn!("Integration failed for parameter value {parameter:e}: {error}")
        }
    }
}

/// Mutation rates `start, start + step, ...` strictly below `stop`.
pub fn mutation_rate_grid(start: f64, stop: f64, step: f64) -> Result<Vec<f64>> {
    if start < 0.0 {
        return Err(FermentError::invalid("Mutation rates must be non-negative."));
    }
    sample_grid(start, stop, step)
}

#[cfg(test)]
mod tests {
    use super::{first_crossing, mutation_rate_grid, sweep_threshold, CrossingOutcome, SweepRequest};
    use crate::error::FermentError;
    use crate::integrator::Trajectory;
    use crate::kinetics::{mutant_dominates, CompetitionModel, KineticModel, KineticParams};
    use crate::traits::FnSystem;

    fn trajectory(values: &[f64]) -> Trajectory {
        Trajectory {
            t: (0..values.len()).map(|i| i as f64 * 0.5).collect(),
            y: values.iter().map(|&v| vec![v]).collect(),
            ..Trajectory::default()
        }
    }

    #[test]
    fn first_crossing_ignores_later_crossings() {
        let samples = trajectory(&[0.0, 1.0, 2.0, 0.5, 3.0, 0.0, 4.0]);
        assert_eq!(first_crossing(&samples, |y| y[0] > 1.5), Some((1.0, 2)));
        assert_eq!(first_crossing(&samples, |y| y[0] > 10.0), None);
    }

    #[test]
    fn alternating_predicate_reports_first_sample() {
        // Transient dominance still counts as the crossing.
        let samples = trajectory(&[0.0, 2.0, 0.0, 2.0, 2.0, 2.0]);
        assert_eq!(first_crossing(&samples, |y| y[0] > 1.0), Some((0.5, 1)));
    }

    #[test]
    fn higher_mutation_rates_reach_dominance_sooner() {
        let params = KineticParams::competition();
        let y0 = CompetitionModel::new(&params).expect("valid").initial_state();
        let request = SweepRequest::sampled(400.0, 0.01).expect("request");
        // 21 rates spaced logarithmically from 1e-6 to 1e-4 per hour.
        let rates: Vec<f64> = (0..=20).map(|i| 10f64.powf(-6.0 + i as f64 * 0.1)).collect();

        let result = sweep_threshold(
            &rates,
            |rate| CompetitionModel::with_mutation_rate(&params, rate),
            &y0,
            &request,
            mutant_dominates,
        )
        .expect("sweep");

        assert!(result.is_complete());
        let times = result.crossing_times().expect("complete sweep");
        assert_eq!(times.len(), rates.len());
        assert!(times.windows(2).all(|w| w[1].1 <= w[0].1), "{times:?}");
        assert!((times[0].1 - 358.6).abs() < 1.0, "{times:?}");
        assert!((times[20].1 - 193.5).abs() < 1.0, "{times:?}");
    }

    #[test]
    fn short_horizon_reports_incomplete_sweep() {
        let params = KineticParams::competition();
        let y0 = CompetitionModel::new(&params).expect("valid").initial_state();
        let request = SweepRequest::sampled(200.0, 0.1).expect("request");

        let result = sweep_threshold(
            &[3e-6, 3e-5, 3e-4],
            |rate| CompetitionModel::with_mutation_rate(&params, rate),
            &y0,
            &request,
            mutant_dominates,
        )
        .expect("sweep");

        assert!(!result.is_complete());
        assert_eq!(result.not_reached(), vec![3e-6, 3e-5]);
        assert_eq!(result.reached().len(), 1);
        match result.crossing_times() {
            Err(FermentError::ThresholdNotReached { values }) => {
                assert_eq!(values, vec![3e-6, 3e-5])
            }
            other => panic!("expected ThresholdNotReached, got {other:?}"),
        }
    }

    #[test]
    fn integration_failure_is_recorded_and_sweep_continues() {
        // dy/dt = a * y^2 blows up at t = 1 for a = 1 and stays finite for a = 0.1.
        let request = SweepRequest::sampled(2.0, 0.1).expect("request");
        let result = sweep_threshold(
            &[1.0, 0.1],
            |a| {
                Ok(FnSystem::new(1, move |_t, y: &[f64], out: &mut [f64]| {
                    out[0] = a * y[0] * y[0]
                }))
            },
            &[1.0],
            &request,
            |y| y[0] > 1.1,
        )
        .expect("sweep");

        assert_eq!(result.entries.len(), 2);
        assert!(matches!(
            result.entries[0].outcome,
            CrossingOutcome::Failed(FermentError::IntegrationFailure { .. })
        ));
        assert!(matches!(
            result.entries[1].outcome,
            CrossingOutcome::Reached { .. }
        ));
        assert_eq!(result.failed().len(), 1);
        assert_eq!(result.missing(), vec![1.0]);
    }

    #[test]
    fn construction_error_aborts_sweep() {
        let params = KineticParams::competition();
        let request = SweepRequest::sampled(10.0, 1.0).expect("request");
        let result = sweep_threshold(
            &[1e-5, -1.0],
            |rate| CompetitionModel::with_mutation_rate(&params, rate),
            &[0.0, 0.1, 15.0, 0.0],
            &request,
            mutant_dominates,
        );
        assert!(matches!(result, Err(FermentError::InvalidParameters(_))));
    }

    #[test]
    fn mutation_rate_grid_matches_sweep_range() {
        let grid = mutation_rate_grid(0.0, 1e-3, 2.5e-4).expect("grid");
        assert_eq!(grid.len(), 4);
        assert!(mutation_rate_grid(-1.0, 1.0, 0.1).is_err());
    }
}
