//! Labelled, serializable series for plotting front ends.

use crate::error::{FermentError, Result};
use crate::integrator::Trajectory;
use crate::kinetics::{KineticModel, SteadyState, SteadyStateCurve};
use crate::sweep::SweepResult;
use serde::{Deserialize, Serialize};

pub const DURATION_LABEL: &str = "Duration [h]";
pub const CONCENTRATION_LABEL: &str = "Concentration [g/L]";
pub const DILUTION_LABEL: &str = "Dilution rate [1/h]";
pub const SPACE_TIME_YIELD_LABEL: &str = "Space-time-yield [g/L*h]";
pub const MUTATION_RATE_LABEL: &str = "Mutation rate [1/h]";
pub const THRESHOLD_TIME_LABEL: &str = "Ferm. time until threshold reached [h]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
    /// Plotted against the report's secondary axis.
    #[serde(default)]
    pub secondary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryReport {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub secondary_label: Option<String>,
    pub t: Vec<f64>,
    pub series: Vec<Series>,
}

impl TrajectoryReport {
    pub fn from_trajectory<M>(model: &M, trajectory: &Trajectory) -> Result<Self>
    where
        M: KineticModel + ?Sized,
    {
        let names = model.series_names();
        if names.len() != model.dimension() {
            return Err(FermentError::invalid(format!(
                "Model {} names {} series for {} state components.",
                model.name(),
                names.len(),
                model.dimension()
            )));
        }
        if trajectory.y.iter().any(|state| state.len() != names.len()) {
            return Err(FermentError::invalid(
                "Trajectory does not match the model's state dimension.",
            ));
        }

        let secondary = model.secondary_axis();
        let series = names
            .iter()
            .enumerate()
            .map(|(index, name)| Series {
                name: (*name).to_string(),
                values: trajectory.component(index),
                secondary: secondary.map_or(false, |(axis_index, _)| axis_index == index),
            })
            .collect();

        Ok(Self {
            title: model.name().to_string(),
            x_label: DURATION_LABEL.to_string(),
            y_label: CONCENTRATION_LABEL.to_string(),
            secondary_label: secondary.map(|(_, label)| label.to_string()),
            t: trajectory.t.clone(),
            series,
        })
    }
}

/// X-D diagram: steady-state concentrations over the dilution rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteadyStateReport {
    pub x_label: String,
    pub y_label: String,
    pub secondary_label: String,
    pub dilution: Vec<f64>,
    pub series: Vec<Series>,
    pub optimum: Option<SteadyState>,
}

impl SteadyStateReport {
    pub fn from_curve(curve: &SteadyStateCurve) -> Self {
        let column = |pick: fn(&SteadyState) -> f64| -> Vec<f64> {
            curve.points.iter().map(pick).collect()
        };
        let series = vec![
            Series {
                name: "Substrate".to_string(),
                values: column(|p| p.substrate),
                secondary: false,
            },
            Series {
                name: "Cells".to_string(),
                values: column(|p| p.biomass),
                secondary: false,
            },
            Series {
                name: "Product".to_string(),
                values: column(|p| p.product),
                secondary: false,
            },
            Series {
                name: "STY".to_string(),
                values: column(|p| p.space_time_yield),
                secondary: true,
            },
        ];

        Self {
            x_label: DILUTION_LABEL.to_string(),
            y_label: CONCENTRATION_LABEL.to_string(),
            secondary_label: SPACE_TIME_YIELD_LABEL.to_string(),
            dilution: column(|p| p.dilution),
            series,
            optimum: curve.max_productivity().copied(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    Complete,
    Incomplete,
}

/// Time to threshold over the swept parameter.
///
/// `points` is filled only for a complete sweep, so a plot never shows a partial curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub x_label: String,
    pub y_label: String,
    pub status: SweepStatus,
    pub points: Vec<(f64, f64)>,
    pub reached: Vec<f64>,
    pub missing: Vec<f64>,
    pub message: Option<String>,
}

impl SweepReport {
    pub fn from_result(result: &SweepResult) -> Self {
        let reached = result.reached();
        let (status, points, message) = match result.crossing_times() {
            Ok(points) => (SweepStatus::Complete, points, None),
            Err(error) => (SweepStatus::Incomplete, Vec::new(), Some(error.to_string())),
        };
        Self {
            x_label: MUTATION_RATE_LABEL.to_string(),
            y_label: THRESHOLD_TIME_LABEL.to_string(),
            status,
            points,
            reached: reached.into_iter().map(|(parameter, _)| parameter).collect(),
            missing: result.missing(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SteadyStateReport, SweepReport, SweepStatus, TrajectoryReport};
    use crate::integrator::{integrate, sample_grid, IntegratorSettings};
    use crate::kinetics::{steady_state_curve, FedBatchModel, KineticModel, KineticParams};
    use crate::sweep::{CrossingOutcome, SweepEntry, SweepResult};

    #[test]
    fn fed_batch_report_puts_volume_on_secondary_axis() {
        let model = FedBatchModel::new(&KineticParams::fed_batch()).expect("valid");
        let times = sample_grid(0.0, 10.0, 0.5).expect("grid");
        let trajectory = integrate(
            &model,
            &model.initial_state(),
            (0.0, 10.0),
            Some(&times),
            &IntegratorSettings::default(),
        )
        .expect("integration");

        let report = TrajectoryReport::from_trajectory(&model, &trajectory).expect("report");
        assert_eq!(report.x_label, "Duration [h]");
        assert_eq!(report.y_label, "Concentration [g/L]");
        assert_eq!(report.secondary_label.as_deref(), Some("Volume [L]"));
        assert_eq!(report.series.len(), 4);
        assert_eq!(report.series.iter().filter(|s| s.secondary).count(), 1);
        assert!(report.series[3].secondary);
        assert_eq!(report.series[0].values.len(), times.len());

        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["series"][3]["name"], "Volume");
    }

    #[test]
    fn steady_state_report_tracks_optimum() {
        let dilutions: Vec<f64> = (1..40).map(|i| i as f64 * 0.01).collect();
        let curve = steady_state_curve(&KineticParams::chemostat(), &dilutions).expect("curve");
        let report = SteadyStateReport::from_curve(&curve);
        assert_eq!(report.x_label, "Dilution rate [1/h]");
        assert_eq!(report.secondary_label, "Space-time-yield [g/L*h]");
        assert_eq!(report.dilution, dilutions);
        let optimum = report.optimum.expect("some dilution sustains biomass");
        let sty = &report.series[3].values;
        assert!(sty.iter().all(|&v| v <= optimum.space_time_yield));
    }

    #[test]
    fn incomplete_sweep_has_no_points_and_an_advisory() {
        let result = SweepResult {
            entries: vec![
                SweepEntry {
                    parameter: 1e-5,
                    outcome: CrossingOutcome::Reached {
                        time: 120.0,
                        index: 12,
                    },
                },
                SweepEntry {
                    parameter: 1e-6,
                    outcome: CrossingOutcome::NotReached,
                },
            ],
        };
        let report = SweepReport::from_result(&result);
        assert_eq!(report.status, SweepStatus::Incomplete);
        assert!(report.points.is_empty());
        assert_eq!(report.reached, vec![1e-5]);
        assert_eq!(report.missing, vec![1e-6]);
        let message = report.message.expect("advisory");
        assert!(message.contains("Prolong the fermentation time"));
    }

    #[test]
    fn complete_sweep_lists_points() {
        let result = SweepResult {
            entries: vec![SweepEntry {
                parameter: 1e-4,
                outcome: CrossingOutcome::Reached {
                    time: 80.0,
                    index: 8,
                },
            }],
        };
        let report = SweepReport::from_result(&result);
        assert_eq!(report.status, SweepStatus::Complete);
        assert_eq!(report.points, vec![(1e-4, 80.0)]);
        assert!(report.message.is_none());
        assert_eq!(report.y_label, "Ferm. time until threshold reached [h]");
    }
}
