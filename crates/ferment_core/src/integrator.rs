//! Adaptive step driver with dense output.
//!
//! The driver owns step-size control; the embedded pairs in [`crate::solvers`] only
//! propagate a single step and estimate its local error.

use crate::error::{FailureKind, FermentError, Result};
use crate::solvers::{Dopri5, Tsit5};
use crate::traits::{DynamicalSystem, EmbeddedStepper};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    #[default]
    Dopri5,
    Tsit5,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    pub method: Method,
    pub rtol: f64,
    pub atol: f64,
    /// First trial step; chosen from the local derivative scale when absent.
    pub initial_step: Option<f64>,
    pub min_step: f64,
    pub max_step: Option<f64>,
    /// Limit on step attempts, accepted and rejected together.
    pub max_steps: usize,
    pub safety: f64,
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            method: Method::Dopri5,
            rtol: 1e-6,
            atol: 1e-9,
            initial_step: None,
            min_step: 0.0,
            max_step: None,
            max_steps: 100_000,
            safety: 0.9,
            min_factor: 0.2,
            max_factor: 10.0,
        }
    }
}

impl IntegratorSettings {
    pub fn with_tolerances(rtol: f64, atol: f64) -> Self {
        Self {
            rtol,
            atol,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rtol >= 0.0 && self.rtol.is_finite()) {
            return Err(FermentError::invalid("rtol must be finite and non-negative."));
        }
        if !(self.atol > 0.0 && self.atol.is_finite()) {
            return Err(FermentError::invalid("atol must be finite and positive."));
        }
        if let Some(h) = self.initial_step {
            if !(h > 0.0 && h.is_finite()) {
                return Err(FermentError::invalid("initial_step must be positive."));
            }
        }
        if !(self.min_step >= 0.0 && self.min_step.is_finite()) {
            return Err(FermentError::invalid("min_step must be non-negative."));
        }
        if let Some(h) = self.max_step {
            if !(h > 0.0) || h < self.min_step {
                return Err(FermentError::invalid(
                    "max_step must be positive and at least min_step.",
                ));
            }
        }
        if self.max_steps == 0 {
            return Err(FermentError::invalid("max_steps must be greater than zero."));
        }
        if !(self.safety > 0.0 && self.safety <= 1.0) {
            return Err(FermentError::invalid("safety must lie in (0, 1]."));
        }
        if !(self.min_factor > 0.0 && self.min_factor <= 1.0) {
            return Err(FermentError::invalid("min_factor must lie in (0, 1]."));
        }
        if !(self.max_factor >= 1.0 && self.max_factor.is_finite()) {
            return Err(FermentError::invalid("max_factor must be at least 1."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub rhs_evaluations: usize,
    pub accepted_steps: usize,
    pub rejected_steps: usize,
}

/// Samples of one integration run, strictly increasing in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trajectory {
    pub t: Vec<f64>,
    pub y: Vec<Vec<f64>>,
    pub stats: IntegrationStats,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &[f64])> + '_ {
        self.t.iter().copied().zip(self.y.iter().map(Vec::as_slice))
    }

    pub fn last(&self) -> Option<(f64, &[f64])> {
        self.iter().last()
    }

    /// Time series of one state component.
    pub fn component(&self, index: usize) -> Vec<f64> {
        self.y.iter().map(|state| state[index]).collect()
    }

    fn push(&mut self, t: f64, state: &[f64]) {
        self.t.push(t);
        self.y.push(state.to_vec());
    }
}

/// Evenly spaced sample times `start, start + step, ...` strictly below `stop`.
pub fn sample_grid(start: f64, stop: f64, step: f64) -> Result<Vec<f64>> {
    if !(step > 0.0 && step.is_finite()) {
        return Err(FermentError::invalid("Sample step must be positive."));
    }
    if !start.is_finite() || !stop.is_finite() {
        return Err(FermentError::invalid("Sample range must be finite."));
    }
    if stop <= start {
        return Ok(Vec::new());
    }
    let count = ((stop - start) / step).ceil() as usize;
    Ok((0..count)
        .map(|i| start + i as f64 * step)
        .filter(|&t| t < stop)
        .collect())
}

/// Integrates `system` from `y0` across `t_span`.
///
/// With `eval_times` the trajectory holds exactly those samples, produced by dense
/// output; without, it holds `t_span.0` followed by every accepted step end point.
pub fn integrate<S>(
    system: &S,
    y0: &[f64],
    t_span: (f64, f64),
    eval_times: Option<&[f64]>,
    settings: &IntegratorSettings,
) -> Result<Trajectory>
where
    S: DynamicalSystem<f64> + ?Sized,
{
    settings.validate()?;
    let dim = system.dimension();
    if dim == 0 {
        return Err(FermentError::invalid("System has zero dimension."));
    }
    if y0.len() != dim {
        return Err(FermentError::invalid(format!(
            "Initial state dimension mismatch. Expected {}, got {}.",
            dim,
            y0.len()
        )));
    }
    if y0.iter().any(|v| !v.is_finite()) {
        return Err(FermentError::invalid("Initial state must be finite."));
    }
    let (t_start, t_end) = t_span;
    if !t_start.is_finite() || !t_end.is_finite() {
        return Err(FermentError::invalid("Time span must be finite."));
    }
    if t_start > t_end {
        return Err(FermentError::invalid(format!(
            "Time span start ({t_start}) must not exceed its end ({t_end})."
        )));
    }
    if let Some(times) = eval_times {
        validate_eval_times(times, t_start, t_end)?;
    }

    match settings.method {
        Method::Dopri5 => drive(&system, Dopri5::new(dim), y0, t_span, eval_times, settings),
        Method::Tsit5 => drive(&system, Tsit5::new(dim), y0, t_span, eval_times, settings),
    }
}

fn validate_eval_times(times: &[f64], t_start: f64, t_end: f64) -> Result<()> {
    for (idx, &t) in times.iter().enumerate() {
        if !t.is_finite() || t < t_start || t > t_end {
            return Err(FermentError::invalid(format!(
                "Evaluation time {t} lies outside the span [{t_start}, {t_end}]."
            )));
        }
        if idx > 0 && t <= times[idx - 1] {
            return Err(FermentError::invalid(
                "Evaluation times must be strictly increasing.",
            ));
        }
    }
    Ok(())
}

fn drive<S, M>(
    system: &S,
    mut stepper: M,
    y0: &[f64],
    t_span: (f64, f64),
    eval_times: Option<&[f64]>,
    settings: &IntegratorSettings,
) -> Result<Trajectory>
where
    S: DynamicalSystem<f64>,
    M: EmbeddedStepper<f64>,
{
    let (t_start, t_end) = t_span;
    let dim = y0.len();
    let mut trajectory = Trajectory::default();
    let mut next_sample = 0usize;

    match eval_times {
        Some(times) => {
            if times.first() == Some(&t_start) {
                trajectory.push(t_start, y0);
                next_sample = 1;
            }
        }
        None => trajectory.push(t_start, y0),
    }

    if t_start == t_end {
        return Ok(trajectory);
    }

    let mut t = t_start;
    let mut state = y0.to_vec();
    let mut derivative = vec![0.0; dim];
    system.apply(t, &state, &mut derivative);
    trajectory.stats.rhs_evaluations += 1;
    if derivative.iter().any(|v| !v.is_finite()) {
        return Err(failure(t, FailureKind::NonFiniteDerivative));
    }

    let exponent = 1.0 / stepper.order() as f64;
    let max_step = settings.max_step.unwrap_or(f64::INFINITY);
    let mut h = match settings.initial_step {
        Some(h) => h,
        None => initial_step(
            system,
            t,
            &state,
            &derivative,
            t_end - t,
            stepper.order(),
            settings,
            &mut trajectory.stats,
        ),
    }
    .min(max_step);

    let mut next = vec![0.0; dim];
    let mut error = vec![0.0; dim];
    let mut dense = vec![0.0; dim];
    let mut attempts = 0usize;
    let mut rejected_last = false;

    while t < t_end {
        let min_step = settings.min_step.max(16.0 * f64::EPSILON * t.abs());
        if !(h >= min_step) || h == 0.0 {
            return Err(failure(t, FailureKind::StepSizeUnderflow { step: h }));
        }

        let remaining = t_end - t;
        let last = h >= remaining || remaining - h <= min_step;
        if last {
            h = remaining;
        }

        attempts += 1;
        if attempts > settings.max_steps {
            return Err(failure(
                t,
                FailureKind::MaxStepsExceeded {
                    max_steps: settings.max_steps,
                },
            ));
        }

        stepper.attempt(system, t, &state, &derivative, h, &mut next, &mut error);
        trajectory.stats.rhs_evaluations += 6;

        let err_norm = error_norm(&error, &state, &next, settings);
        if !err_norm.is_finite() || next.iter().any(|v| !v.is_finite()) {
            return Err(failure(t, FailureKind::NonFiniteDerivative));
        }

        if err_norm <= 1.0 {
            let t_new = if last { t_end } else { t + h };

            match eval_times {
                Some(times) => {
                    while next_sample < times.len() && times[next_sample] <= t_new {
                        let sample_t = times[next_sample];
                        if sample_t == t_new {
                            trajectory.push(sample_t, &next);
                        } else {
                            let theta = (sample_t - t) / h;
                            stepper.interpolate(theta, &state, &next, h, &mut dense);
                            trajectory.push(sample_t, &dense);
                        }
                        next_sample += 1;
                    }
                }
                None => trajectory.push(t_new, &next),
            }

            t = t_new;
            state.copy_from_slice(&next);
            derivative.copy_from_slice(stepper.end_derivative());
            trajectory.stats.accepted_steps += 1;

            let mut factor = if err_norm == 0.0 {
                settings.max_factor
            } else {
                (settings.safety * err_norm.powf(-exponent))
                    .clamp(settings.min_factor, settings.max_factor)
            };
            if rejected_last {
                factor = factor.min(1.0);
            }
            rejected_last = false;
            h = (h * factor).min(max_step);
        } else {
            trajectory.stats.rejected_steps += 1;
            let factor = (settings.safety * err_norm.powf(-exponent)).max(settings.min_factor);
            h *= factor.min(1.0);
            rejected_last = true;
        }
    }

    debug!(
        "Integrated [{}, {}]: {} accepted, {} rejected, {} rhs evaluations.",
        t_start,
        t_end,
        trajectory.stats.accepted_steps,
        trajectory.stats.rejected_steps,
        trajectory.stats.rhs_evaluations
    );

    Ok(trajectory)
}

fn failure(t: f64, kind: FailureKind) -> FermentError {
    FermentError::IntegrationFailure { t, kind }
}

/// Scaled RMS norm of the local error estimate.
fn error_norm(error: &[f64], state: &[f64], next: &[f64], settings: &IntegratorSettings) -> f64 {
    let sum: f64 = error
        .iter()
        .zip(state.iter().zip(next))
        .map(|(e, (y, y_new))| {
            let scale = settings.atol + settings.rtol * y.abs().max(y_new.abs());
            (e / scale).powi(2)
        })
        .sum();
    (sum / error.len() as f64).sqrt()
}

fn rms_scaled(values: &[f64], scale: &[f64]) -> f64 {
    let sum: f64 = values
        .iter()
        .zip(scale)
        .map(|(v, s)| (v / s).powi(2))
        .sum();
    (sum / values.len() as f64).sqrt()
}

/// Starting step from the magnitudes of the state and its first two derivatives.
#[allow(clippy::too_many_arguments)]
fn initial_step<S: DynamicalSystem<f64>>(
    system: &S,
    t0: f64,
    y0: &[f64],
    f0: &[f64],
    span: f64,
    order: usize,
    settings: &IntegratorSettings,
    stats: &mut IntegrationStats,
) -> f64 {
    let scale: Vec<f64> = y0
        .iter()
        .map(|y| settings.atol + settings.rtol * y.abs())
        .collect();
    let d0 = rms_scaled(y0, &scale);
    let d1 = rms_scaled(f0, &scale);
    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    }
    .min(span);

    let y1: Vec<f64> = y0.iter().zip(f0).map(|(y, f)| y + h0 * f).collect();
    let mut f1 = vec![0.0; y0.len()];
    system.apply(t0 + h0, &y1, &mut f1);
    stats.rhs_evaluations += 1;

    let diff: Vec<f64> = f1.iter().zip(f0).map(|(a, b)| a - b).collect();
    let d2 = rms_scaled(&diff, &scale) / h0;
    let dmax = d1.max(d2);
    let h1 = if dmax <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / dmax).powf(1.0 / (order as f64 + 1.0))
    };

    (100.0 * h0).min(h1).min(span)
}
