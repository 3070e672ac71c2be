use crate::error::{FermentError, Result};
use crate::traits::DynamicalSystem;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    pub tolerance: f64,
    /// Relative perturbation of the central-difference Jacobian.
    pub jacobian_step: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            damping: 1.0,
            tolerance: 1e-9,
            jacobian_step: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquilibriumResult {
    pub state: Vec<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
    /// Row-major Jacobian at `state`.
    pub jacobian: Vec<f64>,
    pub eigenvalues: Vec<Complex<f64>>,
}

impl EquilibriumResult {
    /// Linear stability: every eigenvalue has a negative real part.
    pub fn is_stable(&self) -> bool {
        self.eigenvalues.iter().all(|lambda| lambda.re < 0.0)
    }
}

/// Refines `initial_guess` to a root of the vector field by damped Newton iteration.
pub fn solve_equilibrium<S>(
    system: &S,
    initial_guess: &[f64],
    settings: NewtonSettings,
) -> Result<EquilibriumResult>
where
    S: DynamicalSystem<f64> + ?Sized,
{
    let dim = system.dimension();
    if dim == 0 {
        return Err(FermentError::invalid("System has zero dimension."));
    }
    if initial_guess.len() != dim {
        return Err(FermentError::invalid(format!(
            "Initial guess dimension mismatch. Expected {}, got {}.",
            dim,
            initial_guess.len()
        )));
    }
    if settings.max_steps == 0 {
        return Err(FermentError::invalid("max_steps must be greater than zero."));
    }
    if settings.damping <= 0.0 {
        return Err(FermentError::invalid("damping must be positive."));
    }
    if settings.tolerance <= 0.0 {
        return Err(FermentError::invalid("tolerance must be positive."));
    }
    if settings.jacobian_step <= 0.0 {
        return Err(FermentError::invalid("jacobian_step must be positive."));
    }

    let mut state = initial_guess.to_vec();
    let mut residual = vec![0.0; dim];
    system.apply(0.0, &state, &mut residual);
    let mut residual_norm = l2_norm(&residual);
    let mut iterations = 0usize;

    loop {
        if residual_norm <= settings.tolerance {
            break;
        }
        if iterations >= settings.max_steps || !residual_norm.is_finite() {
            return Err(FermentError::EquilibriumNotConverged {
                iterations,
                residual_norm,
            });
        }

        let jacobian = compute_jacobian(system, &state, settings.jacobian_step);
        let delta = solve_linear_system(dim, &jacobian, &residual)?;
        for i in 0..dim {
            state[i] -= settings.damping * delta[i];
        }

        iterations += 1;
        system.apply(0.0, &state, &mut residual);
        residual_norm = l2_norm(&residual);
    }

    let mut result = analyze_point(system, &state, settings.jacobian_step)?;
    result.residual_norm = residual_norm;
    result.iterations = iterations;
    Ok(result)
}

/// Jacobian and eigenvalues at `state` without any refinement.
pub fn analyze_point<S>(system: &S, state: &[f64], jacobian_step: f64) -> Result<EquilibriumResult>
where
    S: DynamicalSystem<f64> + ?Sized,
{
    let dim = system.dimension();
    if state.len() != dim {
        return Err(FermentError::invalid(format!(
            "State dimension mismatch. Expected {}, got {}.",
            dim,
            state.len()
        )));
    }
    let mut residual = vec![0.0; dim];
    system.apply(0.0, state, &mut residual);
    let jacobian = compute_jacobian(system, state, jacobian_step);
    let eigenvalues = DMatrix::from_row_slice(dim, dim, &jacobian)
        .complex_eigenvalues()
        .iter()
        .copied()
        .collect();

    Ok(EquilibriumResult {
        state: state.to_vec(),
        residual_norm: l2_norm(&residual),
        iterations: 0,
        jacobian,
        eigenvalues,
    })
}

fn compute_jacobian<S>(system: &S, state: &[f64], relative_step: f64) -> Vec<f64>
where
    S: DynamicalSystem<f64> + ?Sized,
{
    let dim = state.len();
    let mut jacobian = vec![0.0; dim * dim];
    let mut probe = state.to_vec();
    let mut forward = vec![0.0; dim];
    let mut backward = vec![0.0; dim];

    for j in 0..dim {
        let h = relative_step * state[j].abs().max(1.0);
        probe[j] = state[j] + h;
        system.apply(0.0, &probe, &mut forward);
        probe[j] = state[j] - h;
        system.apply(0.0, &probe, &mut backward);
        probe[j] = state[j];
        for i in 0..dim {
            jacobian[i * dim + j] = (forward[i] - backward[i]) / (2.0 * h);
        }
    }

    jacobian
}

fn solve_linear_system(dim: usize, jacobian: &[f64], residual: &[f64]) -> Result<Vec<f64>> {
    let j_matrix = DMatrix::from_row_slice(dim, dim, jacobian);
    let rhs = DVector::from_column_slice(residual);
    j_matrix
        .lu()
        .solve(&rhs)
        .map(|v| v.iter().cloned().collect())
        .ok_or(FermentError::SingularJacobian)
}

fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::{analyze_point, solve_equilibrium, NewtonSettings};
    use crate::error::FermentError;
    use crate::kinetics::{ChemostatModel, KineticParams};
    use crate::traits::FnSystem;

    fn chemostat(dilution: f64) -> (KineticParams, ChemostatModel) {
        let params = KineticParams {
            dilution,
            ..KineticParams::chemostat()
        };
        let model = ChemostatModel::new(&params).expect("valid parameters");
        (params, model)
    }

    #[test]
    fn newton_recovers_closed_form_steady_state() {
        let (_, model) = chemostat(0.14);
        let expected = model.steady_state();
        let result = solve_equilibrium(&model, &[1.5, 2.5, 3.0], NewtonSettings::default())
            .expect("newton should converge");
        for (found, exact) in result.state.iter().zip(expected.state()) {
            assert!((found - exact).abs() < 1e-7, "{found} vs {exact}");
        }
        assert!(result.iterations > 0);
        assert!(result.is_stable());
    }

    #[test]
    fn washout_is_unstable_while_biomass_can_grow() {
        let (params, model) = chemostat(0.14);
        let result = analyze_point(&model, &[0.0, params.sf, 0.0], 1e-6).expect("valid state");
        assert!(result.residual_norm < 1e-12);
        assert!(!result.is_stable());
        let growth_mode = result
            .eigenvalues
            .iter()
            .map(|l| l.re)
            .fold(f64::NEG_INFINITY, f64::max);
        let expected = 0.3 * params.sf / (3.0 + params.sf) - 0.14;
        assert!((growth_mode - expected).abs() < 1e-6);
    }

    #[test]
    fn washout_is_stable_above_critical_dilution() {
        let (params, model) = chemostat(0.26);
        let result = analyze_point(&model, &[0.0, params.sf, 0.0], 1e-6).expect("valid state");
        assert!(result.is_stable());
    }

    #[test]
    fn rejects_invalid_inputs() {
        let (_, model) = chemostat(0.14);
        assert!(matches!(
            solve_equilibrium(&model, &[1.0], NewtonSettings::default()),
            Err(FermentError::InvalidParameters(_))
        ));
        let settings = NewtonSettings {
            damping: 0.0,
            ..NewtonSettings::default()
        };
        assert!(solve_equilibrium(&model, &[1.0, 1.0, 1.0], settings).is_err());
    }

    #[test]
    fn reports_non_convergence_and_singularity() {
        let cubic = FnSystem::new(1, |_t, x: &[f64], out: &mut [f64]| out[0] = x[0].powi(3) - 8.0);
        let settings = NewtonSettings {
            max_steps: 1,
            ..NewtonSettings::default()
        };
        assert!(matches!(
            solve_equilibrium(&cubic, &[10.0], settings),
            Err(FermentError::EquilibriumNotConverged { iterations: 1, .. })
        ));

        let flat = FnSystem::new(1, |_t, _x: &[f64], out: &mut [f64]| out[0] = 1.0);
        assert!(matches!(
            solve_equilibrium(&flat, &[0.0], NewtonSettings::default()),
            Err(FermentError::SingularJacobian)
        ));
    }
}
