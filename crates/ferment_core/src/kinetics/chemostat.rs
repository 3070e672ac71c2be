use super::{require_non_negative, require_positive, Growth, KineticModel, KineticParams, Yields};
use crate::error::{FermentError, Result};
use crate::traits::DynamicalSystem;
use serde::{Deserialize, Serialize};

pub const BIOMASS: usize = 0;
pub const SUBSTRATE: usize = 1;
pub const PRODUCT: usize = 2;

/// Constant-volume continuous culture with dilution rate `D`. State `(X, S, P)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChemostatModel {
    growth: Growth,
    yields: Yields,
    dilution: f64,
    sf: f64,
    x0: f64,
    s0: f64,
}

impl ChemostatModel {
    pub fn new(params: &KineticParams) -> Result<Self> {
        require_positive("D", params.dilution)?;
        require_non_negative("Sf", params.sf)?;
        require_non_negative("X0", params.x0)?;
        require_non_negative("S0", params.s0)?;
        Ok(Self {
            growth: Growth::from_params(params)?,
            yields: Yields::from_params(params)?,
            dilution: params.dilution,
            sf: params.sf,
            x0: params.x0,
            s0: params.s0,
        })
    }

    pub fn dilution(&self) -> f64 {
        self.dilution
    }

    /// Closed-form steady state at this model's dilution rate.
    pub fn steady_state(&self) -> SteadyState {
        solve_steady_state(&self.growth, &self.yields, self.sf, self.dilution)
    }
}

impl DynamicalSystem<f64> for ChemostatModel {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let biomass = x[BIOMASS];
        let substrate = x[SUBSTRATE];
        let product = x[PRODUCT];
        let growth = self.growth.mu(substrate) * biomass;
        let production = self.growth.qp(substrate) * biomass;

        out[BIOMASS] = growth - self.dilution * biomass;
        out[SUBSTRATE] = -growth / self.yields.yxs + self.dilution * (self.sf - substrate)
            - production / self.yields.yps;
        out[PRODUCT] = production - self.dilution * product;
    }
}

impl KineticModel for ChemostatModel {
    fn name(&self) -> &'static str {
        "chemostat"
    }

    fn series_names(&self) -> &'static [&'static str] {
        &[
            "Cell concentration",
            "Substrate concentration",
            "Product concentration",
        ]
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.x0, self.s0, 0.0]
    }
}

/// Operating point of a chemostat with all derivatives zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteadyState {
    pub dilution: f64,
    pub biomass: f64,
    pub substrate: f64,
    pub product: f64,
    /// Product output per reactor volume, `P * D`.
    pub space_time_yield: f64,
    pub washout: bool,
}

impl SteadyState {
    /// State vector in chemostat order `(X, S, P)`.
    pub fn state(&self) -> Vec<f64> {
        vec![self.biomass, self.substrate, self.product]
    }
}

/// Dilution rate above which no biomass can be sustained: `mu(Sf)`.
pub fn critical_dilution(params: &KineticParams) -> Result<f64> {
    let growth = Growth::from_params(params)?;
    require_non_negative("Sf", params.sf)?;
    Ok(growth.mu(params.sf))
}

/// Solves the chemostat balances algebraically for dilution rate `dilution`.
///
/// `dX/dt = 0` fixes `mu(S) = D`, so `S = D Ks / (mumax - D)`; the substrate
/// balance then gives `X = D (Sf - S) / (D / Yxs + qp(S) / Yps)` and the product
/// balance `P = qp(S) X / D`. For `D >= mumax`, or whenever that `S` would exceed
/// the feed concentration, the culture washes out: `X = 0`, `S = Sf`.
pub fn steady_state(params: &KineticParams, dilution: f64) -> Result<SteadyState> {
    require_positive("D", dilution)?;
    require_non_negative("Sf", params.sf)?;
    let growth = Growth::from_params(params)?;
    let yields = Yields::from_params(params)?;
    Ok(solve_steady_state(&growth, &yields, params.sf, dilution))
}

fn solve_steady_state(growth: &Growth, yields: &Yields, sf: f64, dilution: f64) -> SteadyState {
    let washout = SteadyState {
        dilution,
        biomass: 0.0,
        substrate: sf,
        product: 0.0,
        space_time_yield: 0.0,
        washout: true,
    };
    if dilution >= growth.mumax() {
        return washout;
    }

    let substrate = dilution * growth.ks() / (growth.mumax() - dilution);
    if substrate >= sf {
        return washout;
    }

    let specific_production = growth.qp(substrate);
    let biomass =
        dilution * (sf - substrate) / (dilution / yields.yxs + specific_production / yields.yps);
    let product = specific_production * biomass / dilution;

    SteadyState {
        dilution,
        biomass,
        substrate,
        product,
        space_time_yield: product * dilution,
        washout: false,
    }
}

/// Steady states across a range of dilution rates (the X-D diagram).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SteadyStateCurve {
    pub points: Vec<SteadyState>,
}

impl SteadyStateCurve {
    /// Point of highest space-time yield, if any point sustains biomass.
    pub fn max_productivity(&self) -> Option<&SteadyState> {
        self.points
            .iter()
            .filter(|point| !point.washout)
            .max_by(|a, b| a.space_time_yield.total_cmp(&b.space_time_yield))
    }
}

pub fn steady_state_curve(params: &KineticParams, dilutions: &[f64]) -> Result<SteadyStateCurve> {
    if dilutions.is_empty() {
        return Err(FermentError::invalid(
            "Steady-state curve requires at least one dilution rate.",
        ));
    }
    let points = dilutions
        .iter()
        .map(|&d| steady_state(params, d))
        .collect::<Result<Vec<_>>>()?;
    Ok(SteadyStateCurve { points })
}
