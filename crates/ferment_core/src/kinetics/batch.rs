use super::{require_non_negative, Growth, KineticModel, KineticParams, Yields};
use crate::error::Result;
use crate::traits::DynamicalSystem;

pub const BIOMASS: usize = 0;
pub const PRODUCT: usize = 1;
pub const SUBSTRATE: usize = 2;

/// Closed vessel: no feed, no removal. State `(X, P, S)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchModel {
    growth: Growth,
    yields: Yields,
    x0: f64,
    s0: f64,
}

impl BatchModel {
    pub fn new(params: &KineticParams) -> Result<Self> {
        require_non_negative("X0", params.x0)?;
        require_non_negative("S0", params.s0)?;
        Ok(Self {
            growth: Growth::from_params(params)?,
            yields: Yields::from_params(params)?,
            x0: params.x0,
            s0: params.s0,
        })
    }
}

impl DynamicalSystem<f64> for BatchModel {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let biomass = x[BIOMASS];
        let substrate = x[SUBSTRATE];
        let growth = self.growth.mu(substrate) * biomass;
        let production = self.growth.qp(substrate) * biomass;

        out[BIOMASS] = growth;
        out[PRODUCT] = production;
        out[SUBSTRATE] = -growth / self.yields.yxs - production / self.yields.yps;
    }
}

impl KineticModel for BatchModel {
    fn name(&self) -> &'static str {
        "batch"
    }

    fn series_names(&self) -> &'static [&'static str] {
        &[
            "Cell concentration",
            "Product concentration",
            "Substrate concentration",
        ]
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.x0, 0.0, self.s0]
    }
}
