use super::{require_non_negative, require_positive, Growth, KineticModel, KineticParams, Yields};
use crate::error::Result;
use crate::traits::DynamicalSystem;

pub const BIOMASS: usize = 0;
pub const SUBSTRATE: usize = 1;
pub const PRODUCT: usize = 2;
pub const VOLUME: usize = 3;

/// Constant volumetric feed into a growing volume. State `(X, S, P, V)`.
///
/// The feed carries no feedback: `dV/dt = F` and the volume grows linearly. Every
/// concentration is diluted at the instantaneous rate `F / V`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FedBatchModel {
    growth: Growth,
    yields: Yields,
    sf: f64,
    feed: f64,
    x0: f64,
    s0: f64,
    v0: f64,
}

impl FedBatchModel {
    pub fn new(params: &KineticParams) -> Result<Self> {
        require_non_negative("X0", params.x0)?;
        require_non_negative("S0", params.s0)?;
        require_non_negative("Sf", params.sf)?;
        require_non_negative("F", params.feed)?;
        require_positive("V0", params.v0)?;
        Ok(Self {
            growth: Growth::from_params(params)?,
            yields: Yields::from_params(params)?,
            sf: params.sf,
            feed: params.feed,
            x0: params.x0,
            s0: params.s0,
            v0: params.v0,
        })
    }

    pub fn volume_at(&self, t: f64) -> f64 {
        self.v0 + self.feed * t
    }
}

impl DynamicalSystem<f64> for FedBatchModel {
    fn dimension(&self) -> usize {
        4
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let biomass = x[BIOMASS];
        let substrate = x[SUBSTRATE];
        let product = x[PRODUCT];
        let dilution = self.feed / x[VOLUME];
        let growth = self.growth.mu(substrate) * biomass;
        let production = self.growth.qp(substrate) * biomass;

        out[BIOMASS] = growth - dilution * biomass;
        out[SUBSTRATE] = -growth / self.yields.yxs + dilution * (self.sf - substrate)
            - production / self.yields.yps;
        out[PRODUCT] = production - dilution * product;
        out[VOLUME] = self.feed;
    }
}

impl KineticModel for FedBatchModel {
    fn name(&self) -> &'static str {
        "fed_batch"
    }

    fn series_names(&self) -> &'static [&'static str] {
        &[
            "Cell concentration",
            "Substrate concentration",
            "Product concentration",
            "Volume",
        ]
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.x0, self.s0, 0.0, self.v0]
    }

    fn secondary_axis(&self) -> Option<(usize, &'static str)> {
        Some((VOLUME, "Volume [L]"))
    }
}
