use super::{require_non_negative, require_positive, Growth, KineticModel, KineticParams, Yields};
use crate::error::Result;
use crate::traits::DynamicalSystem;

pub const MUTANT: usize = 0;
pub const WILD_TYPE: usize = 1;
pub const SUBSTRATE: usize = 2;
pub const PRODUCT: usize = 3;

/// Converts a mutation probability per division interval into a rate per hour.
pub fn mutation_rate_per_hour(rate_per_interval: f64, interval_hours: f64) -> f64 {
    rate_per_interval / interval_hours
}

/// Chemostat holding a wild-type population `X` and a faster growing mutant `M`
/// ("cheater cells") on one substrate pool. State `(M, X, S, P)`.
///
/// Wild-type cells turn into mutants at a constant per-capita rate; only the
/// wild type forms product. Cell concentration stands in for cell count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompetitionModel {
    growth: Growth,
    yields: Yields,
    dilution: f64,
    sf: f64,
    mutation_rate: f64,
    mutant_fitness: f64,
    x0: f64,
    s0: f64,
}

impl CompetitionModel {
    pub fn new(params: &KineticParams) -> Result<Self> {
        require_positive("D", params.dilution)?;
        require_non_negative("Sf", params.sf)?;
        require_non_negative("X0", params.x0)?;
        require_non_negative("S0", params.s0)?;
        require_non_negative("mutation_rate", params.mutation_rate)?;
        require_positive("mutant_fitness", params.mutant_fitness)?;
        Ok(Self {
            growth: Growth::from_params(params)?,
            yields: Yields::from_params(params)?,
            dilution: params.dilution,
            sf: params.sf,
            mutation_rate: params.mutation_rate,
            mutant_fitness: params.mutant_fitness,
            x0: params.x0,
            s0: params.s0,
        })
    }

    /// Same culture with the mutation rate replaced, for parameter sweeps.
    pub fn with_mutation_rate(params: &KineticParams, mutation_rate: f64) -> Result<Self> {
        Self::new(&KineticParams {
            mutation_rate,
            ..*params
        })
    }

    pub fn mutation_rate(&self) -> f64 {
        self.mutation_rate
    }
}

/// Threshold used by the mutation sweep: mutants outnumber the wild type.
pub fn mutant_dominates(state: &[f64]) -> bool {
    state[MUTANT] > state[WILD_TYPE]
}

impl DynamicalSystem<f64> for CompetitionModel {
    fn dimension(&self) -> usize {
        4
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let mutant = x[MUTANT];
        let wild_type = x[WILD_TYPE];
        let substrate = x[SUBSTRATE];
        let product = x[PRODUCT];

        let mu = self.growth.mu(substrate);
        let wild_growth = mu * wild_type;
        let mutant_growth = self.mutant_fitness * mu * mutant;
        let mutation = self.mutation_rate * wild_type;
        let production = self.growth.qp(substrate) * wild_type;

        out[MUTANT] = mutant_growth + mutation - self.dilution * mutant;
        out[WILD_TYPE] = wild_growth - self.dilution * wild_type - mutation;
        out[SUBSTRATE] = -(wild_growth + mutant_growth) / self.yields.yxs
            + self.dilution * (self.sf - substrate)
            - production / self.yields.yps;
        out[PRODUCT] = production - self.dilution * product;
    }
}

impl KineticModel for CompetitionModel {
    fn name(&self) -> &'static str {
        "competition"
    }

    fn series_names(&self) -> &'static [&'static str] {
        &["Mutated cells", "Normal cells", "Substrate", "Product"]
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![0.0, self.x0, self.s0, 0.0]
    }
}
