//! Monod-type fermentation kinetics.
//!
//! Every model is an immutable right-hand side built once from a [`KineticParams`]
//! record; the constructors validate the constants they use and the resulting
//! structs are cheap to rebuild for each run of a sweep.

pub mod batch;
pub mod chemostat;
pub mod competition;
pub mod fed_batch;

pub use batch::BatchModel;
pub use chemostat::{
    critical_dilution, steady_state, steady_state_curve, ChemostatModel, SteadyState,
    SteadyStateCurve,
};
pub use competition::{mutant_dominates, mutation_rate_per_hour, CompetitionModel};
pub use fed_batch::FedBatchModel;

use crate::error::{FermentError, Result};
use crate::traits::DynamicalSystem;
use serde::{Deserialize, Serialize};

/// Saturating Monod rate `rate_max * s / (k + s)`.
pub fn monod(rate_max: f64, substrate: f64, k: f64) -> f64 {
    rate_max * substrate / (k + substrate)
}

/// Flat record of kinetic constants shared by all regimes.
///
/// Concentrations in g/L, rates in 1/h, yields in g/g, feed in L/h, volume in L.
/// Each regime reads only the constants it needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KineticParams {
    /// Substrate concentration at t = 0.
    #[serde(alias = "S0")]
    pub s0: f64,
    /// Inoculation biomass.
    #[serde(alias = "X0")]
    pub x0: f64,
    /// Monod constant of growth.
    #[serde(alias = "Ks")]
    pub ks: f64,
    /// Monod constant of product formation.
    #[serde(alias = "Kp")]
    pub kp: f64,
    pub mumax: f64,
    pub qpmax: f64,
    /// Biomass/substrate yield.
    #[serde(alias = "Yxs")]
    pub yxs: f64,
    /// Product/substrate yield.
    #[serde(alias = "Yps")]
    pub yps: f64,
    #[serde(alias = "D")]
    pub dilution: f64,
    /// Substrate concentration in the feed.
    #[serde(alias = "Sf")]
    pub sf: f64,
    /// Volumetric feed rate of a fed-batch.
    #[serde(alias = "F")]
    pub feed: f64,
    #[serde(alias = "V0")]
    pub v0: f64,
    /// Per-capita wild-type to mutant conversion rate [1/h].
    #[serde(alias = "mut_rate")]
    pub mutation_rate: f64,
    /// Growth-rate multiplier of the mutant.
    #[serde(alias = "mut_fitness")]
    pub mutant_fitness: f64,
}

impl Default for KineticParams {
    fn default() -> Self {
        Self::batch()
    }
}

impl KineticParams {
    /// Batch fermentation with product formation, no maintenance metabolism.
    pub fn batch() -> Self {
        Self {
            s0: 15.0,
            x0: 0.2,
            ks: 2.0,
            kp: 1.0,
            mumax: 0.3,
            qpmax: 0.4,
            yxs: 0.5,
            yps: 0.4,
            dilution: 0.14,
            sf: 10.0,
            feed: 0.05,
            v0: 1.0,
            mutation_rate: 0.0,
            mutant_fitness: 1.0,
        }
    }

    /// Fed-batch with a linear feed starting with the fermentation.
    pub fn fed_batch() -> Self {
        Self {
            s0: 0.5,
            x0: 0.3,
            ks: 2.0,
            kp: 1.0,
            mumax: 0.3,
            qpmax: 0.5,
            yxs: 0.6,
            yps: 0.5,
            sf: 5.0,
            feed: 0.05,
            v0: 1.0,
            ..Self::batch()
        }
    }

    /// Continuous culture, used for both the X-t and X-D diagrams.
    pub fn chemostat() -> Self {
        Self {
            s0: 5.0,
            x0: 0.2,
            ks: 3.0,
            kp: 1.0,
            mumax: 0.3,
            qpmax: 0.4,
            yxs: 0.6,
            yps: 0.7,
            dilution: 0.14,
            sf: 10.0,
            ..Self::batch()
        }
    }

    /// Continuous culture with cheater cells: a mutation every 20 min division
    /// interval at 1e-6 per division, with a 20 % fitness advantage.
    pub fn competition() -> Self {
        Self {
            s0: 15.0,
            x0: 0.1,
            ks: 3.0,
            kp: 1.0,
            mumax: 0.3,
            qpmax: 0.5,
            yxs: 0.9,
            yps: 0.7,
            dilution: 0.14,
            sf: 15.0,
            mutation_rate: mutation_rate_per_hour(1e-6, 1.0 / 3.0),
            mutant_fitness: 1.2,
            ..Self::batch()
        }
    }

    /// Builds a record from parallel name/value lists on top of `base`.
    /// Accepts both the field names and the conventional symbols (`S0`, `Ks`, `D`, ...).
    pub fn from_named(base: Self, names: &[String], values: &[f64]) -> Result<Self> {
        if names.len() != values.len() {
            return Err(FermentError::invalid(format!(
                "Parameter names ({}) and values ({}) differ in length.",
                names.len(),
                values.len()
            )));
        }
        let mut params = base;
        for (name, &value) in names.iter().zip(values) {
            let slot = match name.as_str() {
                "s0" | "S0" => &mut params.s0,
                "x0" | "X0" => &mut params.x0,
                "ks" | "Ks" => &mut params.ks,
                "kp" | "Kp" => &mut params.kp,
                "mumax" => &mut params.mumax,
                "qpmax" => &mut params.qpmax,
                "yxs" | "Yxs" => &mut params.yxs,
                "yps" | "Yps" => &mut params.yps,
                "dilution" | "D" => &mut params.dilution,
                "sf" | "Sf" => &mut params.sf,
                "feed" | "F" => &mut params.feed,
                "v0" | "V0" => &mut params.v0,
                "mutation_rate" | "mut_rate" => &mut params.mutation_rate,
                "mutant_fitness" | "mut_fitness" => &mut params.mutant_fitness,
                other => {
                    return Err(FermentError::invalid(format!(
                        "Unknown parameter \"{other}\"."
                    )))
                }
            };
            *slot = value;
        }
        Ok(params)
    }
}

/// A kinetics right-hand side together with the labels a plot needs.
pub trait KineticModel: DynamicalSystem<f64> {
    fn name(&self) -> &'static str;

    /// Legend entries, one per state component.
    fn series_names(&self) -> &'static [&'static str];

    /// State at t = 0 taken from the parameter record.
    fn initial_state(&self) -> Vec<f64>;

    /// State component plotted against its own axis, with that axis' label.
    fn secondary_axis(&self) -> Option<(usize, &'static str)> {
        None
    }
}

/// Kinetic regime selector for callers that pick a model at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Batch,
    FedBatch,
    Chemostat,
    Competition,
}

impl Regime {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "batch" => Ok(Regime::Batch),
            "fed_batch" | "fedbatch" => Ok(Regime::FedBatch),
            "chemostat" | "continuous" => Ok(Regime::Chemostat),
            "competition" | "cheater" => Ok(Regime::Competition),
            other => Err(FermentError::invalid(format!("Unknown regime \"{other}\"."))),
        }
    }

    pub fn preset(self) -> KineticParams {
        match self {
            Regime::Batch => KineticParams::batch(),
            Regime::FedBatch => KineticParams::fed_batch(),
            Regime::Chemostat => KineticParams::chemostat(),
            Regime::Competition => KineticParams::competition(),
        }
    }

    pub fn build(self, params: &KineticParams) -> Result<Box<dyn KineticModel>> {
        Ok(match self {
            Regime::Batch => Box::new(BatchModel::new(params)?),
            Regime::FedBatch => Box::new(FedBatchModel::new(params)?),
            Regime::Chemostat => Box::new(ChemostatModel::new(params)?),
            Regime::Competition => Box::new(CompetitionModel::new(params)?),
        })
    }
}

/// Monod growth and product formation rates shared by every regime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Growth {
    mumax: f64,
    ks: f64,
    qpmax: f64,
    kp: f64,
}

impl Growth {
    pub(crate) fn from_params(params: &KineticParams) -> Result<Self> {
        require_positive("mumax", params.mumax)?;
        require_positive("Ks", params.ks)?;
        require_positive("qpmax", params.qpmax)?;
        require_positive("Kp", params.kp)?;
        Ok(Self {
            mumax: params.mumax,
            ks: params.ks,
            qpmax: params.qpmax,
            kp: params.kp,
        })
    }

    pub(crate) fn mu(&self, substrate: f64) -> f64 {
        monod(self.mumax, substrate, self.ks)
    }

    pub(crate) fn qp(&self, substrate: f64) -> f64 {
        monod(self.qpmax, substrate, self.kp)
    }

    pub(crate) fn mumax(&self) -> f64 {
        self.mumax
    }

    pub(crate) fn ks(&self) -> f64 {
        self.ks
    }
}

/// Biomass and product yields on substrate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Yields {
    pub(crate) yxs: f64,
    pub(crate) yps: f64,
}

impl Yields {
    pub(crate) fn from_params(params: &KineticParams) -> Result<Self> {
        require_positive("Yxs", params.yxs)?;
        require_positive("Yps", params.yps)?;
        Ok(Self {
            yxs: params.yxs,
            yps: params.yps,
        })
    }
}

pub(crate) fn require_positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(FermentError::invalid(format!(
            "{name} must be positive and finite, got {value}."
        )))
    }
}

pub(crate) fn require_non_negative(name: &str, value: f64) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(FermentError::invalid(format!(
            "{name} must be non-negative and finite, got {value}."
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::{monod, KineticParams, Regime};
    use crate::error::FermentError;

    #[test]
    fn monod_saturates() {
        assert_eq!(monod(0.3, 0.0, 2.0), 0.0);
        assert!((monod(0.3, 2.0, 2.0) - 0.15).abs() < 1e-15);
        assert!(monod(0.3, 1e9, 2.0) < 0.3);
        assert!((monod(0.3, 1e9, 2.0) - 0.3).abs() < 1e-8);
    }

    #[test]
    fn competition_preset_converts_mutation_rate() {
        let params = KineticParams::competition();
        assert!((params.mutation_rate - 3e-6).abs() < 1e-18);
        assert_eq!(params.sf, 15.0);
        assert_eq!(params.yxs, 0.9);
    }

    #[test]
    fn from_named_accepts_symbols_and_rejects_unknown() {
        let names = vec!["S0".to_string(), "mumax".to_string(), "dilution".to_string()];
        let params = KineticParams::from_named(KineticParams::batch(), &names, &[12.0, 0.25, 0.1])
            .expect("known names");
        assert_eq!(params.s0, 12.0);
        assert_eq!(params.mumax, 0.25);
        assert_eq!(params.dilution, 0.1);
        assert_eq!(params.ks, KineticParams::batch().ks);

        let result =
            KineticParams::from_named(KineticParams::batch(), &["nope".to_string()], &[1.0]);
        assert!(matches!(result, Err(FermentError::InvalidParameters(_))));
        let result = KineticParams::from_named(KineticParams::batch(), &names, &[1.0]);
        assert!(matches!(result, Err(FermentError::InvalidParameters(_))));
    }

    #[test]
    fn params_deserialize_from_conventional_symbols() {
        let params: KineticParams =
            serde_json::from_str(r#"{"S0": 20.0, "Yxs": 0.45, "mut_fitness": 1.5}"#)
                .expect("valid json");
        assert_eq!(params.s0, 20.0);
        assert_eq!(params.yxs, 0.45);
        assert_eq!(params.mutant_fitness, 1.5);
        assert_eq!(params.ks, KineticParams::default().ks);
    }

    #[test]
    fn regime_builds_models_with_matching_dimension() {
        for (name, dim) in [
            ("batch", 3),
            ("fed_batch", 4),
            ("chemostat", 3),
            ("competition", 4),
        ] {
            let regime = Regime::parse(name).expect("known regime");
            let model = regime.build(&regime.preset()).expect("preset is valid");
            assert_eq!(model.dimension(), dim);
            assert_eq!(model.series_names().len(), dim);
            assert_eq!(model.initial_state().len(), dim);
        }
        assert!(Regime::parse("solid_state").is_err());
    }

    #[test]
    fn non_positive_constants_are_rejected() {
        let params = KineticParams {
            yxs: 0.0,
            ..KineticParams::batch()
        };
        assert!(matches!(
            Regime::Batch.build(&params),
            Err(FermentError::InvalidParameters(_))
        ));
        let params = KineticParams {
            mumax: f64::NAN,
            ..KineticParams::chemostat()
        };
        assert!(Regime::Chemostat.build(&params).is_err());
    }
}
