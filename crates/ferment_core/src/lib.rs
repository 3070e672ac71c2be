pub mod equilibrium;
pub mod error;
pub mod integrator;
pub mod kinetics;
pub mod report;
pub mod scenario;
pub mod solvers;
pub mod sweep;
/// The `ferment_core` crate provides the numerical engine for fermentation kinetics
/// simulations: an adaptive Runge-Kutta integrator and the Monod-type models that feed it.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (right-hand sides),
///   `EmbeddedStepper` (step-with-error-estimate solvers).
/// - **Solvers / Integrator**: Dormand-Prince and Tsitouras 5(4) pairs driven by an adaptive
///   step controller with dense output.
/// - **Kinetics**: batch, fed-batch, chemostat and mutant/wild-type competition models.
/// - **Equilibrium**: Newton refinement and linear stability of steady states.
/// - **Sweep**: repeated simulations scanned for the first threshold crossing.
/// - **Scenario / Report**: serde run descriptions and the labelled series they produce.
pub mod traits;

pub use error::{FailureKind, FermentError, Result};
