use thiserror::Error;

pub type Result<T> = std::result::Result<T, FermentError>;

/// Why an integration run stopped before reaching the end of its span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailureKind {
    /// The controller asked for a step smaller than the representable minimum.
    StepSizeUnderflow { step: f64 },
    /// The right-hand side (or the error estimate built from it) was NaN or infinite.
    NonFiniteDerivative,
    MaxStepsExceeded { max_steps: usize },
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::StepSizeUnderflow { step } => {
                write!(f, "step size {step:e} underflowed the minimum step")
            }
            FailureKind::NonFiniteDerivative => {
                write!(f, "right-hand side produced a non-finite value")
            }
            FailureKind::MaxStepsExceeded { max_steps } => {
                write!(f, "exceeded the limit of {max_steps} step attempts")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FermentError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Integration failed at t = {t}: {kind}")]
    IntegrationFailure { t: f64, kind: FailureKind },

    /// Raised only when a caller demands a complete sweep; the sweep itself records
    /// unreached values per entry.
    #[error("Threshold not reached for parameter values {values:?}. Prolong the fermentation time or increase the mutation rate.")]
    ThresholdNotReached { values: Vec<f64> },

    #[error("Newton solver failed to converge in {iterations} steps (‖f(x)‖ = {residual_norm}).")]
    EquilibriumNotConverged {
        iterations: usize,
        residual_norm: f64,
    },

    #[error("Jacobian is singular.")]
    SingularJacobian,
}

impl FermentError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        FermentError::InvalidParameters(message.into())
    }
}
