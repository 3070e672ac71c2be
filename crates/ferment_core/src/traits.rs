use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars by the steppers.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A right-hand side `dy/dt = f(t, y)`.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

impl<T: Scalar, S: DynamicalSystem<T> + ?Sized> DynamicalSystem<T> for &S {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        (**self).apply(t, x, out)
    }
}

/// A solver that attempts one step and reports an embedded error estimate.
///
/// Steppers are first-same-as-last: the caller passes the derivative at the start of
/// the step and reads the derivative at the end through `end_derivative` once a step
/// has been accepted.
pub trait EmbeddedStepper<T: Scalar> {
    /// Order of the propagated solution; the step controller uses `1 / order` as its exponent.
    fn order(&self) -> usize;

    /// Attempts a step of size dt from (t, state).
    /// f0: derivative at (t, state)
    /// next: buffer for the propagated state
    /// error: buffer for the local error estimate
    fn attempt(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        f0: &[T],
        dt: T,
        next: &mut [T],
        error: &mut [T],
    );

    /// Derivative at the end point of the most recent attempt.
    fn end_derivative(&self) -> &[T];

    /// Dense output inside the most recent attempt.
    /// theta: fraction of the step in [0, 1]
    fn interpolate(&self, theta: T, state: &[T], next: &[T], dt: T, out: &mut [T]);
}

/// Adapts a closure `f(t, y, dy)` into a `DynamicalSystem<f64>`.
pub struct FnSystem<F> {
    dim: usize,
    f: F,
}

impl<F> FnSystem<F>
where
    F: Fn(f64, &[f64], &mut [f64]),
{
    pub fn new(dim: usize, f: F) -> Self {
        Self { dim, f }
    }
}

impl<F> DynamicalSystem<f64> for FnSystem<F>
where
    F: Fn(f64, &[f64], &mut [f64]),
{
    fn dimension(&self) -> usize {
        self.dim
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        (self.f)(t, x, out)
    }
}
