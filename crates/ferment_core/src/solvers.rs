use crate::traits::{DynamicalSystem, EmbeddedStepper, Scalar};

fn constant<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// Dormand-Prince 5(4) pair with its 4th-order continuous extension.
pub struct Dopri5<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    k5: Vec<T>,
    k6: Vec<T>,
    k7: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> Dopri5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            k5: vec![z; dim],
            k6: vec![z; dim],
            k7: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> EmbeddedStepper<T> for Dopri5<T> {
    fn order(&self) -> usize {
        5
    }

    fn attempt(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        f0: &[T],
        dt: T,
        next: &mut [T],
        error: &mut [T],
    ) {
        let c2 = constant::<T>(1.0 / 5.0);
        let c3 = constant::<T>(3.0 / 10.0);
        let c4 = constant::<T>(4.0 / 5.0);
        let c5 = constant::<T>(8.0 / 9.0);

        let a21 = constant::<T>(1.0 / 5.0);

        let a31 = constant::<T>(3.0 / 40.0);
        let a32 = constant::<T>(9.0 / 40.0);

        let a41 = constant::<T>(44.0 / 45.0);
        let a42 = constant::<T>(-56.0 / 15.0);
        let a43 = constant::<T>(32.0 / 9.0);

        let a51 = constant::<T>(19372.0 / 6561.0);
        let a52 = constant::<T>(-25360.0 / 2187.0);
        let a53 = constant::<T>(64448.0 / 6561.0);
        let a54 = constant::<T>(-212.0 / 729.0);

        let a61 = constant::<T>(9017.0 / 3168.0);
        let a62 = constant::<T>(-355.0 / 33.0);
        let a63 = constant::<T>(46732.0 / 5247.0);
        let a64 = constant::<T>(49.0 / 176.0);
        let a65 = constant::<T>(-5103.0 / 18656.0);

        // 5th order weights; the 7th stage is evaluated at the propagated state (FSAL).
        let b1 = constant::<T>(35.0 / 384.0);
        let b3 = constant::<T>(500.0 / 1113.0);
        let b4 = constant::<T>(125.0 / 192.0);
        let b5 = constant::<T>(-2187.0 / 6784.0);
        let b6 = constant::<T>(11.0 / 84.0);

        // Difference between the 5th and 4th order weights.
        let e1 = constant::<T>(71.0 / 57600.0);
        let e3 = constant::<T>(-71.0 / 16695.0);
        let e4 = constant::<T>(71.0 / 1920.0);
        let e5 = constant::<T>(-17253.0 / 339200.0);
        let e6 = constant::<T>(22.0 / 525.0);
        let e7 = constant::<T>(-1.0 / 40.0);

        let n = state.len();
        self.k1.copy_from_slice(f0);

        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a21 * self.k1[i]);
        }
        system.apply(t + c2 * dt, &self.tmp, &mut self.k2);

        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a31 * self.k1[i] + a32 * self.k2[i]);
        }
        system.apply(t + c3 * dt, &self.tmp, &mut self.k3);

        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a41 * self.k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        system.apply(t + c4 * dt, &self.tmp, &mut self.k4);

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (a51 * self.k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        system.apply(t + c5 * dt, &self.tmp, &mut self.k5);

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (a61 * self.k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        system.apply(t + dt, &self.tmp, &mut self.k6);

        for i in 0..n {
            next[i] = state[i]
                + dt * (b1 * self.k1[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }
        system.apply(t + dt, next, &mut self.k7);

        for i in 0..n {
            error[i] = dt
                * (e1 * self.k1[i]
                    + e3 * self.k3[i]
                    + e4 * self.k4[i]
                    + e5 * self.k5[i]
                    + e6 * self.k6[i]
                    + e7 * self.k7[i]);
        }
    }

    fn end_derivative(&self) -> &[T] {
        &self.k7
    }

    fn interpolate(&self, theta: T, state: &[T], next: &[T], dt: T, out: &mut [T]) {
        let d1 = constant::<T>(-12715105075.0 / 11282082432.0);
        let d3 = constant::<T>(87487479700.0 / 32700410799.0);
        let d4 = constant::<T>(-10690763975.0 / 1880347072.0);
        let d5 = constant::<T>(701980252875.0 / 199316789632.0);
        let d6 = constant::<T>(-1453857185.0 / 822651844.0);
        let d7 = constant::<T>(69997945.0 / 29380423.0);

        let theta1 = T::one() - theta;
        for i in 0..state.len() {
            let diff = next[i] - state[i];
            let bspl = dt * self.k1[i] - diff;
            let r4 = diff - dt * self.k7[i] - bspl;
            let r5 = dt
                * (d1 * self.k1[i]
                    + d3 * self.k3[i]
                    + d4 * self.k4[i]
                    + d5 * self.k5[i]
                    + d6 * self.k6[i]
                    + d7 * self.k7[i]);
            out[i] = state[i] + theta * (diff + theta1 * (bspl + theta * (r4 + theta1 * r5)));
        }
    }
}

/// Tsitouras 5/4 pair with its free 4th-order interpolant.
pub struct Tsit5<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    k5: Vec<T>,
    k6: Vec<T>,
    k7: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> Tsit5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            k5: vec![z; dim],
            k6: vec![z; dim],
            k7: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> EmbeddedStepper<T> for Tsit5<T> {
    fn order(&self) -> usize {
        5
    }

    fn attempt(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        f0: &[T],
        dt: T,
        next: &mut [T],
        error: &mut [T],
    ) {
        // Each row of a sums to its c.
        let c2 = constant::<T>(0.161);
        let c3 = constant::<T>(0.327);
        let c4 = constant::<T>(0.9);
        let c5 = constant::<T>(0.9800255409045097);

        let a21 = constant::<T>(0.161);

        let a31 = constant::<T>(-0.008480655492356989);
        let a32 = constant::<T>(0.335480655492357);

        let a41 = constant::<T>(2.897153057105493);
        let a42 = constant::<T>(-6.359448489975075);
        let a43 = constant::<T>(4.3622954328695815);

        let a51 = constant::<T>(5.325864828439257);
        let a52 = constant::<T>(-11.748883564062828);
        let a53 = constant::<T>(7.4955393428898365);
        let a54 = constant::<T>(-0.09249506636175525);

        let a61 = constant::<T>(5.86145544294642);
        let a62 = constant::<T>(-12.92096931784711);
        let a63 = constant::<T>(8.159367898576159);
        let a64 = constant::<T>(-0.071584973281401);
        let a65 = constant::<T>(-0.028269050394068383);

        // b coefficients (5th order)
        let b1 = constant::<T>(0.09646076681806523);
        let b2 = constant::<T>(0.01);
        let b3 = constant::<T>(0.4798896504144996);
        let b4 = constant::<T>(1.379008574103742);
        let b5 = constant::<T>(-3.290069515436081);
        let b6 = constant::<T>(2.324710524099774);

        // Embedded error weights
        let e1 = constant::<T>(-0.00178001105222577714);
        let e2 = constant::<T>(-0.0008164344596567469);
        let e3 = constant::<T>(0.007880878010261995);
        let e4 = constant::<T>(-0.1447110071732629);
        let e5 = constant::<T>(0.5823571654525552);
        let e6 = constant::<T>(-0.45808210592918697);
        let e7 = constant::<T>(1.0 / 66.0);

        let n = state.len();
        self.k1.copy_from_slice(f0);

        // k2
        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a21 * self.k1[i]);
        }
        system.apply(t + c2 * dt, &self.tmp, &mut self.k2);

        // k3
        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a31 * self.k1[i] + a32 * self.k2[i]);
        }
        system.apply(t + c3 * dt, &self.tmp, &mut self.k3);

        // k4
        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a41 * self.k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        system.apply(t + c4 * dt, &self.tmp, &mut self.k4);

        // k5
        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (a51 * self.k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        system.apply(t + c5 * dt, &self.tmp, &mut self.k5);

        // k6
        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (a61 * self.k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        system.apply(t + dt, &self.tmp, &mut self.k6);

        for i in 0..n {
            next[i] = state[i]
                + dt * (b1 * self.k1[i]
                    + b2 * self.k2[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }

        // k7 at the propagated state
        system.apply(t + dt, next, &mut self.k7);

        for i in 0..n {
            error[i] = dt
                * (e1 * self.k1[i]
                    + e2 * self.k2[i]
                    + e3 * self.k3[i]
                    + e4 * self.k4[i]
                    + e5 * self.k5[i]
                    + e6 * self.k6[i]
                    + e7 * self.k7[i]);
        }
    }

    fn end_derivative(&self) -> &[T] {
        &self.k7
    }

    fn interpolate(&self, theta: T, state: &[T], _next: &[T], dt: T, out: &mut [T]) {
        // Free 4th order interpolant: y(theta) = y0 + dt * sum_i b_i(theta) * k_i,
        // with b_i(theta) = r_i1 theta + r_i2 theta^2 + r_i3 theta^3 + r_i4 theta^4.
        let r12 = constant::<T>(-2.763706197274826);
        let r13 = constant::<T>(2.9132554618219126);
        let r14 = constant::<T>(-1.0530884977290216);

        let r22 = constant::<T>(0.13169999999999998);
        let r23 = constant::<T>(-0.2234);
        let r24 = constant::<T>(0.1017);

        let r32 = constant::<T>(3.9302962368947516);
        let r33 = constant::<T>(-5.941033872131505);
        let r34 = constant::<T>(2.490627285651253);

        let r42 = constant::<T>(-12.411077166933676);
        let r43 = constant::<T>(30.33818863028232);
        let r44 = constant::<T>(-16.548102889244902);

        let r52 = constant::<T>(37.50931341651104);
        let r53 = constant::<T>(-88.1789048947664);
        let r54 = constant::<T>(47.37952196281928);

        let r62 = constant::<T>(-27.896526289197286);
        let r63 = constant::<T>(65.09189467479366);
        let r64 = constant::<T>(-34.87065786149661);

        let r72 = constant::<T>(1.5);
        let r73 = constant::<T>(-4.0);
        let r74 = constant::<T>(2.5);

        let th2 = theta * theta;
        let th3 = th2 * theta;
        let th4 = th3 * theta;

        let b1 = theta + r12 * th2 + r13 * th3 + r14 * th4;
        let b2 = r22 * th2 + r23 * th3 + r24 * th4;
        let b3 = r32 * th2 + r33 * th3 + r34 * th4;
        let b4 = r42 * th2 + r43 * th3 + r44 * th4;
        let b5 = r52 * th2 + r53 * th3 + r54 * th4;
        let b6 = r62 * th2 + r63 * th3 + r64 * th4;
        let b7 = r72 * th2 + r73 * th3 + r74 * th4;

        for i in 0..state.len() {
            out[i] = state[i]
                + dt * (b1 * self.k1[i]
                    + b2 * self.k2[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]
                    + b7 * self.k7[i]);
        }
    }
}
