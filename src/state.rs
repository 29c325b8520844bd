//! Manifold state algebra.
//!
//! The catheter state lives on a product manifold whose rotational part is
//! the unit 2-sphere `S²`: the direction `q` from the midpoint to the tip.
//! This module provides the global <-> local (tangent chart) conversions,
//! the state evolution and observation models, and the sphere's exponential
//! and logarithm maps that make those conversions well-defined.
//!
//! Ported from `examples/original_source/catheter_ukf/statespace.py`, with
//! the rotation-vector -> rotation-matrix step expressed the way this
//! codebase's IMU preintegration already does it
//! (`UnitQuaternion::from_axis_angle` on a raw rotation vector).

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use crate::types::{StateMatrix, StateVector};

/// Below this rotation-vector norm, `rot` returns the identity rather than
/// normalizing a near-zero axis.
const ROTATION_EPSILON: f64 = 1e-12;

/// A state on the manifold: midpoint pose, velocity, acceleration, tip
/// direction, and its angular rates, as six 3-vectors.
///
/// Constructed only through [`State::new`], which projects `q`, `w`, and `u`
/// back onto the manifold — there is no way to hold a `State` that violates
/// `‖q‖=1`, `w·q=0`, `u·q=0`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct State {
    pub x: Vector3<f64>,
    pub v: Vector3<f64>,
    pub a: Vector3<f64>,
    pub q: Vector3<f64>,
    pub w: Vector3<f64>,
    pub u: Vector3<f64>,
}

impl State {
    /// Builds a state, projecting it onto the manifold: `q` is normalized,
    /// and `w`/`u` have their `q`-parallel component removed so they land in
    /// the tangent space at `q`.
    pub fn new(
        x: Vector3<f64>,
        v: Vector3<f64>,
        a: Vector3<f64>,
        q: Vector3<f64>,
        w: Vector3<f64>,
        u: Vector3<f64>,
    ) -> Self {
        let q = q.normalize();
        let w = w - q * w.dot(&q);
        let u = u - q * u.dot(&q);
        Self { x, v, a, q, w, u }
    }

    /// Flattens to the documented 18-slot layout: 0-2 x, 3-5 v, 6-8 a, 9-11
    /// q, 12-14 w, 15-17 u.
    pub fn pack(&self) -> StateVector {
        let mut s = StateVector::zeros();
        s.fixed_rows_mut::<3>(0).copy_from(&self.x);
        s.fixed_rows_mut::<3>(3).copy_from(&self.v);
        s.fixed_rows_mut::<3>(6).copy_from(&self.a);
        s.fixed_rows_mut::<3>(9).copy_from(&self.q);
        s.fixed_rows_mut::<3>(12).copy_from(&self.w);
        s.fixed_rows_mut::<3>(15).copy_from(&self.u);
        s
    }

    /// Inverse of [`State::pack`]. Re-projects onto the manifold, so this is
    /// *not* a raw reinterpretation of the slots.
    pub fn unpack(s: &StateVector) -> Self {
        Self::new(
            s.fixed_rows::<3>(0).into_owned(),
            s.fixed_rows::<3>(3).into_owned(),
            s.fixed_rows::<3>(6).into_owned(),
            s.fixed_rows::<3>(9).into_owned(),
            s.fixed_rows::<3>(12).into_owned(),
            s.fixed_rows::<3>(15).into_owned(),
        )
    }
}

/// A point in the tangent chart rooted at some base [`State`]. Unlike
/// `State`, construction performs no projection: `Local::identity()` is the
/// zero vector, and any 18 reals are a valid (if perhaps large, non-locally-
/// Euclidean) local coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Local {
    pub x: Vector3<f64>,
    pub v: Vector3<f64>,
    pub a: Vector3<f64>,
    pub q: Vector3<f64>,
    pub w: Vector3<f64>,
    pub u: Vector3<f64>,
}

impl Local {
    pub fn new(
        x: Vector3<f64>,
        v: Vector3<f64>,
        a: Vector3<f64>,
        q: Vector3<f64>,
        w: Vector3<f64>,
        u: Vector3<f64>,
    ) -> Self {
        Self { x, v, a, q, w, u }
    }

    /// The local-chart origin: zero increment from the base state.
    pub fn identity() -> Self {
        Self::new(
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
        )
    }

    pub fn pack(&self) -> StateVector {
        let mut s = StateVector::zeros();
        s.fixed_rows_mut::<3>(0).copy_from(&self.x);
        s.fixed_rows_mut::<3>(3).copy_from(&self.v);
        s.fixed_rows_mut::<3>(6).copy_from(&self.a);
        s.fixed_rows_mut::<3>(9).copy_from(&self.q);
        s.fixed_rows_mut::<3>(12).copy_from(&self.w);
        s.fixed_rows_mut::<3>(15).copy_from(&self.u);
        s
    }

    pub fn unpack(s: &StateVector) -> Self {
        Self::new(
            s.fixed_rows::<3>(0).into_owned(),
            s.fixed_rows::<3>(3).into_owned(),
            s.fixed_rows::<3>(6).into_owned(),
            s.fixed_rows::<3>(9).into_owned(),
            s.fixed_rows::<3>(12).into_owned(),
            s.fixed_rows::<3>(15).into_owned(),
        )
    }
}

/// Rotation matrix that rotates by angle `‖b×v‖` about axis `b×v`, for `v`
/// tangent at `b`. The rotation vector `b×v` is fed directly to
/// `UnitQuaternion::from_axis_angle` (axis = its normalization, angle = its
/// norm) — the same rotation-vector idiom this codebase already uses for
/// IMU attitude updates.
pub fn rot(base: Vector3<f64>, v: Vector3<f64>) -> Matrix3<f64> {
    let rotation_vector = base.cross(&v);
    let angle = rotation_vector.norm();
    if angle < ROTATION_EPSILON {
        return Matrix3::identity();
    }
    let axis = nalgebra::Unit::new_normalize(rotation_vector);
    UnitQuaternion::from_axis_angle(&axis, angle)
        .to_rotation_matrix()
        .into_inner()
}

/// Maps a tangent increment `v` at `b` to a new point on the sphere.
pub fn exp(base: Vector3<f64>, v: Vector3<f64>) -> Vector3<f64> {
    rot(base, v) * base
}

/// Inverse of [`exp`]: the tangent vector at `base` whose geodesic points at
/// `p`. Returns the zero vector when `p` is (numerically) equal to `base`;
/// undefined in magnitude/direction for antipodal `base`/`p` — callers must
/// keep `p` in the open hemisphere of `base`.
pub fn log(base: Vector3<f64>, p: Vector3<f64>) -> Vector3<f64> {
    let v = base.cross(&p).cross(&base);
    let s = v.norm();
    if s < ROTATION_EPSILON {
        Vector3::zeros()
    } else {
        (s.asin() / s) * v
    }
}

/// Coil/tip geometry derived from the physical catheter dimensions.
///
/// `coil_offset` is the distance from the midpoint to either coil;
/// `tip_offset` is the distance from the midpoint to the tip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateSpace {
    pub coil_offset: f64,
    pub tip_offset: f64,
}

impl StateSpace {
    /// `coil_distance` and `tip_distance` are in millimetres.
    pub fn new(coil_distance: f64, tip_distance: f64) -> Self {
        let coil_offset = coil_distance / 2.0;
        let tip_offset = tip_distance + coil_offset;
        Self {
            coil_offset,
            tip_offset,
        }
    }

    /// Constant-acceleration translation; the rotational triple `(q, w, u)`
    /// is carried along by the rotation that the total tangent increment
    /// `dt*w + 0.5*dt^2*u` induces about `q`.
    pub fn evolve_state(&self, s: &State, dt: f64) -> State {
        let x = s.x + dt * s.v + 0.5 * dt * dt * s.a;
        let v = s.v + dt * s.a;
        let a = s.a;

        let omega = dt * s.w + 0.5 * dt * dt * s.u;
        let r = rot(s.q, omega);

        State::new(x, v, a, r * s.q, r * (s.w + dt * s.u), r * s.u)
    }

    /// Both coil positions: `(x + coil_offset*q, x - coil_offset*q)`, distal
    /// first.
    pub fn observe_state(&self, s: &State) -> crate::types::ObsVector {
        let distal = s.x + self.coil_offset * s.q;
        let proximal = s.x - self.coil_offset * s.q;
        let mut o = crate::types::ObsVector::zeros();
        o.fixed_rows_mut::<3>(0).copy_from(&distal);
        o.fixed_rows_mut::<3>(3).copy_from(&proximal);
        o
    }

    pub fn tip_from_state(&self, s: &State) -> Vector3<f64> {
        s.x + self.tip_offset * s.q
    }

    /// Expresses a global state `g` as a [`Local`] offset from `base`.
    pub fn global_to_local(&self, base: &State, g: &State) -> Local {
        let lx = g.x - base.x;
        let lv = g.v - base.v;
        let la = g.a - base.a;
        let lq = log(base.q, g.q);
        let r = rot(base.q, lq);
        // R is a rotation matrix, so R^-1 == R^T; avoids a linear solve.
        let lw = r.transpose() * g.w - base.w;
        let lu = r.transpose() * g.u - base.u;
        Local::new(lx, lv, la, lq, lw, lu)
    }

    /// Lifts a [`Local`] offset from `base` back to a global [`State`].
    pub fn local_to_global(&self, base: &State, l: &Local) -> State {
        let gx = base.x + l.x;
        let gv = base.v + l.v;
        let ga = base.a + l.a;
        let gq = exp(base.q, l.q);
        let r = rot(base.q, l.q);
        let gw = r * (base.w + l.w);
        let gu = r * (base.u + l.u);
        State::new(gx, gv, ga, gq, gw, gu)
    }

    /// Projects `Q` so that the angular blocks (`w`, `u`) carry no noise
    /// along `q` — without this, additive noise in those blocks would push
    /// the state off the manifold.
    pub fn local_transition_cov(&self, s: &State, q_noise: &StateMatrix) -> StateMatrix {
        let mut proj = StateMatrix::identity();
        let tangent_proj = Matrix3::identity() - s.q * s.q.transpose();
        proj.fixed_view_mut::<3, 3>(12, 12).copy_from(&tangent_proj);
        proj.fixed_view_mut::<3, 3>(15, 15).copy_from(&tangent_proj);
        proj * q_noise * proj.transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn e1() -> Vector3<f64> {
        Vector3::new(1.0, 0.0, 0.0)
    }

    fn e2() -> Vector3<f64> {
        Vector3::new(0.0, 1.0, 0.0)
    }

    #[test]
    fn exp_and_log_e1_e2() {
        let b = exp(e1(), Vector3::new(0.0, std::f64::consts::FRAC_PI_2, 0.0));
        assert_relative_eq!(b, e2(), epsilon = 1e-9);

        let ab = log(e1(), e2());
        assert_relative_eq!(ab, Vector3::new(0.0, std::f64::consts::FRAC_PI_2, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn exp_and_log_e2_e1() {
        let a = exp(e2(), Vector3::new(std::f64::consts::FRAC_PI_2, 0.0, 0.0));
        assert_relative_eq!(a, e1(), epsilon = 1e-9);

        let ba = log(e2(), e1());
        assert_relative_eq!(ba, Vector3::new(std::f64::consts::FRAC_PI_2, 0.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn log_at_base_is_zero() {
        let v = log(e1(), e1());
        assert_relative_eq!(v, Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn evolve_state_matches_reference_scenario() {
        let space = StateSpace::new(0.0, 0.0);
        let s = State::new(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(4.0, 5.0, 6.0),
            Vector3::zeros(),
            e1(),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::zeros(),
        );
        let s2 = space.evolve_state(&s, 1.0);

        assert_relative_eq!(s2.x, Vector3::new(5.0, 7.0, 9.0), epsilon = 1e-9);
        assert_relative_eq!(s2.v, Vector3::new(4.0, 5.0, 6.0), epsilon = 1e-9);
        assert_relative_eq!(
            s2.q,
            Vector3::new(1.0_f64.cos(), 1.0_f64.sin(), 0.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            s2.w,
            Vector3::new(-1.0_f64.sin(), 1.0_f64.cos(), 0.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn observe_state_matches_reference_scenario() {
        let space = StateSpace::new(2.0, 0.0); // coil_offset = 1
        let s = State::new(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::zeros(),
            Vector3::zeros(),
            e1(),
            Vector3::zeros(),
            Vector3::zeros(),
        );
        let o = space.observe_state(&s);
        assert_relative_eq!(
            o,
            crate::types::ObsVector::from_column_slice(&[2.0, 2.0, 3.0, 0.0, 2.0, 3.0]),
            epsilon = 1e-9
        );
    }

    #[test]
    fn local_to_global_and_back_is_identity_near_base() {
        let space = StateSpace::new(7.8, 9.0);
        let base = State::new(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(0.1, -0.2, 0.3),
            Vector3::new(0.0, 0.0, 0.1),
            e1(),
            Vector3::new(0.0, 0.01, 0.0),
            Vector3::zeros(),
        );

        let l = Local::new(
            Vector3::new(0.01, -0.02, 0.0),
            Vector3::new(0.001, 0.0, 0.0),
            Vector3::zeros(),
            Vector3::new(0.0, 0.02, -0.01),
            Vector3::new(0.0, 0.0, 0.001),
            Vector3::zeros(),
        );

        let g = space.local_to_global(&base, &l);
        let l2 = space.global_to_local(&base, &g);

        assert_relative_eq!(l2.x, l.x, epsilon = 1e-8);
        assert_relative_eq!(l2.v, l.v, epsilon = 1e-8);
        assert_relative_eq!(l2.a, l.a, epsilon = 1e-8);
        assert_relative_eq!(l2.q, l.q, epsilon = 1e-6);
        assert_relative_eq!(l2.w, l.w, epsilon = 1e-6);
        assert_relative_eq!(l2.u, l.u, epsilon = 1e-6);
    }

    #[test]
    fn global_to_local_of_self_is_identity() {
        let space = StateSpace::new(7.8, 9.0);
        let base = State::new(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(0.1, -0.2, 0.3),
            Vector3::zeros(),
            e1(),
            Vector3::zeros(),
            Vector3::zeros(),
        );

        let l = space.global_to_local(&base, &base);
        assert_relative_eq!(l.pack(), StateVector::zeros(), epsilon = 1e-9);
    }

    #[test]
    fn new_projects_onto_manifold() {
        let s = State::new(
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        );
        assert_relative_eq!(s.q.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(s.w.dot(&s.q), 0.0, epsilon = 1e-12);
        assert_relative_eq!(s.u.dot(&s.q), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn local_transition_cov_zeroes_noise_along_q() {
        let space = StateSpace::new(7.8, 9.0);
        for q in [
            Vector3::new(1.0, 2.0, 3.0).normalize(),
            Vector3::new(-0.5, 0.2, 0.9).normalize(),
        ] {
            let s = State::new(
                Vector3::zeros(),
                Vector3::zeros(),
                Vector3::zeros(),
                q,
                Vector3::zeros(),
                Vector3::zeros(),
            );
            let noise = StateMatrix::identity();
            let projected = space.local_transition_cov(&s, &noise);

            let w_block = projected.fixed_view::<3, 3>(12, 12).into_owned();
            let u_block = projected.fixed_view::<3, 3>(15, 15).into_owned();
            assert_relative_eq!((w_block * q).norm(), 0.0, epsilon = 1e-9);
            assert_relative_eq!((u_block * q).norm(), 0.0, epsilon = 1e-9);
        }
    }
}
