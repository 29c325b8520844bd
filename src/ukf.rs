//! Predict/update equations for an unscented Kalman filter on the catheter's
//! Riemannian manifold.
//!
//! The sigma-generate -> propagate -> recombine -> gain control flow mirrors
//! `filters/ukf_15d.rs`'s `predict`/`update_gps`; the chart-rebasing that
//! makes this a *Riemannian* UKF (steps 3 and 8 below) follows
//! `examples/original_source/catheter_ukf/riemannian_ukf.py` exactly.

use crate::error::FilterError;
use crate::state::{Local, State, StateSpace};
use crate::types::{ObsMatrix, ObsSigmas, ObsVector, StateMatrix, StateSigmas};
use crate::unscented::UnscentedTransform;

/// Couples the manifold algebra and the unscented transform into the two
/// Kalman steps. Both fields are `Copy` plain configuration — no shared
/// mutable state, no cycles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RiemannianUkf {
    pub statespace: StateSpace,
    pub unscented: UnscentedTransform,
}

impl RiemannianUkf {
    pub fn new(statespace: StateSpace, unscented: UnscentedTransform) -> Self {
        Self {
            statespace,
            unscented,
        }
    }

    /// Propagates `(x, P)` by `dt` under process noise `q`. Infallible: every
    /// step is linear algebra plus the always-defined manifold maps (assuming
    /// the caller keeps consecutive states within the same hemisphere).
    pub fn predict(&self, x: &State, p: &StateMatrix, q: &StateMatrix, dt: f64) -> (State, StateMatrix) {
        let xt = self.statespace.evolve_state(x, dt);

        let (mut sigmas, weights) = self
            .unscented
            .sigmas_from_stats(&Local::identity().pack(), p);

        for sigma in sigmas.iter_mut() {
            let local = Local::unpack(sigma);
            let mut g = self.statespace.local_to_global(x, &local);
            g = self.statespace.evolve_state(&g, dt);
            *sigma = self.statespace.global_to_local(&xt, &g).pack();
        }

        let (_, pt) = UnscentedTransform::stats_from_sigmas(&sigmas, &weights);
        let transition_cov = self.statespace.local_transition_cov(&xt, q);

        (xt, pt + dt * transition_cov)
    }

    /// Fuses observation `z` (with measurement noise `r`) into `(x, P)`.
    /// Returns [`FilterError::SingularInnovationCovariance`] if the
    /// innovation covariance can't be inverted.
    pub fn update(
        &self,
        x: &State,
        p: &StateMatrix,
        r: &ObsMatrix,
        z: &ObsVector,
    ) -> Result<(State, StateMatrix), FilterError> {
        let (sigmas, weights) = self
            .unscented
            .sigmas_from_stats(&Local::identity().pack(), p);

        let mut obs_sigmas: ObsSigmas = [ObsVector::zeros(); crate::types::SIGMA_COUNT];
        for (i, sigma) in sigmas.iter().enumerate() {
            let local = Local::unpack(sigma);
            let g = self.statespace.local_to_global(x, &local);
            obs_sigmas[i] = self.statespace.observe_state(&g);
        }

        let (_, s_raw) = UnscentedTransform::stats_from_sigmas(&obs_sigmas, &weights);
        let s = s_raw + *r;

        // Cross-covariance C = Sigma * diag(w) * O^T.
        let mut cross = crate::types::CrossMatrix::zeros();
        for i in 0..crate::types::SIGMA_COUNT {
            cross += (sigmas[i] * obs_sigmas[i].transpose()) * weights[i];
        }

        let s_inv = s
            .try_inverse()
            .ok_or(FilterError::SingularInnovationCovariance)?;
        let gain = cross * s_inv;

        let innovation = *z - self.statespace.observe_state(x);
        let new_local = Local::unpack(&(gain * innovation));
        let new_x = self.statespace.local_to_global(x, &new_local);

        let mut new_p = *p - gain * s * gain.transpose();
        new_p = 0.5 * (new_p + new_p.transpose());

        // Rebase the posterior covariance into the chart at new_x.
        let (rebase_sigmas, rebase_weights) = self
            .unscented
            .sigmas_from_stats(&Local::identity().pack(), &new_p);
        let mut rebased: StateSigmas = [crate::types::StateVector::zeros(); crate::types::SIGMA_COUNT];
        for (i, sigma) in rebase_sigmas.iter().enumerate() {
            let local = Local::unpack(sigma);
            let g = self.statespace.local_to_global(x, &local);
            rebased[i] = self.statespace.global_to_local(&new_x, &g).pack();
        }
        let (_, final_p) = UnscentedTransform::stats_from_sigmas(&rebased, &rebase_weights);

        Ok((new_x, final_p))
    }
}
