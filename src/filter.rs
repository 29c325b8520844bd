//! Fixed-noise facade over the Riemannian UKF: `Q`/`R` built once,
//! initial-state helper, tip/coil reconstruction.
//!
//! Grounded in `Ukf15d::new`'s pattern of building its noise matrices from a
//! small set of constructor parameters, and in
//! `examples/original_source/catheter_ukf/ukf.py`'s exact `Q`/`R`/initial-
//! covariance formulas.

use nalgebra::Vector3;

use crate::error::FilterError;
use crate::state::{State, StateSpace};
use crate::types::{ObsMatrix, ObsVector, StateMatrix};
use crate::ukf::RiemannianUkf;
use crate::unscented::UnscentedTransform;

/// Construction-time configuration: catheter geometry and sigma spread.
/// `Default` reproduces the filter's documented defaults.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterConfig {
    pub coil_distance_mm: f64,
    pub tip_distance_mm: f64,
    pub h: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            coil_distance_mm: 7.8,
            tip_distance_mm: 9.0,
            h: 1e-4,
        }
    }
}

/// A serializable read-only view of a state estimate, for callers that want
/// a single value to log or replay. Carries no behavior of its own.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FilterEstimate {
    pub state: State,
    pub covariance_trace: f64,
    pub tip: Vector3<f64>,
    pub distal: Vector3<f64>,
    pub proximal: Vector3<f64>,
}

/// Ready-to-use catheter tracker: fixed process/measurement noise plus the
/// Riemannian UKF core, built once from a [`FilterConfig`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CatheterFilter {
    ukf: RiemannianUkf,
    q: StateMatrix,
    r: ObsMatrix,
}

impl Default for CatheterFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl CatheterFilter {
    pub fn new(config: FilterConfig) -> Self {
        let statespace = StateSpace::new(config.coil_distance_mm, config.tip_distance_mm);
        let unscented = UnscentedTransform::new(config.h);
        let ukf = RiemannianUkf::new(statespace, unscented);
        let q = transition_noise(statespace.tip_offset);
        let r = measurement_noise();

        log::debug!(
            "CatheterFilter built: coil_offset={:.3}mm tip_offset={:.3}mm h={:e}",
            statespace.coil_offset,
            statespace.tip_offset,
            config.h
        );

        Self { ukf, q, r }
    }

    /// Builds a plausible initial `(state, covariance)` from a single pair of
    /// coil observations: midpoint as position, the distal-to-proximal
    /// direction as `q`, zero velocity/acceleration/angular rates.
    pub fn estimate_initial_state(
        &self,
        distal: Vector3<f64>,
        proximal: Vector3<f64>,
    ) -> (State, StateMatrix) {
        let x = 0.5 * (distal + proximal);
        let q = (distal - proximal).normalize();
        let state = State::new(x, Vector3::zeros(), Vector3::zeros(), q, Vector3::zeros(), Vector3::zeros());

        let c = (1.0 / self.ukf.statespace.tip_offset).powi(2);
        let mut p = StateMatrix::zeros();
        for i in 0..9 {
            p[(i, i)] = 1.0;
        }
        for i in 9..18 {
            p[(i, i)] = c;
        }

        (state, p)
    }

    pub fn predict(&self, x: &State, p: &StateMatrix, dt: f64) -> (State, StateMatrix) {
        self.ukf.predict(x, p, &self.q, dt)
    }

    pub fn update(
        &self,
        x: &State,
        p: &StateMatrix,
        z: &ObsVector,
    ) -> Result<(State, StateMatrix), FilterError> {
        self.ukf.update(x, p, &self.r, z)
    }

    /// One predict-then-update cycle. Logs the innovation norm at `trace`
    /// level so a caller with `env_logger` wired in can watch filter health.
    pub fn filter(
        &self,
        x: &State,
        p: &StateMatrix,
        z: &ObsVector,
        dt: f64,
    ) -> Result<(State, StateMatrix), FilterError> {
        let (xt, pt) = self.predict(x, p, dt);
        let innovation = z - self.ukf.statespace.observe_state(&xt);
        log::trace!("innovation norm = {:.6}", innovation.norm());
        self.update(&xt, &pt, z)
    }

    /// `(tip, distal, proximal)` reconstructed from a state.
    pub fn tip_and_coils(&self, x: &State) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let space = &self.ukf.statespace;
        let tip = space.tip_from_state(x);
        let distal = x.x + space.coil_offset * x.q;
        let proximal = x.x - space.coil_offset * x.q;
        (tip, distal, proximal)
    }

    pub fn snapshot(&self, x: &State, p: &StateMatrix) -> FilterEstimate {
        let (tip, distal, proximal) = self.tip_and_coils(x);
        FilterEstimate {
            state: *x,
            covariance_trace: p.trace(),
            tip,
            distal,
            proximal,
        }
    }
}

fn transition_noise(tip_offset: f64) -> StateMatrix {
    let c = (1.0 / tip_offset).powi(2);
    let mut q = StateMatrix::zeros();
    for i in 0..3 {
        q[(i, i)] = 1e-12;
    }
    for i in 3..9 {
        q[(i, i)] = 1e0;
    }
    for i in 9..12 {
        q[(i, i)] = c * 1e-12;
    }
    for i in 12..18 {
        q[(i, i)] = c * 1e0;
    }
    q
}

fn measurement_noise() -> ObsMatrix {
    let mut r = ObsMatrix::zeros();
    for i in 0..6 {
        r[(i, i)] = 0.001;
    }
    for i in 0..3 {
        r[(i, i + 3)] = 0.0006;
        r[(i + 3, i)] = 0.0006;
    }
    r
}
