//! Fixed-size type aliases for the filter's linear algebra.
//!
//! Mirrors the const-dimension + `SVector`/`SMatrix` alias convention used
//! throughout this codebase's other Kalman filters, sized for the 18-scalar
//! catheter state and its 37-point sigma set.

use nalgebra::{SMatrix, SVector};

/// Dimension of the flat state / local-chart vector (x, v, a, q, w, u).
pub const STATE_DIM: usize = 18;

/// Dimension of an observation (distal coil + proximal coil).
pub const OBS_DIM: usize = 6;

/// Number of sigma points for an unscented transform over `STATE_DIM`.
pub const SIGMA_COUNT: usize = 2 * STATE_DIM + 1;

/// Flat 18-scalar state or local-chart vector.
pub type StateVector = SVector<f64, STATE_DIM>;

/// 18x18 covariance / noise matrix, always paired with a base state.
pub type StateMatrix = SMatrix<f64, STATE_DIM, STATE_DIM>;

/// Flat 6-scalar observation vector (distal xyz, proximal xyz).
pub type ObsVector = SVector<f64, OBS_DIM>;

/// 6x6 measurement noise / innovation covariance matrix.
pub type ObsMatrix = SMatrix<f64, OBS_DIM, OBS_DIM>;

/// Cross-covariance between the state chart and observation space.
pub type CrossMatrix = SMatrix<f64, STATE_DIM, OBS_DIM>;

/// Kalman gain, state chart per unit observation.
pub type GainMatrix = SMatrix<f64, STATE_DIM, OBS_DIM>;

/// One sigma point per column, `STATE_DIM`-wide.
pub type StateSigmas = [StateVector; SIGMA_COUNT];

/// One sigma point per column, `OBS_DIM`-wide (observation-space sigmas).
pub type ObsSigmas = [ObsVector; SIGMA_COUNT];

/// Unscented transform weights, one per sigma point.
pub type SigmaWeights = SVector<f64, SIGMA_COUNT>;
