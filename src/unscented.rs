//! Unscented transform: sigma points from tangent-space statistics, and back.
//!
//! The sigma-point generate/recombine mechanics mirror
//! `filters/ukf_15d.rs`'s `generate_sigma_points`/`recombine_sigma_points`,
//! but the weight formula and the square-root step differ: weights use the
//! `h`-divisor parameterization of
//! `examples/original_source/catheter_ukf/unscented.py` rather than the
//! alpha/beta/kappa form `ukf_15d.rs` uses, and the square root is a
//! singularity-tolerant eigendecomposition rather than a Cholesky factor
//! (`ukf_15d.rs` falls back to the identity matrix on a failed Cholesky; this
//! filter instead needs the principal square root to stay well-defined for
//! rank-deficient covariances).

use nalgebra::SymmetricEigen;

use crate::types::{SigmaWeights, StateMatrix, StateSigmas, StateVector, SIGMA_COUNT, STATE_DIM};

/// Spread parameter for sigma-point generation, paired with the fixed
/// `STATE_DIM`/`SIGMA_COUNT` this filter always operates on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnscentedTransform {
    pub h: f64,
}

impl UnscentedTransform {
    /// `h` should be strictly positive; not validated here — see DESIGN.md's
    /// Open Question ledger.
    pub fn new(h: f64) -> Self {
        Self { h }
    }

    /// Produces `2*STATE_DIM + 1` sigma points and their weights from a mean
    /// and covariance in the local tangent chart.
    pub fn sigmas_from_stats(&self, x: &StateVector, p: &StateMatrix) -> (StateSigmas, SigmaWeights) {
        let m = STATE_DIM as f64;
        let scaled = (m + self.h) * p;
        let sqrt_q = principal_sqrt(&scaled);

        let mut sigmas: StateSigmas = [StateVector::zeros(); SIGMA_COUNT];
        sigmas[0] = *x;
        for i in 0..STATE_DIM {
            let column = sqrt_q.column(i).into_owned();
            sigmas[2 * i + 1] = x + column;
            sigmas[2 * i + 2] = x - column;
        }

        let mut weights = SigmaWeights::zeros();
        weights[0] = self.h / (self.h + m);
        for w in weights.iter_mut().skip(1) {
            *w = 1.0 / (2.0 * (self.h + m));
        }

        (sigmas, weights)
    }

    /// Weighted mean and (biased/population) covariance of a set of sigma
    /// points, generic over the sigma vector width `N` so the same weights
    /// reduce both 18-wide state sigmas and 6-wide observation sigmas.
    pub fn stats_from_sigmas<const N: usize>(
        sigmas: &[nalgebra::SVector<f64, N>; SIGMA_COUNT],
        weights: &SigmaWeights,
    ) -> (nalgebra::SVector<f64, N>, nalgebra::SMatrix<f64, N, N>) {
        let mut mean = nalgebra::SVector::<f64, N>::zeros();
        for (sigma, w) in sigmas.iter().zip(weights.iter()) {
            mean += sigma * *w;
        }

        let mut cov = nalgebra::SMatrix::<f64, N, N>::zeros();
        for (sigma, w) in sigmas.iter().zip(weights.iter()) {
            let diff = sigma - mean;
            cov += (diff * diff.transpose()) * *w;
        }

        (mean, cov)
    }
}

/// Principal square root of a symmetric matrix via eigendecomposition:
/// `V * diag(sqrt(max(lambda, 0))) * V^T`. Tolerates singular/indefinite
/// input by clamping negative eigenvalues to zero, discarding the would-be
/// imaginary part the way `scipy.linalg.sqrtm`'s real-part-only reading does
/// in the source implementation.
fn principal_sqrt(m: &StateMatrix) -> StateMatrix {
    let eigen = SymmetricEigen::new(*m);
    let sqrt_eigenvalues = eigen.eigenvalues.map(|lambda| lambda.max(0.0).sqrt());
    let v = eigen.eigenvectors;
    v * StateMatrix::from_diagonal(&sqrt_eigenvalues) * v.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_sum_to_one() {
        let ut = UnscentedTransform::new(1e-4);
        let (_, w) = ut.sigmas_from_stats(&StateVector::zeros(), &StateMatrix::identity());
        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn round_trip_identity_for_full_rank_covariance() {
        let ut = UnscentedTransform::new(1e-4);
        let mut p = StateMatrix::identity() * 0.25;
        // Make it non-trivially correlated, still PSD: P = A A^T.
        let a = StateMatrix::identity() + StateMatrix::identity() * 0.1;
        p = a * p * a.transpose();

        let x = StateVector::from_fn(|i, _| (i as f64) * 0.1 - 0.5);

        let (sigmas, w) = ut.sigmas_from_stats(&x, &p);
        let (x2, p2) = UnscentedTransform::stats_from_sigmas(&sigmas, &w);

        assert_relative_eq!(x2, x, epsilon = 1e-8);
        for i in 0..STATE_DIM {
            for j in 0..STATE_DIM {
                assert_relative_eq!(p2[(i, j)], p[(i, j)], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn round_trip_with_rank_deficient_covariance() {
        let ut = UnscentedTransform::new(1e-4);
        let mut p = StateMatrix::identity();
        // Zero out two rows/columns: components 5 and 11 carry no uncertainty.
        for axis in [5usize, 11usize] {
            for k in 0..STATE_DIM {
                p[(axis, k)] = 0.0;
                p[(k, axis)] = 0.0;
            }
        }

        let x = StateVector::zeros();
        let (sigmas, w) = ut.sigmas_from_stats(&x, &p);
        let (x2, p2) = UnscentedTransform::stats_from_sigmas(&sigmas, &w);

        assert_relative_eq!(x2, x, epsilon = 1e-9);
        for i in 0..STATE_DIM {
            for j in 0..STATE_DIM {
                assert_relative_eq!(p2[(i, j)], p[(i, j)], epsilon = 1e-6);
            }
        }
    }
}
