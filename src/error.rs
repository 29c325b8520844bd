//! The filter's one fallible boundary.
//!
//! Grounded in `examples/dirkwa-mayara-server/mayara-core/src/error.rs`'s
//! `thiserror`-derived library error enum: a pure numerical library has no
//! I/O boundary for `anyhow` to attach to, so a typed error is the
//! idiomatic fit instead.

use thiserror::Error;

/// Errors surfaced by [`crate::ukf::RiemannianUkf::update`] and the
/// [`crate::filter::CatheterFilter`] methods built on top of it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// The innovation covariance `S = Pzz + R` was not invertible. Every
    /// other degeneracy in this crate is clamped silently; this is the one
    /// genuine linear-algebra failure that must propagate.
    #[error("innovation covariance is singular")]
    SingularInnovationCovariance,
}
