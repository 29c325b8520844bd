//! Real-time state estimator for a magnetically-tracked catheter: an
//! unscented Kalman filter whose rotational state lives on the unit 2-sphere.
//!
//! Two sensor coils near the catheter tip report noisy 3-D positions; this
//! crate fuses them into a smooth estimate of the midpoint pose, velocity,
//! acceleration, tip direction, and angular rates, and reconstructs the tip
//! coordinate from the result. [`filter::CatheterFilter`] is the entry point
//! most callers want; the [`state`], [`unscented`], and [`ukf`] modules
//! expose the manifold algebra, sigma-point machinery, and predict/update
//! equations it's built from.

pub mod error;
pub mod filter;
pub mod state;
pub mod types;
pub mod ukf;
pub mod unscented;

pub use error::FilterError;
pub use filter::{CatheterFilter, FilterConfig, FilterEstimate};
pub use state::{Local, State, StateSpace};
pub use ukf::RiemannianUkf;
pub use unscented::UnscentedTransform;
