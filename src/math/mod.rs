//! Mathematical utilities: least squares, robust covariances, and summary
//! statistics / reference distributions.

pub mod ols;
pub mod stats;

pub use ols::*;
pub use stats::*;
