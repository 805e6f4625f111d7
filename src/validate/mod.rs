//! Diagnostics & Validator: residual tests, walk-forward backtests and
//! robustness sweeps.

pub mod diagnostics;
pub mod robustness;
pub mod walk_forward;

pub use diagnostics::*;
pub use robustness::*;
pub use walk_forward::*;
