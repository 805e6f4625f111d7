//! Structural credit-risk models.
//!
//! Models are implemented as small, pure functions so the feature engineer can
//! apply them row by row and callers can use them standalone.

pub mod dtd;

pub use dtd::*;
