//! Data sources that are not files: the seeded synthetic panel used by the
//! `demo` command and the integration tests.

pub mod sample;

pub use sample::*;
