//! Input/output helpers.
//!
//! - CSV ingest into a panel, plus macro series (`ingest`)
//! - table and result exports (CSV/JSON) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
