//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the entity×time panel table (`Panel`)
//! - run-level enums (`EstimatorKind`, `ImputationPolicy`, `FeatureCategory`)
//! - fit outputs (`ModelArtifact`, `Coefficient`, `FitStats`, etc.)

pub mod artifact;
pub mod panel;
pub mod types;

pub use artifact::*;
pub use panel::*;
pub use types::*;
