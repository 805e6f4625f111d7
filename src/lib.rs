//! `cds-panel` library crate.
//!
//! Panel-data modelling of CDS spreads: prepare an entity×time table, engineer
//! accounting/market/macro features (including a naive distance-to-default),
//! fit panel estimators and validate them out of sample.
//!
//! The binary (`cds`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - every stage can be driven from code as well as from the CLI

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod features;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod prepare;
pub mod report;
pub mod validate;
