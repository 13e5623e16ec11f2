//! Small helpers shared by the sync workspace: environment and secret lookup,
//! plus the configuration error type both crates report.

pub mod config;
pub mod env;
