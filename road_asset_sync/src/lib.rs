//! Road-asset synchronization engine.
//!
//! Reconciles records of the national road-data registry with the regional
//! road-asset database, one (region, asset type) partition at a time: diff by
//! external id, resolve road addresses to network links, keep public links,
//! merge contiguous linear segments and write expirations, inserts and new
//! versions transactionally. See [`sync::SyncEngine`] for the pipeline.

#![warn(missing_docs)]

pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod geometry;
pub mod link_filter;
pub mod merge;
pub mod model;
pub mod partition;
pub mod providers;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod strategy;
pub mod sync;
pub mod timing;
