//! Client for the source registry's bulk download API.

mod client;
mod listing;

pub use client::{RegistryClient, RegistryCredentials, RegistrySettings};
pub use listing::{REGION_PARTITION, parse_ndjson};
