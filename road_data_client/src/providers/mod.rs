//! Provider abstraction for the two external services the sync engine talks to.
//!
//! - [`RecordSource`] yields raw source-registry records for one region and one
//!   source path (newline-delimited JSON, one object per line).
//! - [`AddressConverter`] converts batches of road addresses, coordinates or link
//!   ranges into linear-referencing locations.
//!
//! Both traits are async and object safe so the engine can hold them as
//! `Arc<dyn ...>` and tests can swap in in-memory fakes.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use road_data_client::errors::ClientError;
//! use road_data_client::providers::AddressConverter;
//! use road_data_client::providers::converter::{ConversionFeature, ConversionRequest};
//!
//! struct NoLinks;
//!
//! #[async_trait]
//! impl AddressConverter for NoLinks {
//!     async fn convert(
//!         &self,
//!         _batch: &[ConversionRequest],
//!     ) -> Result<Vec<ConversionFeature>, ClientError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod converter;
pub mod registry;

use async_trait::async_trait;

use crate::errors::ClientError;
use converter::{ConversionFeature, ConversionRequest};

/// Source of raw registry records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches every record of `source_path` that belongs to `region`.
    ///
    /// Any non-success HTTP status is fatal for the fetch; it is not retried.
    async fn fetch_records(
        &self,
        region: &str,
        source_path: &str,
    ) -> Result<Vec<serde_json::Value>, ClientError>;
}

/// Linear-referencing conversion service.
#[async_trait]
pub trait AddressConverter: Send + Sync {
    /// Converts one batch. The returned features may be fewer or more than the
    /// requests: a range request can expand to one feature per traversed link,
    /// and failed items come back as [`ConversionFeature::Failed`].
    async fn convert(
        &self,
        batch: &[ConversionRequest],
    ) -> Result<Vec<ConversionFeature>, ClientError>;
}
