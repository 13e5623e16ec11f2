//! Error type of the synchronization engine.
//!
//! Every failure is classified into an [`ErrorKind`] so callers dispatch on
//! the kind instead of matching message text.

use road_data_client::errors::ClientError;
use shared_utils::config::ConfigError;
use thiserror::Error;

/// Coarse classification used for retry and notification decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeouts and gateway-class failures; safe to retry.
    Transient,
    /// Malformed or unexpected upstream data; retrying repeats the failure.
    Data,
    /// A destination transaction failed and was rolled back.
    Integrity,
    /// Missing secrets or invalid settings, detected before any I/O.
    Configuration,
}

/// Failure of one partition run or one of its stages.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching source records failed.
    #[error("registry fetch of {path} failed: {source}")]
    Registry {
        /// Source path being fetched.
        path: String,
        /// Underlying client error.
        source: ClientError,
    },

    /// A conversion batch failed after the client's retries.
    #[error("converter request failed: {0}")]
    Converter(#[source] ClientError),

    /// A source record does not have the expected shape.
    #[error("malformed source record {oid}: {reason}")]
    MalformedRecord {
        /// External id, or `<unknown>` when the id itself is missing.
        oid: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A timestamp on a source record could not be parsed.
    #[error("invalid timestamp {value:?} on {oid}")]
    Timestamp {
        /// External id of the record.
        oid: String,
        /// Raw timestamp text.
        value: String,
    },

    /// A property the writer needs is not defined in the destination catalog.
    #[error("property {public_id} is not defined for asset type {asset_type_id}")]
    MissingProperty {
        /// Asset type the property was looked up for.
        asset_type_id: i32,
        /// Public id of the property.
        public_id: String,
    },

    /// A single-choice value has no enumerated value row.
    #[error("no enumerated value {value} for property {public_id}")]
    MissingEnumeratedValue {
        /// Public id of the property.
        public_id: String,
        /// Value that could not be mapped.
        value: i32,
    },

    /// Query or transaction failure.
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// No connection could be checked out of the pool.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// Missing secret or invalid setting.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl SyncError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Registry { source, .. } | SyncError::Converter(source) => {
                if source.is_transient() {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Data
                }
            }
            SyncError::MalformedRecord { .. } | SyncError::Timestamp { .. } => ErrorKind::Data,
            SyncError::Pool(_) => ErrorKind::Transient,
            SyncError::MissingProperty { .. }
            | SyncError::MissingEnumeratedValue { .. }
            | SyncError::Database(_) => ErrorKind::Integrity,
            SyncError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Shorthand for [`SyncError::MalformedRecord`].
    pub fn malformed(oid: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::MalformedRecord {
            oid: oid.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use road_data_client::errors::StatusCode;

    use super::*;

    fn status(code: StatusCode) -> ClientError {
        ClientError::Status {
            url: "http://converter".into(),
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn client_errors_split_by_transience() {
        assert_eq!(
            SyncError::Converter(status(StatusCode::GATEWAY_TIMEOUT)).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            SyncError::Converter(status(StatusCode::BAD_REQUEST)).kind(),
            ErrorKind::Data
        );
    }

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(SyncError::malformed("oid1", "no oid").kind(), ErrorKind::Data);
        assert_eq!(
            SyncError::Database(diesel::result::Error::RollbackTransaction).kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            SyncError::Configuration(ConfigError::invalid("batch_size", "must be positive"))
                .kind(),
            ErrorKind::Configuration
        );
    }
}
