pub use reqwest::StatusCode;
use snafu::Snafu;

/// Errors that can occur during the creation of a client instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild { source: reqwest::Error },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
    },
}

/// Errors returned by the registry and converter clients.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    /// The request never produced a response (network failure, timeout).
    #[snafu(display("Request to {url} failed: {source}"))]
    Request { url: String, source: reqwest::Error },

    /// The service answered with a non-success status.
    #[snafu(display("{url} answered {status}: {body}"))]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    /// The response body is not the JSON shape we expect.
    #[snafu(display("Could not decode response from {url}: {source}"))]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    /// The converter answered 2xx with a body that is not a feature
    /// collection, e.g. truncated by a proxy.
    #[snafu(display("Malformed converter response from {url}: {source}"))]
    MalformedResponse {
        url: String,
        source: serde_json::Error,
    },

    /// One line of a newline-delimited JSON payload is not valid JSON.
    #[snafu(display("Line {line} of {url} is not valid JSON: {source}"))]
    NdjsonLine {
        url: String,
        line: usize,
        source: serde_json::Error,
    },

    /// The OAuth2 token exchange did not return a usable token.
    #[snafu(display("Token exchange failed: {message}"))]
    Auth { message: String },

    /// The registry listing has no data path for the requested region.
    #[snafu(display("No data path for region {region} under {class_path}"))]
    UnknownRegion { region: String, class_path: String },
}

impl ClientError {
    /// Timeouts, dropped connections, gateway-class statuses and malformed
    /// converter responses.
    ///
    /// Everything else (4xx, other 5xx, undecodable registry bodies) is a data
    /// error and retrying would only repeat it.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Request { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            ClientError::Status { status, .. } => matches!(
                *status,
                StatusCode::REQUEST_TIMEOUT
                    | StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            ),
            ClientError::MalformedResponse { .. } => true,
            _ => false,
        }
    }
}
