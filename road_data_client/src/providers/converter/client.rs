use std::{num::NonZeroU32, time::Duration};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    errors::{
        ClientBuildSnafu, ClientError, ClientInitError, DecodeSnafu, InvalidApiKeySnafu,
        MalformedResponseSnafu, RequestSnafu,
    },
    providers::AddressConverter,
    retry::RetryPolicy,
};

use super::{ConversionFeature, ConversionRequest, response::FeatureCollection};

/// Connection settings for the converter.
#[derive(Debug, Clone)]
pub struct ConverterSettings {
    pub url: String,
    pub timeout: Duration,
    /// Optional client-side throttle, in requests per second.
    pub requests_per_second: Option<NonZeroU32>,
    pub retry: RetryPolicy,
}

/// HTTP client for the linear-referencing converter.
///
/// Each batch is posted as a form with a single `json` field holding the
/// serialized request array.
pub struct ConverterClient {
    client: Client,
    url: String,
    retry: RetryPolicy,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl ConverterClient {
    pub fn new(settings: ConverterSettings, api_key: &SecretString) -> Result<Self, ClientInitError> {
        let mut key = header::HeaderValue::from_str(api_key.expose_secret())
            .context(InvalidApiKeySnafu)?;
        key.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert("X-API-KEY", key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            url: settings.url,
            retry: settings.retry,
            limiter: settings
                .requests_per_second
                .map(|n| RateLimiter::direct(Quota::per_second(n))),
        })
    }

    async fn post_once(&self, payload: &str) -> Result<Vec<ConversionFeature>, ClientError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let response = self
            .client
            .post(&self.url)
            .form(&[("json", payload)])
            .send()
            .await
            .context(RequestSnafu { url: &self.url })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context(RequestSnafu { url: &self.url })?;

        if !status.is_success() {
            return Err(ClientError::Status {
                url: self.url.clone(),
                status,
                body,
            });
        }

        parse_features(&self.url, &body)
    }
}

fn parse_features(url: &str, body: &str) -> Result<Vec<ConversionFeature>, ClientError> {
    let collection: FeatureCollection =
        serde_json::from_str(body).context(MalformedResponseSnafu { url })?;
    Ok(collection.into_features())
}

#[async_trait]
impl AddressConverter for ConverterClient {
    async fn convert(
        &self,
        batch: &[ConversionRequest],
    ) -> Result<Vec<ConversionFeature>, ClientError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let payload = serde_json::to_string(batch).context(DecodeSnafu { url: &self.url })?;
        debug!(items = batch.len(), "posting conversion batch");
        self.retry
            .run("converter", || self.post_once(&payload))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const VALID: &str = r#"{"features": [
        {"properties": {"tunniste": "t1", "link_id": "L1", "m_arvo": 12.5, "kuntakoodi": 91}}
    ]}"#;

    #[tokio::test]
    async fn truncated_body_is_retried() {
        let bodies = [r#"{"features": [{"properties": {"tunn"#, VALID];
        let calls = AtomicUsize::new(0);
        let features = RetryPolicy::new(3, Duration::from_millis(1))
            .run("converter", || async {
                let i = calls.fetch_add(1, Ordering::SeqCst);
                parse_features("http://converter", bodies[i])
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].token(), Some("t1"));
    }

    #[tokio::test]
    async fn persistently_malformed_body_gives_up() {
        let calls = AtomicUsize::new(0);
        let err = RetryPolicy::new(2, Duration::from_millis(1))
            .run("converter", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                parse_features("http://converter", "<html>502</html>")
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::MalformedResponse { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
