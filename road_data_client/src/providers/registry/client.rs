use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use snafu::ResultExt;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::{
    errors::{ClientBuildSnafu, ClientError, ClientInitError, DecodeSnafu, RequestSnafu},
    providers::RecordSource,
};

use super::listing::{ClassListing, parse_ndjson};

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Download API root; class and data paths are appended to it.
    pub api_url: String,
    /// OAuth2 token endpoint.
    pub token_url: String,
    pub timeout: Duration,
}

/// OAuth2 client-credentials pair.
#[derive(Clone)]
pub struct RegistryCredentials {
    pub client_id: SecretString,
    pub client_secret: SecretString,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Client for the source registry's bulk download API.
///
/// The bearer token is requested lazily on first use and shared by every
/// subsequent request made through this instance.
pub struct RegistryClient {
    client: Client,
    settings: RegistrySettings,
    credentials: RegistryCredentials,
    token: OnceCell<SecretString>,
}

impl RegistryClient {
    pub fn new(
        settings: RegistrySettings,
        credentials: RegistryCredentials,
    ) -> Result<Self, ClientInitError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            settings,
            credentials,
            token: OnceCell::new(),
        })
    }

    async fn token(&self) -> Result<&SecretString, ClientError> {
        self.token.get_or_try_init(|| self.authenticate()).await
    }

    async fn authenticate(&self) -> Result<SecretString, ClientError> {
        let url = &self.settings.token_url;
        let response = self
            .client
            .post(url)
            .basic_auth(
                self.credentials.client_id.expose_secret(),
                Some(self.credentials.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context(RequestSnafu { url })?;

        let status = response.status();
        let body = response.text().await.context(RequestSnafu { url })?;
        if !status.is_success() {
            return Err(ClientError::Auth {
                message: format!("{status}: {body}"),
            });
        }
        let parsed: TokenResponse = serde_json::from_str(&body).context(DecodeSnafu { url })?;
        match parsed.access_token {
            Some(t) if !t.is_empty() => {
                debug!("registry token acquired");
                Ok(SecretString::new(t.into()))
            }
            _ => Err(ClientError::Auth {
                message: "response carried no access_token".into(),
            }),
        }
    }

    async fn get_text(&self, path: &str) -> Result<(String, String), ClientError> {
        let token = self.token().await?;
        let url = format!(
            "{}/{}",
            self.settings.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .context(RequestSnafu { url: &url })?;

        let status = response.status();
        let body = response.text().await.context(RequestSnafu { url: &url })?;
        if !status.is_success() {
            return Err(ClientError::Status { url, status, body });
        }
        Ok((url, body))
    }

    /// Lists the per-region data paths of a source class.
    pub async fn region_paths(
        &self,
        class_path: &str,
    ) -> Result<indexmap::IndexMap<String, String>, ClientError> {
        let (url, body) = self.get_text(class_path).await?;
        let listing: ClassListing = serde_json::from_str(&body).context(DecodeSnafu { url })?;
        Ok(listing.region_paths())
    }
}

#[async_trait]
impl RecordSource for RegistryClient {
    async fn fetch_records(
        &self,
        region: &str,
        source_path: &str,
    ) -> Result<Vec<serde_json::Value>, ClientError> {
        let paths = self.region_paths(source_path).await?;
        let Some(data_path) = paths.get(region) else {
            return Err(ClientError::UnknownRegion {
                region: region.to_owned(),
                class_path: source_path.to_owned(),
            });
        };
        let (url, body) = self.get_text(data_path).await?;
        let records = parse_ndjson(&url, &body)?;
        info!(region, source_path, records = records.len(), "fetched source records");
        Ok(records)
    }
}
