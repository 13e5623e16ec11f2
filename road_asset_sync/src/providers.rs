//! Builds the engine and its collaborators from configuration and secrets.
use std::sync::Arc;

use road_data_client::{
    errors::ClientInitError,
    providers::{
        AddressConverter, RecordSource,
        converter::ConverterClient,
        registry::{RegistryClient, RegistryCredentials},
    },
};

use crate::{
    config::{Secrets, SyncConfig},
    db::pool::build_pool,
    error::SyncError,
    store::{DestinationStore, PgStore},
    sync::SyncEngine,
};

/// Registry client for the configured endpoints.
pub fn build_registry(
    cfg: &SyncConfig,
    secrets: &Secrets,
) -> Result<Arc<dyn RecordSource>, ClientInitError> {
    let credentials = RegistryCredentials {
        client_id: secrets.registry_client_id.clone(),
        client_secret: secrets.registry_client_secret.clone(),
    };
    Ok(Arc::new(RegistryClient::new(cfg.registry_settings(), credentials)?))
}

/// Converter client for the configured endpoint.
pub fn build_converter(
    cfg: &SyncConfig,
    secrets: &Secrets,
) -> Result<Arc<dyn AddressConverter>, ClientInitError> {
    Ok(Arc::new(ConverterClient::new(
        cfg.converter_settings(),
        &secrets.converter_api_key,
    )?))
}

/// Postgres-backed destination store.
pub fn build_store(cfg: &SyncConfig, secrets: &Secrets) -> Result<Arc<dyn DestinationStore>, SyncError> {
    let pool = build_pool(&secrets.database_url, cfg.database.pool_size)?;
    Ok(Arc::new(
        PgStore::new(pool).with_write_batch_size(cfg.database.write_batch_size),
    ))
}

/// Fully wired engine.
pub fn build_engine(cfg: &SyncConfig, secrets: &Secrets) -> anyhow::Result<SyncEngine> {
    let registry = build_registry(cfg, secrets)?;
    let converter = build_converter(cfg, secrets)?;
    let store = build_store(cfg, secrets)?;
    Ok(
        SyncEngine::new(registry, converter, store, cfg.resolver_settings())
            .with_writer(cfg.writer.clone())
            .with_sign_types(cfg.sign_types()),
    )
}
