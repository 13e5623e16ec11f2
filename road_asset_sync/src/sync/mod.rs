//! Partition orchestration.
//!
//! [`SyncEngine::run_partition`] runs the whole pipeline for one region and
//! one asset type:
//!
//! 1. fetch every source path and remember which path each record came from
//! 2. drop records the strategy does not sync
//! 3. read the region's active destination records and diff
//! 4. expire records that left the source
//! 5. resolve added and updated records to the network, keep public links
//! 6. compute side codes and values, merge linear segments
//! 7. insert new records and supersede updated ones
//!
//! Any error aborts the partition only; [`fanout::run_partitions`] runs many
//! partitions and reports failures through a [`FailureNotifier`].

pub mod fanout;
mod placement;
mod report;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use road_data_client::providers::{AddressConverter, RecordSource};
use shared_utils::config::ConfigError;
use tracing::{Instrument, info, info_span};

use crate::{
    diff::{DiffResult, diff_with},
    error::SyncError,
    link_filter::{filter_locators, referenced_links},
    model::{RoadLink, SourceAsset},
    partition::Partition,
    resolver::{ResolverSettings, RoadLinkResolver},
    store::{DestinationStore, WriterIdentity},
    strategy::{AssetTypeStrategy, RunState, SignTypeTable, Strategy},
    timing::timed,
};

pub use fanout::{FailureNotifier, LogNotifier, PartitionOutcome, run_partitions};
pub use report::PartitionReport;

/// Everything a partition run needs: the two services, the destination and
/// the writer identities.
pub struct SyncEngine {
    registry: Arc<dyn RecordSource>,
    resolver: RoadLinkResolver,
    store: Arc<dyn DestinationStore>,
    writer: WriterIdentity,
    sign_types: SignTypeTable,
}

impl SyncEngine {
    /// Engine with default writer identities and the built-in sign types.
    pub fn new(
        registry: Arc<dyn RecordSource>,
        converter: Arc<dyn AddressConverter>,
        store: Arc<dyn DestinationStore>,
        resolver: ResolverSettings,
    ) -> Self {
        Self {
            registry,
            resolver: RoadLinkResolver::new(converter, resolver),
            store,
            writer: WriterIdentity::default(),
            sign_types: SignTypeTable::builtin(),
        }
    }

    /// Replaces the identities stamped on written rows.
    pub fn with_writer(mut self, writer: WriterIdentity) -> Self {
        self.writer = writer;
        self
    }

    /// Replaces the traffic sign type table.
    pub fn with_sign_types(mut self, sign_types: SignTypeTable) -> Self {
        self.sign_types = sign_types;
        self
    }

    /// Synchronizes one partition.
    pub async fn run_partition(&self, partition: &Partition) -> Result<PartitionReport, SyncError> {
        let span = info_span!(
            "partition",
            region = %partition.region_code,
            asset_type = %partition.asset_type_name,
        );
        self.run(partition).instrument(span).await
    }

    async fn run(&self, partition: &Partition) -> Result<PartitionReport, SyncError> {
        let region = partition.destination_region().ok_or_else(|| {
            ConfigError::invalid(
                "region_code",
                format!("no destination region for {}", partition.region_code),
            )
        })?;
        let strategy = Strategy::select(
            partition.asset_type_id,
            partition.asset_type_kind,
            self.sign_types.clone(),
        );
        info!(strategy = strategy.name(), "partition started");

        let mut report = PartitionReport::for_partition(partition);
        let mut state = RunState::default();

        let records = self.fetch(partition, &mut state).await?;
        report.fetched = records.len();

        let records = timed("filter", || strategy.filter_unnecessary(records, &state));
        report.eligible = records.len();

        let municipalities = self.store.municipalities(region).await?;
        let destination = self
            .store
            .active_records(partition.asset_type_id, &municipalities)
            .await?;
        info!(
            municipalities = municipalities.len(),
            records = destination.len(),
            "active destination records read"
        );

        let diff = timed("diff", || {
            diff_with(records, destination, |a| strategy.accepts_update(a, &state))
        })?;
        report.added = diff.added.len();
        report.updated = diff.updated.len();
        report.unchanged = diff.unchanged.len();
        report.updates_skipped = diff.skipped.len();
        info!(
            added = diff.added.len(),
            updated = diff.updated.len(),
            unchanged = diff.unchanged.len(),
            expired = diff.expired.len(),
            carried = diff.carried.len(),
            "diff computed"
        );
        if !diff.skipped.is_empty() {
            info!(count = diff.skipped.len(), "updates to unversioned records skipped");
        }

        let expired_ids: Vec<i64> = diff.expired.iter().map(|r| r.id).collect();
        report.expired = self.store.expire(&expired_ids, &self.writer).await?;

        let rewritten: Vec<SourceAsset> = diff.rewritten().cloned().collect();
        let rewritten_oids: HashSet<String> = rewritten.iter().map(|a| a.oid.clone()).collect();
        let DiffResult { added, replaced, .. } = diff;
        let mut pending = added;
        pending.extend(rewritten);
        if pending.is_empty() {
            info!(%report, "partition finished");
            return Ok(report);
        }

        let outcome = self.resolver.resolve(pending, &strategy).await?;
        report.unresolved = outcome.unresolved.len();

        let link_ids = referenced_links(&outcome.resolved);
        let links: HashMap<String, RoadLink> = self
            .store
            .public_road_links(&link_ids)
            .await?
            .into_iter()
            .map(|l| (l.link_id.clone(), l))
            .collect();
        let filtered = filter_locators(outcome.resolved, &links);
        report.missing_link = filtered.dropped.len();

        if strategy.needs_growth_direction() {
            let used_ids = referenced_links(&filtered.kept);
            let used: Vec<&RoadLink> = used_ids.iter().filter_map(|id| links.get(id)).collect();
            state.growth_by_link = self.resolver.growth_directions(&used).await?;
        }

        let rows = timed("placement", || {
            placement::build_rows(&strategy, &filtered.kept, &links, &state, &rewritten_oids, &replaced)
        });
        report.without_value = rows.without_value;
        report.held_back = rows.held_back;

        report.inserted = self
            .store
            .insert(partition.asset_type_id, &rows.inserts, &self.writer)
            .await?;
        report.superseded = self
            .store
            .supersede(partition.asset_type_id, &rows.supersedes, &self.writer)
            .await?;

        info!(%report, "partition finished");
        Ok(report)
    }

    async fn fetch(
        &self,
        partition: &Partition,
        state: &mut RunState,
    ) -> Result<Vec<SourceAsset>, SyncError> {
        let mut records = Vec::new();
        for path in &partition.source_paths {
            let raw = self
                .registry
                .fetch_records(&partition.region_code, path)
                .await
                .map_err(|source| SyncError::Registry {
                    path: path.clone(),
                    source,
                })?;
            for value in raw {
                let asset = SourceAsset::from_value(value)?;
                state
                    .source_path_by_oid
                    .insert(asset.oid.clone(), path.clone());
                records.push(asset);
            }
        }
        Ok(records)
    }
}
