//! Running many partitions with failure isolation.

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tracing::{error, info};

use super::{PartitionReport, SyncEngine};
use crate::{error::SyncError, partition::Partition};

/// Receives one message per failed partition.
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    /// Called once for each partition that ended in an error.
    async fn partition_failed(&self, partition: &Partition, error: &SyncError);
}

/// Notifier that emits an `error` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl FailureNotifier for LogNotifier {
    async fn partition_failed(&self, partition: &Partition, error: &SyncError) {
        error!(
            region = %partition.region_code,
            asset_type = %partition.asset_type_name,
            kind = ?error.kind(),
            error = %error,
            "partition failed"
        );
    }
}

/// Result of one partition in a fan-out.
#[derive(Debug)]
pub struct PartitionOutcome {
    /// The partition that ran.
    pub partition: Partition,
    /// Its report, or the error that aborted it.
    pub result: Result<PartitionReport, SyncError>,
}

/// Runs `partitions` with at most `max_in_flight` at a time. A failed
/// partition is reported to `notifier` and does not stop the others.
/// Outcomes are returned in completion order.
pub async fn run_partitions(
    engine: &SyncEngine,
    partitions: Vec<Partition>,
    max_in_flight: usize,
    notifier: &dyn FailureNotifier,
) -> Vec<PartitionOutcome> {
    let total = partitions.len();
    let outcomes: Vec<PartitionOutcome> = stream::iter(partitions)
        .map(|partition| async move {
            let result = engine.run_partition(&partition).await;
            if let Err(e) = &result {
                notifier.partition_failed(&partition, e).await;
            }
            PartitionOutcome { partition, result }
        })
        .buffer_unordered(max_in_flight.max(1))
        .collect()
        .await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(total, failed, "partitions finished");
    outcomes
}
