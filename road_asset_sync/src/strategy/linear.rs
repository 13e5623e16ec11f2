use crate::{
    model::{OutputValue, SourceAsset},
    resolver::ResolverRequest,
};

use super::{AssetTypeStrategy, RunState, range_request, with_valid_status};

/// Generic linear asset. Side codes come from the link; segments of the same
/// record on one link are merged when they touch.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearStrategy;

impl AssetTypeStrategy for LinearStrategy {
    fn filter_unnecessary(&self, records: Vec<SourceAsset>, _state: &RunState) -> Vec<SourceAsset> {
        with_valid_status(records)
    }

    fn build_resolver_request(&self, asset: &SourceAsset, token: &str) -> Option<ResolverRequest> {
        range_request(asset, token)
    }

    fn derive_output_value(&self, asset: &SourceAsset, _state: &RunState) -> Option<OutputValue> {
        Some(OutputValue::ExternalId(asset.oid.clone()))
    }

    fn merges_segments(&self) -> bool {
        true
    }
}
