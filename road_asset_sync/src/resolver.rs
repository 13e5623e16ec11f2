//! Road-address to network-link resolution through the converter.
//!
//! Requests are sent in batches of `batch_size`, with at most `max_in_flight`
//! batches outstanding. Every request carries a correlation token (the
//! asset's index in the input) which the converter echoes on each feature
//! derived from it. Items the converter reports as failed are dropped;
//! assets left without locators are reported, not treated as errors.

use std::{collections::HashMap, sync::Arc};

use futures::future::join_all;
use road_data_client::providers::{
    AddressConverter,
    converter::{ConversionFeature, ConversionRequest, ConvertedLocation},
};
use tracing::{debug, info, warn};

use crate::{
    error::SyncError,
    geometry::GrowthDirection,
    model::{LinkLocator, RoadLink, SideCode, SourceAsset},
    strategy::AssetTypeStrategy,
};

/// Request shape chosen by the strategy for one asset.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverRequest {
    /// One lookup; every located feature is a point locator.
    Point(ConversionRequest),
    /// Endpoint lookup followed by an interval search between the two links.
    Range(ConversionRequest),
}

/// An asset together with its locators.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAsset {
    /// The source record.
    pub asset: SourceAsset,
    /// Zero or more positions on the network.
    pub locators: Vec<LinkLocator>,
}

/// Result of [`RoadLinkResolver::resolve`].
#[derive(Debug, Default)]
pub struct ResolveOutcome {
    /// Assets with at least one locator.
    pub resolved: Vec<ResolvedAsset>,
    /// External ids of assets that produced no locator.
    pub unresolved: Vec<String>,
}

/// Batch and concurrency limits.
#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    /// Items per converter request.
    pub batch_size: usize,
    /// Requests in flight at once.
    pub max_in_flight: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_in_flight: 20,
        }
    }
}

/// Resolves assets to network positions.
pub struct RoadLinkResolver {
    converter: Arc<dyn AddressConverter>,
    settings: ResolverSettings,
}

impl RoadLinkResolver {
    /// Resolver sending requests to `converter`.
    pub fn new(converter: Arc<dyn AddressConverter>, settings: ResolverSettings) -> Self {
        Self {
            converter,
            settings,
        }
    }

    /// Resolves every asset the strategy can build a request for.
    pub async fn resolve<S>(
        &self,
        assets: Vec<SourceAsset>,
        strategy: &S,
    ) -> Result<ResolveOutcome, SyncError>
    where
        S: AssetTypeStrategy + ?Sized,
    {
        let mut points = Vec::new();
        let mut ranges = Vec::new();
        let mut unresolved = Vec::new();
        for (i, asset) in assets.iter().enumerate() {
            match strategy.build_resolver_request(asset, &i.to_string()) {
                Some(ResolverRequest::Point(r)) => points.push(r),
                Some(ResolverRequest::Range(r)) => ranges.push(r),
                None => {
                    warn!(oid = %asset.oid, "asset has no usable address or coordinates");
                }
            }
        }

        let mut by_token: HashMap<String, Vec<LinkLocator>> = HashMap::new();

        for loc in self.located(points).await? {
            by_token.entry(loc.token.clone()).or_default().push(LinkLocator {
                link_id: loc.link_id,
                start: loc.measure,
                end: None,
                municipality_code: loc.municipality_code,
                side_code: SideCode::Unknown,
            });
        }

        let intervals: Vec<ConversionRequest> = self
            .located(ranges)
            .await?
            .into_iter()
            .filter_map(|loc| match (&loc.end_link_id, loc.end_measure) {
                (Some(end_link), Some(end_m)) => Some(ConversionRequest::link_interval(
                    loc.token.clone(),
                    (&loc.link_id, loc.measure),
                    (end_link, end_m),
                )),
                _ => {
                    debug!(token = %loc.token, "endpoint lookup returned no end link");
                    None
                }
            })
            .collect();

        for loc in self.located(intervals).await? {
            let Some(end) = loc.end_measure else { continue };
            let (start, end) = if loc.measure <= end {
                (loc.measure, end)
            } else {
                (end, loc.measure)
            };
            if start == end {
                continue;
            }
            by_token.entry(loc.token.clone()).or_default().push(LinkLocator {
                link_id: loc.link_id,
                start,
                end: Some(end),
                municipality_code: loc.municipality_code,
                side_code: SideCode::Unknown,
            });
        }

        let mut resolved = Vec::with_capacity(assets.len());
        for (i, asset) in assets.into_iter().enumerate() {
            match by_token.remove(&i.to_string()) {
                Some(locators) if !locators.is_empty() => {
                    resolved.push(ResolvedAsset { asset, locators })
                }
                _ => unresolved.push(asset.oid),
            }
        }

        if !unresolved.is_empty() {
            warn!(
                count = unresolved.len(),
                oids = ?unresolved,
                "assets without any resolved link are skipped this run"
            );
        }
        info!(resolved = resolved.len(), "road links resolved");
        Ok(ResolveOutcome {
            resolved,
            unresolved,
        })
    }

    /// Road-address growth direction along each link's digitizing direction.
    ///
    /// Converts each link's first and last point to road addresses and compares
    /// them. Links whose endpoints do not both resolve are left out.
    pub async fn growth_directions(
        &self,
        links: &[&RoadLink],
    ) -> Result<HashMap<String, GrowthDirection>, SyncError> {
        let requests = links
            .iter()
            .enumerate()
            .flat_map(|(i, l)| {
                [
                    ConversionRequest::link_position(format!("{i}:start"), &l.link_id, 0.0),
                    ConversionRequest::link_position(format!("{i}:end"), &l.link_id, l.length),
                ]
            })
            .collect();

        let addresses: HashMap<String, (i64, i64)> = self
            .located(requests)
            .await?
            .into_iter()
            .filter_map(|loc| Some((loc.token, (loc.part?, loc.distance?))))
            .collect();

        let mut out = HashMap::new();
        for (i, link) in links.iter().enumerate() {
            let (Some(start), Some(end)) = (
                addresses.get(&format!("{i}:start")),
                addresses.get(&format!("{i}:end")),
            ) else {
                continue;
            };
            let growth = match end.cmp(start) {
                std::cmp::Ordering::Greater => GrowthDirection::Towards,
                std::cmp::Ordering::Less => GrowthDirection::Against,
                std::cmp::Ordering::Equal => continue,
            };
            out.insert(link.link_id.clone(), growth);
        }
        Ok(out)
    }

    async fn located(
        &self,
        requests: Vec<ConversionRequest>,
    ) -> Result<Vec<ConvertedLocation>, SyncError> {
        let mut failed = 0usize;
        let located = self
            .convert_all(&requests)
            .await?
            .into_iter()
            .filter_map(|f| match f {
                ConversionFeature::Located(l) => Some(l),
                ConversionFeature::Failed { token, message } => {
                    debug!(token = ?token, message, "converter could not locate item");
                    failed += 1;
                    None
                }
            })
            .collect();
        if failed > 0 {
            info!(failed, requested = requests.len(), "converter rejected some items");
        }
        Ok(located)
    }

    async fn convert_all(
        &self,
        requests: &[ConversionRequest],
    ) -> Result<Vec<ConversionFeature>, SyncError> {
        let batches: Vec<&[ConversionRequest]> =
            requests.chunks(self.settings.batch_size.max(1)).collect();
        let mut features = Vec::new();
        for wave in batches.chunks(self.settings.max_in_flight.max(1)) {
            let results = join_all(wave.iter().map(|b| self.converter.convert(b))).await;
            for r in results {
                features.extend(r.map_err(SyncError::Converter)?);
            }
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use road_data_client::errors::ClientError;

    use super::*;
    use crate::strategy::Strategy;

    /// Locates every point request on link `P<token>`; fails tokens listed in
    /// `reject`. Range requests return a start and end link, interval
    /// requests return two links.
    #[derive(Default)]
    struct ScriptedConverter {
        reject: Vec<String>,
        batch_sizes: Mutex<Vec<usize>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl AddressConverter for ScriptedConverter {
        async fn convert(
            &self,
            batch: &[ConversionRequest],
        ) -> Result<Vec<ConversionFeature>, ClientError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.batch_sizes.lock().unwrap().push(batch.len());

            let mut out = Vec::new();
            for r in batch {
                if self.reject.contains(&r.token) {
                    out.push(ConversionFeature::Failed {
                        token: Some(r.token.clone()),
                        message: "not found".into(),
                    });
                } else if r.interval_search == Some(true) {
                    for (link, m0, m1) in [("A", 5.0, 50.0), ("B", 30.0, 0.0)] {
                        out.push(ConversionFeature::Located(ConvertedLocation {
                            token: r.token.clone(),
                            link_id: link.into(),
                            measure: m0,
                            end_measure: Some(m1),
                            ..Default::default()
                        }));
                    }
                } else if r.end_part.is_some() {
                    out.push(ConversionFeature::Located(ConvertedLocation {
                        token: r.token.clone(),
                        link_id: "A".into(),
                        end_link_id: Some("B".into()),
                        measure: 5.0,
                        end_measure: Some(0.0),
                        ..Default::default()
                    }));
                } else {
                    out.push(ConversionFeature::Located(ConvertedLocation {
                        token: r.token.clone(),
                        link_id: format!("P{}", r.token),
                        measure: 12.5,
                        municipality_code: Some(91),
                        ..Default::default()
                    }));
                }
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(out)
        }
    }

    fn point(oid: &str) -> SourceAsset {
        SourceAsset::from_value(serde_json::json!({
            "oid": oid,
            "sijainti": {"tie": 1, "osa": 1, "etaisyys": 100},
            "keskilinjageometria": {"type": "Point", "coordinates": [1.0, 2.0, 0.0]}
        }))
        .unwrap()
    }

    fn linear(oid: &str) -> SourceAsset {
        SourceAsset::from_value(serde_json::json!({
            "oid": oid,
            "alkusijainti": {"tie": 1, "osa": 1, "etaisyys": 0},
            "loppusijainti": {"tie": 1, "osa": 1, "etaisyys": 500}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn batches_and_waves_are_bounded() {
        let conv = Arc::new(ScriptedConverter::default());
        let resolver = RoadLinkResolver::new(
            conv.clone(),
            ResolverSettings {
                batch_size: 50,
                max_in_flight: 20,
            },
        );
        let assets: Vec<_> = (0..1234).map(|i| point(&format!("o{i}"))).collect();
        let out = resolver.resolve(assets, &Strategy::Point).await.unwrap();

        assert_eq!(out.resolved.len(), 1234);
        assert!(out.unresolved.is_empty());
        let sizes = conv.batch_sizes.lock().unwrap().clone();
        assert_eq!(sizes.len(), 25);
        assert!(sizes.iter().all(|&s| s <= 50));
        assert!(conv.peak.load(Ordering::SeqCst) <= 20);

        // correlation by token
        let r = &out.resolved[17];
        assert_eq!(r.asset.oid, "o17");
        assert_eq!(r.locators[0].link_id, "P17");
        assert_eq!(r.locators[0].end, None);
    }

    #[tokio::test]
    async fn error_only_responses_yield_no_locators() {
        let conv = Arc::new(ScriptedConverter {
            reject: vec!["1".into()],
            ..Default::default()
        });
        let resolver = RoadLinkResolver::new(conv, ResolverSettings::default());
        let out = resolver
            .resolve(vec![point("a"), point("b")], &Strategy::Point)
            .await
            .unwrap();
        assert_eq!(out.resolved.len(), 1);
        assert_eq!(out.unresolved, vec!["b"]);
    }

    #[tokio::test]
    async fn ranges_expand_to_every_traversed_link() {
        let conv = Arc::new(ScriptedConverter::default());
        let resolver = RoadLinkResolver::new(conv, ResolverSettings::default());
        let out = resolver
            .resolve(vec![linear("l1")], &Strategy::Linear)
            .await
            .unwrap();
        let locs = &out.resolved[0].locators;
        assert_eq!(locs.len(), 2);
        assert_eq!((locs[0].start, locs[0].end), (5.0, Some(50.0)));
        // reversed measures are normalized
        assert_eq!((locs[1].start, locs[1].end), (0.0, Some(30.0)));
    }

    #[tokio::test]
    async fn assets_without_address_are_unresolved() {
        let conv = Arc::new(ScriptedConverter::default());
        let resolver = RoadLinkResolver::new(conv, ResolverSettings::default());
        let bare = SourceAsset::from_value(serde_json::json!({"oid": "x"})).unwrap();
        let out = resolver.resolve(vec![bare], &Strategy::Point).await.unwrap();
        assert_eq!(out.unresolved, vec!["x"]);
    }
}
