//! Fetch-transform-emit passes over the NGINX Plus status API.
//!
//! Every public operation is a single stateless pass: fetch, shape, emit. No
//! operation returns an error to its caller; failures are folded into
//! [`Listing`] / [`UpdateOutcome`] so the binary can print and exit 0 while
//! callers can still tell "no data" from "fetch failed".

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::adapters::{MetricSender, SenderSummary, StatusSource};
use crate::config::{AppConfig, MissingCounters};
use crate::domain::{
    keys, DiscoveryEnvelope, DiscoveryRecord, GroupKind, MetricSet, PeerGroup, RequestCounters,
};
use crate::error::{Result, StatusError};

/// Result of a discovery check
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Listing {
    pub records: Vec<DiscoveryRecord>,
    /// Set when the fetch or decode failed; `records` is empty then
    pub failure: Option<String>,
}

impl Listing {
    pub fn found(records: Vec<DiscoveryRecord>) -> Self {
        Self {
            records,
            failure: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            failure: Some(reason.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Output form; a failed listing prints as an empty `data` array
    pub fn into_envelope(self) -> DiscoveryEnvelope {
        DiscoveryEnvelope { data: self.records }
    }
}

/// Result of an `update_items` pass
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Items were handed to the sender
    Submitted { items: usize, summary: SenderSummary },
    /// Dry run: the `{host: {key: value}}` payload that would have been pushed
    DryRun { payload: Value },
    /// Nothing was pushed
    Failed { reason: String },
}

impl UpdateOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, UpdateOutcome::Failed { .. })
    }
}

/// Knobs of the update pass
#[derive(Debug, Clone, Default)]
pub struct UpdateSettings {
    /// Zabbix host name the items are filed under
    pub sender_host: Option<String>,
    pub missing_counters: MissingCounters,
    pub dry_run: bool,
}

impl UpdateSettings {
    pub fn from_config(cfg: &AppConfig, dry_run: bool) -> Self {
        Self {
            sender_host: cfg.metrics.sender.clone(),
            missing_counters: cfg.metrics.missing_counters,
            dry_run,
        }
    }
}

pub struct StatusAdapter {
    source: Arc<dyn StatusSource>,
    sender: Arc<dyn MetricSender>,
    settings: UpdateSettings,
}

impl StatusAdapter {
    pub fn new(
        source: Arc<dyn StatusSource>,
        sender: Arc<dyn MetricSender>,
        settings: UpdateSettings,
    ) -> Self {
        Self {
            source,
            sender,
            settings,
        }
    }

    /// One record per (upstream, peer server); repeated pairs keep the first peer
    pub async fn list_upstreams(&self) -> Listing {
        listing("list_upstreams", self.source.http_upstreams().await, |groups| {
            peer_records(groups, true)
        })
    }

    /// One record per stream peer. Unlike `list_upstreams` no pair is collapsed.
    pub async fn list_streams(&self) -> Listing {
        listing("list_streams", self.source.stream_upstreams().await, |groups| {
            peer_records(groups, false)
        })
    }

    pub async fn short_list_upstreams(&self) -> Listing {
        listing(
            "short_list_upstreams",
            self.source.http_upstreams().await,
            group_records,
        )
    }

    pub async fn short_list_streams(&self) -> Listing {
        listing(
            "short_list_streams",
            self.source.stream_upstreams().await,
            group_records,
        )
    }

    /// Full metrics pass. Any failure aborts the pass before anything is pushed.
    pub async fn update_items(&self) -> UpdateOutcome {
        match self.try_update_items().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("update_items failed: {}", e);
                UpdateOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_update_items(&self) -> Result<UpdateOutcome> {
        let host = self
            .settings
            .sender_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                StatusError::Validation("no sender host configured (--sender)".to_string())
            })?;

        let items = self.collect_items().await?;

        if self.settings.dry_run {
            info!("Dry run: {} items for {} not pushed", items.len(), host);
            return Ok(UpdateOutcome::DryRun {
                payload: items.namespaced(host),
            });
        }

        let summary = self.sender.send(host, &items).await?;
        info!(
            "Pushed {} items for {} (processed={}, failed={})",
            items.len(),
            host,
            summary.processed,
            summary.failed
        );

        Ok(UpdateOutcome::Submitted {
            items: items.len(),
            summary,
        })
    }

    /// Fetch all three resources and build the flat item map.
    ///
    /// An API error document on a resource skips that resource (stream
    /// upstreams are absent on many targets); transport and decode errors
    /// abort.
    pub async fn collect_items(&self) -> Result<MetricSet> {
        let mut items = MetricSet::new();
        let mut no_peers = Vec::new();

        match self.source.http_upstreams().await {
            Ok(groups) => group_items(&groups, &mut items, &mut no_peers)?,
            Err(e) if e.is_api_error() => warn!("Skipping HTTP upstreams: {}", e),
            Err(e) => return Err(e),
        }

        match self.source.stream_upstreams().await {
            Ok(groups) => group_items(&groups, &mut items, &mut no_peers)?,
            Err(e) if e.is_api_error() => debug!("Skipping stream upstreams: {}", e),
            Err(e) => return Err(e),
        }

        items.insert(keys::ERROR_LIST, no_peers.join(", "));

        let counters = match self.source.http_requests().await {
            Ok(counters) => Some(counters),
            Err(e) if e.is_api_error() => {
                warn!("Request counters unavailable: {}", e);
                match self.settings.missing_counters {
                    MissingCounters::Zero => Some(RequestCounters::default()),
                    MissingCounters::Omit => None,
                }
            }
            Err(e) => return Err(e),
        };

        if let Some(counters) = counters {
            items.insert(keys::REQUESTS_TOTAL, counters.total);
            items.insert(keys::REQUESTS_CURRENT, counters.current);
        }

        Ok(items)
    }
}

fn listing(
    check: &str,
    fetched: Result<Vec<PeerGroup>>,
    shape: impl FnOnce(&[PeerGroup]) -> Vec<DiscoveryRecord>,
) -> Listing {
    match fetched {
        Ok(groups) => {
            let records = shape(&groups);
            debug!("{}: {} records from {} groups", check, records.len(), groups.len());
            Listing::found(records)
        }
        Err(e) => {
            warn!("{} failed: {}", check, e);
            Listing::failed(e.to_string())
        }
    }
}

/// Peer-level discovery rows for every group that has peers
pub fn peer_records(groups: &[PeerGroup], dedup: bool) -> Vec<DiscoveryRecord> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut records = Vec::new();

    for group in groups.iter().filter(|g| g.has_peers()) {
        for peer in &group.peers {
            if dedup && !seen.insert((group.name.as_str(), peer.server.as_str())) {
                continue;
            }
            records.push(DiscoveryRecord::for_peer(group, peer));
        }
    }

    records
}

/// Group-level discovery rows for every group that has peers
pub fn group_records(groups: &[PeerGroup]) -> Vec<DiscoveryRecord> {
    groups
        .iter()
        .filter(|g| g.has_peers())
        .map(DiscoveryRecord::for_group)
        .collect()
}

/// Items for one upstreams document. Groups without peers are reported in
/// `no_peers` instead.
pub fn group_items(
    groups: &[PeerGroup],
    items: &mut MetricSet,
    no_peers: &mut Vec<String>,
) -> Result<()> {
    for group in groups {
        if !group.has_peers() {
            no_peers.push(group.no_peers_message());
            continue;
        }

        let mut peers_up = 0u64;
        for peer in &group.peers {
            if peer.is_up() {
                peers_up += 1;
            }
            items.insert(keys::state(&peer.server, &group.name), peer.state.as_str());

            if group.kind == GroupKind::Upstream {
                let responses = peer.responses.ok_or_else(|| {
                    StatusError::Validation(format!(
                        "peer {} of upstream {} has no responses",
                        peer.server, group.name
                    ))
                })?;
                for (class, count) in responses.iter() {
                    items.insert(keys::responses(class, &peer.server, &group.name), count);
                }
            }
        }

        let all_down = peers_up == 0;
        items.insert(keys::overall_state(group.kind, &group.name), all_down);
        if group.kind == GroupKind::Upstream {
            items.insert(keys::overall_upstream_up(&group.name), peers_up);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockMetricSender, MockStatusSource};
    use crate::domain::MetricValue;
    use serde_json::json;

    fn http_doc() -> Vec<PeerGroup> {
        PeerGroup::parse_document(
            GroupKind::Upstream,
            json!({
                "web": {"zone": "z1", "peers": [
                    {"id": 0, "server": "10.0.0.1:80", "name": "p1", "state": "up",
                     "responses": {"1xx": 0, "2xx": 100, "3xx": 0, "4xx": 2, "5xx": 0}},
                    {"id": 1, "server": "10.0.0.2:80", "name": "p2", "state": "down",
                     "responses": {"1xx": 0, "2xx": 7, "3xx": 1, "4xx": 0, "5xx": 3}},
                    {"id": 2, "server": "10.0.0.1:80", "name": "p1-dup", "state": "up",
                     "responses": {"1xx": 0, "2xx": 0, "3xx": 0, "4xx": 0, "5xx": 0}}
                ]},
                "empty": {"zone": "z2", "peers": []},
                "dead": {"zone": "z3", "peers": [
                    {"id": 0, "server": "10.0.1.1:80", "name": "d1", "state": "unavail",
                     "responses": {"1xx": 0, "2xx": 0, "3xx": 0, "4xx": 0, "5xx": 9}}
                ]}
            }),
        )
        .unwrap()
    }

    fn stream_doc() -> Vec<PeerGroup> {
        PeerGroup::parse_document(
            GroupKind::Stream,
            json!({
                "dns": {"zone": "dns", "peers": [
                    {"id": 0, "server": "10.0.0.53:53", "name": "ns1", "state": "up"},
                    {"id": 1, "server": "10.0.0.53:53", "name": "ns1", "state": "up"}
                ]},
                "tcp_empty": {"zone": "t", "peers": []}
            }),
        )
        .unwrap()
    }

    fn api_error(path: &str) -> StatusError {
        StatusError::Api {
            path: path.to_string(),
            status: 404,
            text: "path not found".to_string(),
        }
    }

    fn unreachable() -> StatusError {
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused").into()
    }

    fn settings(host: Option<&str>) -> UpdateSettings {
        UpdateSettings {
            sender_host: host.map(str::to_string),
            ..Default::default()
        }
    }

    fn healthy_source() -> MockStatusSource {
        let mut source = MockStatusSource::new();
        source.expect_http_upstreams().returning(|| Ok(http_doc()));
        source.expect_stream_upstreams().returning(|| Ok(stream_doc()));
        source
            .expect_http_requests()
            .returning(|| Ok(RequestCounters { total: 5000, current: 4 }));
        source
    }

    fn adapter(source: MockStatusSource, sender: MockMetricSender, s: UpdateSettings) -> StatusAdapter {
        StatusAdapter::new(Arc::new(source), Arc::new(sender), s)
    }

    #[tokio::test]
    async fn test_list_upstreams_dedups_by_group_and_server() {
        let adapter = adapter(healthy_source(), MockMetricSender::new(), settings(None));
        let listing = adapter.list_upstreams().await;

        assert!(!listing.is_failed());
        let rows: Vec<_> = listing
            .records
            .iter()
            .map(|r| serde_json::to_value(r).unwrap())
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["{#UPSTREAMNAME}"], "p1");
        assert_eq!(rows[1]["{#UPSTREAMSRV}"], "10.0.0.2:80");
        assert_eq!(rows[2]["{#UPSTREAM}"], "dead");
        assert!(rows.iter().all(|r| r["{#UPSTREAM}"] != "empty"));
    }

    #[tokio::test]
    async fn test_list_streams_keeps_duplicates() {
        let adapter = adapter(healthy_source(), MockMetricSender::new(), settings(None));
        let listing = adapter.list_streams().await;

        assert_eq!(listing.records.len(), 2);
        assert!(listing.records.iter().all(|r| r.group() == "dns"));
    }

    #[tokio::test]
    async fn test_short_lists_skip_empty_groups() {
        let adapter = adapter(healthy_source(), MockMetricSender::new(), settings(None));

        let upstreams = adapter.short_list_upstreams().await;
        let names: Vec<_> = upstreams.records.iter().map(|r| r.group()).collect();
        assert_eq!(names, vec!["web", "dead"]);

        let streams = adapter.short_list_streams().await;
        assert_eq!(
            serde_json::to_string(&streams.into_envelope()).unwrap(),
            r#"{"data":[{"{#STREAMSHORT}":"dns"}]}"#
        );
    }

    #[tokio::test]
    async fn test_listing_failure_is_empty_with_reason() {
        let mut source = MockStatusSource::new();
        source.expect_http_upstreams().returning(|| Err(unreachable()));
        let adapter = adapter(source, MockMetricSender::new(), settings(None));

        let listing = adapter.list_upstreams().await;
        assert!(listing.is_failed());
        assert!(listing.is_empty());
        assert_eq!(
            listing.into_envelope().to_json().unwrap(),
            r#"{"data":[]}"#
        );
    }

    #[tokio::test]
    async fn test_listing_no_groups_is_not_a_failure() {
        let mut source = MockStatusSource::new();
        source.expect_stream_upstreams().returning(|| Ok(Vec::new()));
        let adapter = adapter(source, MockMetricSender::new(), settings(None));

        let listing = adapter.short_list_streams().await;
        assert!(listing.is_empty());
        assert!(!listing.is_failed());
    }

    #[test]
    fn test_group_items_shapes_upstreams() {
        let mut items = MetricSet::new();
        let mut no_peers = Vec::new();
        group_items(&http_doc(), &mut items, &mut no_peers).unwrap();

        assert_eq!(items.get("state[10.0.0.1:80,web]"), Some(&MetricValue::from("up")));
        assert_eq!(items.get("state[10.0.0.2:80,web]"), Some(&MetricValue::from("down")));
        assert_eq!(items.get("responses_5xx[10.0.0.2:80,web]"), Some(&MetricValue::from(3u64)));
        assert_eq!(items.get("overall_upstream_state[web]"), Some(&MetricValue::from(0u64)));
        assert_eq!(items.get("overall_upstream_state[dead]"), Some(&MetricValue::from(1u64)));
        assert_eq!(items.get("overall_upstream_up[web]"), Some(&MetricValue::from(2u64)));
        assert_eq!(items.get("overall_upstream_up[dead]"), Some(&MetricValue::from(0u64)));
        assert!(!items.contains_key("overall_upstream_state[empty]"));
        assert_eq!(no_peers, vec!["upstream empty has no peers".to_string()]);
    }

    #[test]
    fn test_group_items_streams_have_no_responses() {
        let mut items = MetricSet::new();
        let mut no_peers = Vec::new();
        group_items(&stream_doc(), &mut items, &mut no_peers).unwrap();

        assert_eq!(items.get("state[10.0.0.53:53,dns]"), Some(&MetricValue::from("up")));
        assert_eq!(items.get("overall_stream_state[dns]"), Some(&MetricValue::from(0u64)));
        assert!(items.iter().all(|(k, _)| !k.starts_with("responses_")));
        assert!(!items.contains_key("overall_upstream_up[dns]"));
        assert_eq!(no_peers, vec!["stream tcp_empty has no peers".to_string()]);
    }

    #[test]
    fn test_upstream_peer_without_responses_is_malformed() {
        let mut groups = http_doc();
        groups[0].peers[1].responses = None;

        let err = group_items(&groups, &mut MetricSet::new(), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("10.0.0.2:80"));
    }

    #[tokio::test]
    async fn test_update_items_pushes_under_sender_host() {
        let mut sender = MockMetricSender::new();
        sender
            .expect_send()
            .times(1)
            .withf(|host, items| {
                host == "lb1.example.com"
                    && items.get("error_list")
                        == Some(&MetricValue::from(
                            "upstream empty has no peers, stream tcp_empty has no peers",
                        ))
                    && items.get("requests_total") == Some(&MetricValue::from(5000u64))
                    && items.get("requests_current") == Some(&MetricValue::from(4u64))
            })
            .returning(|_, items| {
                Ok(SenderSummary {
                    processed: items.len() as u64,
                    total: items.len() as u64,
                    ..Default::default()
                })
            });

        let adapter = adapter(healthy_source(), sender, settings(Some("lb1.example.com")));
        match adapter.update_items().await {
            UpdateOutcome::Submitted { items, summary } => {
                assert_eq!(summary.processed, items as u64);
                assert_eq!(summary.failed, 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_items_error_list_empty_when_all_groups_have_peers() {
        let mut source = MockStatusSource::new();
        source.expect_http_upstreams().returning(|| {
            let mut groups = http_doc();
            groups.retain(|g| g.has_peers());
            Ok(groups)
        });
        source.expect_stream_upstreams().returning(|| Ok(Vec::new()));
        source
            .expect_http_requests()
            .returning(|| Ok(RequestCounters::default()));

        let adapter = adapter(source, MockMetricSender::new(), settings(Some("lb1")));
        let items = adapter.collect_items().await.unwrap();
        assert_eq!(items.get("error_list"), Some(&MetricValue::from("")));
    }

    #[tokio::test]
    async fn test_update_items_unreachable_pushes_nothing() {
        let mut source = MockStatusSource::new();
        source.expect_http_upstreams().returning(|| Err(unreachable()));
        source.expect_stream_upstreams().never();
        let mut sender = MockMetricSender::new();
        sender.expect_send().never();

        let adapter = adapter(source, sender, settings(Some("lb1")));
        let outcome = adapter.update_items().await;
        assert!(outcome.is_failed());
    }

    #[tokio::test]
    async fn test_update_items_malformed_stream_doc_pushes_nothing() {
        let mut source = MockStatusSource::new();
        source.expect_http_upstreams().returning(|| Ok(http_doc()));
        source.expect_stream_upstreams().returning(|| {
            let err = serde_json::from_str::<Value>("{not json").unwrap_err();
            Err(err.into())
        });
        let mut sender = MockMetricSender::new();
        sender.expect_send().never();

        let adapter = adapter(source, sender, settings(Some("lb1")));
        assert!(adapter.update_items().await.is_failed());
    }

    #[tokio::test]
    async fn test_update_items_skips_absent_streams() {
        let mut source = MockStatusSource::new();
        source.expect_http_upstreams().returning(|| Ok(http_doc()));
        source
            .expect_stream_upstreams()
            .returning(|| Err(api_error("api/3/stream/upstreams")));
        source
            .expect_http_requests()
            .returning(|| Ok(RequestCounters { total: 1, current: 1 }));

        let adapter = adapter(source, MockMetricSender::new(), settings(Some("lb1")));
        let items = adapter.collect_items().await.unwrap();
        assert!(items.contains_key("overall_upstream_state[web]"));
        assert!(items.iter().all(|(k, _)| !k.starts_with("overall_stream_state")));
        assert_eq!(
            items.get("error_list"),
            Some(&MetricValue::from("upstream empty has no peers"))
        );
    }

    #[tokio::test]
    async fn test_missing_counters_zero_or_omit() {
        fn source() -> MockStatusSource {
            let mut source = MockStatusSource::new();
            source.expect_http_upstreams().returning(|| Ok(Vec::new()));
            source.expect_stream_upstreams().returning(|| Ok(Vec::new()));
            source
                .expect_http_requests()
                .returning(|| Err(api_error("api/3/http/requests")));
            source
        }

        let zero = adapter(source(), MockMetricSender::new(), settings(Some("lb1")));
        let items = zero.collect_items().await.unwrap();
        assert_eq!(items.get("requests_total"), Some(&MetricValue::from(0u64)));
        assert_eq!(items.get("requests_current"), Some(&MetricValue::from(0u64)));

        let omit_settings = UpdateSettings {
            sender_host: Some("lb1".to_string()),
            missing_counters: MissingCounters::Omit,
            dry_run: false,
        };
        let omit = adapter(source(), MockMetricSender::new(), omit_settings);
        let items = omit.collect_items().await.unwrap();
        assert!(!items.contains_key("requests_total"));
        assert!(!items.contains_key("requests_current"));
        assert!(items.contains_key("error_list"));
    }

    #[tokio::test]
    async fn test_update_items_requires_sender_host() {
        let mut source = MockStatusSource::new();
        source.expect_http_upstreams().never();
        let mut sender = MockMetricSender::new();
        sender.expect_send().never();

        let adapter = adapter(source, sender, settings(Some("  ")));
        match adapter.update_items().await {
            UpdateOutcome::Failed { reason } => assert!(reason.contains("--sender")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_items_sender_failure_is_swallowed() {
        let mut sender = MockMetricSender::new();
        sender
            .expect_send()
            .times(1)
            .returning(|_, _| Err(StatusError::Sender("connect refused".to_string())));

        let adapter = adapter(healthy_source(), sender, settings(Some("lb1")));
        assert!(adapter.update_items().await.is_failed());
    }

    #[tokio::test]
    async fn test_update_items_dry_run_wraps_under_host() {
        let mut sender = MockMetricSender::new();
        sender.expect_send().never();

        let dry = UpdateSettings {
            sender_host: Some("lb1".to_string()),
            dry_run: true,
            ..Default::default()
        };
        let adapter = adapter(healthy_source(), sender, dry);
        match adapter.update_items().await {
            UpdateOutcome::DryRun { payload } => {
                assert_eq!(payload["lb1"]["state[10.0.0.1:80,web]"], "up");
                // p1-dup shares p1's server, its counts land last
                assert_eq!(payload["lb1"]["responses_2xx[10.0.0.1:80,web]"], 0);
                assert_eq!(payload["lb1"]["overall_stream_state[dns]"], 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
