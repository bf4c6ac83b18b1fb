//! Zabbix low-level discovery records.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::status::{GroupKind, Peer, PeerGroup};

/// One LLD row. Serializes to an object of `{#MACRO}` keys, e.g.
/// `{"{#UPSTREAM}":"web","{#UPSTREAMPEER}":0,...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryRecord {
    /// One row per (group, peer)
    Peer {
        kind: GroupKind,
        group: String,
        peer_id: i64,
        server: String,
        name: String,
        zone: String,
    },
    /// One row per group (`short_list_*` checks)
    Group { kind: GroupKind, group: String },
}

impl DiscoveryRecord {
    pub fn for_peer(group: &PeerGroup, peer: &Peer) -> Self {
        DiscoveryRecord::Peer {
            kind: group.kind,
            group: group.name.clone(),
            peer_id: peer.id,
            server: peer.server.clone(),
            name: peer.name.clone(),
            zone: group.zone.clone(),
        }
    }

    pub fn for_group(group: &PeerGroup) -> Self {
        DiscoveryRecord::Group {
            kind: group.kind,
            group: group.name.clone(),
        }
    }

    pub fn group(&self) -> &str {
        match self {
            DiscoveryRecord::Peer { group, .. } | DiscoveryRecord::Group { group, .. } => group,
        }
    }
}

fn lld_macro(kind: GroupKind, suffix: &str) -> String {
    format!("{{#{}{}}}", kind.macro_prefix(), suffix)
}

impl Serialize for DiscoveryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DiscoveryRecord::Peer {
                kind,
                group,
                peer_id,
                server,
                name,
                zone,
            } => {
                let mut map = serializer.serialize_map(Some(5))?;
                map.serialize_entry(&lld_macro(*kind, ""), group)?;
                map.serialize_entry(&lld_macro(*kind, "PEER"), peer_id)?;
                map.serialize_entry(&lld_macro(*kind, "SRV"), server)?;
                map.serialize_entry(&lld_macro(*kind, "NAME"), name)?;
                map.serialize_entry(&lld_macro(*kind, "ZONE"), zone)?;
                map.end()
            }
            DiscoveryRecord::Group { kind, group } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(&lld_macro(*kind, "SHORT"), group)?;
                map.end()
            }
        }
    }
}

/// `{"data": [...]}` wrapper Zabbix expects from a discovery rule
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryEnvelope {
    pub data: Vec<DiscoveryRecord>,
}

impl DiscoveryEnvelope {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_group() -> PeerGroup {
        PeerGroup {
            kind: GroupKind::Upstream,
            name: "web".to_string(),
            zone: "z1".to_string(),
            peers: vec![Peer {
                id: 0,
                server: "10.0.0.1:80".to_string(),
                name: "p1".to_string(),
                state: "up".to_string(),
                responses: None,
            }],
        }
    }

    #[test]
    fn test_peer_record_json() {
        let group = web_group();
        let record = DiscoveryRecord::for_peer(&group, &group.peers[0]);

        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"{#UPSTREAM}":"web","{#UPSTREAMPEER}":0,"{#UPSTREAMSRV}":"10.0.0.1:80","{#UPSTREAMNAME}":"p1","{#UPSTREAMZONE}":"z1"}"#
        );
    }

    #[test]
    fn test_stream_macros() {
        let mut group = web_group();
        group.kind = GroupKind::Stream;
        let record = DiscoveryRecord::for_peer(&group, &group.peers[0]);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["{#STREAM}"], "web");
        assert_eq!(json["{#STREAMSRV}"], "10.0.0.1:80");
        assert!(json.get("{#UPSTREAM}").is_none());
    }

    #[test]
    fn test_short_record_and_envelope() {
        let envelope = DiscoveryEnvelope {
            data: vec![DiscoveryRecord::for_group(&web_group())],
        };
        assert_eq!(
            envelope.to_json().unwrap(),
            r#"{"data":[{"{#UPSTREAMSHORT}":"web"}]}"#
        );
    }

    #[test]
    fn test_empty_envelope() {
        assert_eq!(DiscoveryEnvelope::default().to_json().unwrap(), r#"{"data":[]}"#);
    }
}
