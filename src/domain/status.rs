//! Typed views of the NGINX Plus status documents.
//!
//! The API returns upstream groups as a JSON object keyed by group name. Group
//! order matters for discovery output, so documents are walked as an ordered
//! map (serde_json `preserve_order`) and each entry is decoded on its own.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StatusError};

/// Which family of upstreams a group belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// `http { upstream ... }` groups
    Upstream,
    /// `stream { upstream ... }` groups (TCP/UDP)
    Stream,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Upstream => "upstream",
            GroupKind::Stream => "stream",
        }
    }

    /// Prefix of the low-level discovery macros, e.g. `{#UPSTREAMSRV}`
    pub fn macro_prefix(&self) -> &'static str {
        match self {
            GroupKind::Upstream => "UPSTREAM",
            GroupKind::Stream => "STREAM",
        }
    }

    /// Resource path relative to `api/<version>/`
    pub fn resource(&self) -> &'static str {
        match self {
            GroupKind::Upstream => "http/upstreams",
            GroupKind::Stream => "stream/upstreams",
        }
    }
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response counts per status class for one HTTP peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseClasses {
    #[serde(rename = "1xx")]
    pub informational: u64,
    #[serde(rename = "2xx")]
    pub success: u64,
    #[serde(rename = "3xx")]
    pub redirection: u64,
    #[serde(rename = "4xx")]
    pub client_error: u64,
    #[serde(rename = "5xx")]
    pub server_error: u64,
}

impl ResponseClasses {
    /// Status-class label paired with its count, in class order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> {
        [
            ("1xx", self.informational),
            ("2xx", self.success),
            ("3xx", self.redirection),
            ("4xx", self.client_error),
            ("5xx", self.server_error),
        ]
        .into_iter()
    }
}

/// One upstream server as reported by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub id: i64,
    /// Resolved address, e.g. `10.0.0.1:80`
    pub server: String,
    /// Server name as written in the configuration
    pub name: String,
    /// `up`, `down`, `unavail`, `unhealthy`, `checking`, `draining`, ...
    pub state: String,
    /// Only present for HTTP peers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responses: Option<ResponseClasses>,
}

impl Peer {
    pub fn is_up(&self) -> bool {
        self.state == "up"
    }
}

#[derive(Debug, Deserialize)]
struct GroupBody {
    #[serde(default)]
    zone: String,
    peers: Vec<Peer>,
}

/// An upstream group and its peers, in document order. `kind` tells an
/// `api/N/http/upstreams` entry from an `api/N/stream/upstreams` one.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerGroup {
    pub kind: GroupKind,
    pub name: String,
    pub zone: String,
    pub peers: Vec<Peer>,
}

impl PeerGroup {
    pub fn has_peers(&self) -> bool {
        !self.peers.is_empty()
    }

    /// Line reported through `error_list` for a group without peers
    pub fn no_peers_message(&self) -> String {
        format!("{} {} has no peers", self.kind, self.name)
    }

    /// Decode a whole upstreams document, keeping group order
    pub fn parse_document(kind: GroupKind, document: Value) -> Result<Vec<PeerGroup>> {
        let Value::Object(groups) = document else {
            return Err(StatusError::Validation(format!(
                "{} document is not a JSON object",
                kind.resource()
            )));
        };

        groups
            .into_iter()
            .map(|(name, body)| -> Result<PeerGroup> {
                let body: GroupBody = serde_json::from_value(body)?;
                Ok(PeerGroup {
                    kind,
                    name,
                    zone: body.zone,
                    peers: body.peers,
                })
            })
            .collect()
    }
}

/// `api/N/http/requests`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestCounters {
    /// Client requests since NGINX start (or last reload of statistics)
    pub total: u64,
    /// Requests currently being processed
    pub current: u64,
}

impl RequestCounters {
    pub fn parse_document(document: Value) -> Result<Self> {
        Ok(serde_json::from_value(document)?)
    }
}
