use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::status::GroupKind;

/// Scalar item value pushed to Zabbix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Text(String),
    Integer(u64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Text(s) => write!(f, "{}", s),
            MetricValue::Integer(n) => write!(f, "{}", n),
        }
    }
}

impl From<&MetricValue> for serde_json::Value {
    fn from(value: &MetricValue) -> Self {
        match value {
            MetricValue::Text(s) => serde_json::Value::String(s.clone()),
            MetricValue::Integer(n) => serde_json::Value::from(*n),
        }
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Integer(value)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Integer(u64::from(value))
    }
}

/// Item key builders. Keys follow the Zabbix template: `name[param,param]`.
pub mod keys {
    use super::GroupKind;

    pub const ERROR_LIST: &str = "error_list";
    pub const REQUESTS_TOTAL: &str = "requests_total";
    pub const REQUESTS_CURRENT: &str = "requests_current";

    pub fn state(server: &str, group: &str) -> String {
        format!("state[{},{}]", server, group)
    }

    pub fn responses(class: &str, server: &str, group: &str) -> String {
        format!("responses_{}[{},{}]", class, server, group)
    }

    /// `overall_upstream_state[g]` / `overall_stream_state[g]`
    pub fn overall_state(kind: GroupKind, group: &str) -> String {
        format!("overall_{}_state[{}]", kind, group)
    }

    pub fn overall_upstream_up(group: &str) -> String {
        format!("overall_upstream_up[{}]", group)
    }
}

/// Flat item key -> value mapping produced by one `update_items` pass.
/// Setting a key twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricSet {
    items: BTreeMap<String, MetricValue>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) {
        self.items.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.items.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `{ "<host>": { "<key>": <value>, ... } }`, the shape handed to the sender
    pub fn namespaced(&self, host: &str) -> serde_json::Value {
        let items: serde_json::Map<_, _> = self
            .items
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
            .collect();

        let mut wrapper = serde_json::Map::new();
        wrapper.insert(host.to_string(), serde_json::Value::Object(items));
        serde_json::Value::Object(wrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_keys() {
        assert_eq!(keys::state("10.0.0.1:80", "web"), "state[10.0.0.1:80,web]");
        assert_eq!(
            keys::responses("2xx", "10.0.0.1:80", "web"),
            "responses_2xx[10.0.0.1:80,web]"
        );
        assert_eq!(
            keys::overall_state(GroupKind::Upstream, "web"),
            "overall_upstream_state[web]"
        );
        assert_eq!(
            keys::overall_state(GroupKind::Stream, "dns"),
            "overall_stream_state[dns]"
        );
        assert_eq!(keys::overall_upstream_up("web"), "overall_upstream_up[web]");
    }

    #[test]
    fn test_last_write_wins() {
        let mut set = MetricSet::new();
        set.insert("state[a,b]", "up");
        set.insert("state[a,b]", "down");

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("state[a,b]"), Some(&MetricValue::from("down")));
    }

    #[test]
    fn test_namespaced_shape() {
        let mut set = MetricSet::new();
        set.insert(keys::ERROR_LIST, "");
        set.insert(keys::REQUESTS_TOTAL, 42u64);
        set.insert(keys::overall_state(GroupKind::Upstream, "web"), true);

        let wrapped = set.namespaced("lb1.example.com");
        assert_eq!(wrapped["lb1.example.com"]["error_list"], "");
        assert_eq!(wrapped["lb1.example.com"]["requests_total"], 42);
        assert_eq!(wrapped["lb1.example.com"]["overall_upstream_state[web]"], 1);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(MetricValue::from(7u64).to_string(), "7");
        assert_eq!(MetricValue::from("up").to_string(), "up");
    }
}
