//! Read options, response metadata and the records the store serves.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Node the caller wants results sorted relative to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySource {
    pub datacenter: String,
    pub node: String,
}

/// Per-request options every store call takes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub datacenter: String,
    pub token: String,
    /// Block until the backing index exceeds this value.
    pub min_query_index: u64,
    /// Upper bound on a blocking wait. `None` uses the store default.
    pub max_query_time: Option<Duration>,
    pub allow_stale: bool,
    pub require_consistent: bool,
    pub node_meta_filters: BTreeMap<String, String>,
    pub source: QuerySource,
}

/// Metadata returned alongside every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryMeta {
    pub index: u64,
    pub last_contact: Duration,
    pub known_leader: bool,
}

/// A key/value entry. `Value` is base64 on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KvEntry {
    pub key: String,
    #[serde(serialize_with = "value_to_base64", deserialize_with = "value_from_base64")]
    pub value: Vec<u8>,
    pub flags: u64,
    pub create_index: u64,
    pub modify_index: u64,
}

/// A catalog node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    pub node: String,
    pub address: String,
    pub datacenter: String,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl Node {
    /// True when every filter pair is present in the node's metadata.
    pub fn matches_meta(&self, filters: &BTreeMap<String, String>) -> bool {
        filters
            .iter()
            .all(|(k, v)| self.meta.get(k).is_some_and(|have| have == v))
    }
}

fn value_to_base64<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(value))
}

fn value_from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_value_is_base64_on_the_wire() {
        let entry = KvEntry {
            key: "web/config".to_string(),
            value: b"hello".to_vec(),
            flags: 0,
            create_index: 3,
            modify_index: 4,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["Value"], "aGVsbG8=");
        assert_eq!(json["ModifyIndex"], 4);

        let back: KvEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.value, b"hello");
    }

    #[test]
    fn meta_filters_require_every_pair() {
        let mut meta = BTreeMap::new();
        meta.insert("rack".to_string(), "r1".to_string());
        meta.insert("zone".to_string(), "a".to_string());
        let node = Node {
            node: "n1".to_string(),
            address: "10.0.0.1".to_string(),
            datacenter: "dc1".to_string(),
            meta,
        };

        let mut filters = BTreeMap::new();
        assert!(node.matches_meta(&filters));
        filters.insert("rack".to_string(), "r1".to_string());
        assert!(node.matches_meta(&filters));
        filters.insert("zone".to_string(), "b".to_string());
        assert!(!node.matches_meta(&filters));
    }
}
