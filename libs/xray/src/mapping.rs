//! Inbound → outbound mapping table.

use serde::ser::{Serialize, SerializeMap, Serializer};
use subgen_networking::ListenerPair;
use subgen_subscription::NodeRecord;

/// One row: a node's listener pair and the outbound it forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub socks_tag: String,
    pub http_tag: String,
    pub outbound_tag: String,
}

impl MappingEntry {
    /// `"<socks_tag> / <http_tag>"`.
    pub fn key(&self) -> String {
        format!("{} / {}", self.socks_tag, self.http_tag)
    }
}

/// Ordered mapping, one entry per node in node order.
///
/// Serializes as a JSON object whose key order is the node order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
}

impl MappingTable {
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outbound tag for a mapping key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key() == key)
            .map(|e| e.outbound_tag.as_str())
    }

    /// `(key, outbound_tag)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (String, &str)> {
        self.entries
            .iter()
            .map(|e| (e.key(), e.outbound_tag.as_str()))
    }
}

impl Serialize for MappingTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.key(), &entry.outbound_tag)?;
        }
        map.end()
    }
}

/// Build the mapping for the same inputs the assembler consumes.
pub fn build_mapping(nodes: &[NodeRecord], pairs: &[ListenerPair]) -> MappingTable {
    MappingTable {
        entries: nodes
            .iter()
            .zip(pairs)
            .map(|(node, pair)| MappingEntry {
                socks_tag: pair.socks_tag.clone(),
                http_tag: pair.http_tag.clone(),
                outbound_tag: node.display_name.clone(),
            })
            .collect(),
    }
}
