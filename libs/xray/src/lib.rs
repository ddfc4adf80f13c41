//! xray client configuration assembly.
//!
//! Given the decoded nodes of a vmess subscription, this library builds:
//! - one SOCKS5 and one HTTP inbound per node, on sequential local ports;
//! - one vmess outbound per node, plus `direct` and `block`;
//! - an ordered, first-match-wins routing table whose fixed prelude precedes
//!   one rule per node;
//! - the inbound/outbound mapping table.
//!
//! # Invariants
//!
//! - Inbound tags and outbound tags are unique within a document.
//! - Every per-node rule references an existing inbound pair and outbound.
//! - Output is a pure function of the input bytes and [`GenerateOptions`].

pub mod assemble;
pub mod digest;
pub mod document;
pub mod mapping;
pub mod pipeline;
pub mod routing;

use subgen_networking::PortError;
use subgen_subscription::SubscriptionError;
use thiserror::Error;

pub use assemble::{assemble, LAN_LISTEN, LOCAL_LISTEN};
pub use digest::DocumentDigest;
pub use document::ConfigDocument;
pub use mapping::{build_mapping, MappingEntry, MappingTable};
pub use pipeline::{build, generate, GenerateOptions, Generated};
pub use routing::{DesignatedNode, PRELUDE_LEN};

/// Assembly errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssembleError {
    /// Nothing to assemble.
    #[error("cannot assemble a configuration without nodes")]
    NoNodes,

    /// Nodes and listener pairs disagree.
    #[error("{nodes} nodes but {pairs} listener pairs")]
    PairCountMismatch { nodes: usize, pairs: usize },

    /// A node has an empty display name.
    #[error("node {position} has an empty display name")]
    EmptyTag { position: usize },

    /// Two nodes share a display name, or a node uses a reserved tag.
    #[error("outbound tag {tag:?} is used more than once")]
    DuplicateTag { tag: String },

    /// Two inbounds would listen on the same port.
    #[error("listen port {port} is assigned to more than one inbound")]
    PortCollision { port: u16 },
}

/// Whole-batch errors. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Every entry was filtered out.
    #[error("no valid vmess nodes found in the subscription ({skipped} skipped)")]
    EmptyResult { skipped: usize },

    #[error(transparent)]
    Ports(#[from] PortError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

#[cfg(test)]
pub(crate) mod testing {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use subgen_networking::{allocate, ListenerPair};
    use subgen_subscription::NodeRecord;

    pub fn node(name: &str) -> NodeRecord {
        NodeRecord {
            display_name: name.to_string(),
            address: format!("{}.example.com", name),
            port: 443,
            user_id: "b831381d-6324-4d53-ad4f-8cda48b30811".to_string(),
            alter_id: 0,
            security: "auto".to_string(),
            network: "tcp".to_string(),
            tls_mode: "none".to_string(),
            sni: None,
            host: None,
            path: None,
            alpn: Vec::new(),
            mux_enabled: false,
            mux_concurrency: -1,
        }
    }

    pub fn pairs(count: usize) -> Vec<ListenerPair> {
        allocate(count, 50001, 51001).unwrap()
    }

    pub fn subscription(names: &[&str]) -> Vec<u8> {
        let lines: Vec<String> = names
            .iter()
            .map(|name| {
                let payload = serde_json::json!({
                    "ps": name,
                    "add": format!("{}.example.com", name),
                    "port": "443",
                    "id": "b831381d-6324-4d53-ad4f-8cda48b30811",
                    "aid": "0"
                });
                format!("vmess://{}", STANDARD.encode(payload.to_string()))
            })
            .collect();
        STANDARD.encode(lines.join("\n")).into_bytes()
    }
}
