//! End-to-end generation: subscription bytes to documents.

use subgen_networking::{allocate, ListenerPair, DEFAULT_HTTP_BASE, DEFAULT_SOCKS_BASE};
use subgen_subscription::{decode, Decoded, NodeRecord, SkippedEntry};
use tracing::info;

use crate::assemble::{assemble, LAN_LISTEN, LOCAL_LISTEN};
use crate::document::ConfigDocument;
use crate::mapping::{build_mapping, MappingTable};
use crate::routing::DesignatedNode;
use crate::PipelineError;

/// Generation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// First SOCKS5 listen port.
    pub socks_base: u16,

    /// First HTTP listen port.
    pub http_base: u16,

    /// Node that carries the designated-domain rule.
    pub designated: DesignatedNode,

    /// Listen address of the local variant.
    pub local_listen: String,

    /// Listen address of the LAN variant.
    pub lan_listen: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            socks_base: DEFAULT_SOCKS_BASE,
            http_base: DEFAULT_HTTP_BASE,
            designated: DesignatedNode::None,
            local_listen: LOCAL_LISTEN.to_string(),
            lan_listen: LAN_LISTEN.to_string(),
        }
    }
}

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct Generated {
    /// Document listening on the local address.
    pub local: ConfigDocument,

    /// Document listening on the LAN address.
    pub lan: ConfigDocument,

    /// Inbound pair → outbound mapping.
    pub mapping: MappingTable,

    /// Listener pairs in node order.
    pub pairs: Vec<ListenerPair>,

    /// Outbound carrying the designated-domain rule, if any node matched.
    pub designated: Option<String>,

    /// Decoder output, including diagnostics.
    pub decoded: Decoded,
}

impl Generated {
    pub fn nodes(&self) -> &[NodeRecord] {
        &self.decoded.nodes
    }

    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.decoded.skipped
    }
}

/// Decode a raw subscription and build both documents and the mapping.
pub fn generate(raw: &[u8], options: &GenerateOptions) -> Result<Generated, PipelineError> {
    let decoded = decode(raw)?;
    build(decoded, options)
}

/// Build both documents and the mapping from an already decoded subscription.
///
/// Fails before producing anything if there are no nodes or the port ranges
/// collide.
pub fn build(decoded: Decoded, options: &GenerateOptions) -> Result<Generated, PipelineError> {
    let nodes = &decoded.nodes;
    if nodes.is_empty() {
        return Err(PipelineError::EmptyResult {
            skipped: decoded.skipped.len(),
        });
    }

    let pairs = allocate(nodes.len(), options.socks_base, options.http_base)?;

    // Resolve once so an unmatched selector is reported once.
    let designated = options.designated.resolve(nodes).map(str::to_string);
    let selector = match &designated {
        Some(tag) => DesignatedNode::Tag(tag.clone()),
        None => DesignatedNode::None,
    };

    let local = assemble(nodes, &pairs, &options.local_listen, &selector)?;
    let lan = assemble(nodes, &pairs, &options.lan_listen, &selector)?;
    let mapping = build_mapping(nodes, &pairs);

    info!(
        nodes = nodes.len(),
        skipped = decoded.skipped.len(),
        rules = local.routing.rules.len(),
        "configuration generated"
    );

    Ok(Generated {
        local,
        lan,
        mapping,
        pairs,
        designated,
        decoded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{node, subscription};
    use crate::AssembleError;
    use subgen_networking::PortError;

    #[test]
    fn test_generate_two_variants() {
        let generated = generate(&subscription(&["a", "b"]), &GenerateOptions::default()).unwrap();

        assert!(generated.local.inbounds.iter().all(|i| i.listen == "127.0.0.1"));
        assert!(generated.lan.inbounds.iter().all(|i| i.listen == "0.0.0.0"));

        let mut lan = generated.lan.clone();
        for inbound in &mut lan.inbounds {
            inbound.listen = "127.0.0.1".to_string();
        }
        assert_eq!(lan, generated.local);
    }

    #[test]
    fn test_designated_resolved_once() {
        let options = GenerateOptions {
            designated: DesignatedNode::Pattern("b".into()),
            ..Default::default()
        };
        let generated = generate(&subscription(&["a", "b"]), &options).unwrap();
        assert_eq!(generated.designated.as_deref(), Some("b"));
        assert_eq!(generated.local.routing.rules[1].outbound_tag, "b");

        let unmatched = GenerateOptions {
            designated: DesignatedNode::Tag("zz".into()),
            ..Default::default()
        };
        let generated = generate(&subscription(&["a", "b"]), &unmatched).unwrap();
        assert_eq!(generated.designated, None);
    }

    #[test]
    fn test_build_rejects_duplicate_names() {
        let decoded = Decoded {
            nodes: vec![node("hk"), node("hk")],
            ..Default::default()
        };
        let result = build(decoded, &GenerateOptions::default());
        assert!(matches!(
            result,
            Err(PipelineError::Assemble(AssembleError::DuplicateTag { ref tag })) if tag == "hk"
        ));
    }

    #[test]
    fn test_empty_result() {
        let raw = subscription(&[]);
        let result = generate(&raw, &GenerateOptions::default());
        assert!(matches!(result, Err(PipelineError::EmptyResult { skipped: 0 })));
    }

    #[test]
    fn test_port_collision_is_fatal() {
        let options = GenerateOptions {
            socks_base: 50001,
            http_base: 50002,
            ..Default::default()
        };
        let result = generate(&subscription(&["a", "b", "c", "d", "e"]), &options);
        assert!(matches!(
            result,
            Err(PipelineError::Ports(PortError::RangeCollision { .. }))
        ));
    }

    #[test]
    fn test_malformed_is_fatal() {
        let result = generate(b"%%%", &GenerateOptions::default());
        assert!(matches!(result, Err(PipelineError::Subscription(_))));
    }
}
