//! Routing rules.
//!
//! Rules are evaluated first-match-wins. The fixed prelude always comes first;
//! the per-node rules only see traffic that no prelude rule claimed.

use subgen_networking::ListenerPair;
use subgen_subscription::NodeRecord;
use tracing::warn;

use crate::document::{Routing, RoutingRule};

/// Tag of the reserved API inbound/outbound.
pub const API_TAG: &str = "api";

/// Tag of the pass-through outbound.
pub const DIRECT_TAG: &str = "direct";

/// Tag of the rejecting outbound.
pub const BLOCK_TAG: &str = "block";

/// Domains pinned to the designated node.
pub const DESIGNATED_DOMAINS: [&str; 2] = ["domain:googleapis.cn", "domain:gstatic.com"];

/// Country-local domain categories.
pub const LOCAL_DOMAIN_CATEGORIES: [&str; 2] = ["geosite:cn", "geosite:geolocation-cn"];

/// Local DNS-over-HTTPS/TLS provider domains.
pub const LOCAL_DNS_DOMAINS: [&str; 5] = [
    "domain:alidns.com",
    "domain:doh.pub",
    "domain:dot.pub",
    "domain:360.cn",
    "domain:onedns.net",
];

/// Local DNS provider resolver addresses.
pub const LOCAL_DNS_IPS: [&str; 35] = [
    "223.5.5.5",
    "223.6.6.6",
    "2400:3200::1",
    "2400:3200:baba::1",
    "119.29.29.29",
    "1.12.12.12",
    "120.53.53.53",
    "2402:4e00::",
    "2402:4e00:1::",
    "180.76.76.76",
    "2400:da00::6666",
    "114.114.114.114",
    "114.114.115.115",
    "114.114.114.119",
    "114.114.115.119",
    "114.114.114.110",
    "114.114.115.110",
    "180.184.1.1",
    "180.184.2.2",
    "101.226.4.6",
    "218.30.118.6",
    "123.125.81.6",
    "140.207.198.6",
    "1.2.4.8",
    "210.2.4.8",
    "52.80.66.66",
    "117.50.22.22",
    "2400:7fc0:849e:200::4",
    "2404:c2c0:85d8:901::4",
    "117.50.10.10",
    "52.80.52.52",
    "2400:7fc0:849e:200::8",
    "2404:c2c0:85d8:901::8",
    "117.50.60.30",
    "52.80.60.30",
];

/// Number of prelude rules when every prelude rule is emitted.
pub const PRELUDE_LEN: usize = 8;

/// Selects the node that carries [`DESIGNATED_DOMAINS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DesignatedNode {
    /// Omit the designated-domain rule.
    #[default]
    None,

    /// The node whose display name equals this tag.
    Tag(String),

    /// The first node (in list order) whose display name contains this text.
    /// An empty pattern matches nothing.
    Pattern(String),
}

impl DesignatedNode {
    /// Resolve to an outbound tag, if any node matches.
    pub fn resolve<'a>(&self, nodes: &'a [NodeRecord]) -> Option<&'a str> {
        let found = match self {
            Self::None => return None,
            Self::Tag(tag) => nodes.iter().find(|n| &n.display_name == tag),
            Self::Pattern(pattern) if pattern.is_empty() => None,
            Self::Pattern(pattern) => nodes.iter().find(|n| n.display_name.contains(pattern)),
        };

        if found.is_none() {
            warn!(selector = ?self, "no node matches the designated-node selector; omitting rule");
        }

        found.map(|n| n.display_name.as_str())
    }
}

/// The fixed prelude, in evaluation order.
///
/// The designated-domain rule is present only when `designated` resolved.
pub fn prelude_rules(designated: Option<&str>) -> Vec<RoutingRule> {
    let mut rules = Vec::with_capacity(PRELUDE_LEN);

    rules.push(RoutingRule::field(API_TAG).with_inbound_tags([API_TAG]));

    if let Some(tag) = designated {
        rules.push(RoutingRule::field(tag).with_domains(DESIGNATED_DOMAINS));
    }

    rules.push(RoutingRule::field(BLOCK_TAG).with_network_port("udp", "443"));
    rules.push(RoutingRule::field(DIRECT_TAG).with_ips(["geoip:private"]));
    rules.push(RoutingRule::field(DIRECT_TAG).with_domains(LOCAL_DOMAIN_CATEGORIES));
    rules.push(RoutingRule::field(DIRECT_TAG).with_domains(LOCAL_DNS_DOMAINS));
    rules.push(RoutingRule::field(DIRECT_TAG).with_ips(LOCAL_DNS_IPS));
    rules.push(RoutingRule::field(DIRECT_TAG).with_ips(["geoip:cn"]));

    rules
}

/// One rule per node, joining its inbound pair to its outbound.
pub fn node_rule(node: &NodeRecord, pair: &ListenerPair) -> RoutingRule {
    RoutingRule::field(node.display_name.as_str())
        .with_inbound_tags([pair.socks_tag.as_str(), pair.http_tag.as_str()])
}

/// Full routing block: prelude, then per-node rules in node order.
pub fn build_routing(
    nodes: &[NodeRecord],
    pairs: &[ListenerPair],
    designated: &DesignatedNode,
) -> Routing {
    let mut rules = prelude_rules(designated.resolve(nodes));
    rules.extend(
        nodes
            .iter()
            .zip(pairs)
            .map(|(node, pair)| node_rule(node, pair)),
    );

    Routing {
        domain_strategy: "AsIs".to_string(),
        rules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{node, pairs};

    #[test]
    fn test_prelude_order() {
        let rules = prelude_rules(Some("hk"));
        assert_eq!(rules.len(), PRELUDE_LEN);

        assert_eq!(rules[0].inbound_tag.as_deref(), Some(&["api".to_string()][..]));
        assert_eq!(rules[0].outbound_tag, "api");
        assert_eq!(rules[1].outbound_tag, "hk");
        assert_eq!(rules[1].domain.as_ref().unwrap().len(), 2);
        assert_eq!(rules[2].network.as_deref(), Some("udp"));
        assert_eq!(rules[2].port.as_deref(), Some("443"));
        assert_eq!(rules[2].outbound_tag, "block");
        assert_eq!(rules[3].ip.as_deref(), Some(&["geoip:private".to_string()][..]));
        assert_eq!(rules[4].domain.as_ref().unwrap()[0], "geosite:cn");
        assert_eq!(rules[5].domain.as_ref().unwrap().len(), LOCAL_DNS_DOMAINS.len());
        assert_eq!(rules[6].ip.as_ref().unwrap().len(), LOCAL_DNS_IPS.len());
        assert_eq!(rules[7].ip.as_deref(), Some(&["geoip:cn".to_string()][..]));
        assert!(rules[3..].iter().all(|r| r.outbound_tag == "direct"));
        assert!(rules.iter().all(|r| r.kind == "field"));
    }

    #[test]
    fn test_prelude_without_designated_node() {
        let rules = prelude_rules(None);
        assert_eq!(rules.len(), PRELUDE_LEN - 1);
        assert!(rules
            .iter()
            .flat_map(|r| r.domain.iter().flatten())
            .all(|d| !DESIGNATED_DOMAINS.contains(&d.as_str())));
    }

    #[test]
    fn test_designated_resolution() {
        let nodes = vec![node("hk-01"), node("us-west-01"), node("us-west-02")];

        assert_eq!(DesignatedNode::None.resolve(&nodes), None);
        assert_eq!(
            DesignatedNode::Tag("us-west-02".into()).resolve(&nodes),
            Some("us-west-02")
        );
        assert_eq!(DesignatedNode::Tag("us-west".into()).resolve(&nodes), None);
        assert_eq!(
            DesignatedNode::Pattern("us-west".into()).resolve(&nodes),
            Some("us-west-01")
        );
        assert_eq!(DesignatedNode::Pattern("jp".into()).resolve(&nodes), None);
        assert_eq!(DesignatedNode::Pattern(String::new()).resolve(&nodes), None);
    }

    #[test]
    fn test_node_rules_follow_prelude() {
        let nodes = vec![node("a"), node("b")];
        let pairs = pairs(2);
        let routing = build_routing(&nodes, &pairs, &DesignatedNode::Tag("b".into()));

        assert_eq!(routing.domain_strategy, "AsIs");
        assert_eq!(routing.rules.len(), PRELUDE_LEN + 2);

        let tail = &routing.rules[PRELUDE_LEN..];
        assert_eq!(
            tail[0].inbound_tag.as_deref(),
            Some(&["socks5-50001".to_string(), "http-51001".to_string()][..])
        );
        assert_eq!(tail[0].outbound_tag, "a");
        assert_eq!(tail[1].outbound_tag, "b");
        assert!(tail.iter().all(|r| r.domain.is_none() && r.ip.is_none()));
    }

    #[test]
    fn test_rule_json_shape() {
        let rule = RoutingRule::field("block").with_network_port("udp", "443");
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            serde_json::json!({
                "type": "field",
                "network": "udp",
                "port": "443",
                "outboundTag": "block"
            })
        );
    }
}
