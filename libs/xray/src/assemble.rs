//! Config assembly.
//!
//! Builds one [`ConfigDocument`] for a node list, its listener pairs and a
//! listen address. Node `i` owns inbounds `2i` and `2i + 1`, outbound `i`,
//! and routing rule `prelude + i`.

use std::collections::{BTreeMap, HashSet};

use subgen_networking::ListenerPair;
use subgen_subscription::{NodeRecord, RESERVED_TAGS};
use tracing::debug;

use crate::document::{
    BlackholeResponse, ConfigDocument, DnsConfig, DnsServer, Inbound, InboundSettings, LogConfig,
    Mux, Outbound, OutboundSettings, ScopedDnsServer, Sniffing, StreamSettings, TlsSettings,
    VmessUser, VnextServer, WsHeaders, WsSettings,
};
use crate::routing::{build_routing, DesignatedNode, BLOCK_TAG, DIRECT_TAG};
use crate::AssembleError;

/// Listen address of the loopback-only variant.
pub const LOCAL_LISTEN: &str = "127.0.0.1";

/// Listen address of the LAN-facing variant.
pub const LAN_LISTEN: &str = "0.0.0.0";

/// Email attached to every vmess user.
pub const USER_EMAIL: &str = "t@t.tt";

/// Default websocket path.
pub const DEFAULT_WS_PATH: &str = "/";

/// Assemble a full document.
///
/// Display names must be non-empty, distinct and not reserved; listener
/// ports must be distinct across all pairs.
pub fn assemble(
    nodes: &[NodeRecord],
    pairs: &[ListenerPair],
    listen: &str,
    designated: &DesignatedNode,
) -> Result<ConfigDocument, AssembleError> {
    if nodes.is_empty() {
        return Err(AssembleError::NoNodes);
    }
    if nodes.len() != pairs.len() {
        return Err(AssembleError::PairCountMismatch {
            nodes: nodes.len(),
            pairs: pairs.len(),
        });
    }
    check_tags(nodes)?;
    check_ports(pairs)?;

    let document = ConfigDocument {
        log: log_config(),
        dns: dns_config(),
        inbounds: inbounds(pairs, listen),
        outbounds: outbounds(nodes),
        routing: build_routing(nodes, pairs, designated),
    };

    debug!(
        listen,
        inbounds = document.inbounds.len(),
        outbounds = document.outbounds.len(),
        rules = document.routing.rules.len(),
        "config assembled"
    );

    Ok(document)
}

fn check_tags(nodes: &[NodeRecord]) -> Result<(), AssembleError> {
    let mut seen: HashSet<&str> = RESERVED_TAGS.into_iter().collect();
    for (i, node) in nodes.iter().enumerate() {
        let tag = node.display_name.as_str();
        if tag.is_empty() {
            return Err(AssembleError::EmptyTag { position: i + 1 });
        }
        if !seen.insert(tag) {
            return Err(AssembleError::DuplicateTag {
                tag: tag.to_string(),
            });
        }
    }
    Ok(())
}

fn check_ports(pairs: &[ListenerPair]) -> Result<(), AssembleError> {
    let mut seen = HashSet::with_capacity(pairs.len() * 2);
    for port in pairs.iter().flat_map(|p| [p.socks_port, p.http_port]) {
        if !seen.insert(port) {
            return Err(AssembleError::PortCollision { port });
        }
    }
    Ok(())
}

pub fn log_config() -> LogConfig {
    LogConfig {
        access: String::new(),
        error: String::new(),
        loglevel: "warning".to_string(),
    }
}

pub fn dns_config() -> DnsConfig {
    let hosts = BTreeMap::from([
        ("dns.google".to_string(), "8.8.8.8".to_string()),
        ("proxy.example.com".to_string(), "127.0.0.1".to_string()),
    ]);

    let servers = vec![
        DnsServer::Scoped(ScopedDnsServer {
            address: "1.1.1.1".to_string(),
            skip_fallback: true,
            domains: strings(&["domain:googleapis.cn", "domain:gstatic.com"]),
            expect_ips: Vec::new(),
        }),
        DnsServer::Scoped(ScopedDnsServer {
            address: "223.5.5.5".to_string(),
            skip_fallback: true,
            domains: strings(&["geosite:cn", "geosite:geolocation-cn"]),
            expect_ips: strings(&["geoip:cn"]),
        }),
        DnsServer::Address("1.1.1.1".to_string()),
        DnsServer::Address("8.8.8.8".to_string()),
        DnsServer::Address("https://dns.google/dns-query".to_string()),
        DnsServer::Scoped(ScopedDnsServer {
            address: "223.5.5.5".to_string(),
            skip_fallback: true,
            domains: strings(&["tanz-board.01byx31qzn.download"]),
            expect_ips: Vec::new(),
        }),
    ];

    DnsConfig { hosts, servers }
}

/// SOCKS5 then HTTP listener for every pair.
pub fn inbounds(pairs: &[ListenerPair], listen: &str) -> Vec<Inbound> {
    pairs
        .iter()
        .flat_map(|pair| {
            [
                inbound(&pair.socks_tag, pair.socks_port, listen, "socks"),
                inbound(&pair.http_tag, pair.http_port, listen, "http"),
            ]
        })
        .collect()
}

fn inbound(tag: &str, port: u16, listen: &str, protocol: &str) -> Inbound {
    Inbound {
        tag: tag.to_string(),
        port,
        listen: listen.to_string(),
        protocol: protocol.to_string(),
        sniffing: Sniffing {
            enabled: true,
            dest_override: strings(&["http", "tls"]),
            route_only: false,
        },
        settings: InboundSettings {
            auth: "noauth".to_string(),
            udp: true,
            allow_transparent: false,
        },
    }
}

/// One vmess outbound per node, then `direct` and `block`.
pub fn outbounds(nodes: &[NodeRecord]) -> Vec<Outbound> {
    let mut outbounds: Vec<Outbound> = nodes.iter().map(node_outbound).collect();

    outbounds.push(Outbound {
        tag: DIRECT_TAG.to_string(),
        protocol: "freedom".to_string(),
        settings: OutboundSettings::Freedom {},
        stream_settings: None,
        mux: None,
    });
    outbounds.push(Outbound {
        tag: BLOCK_TAG.to_string(),
        protocol: "blackhole".to_string(),
        settings: OutboundSettings::Blackhole {
            response: BlackholeResponse {
                kind: "http".to_string(),
            },
        },
        stream_settings: None,
        mux: None,
    });

    outbounds
}

pub fn node_outbound(node: &NodeRecord) -> Outbound {
    Outbound {
        tag: node.display_name.clone(),
        protocol: "vmess".to_string(),
        settings: OutboundSettings::Vmess {
            vnext: vec![VnextServer {
                address: node.address.clone(),
                port: node.port,
                users: vec![VmessUser {
                    id: node.user_id.clone(),
                    alter_id: node.alter_id,
                    email: USER_EMAIL.to_string(),
                    security: node.security.clone(),
                }],
            }],
        },
        stream_settings: Some(stream_settings(node)),
        mux: Some(Mux {
            enabled: node.mux_enabled,
            concurrency: node.mux_concurrency,
        }),
    }
}

fn stream_settings(node: &NodeRecord) -> StreamSettings {
    let ws_settings = node.is_websocket().then(|| WsSettings {
        path: node
            .path
            .clone()
            .unwrap_or_else(|| DEFAULT_WS_PATH.to_string()),
        headers: WsHeaders {
            host: node.host.clone().unwrap_or_else(|| node.address.clone()),
        },
    });

    let tls_settings = node.is_tls().then(|| TlsSettings {
        server_name: node
            .sni
            .clone()
            .or_else(|| node.host.clone())
            .unwrap_or_default(),
        allow_insecure: false,
        alpn: node.alpn.clone(),
    });

    StreamSettings {
        network: node.network.clone(),
        security: node.tls_mode.clone(),
        ws_settings,
        tls_settings,
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
