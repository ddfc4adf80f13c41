//! Configuration document types.
//!
//! Field order in these structs is the field order in the emitted JSON, so
//! serialization is deterministic without sorting.

use std::collections::BTreeMap;

use serde::Serialize;

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigDocument {
    pub log: LogConfig,
    pub dns: DnsConfig,
    pub inbounds: Vec<Inbound>,
    pub outbounds: Vec<Outbound>,
    pub routing: Routing,
}

impl ConfigDocument {
    /// Pretty JSON (two-space indent, non-ASCII kept verbatim).
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Log / DNS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogConfig {
    pub access: String,
    pub error: String,
    pub loglevel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsConfig {
    pub hosts: BTreeMap<String, String>,
    pub servers: Vec<DnsServer>,
}

/// A DNS server: either a bare address or an address with domain scoping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DnsServer {
    Address(String),
    Scoped(ScopedDnsServer),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedDnsServer {
    pub address: String,
    pub skip_fallback: bool,
    pub domains: Vec<String>,
    #[serde(rename = "expectIPs", skip_serializing_if = "Vec::is_empty")]
    pub expect_ips: Vec<String>,
}

// ============================================================================
// Inbounds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inbound {
    pub tag: String,
    pub port: u16,
    pub listen: String,
    pub protocol: String,
    pub sniffing: Sniffing,
    pub settings: InboundSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sniffing {
    pub enabled: bool,
    pub dest_override: Vec<String>,
    pub route_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundSettings {
    pub auth: String,
    pub udp: bool,
    pub allow_transparent: bool,
}

// ============================================================================
// Outbounds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outbound {
    pub tag: String,
    pub protocol: String,
    pub settings: OutboundSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<StreamSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux: Option<Mux>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundSettings {
    Vmess { vnext: Vec<VnextServer> },
    Blackhole { response: BlackholeResponse },
    Freedom {},
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VnextServer {
    pub address: String,
    pub port: u16,
    pub users: Vec<VmessUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmessUser {
    pub id: String,
    pub alter_id: u32,
    pub email: String,
    pub security: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlackholeResponse {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    pub network: String,
    pub security: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_settings: Option<WsSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_settings: Option<TlsSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WsSettings {
    pub path: String,
    pub headers: WsHeaders,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WsHeaders {
    #[serde(rename = "Host")]
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSettings {
    pub server_name: String,
    pub allow_insecure: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mux {
    pub enabled: bool,
    pub concurrency: i64,
}

// ============================================================================
// Routing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Routing {
    pub domain_strategy: String,
    pub rules: Vec<RoutingRule>,
}

/// A `field` rule. Unset matchers are omitted from the JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbound_tag: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub outbound_tag: String,
}

impl RoutingRule {
    /// An empty `field` rule targeting `outbound_tag`.
    pub fn field(outbound_tag: impl Into<String>) -> Self {
        Self {
            kind: "field".to_string(),
            outbound_tag: outbound_tag.into(),
            ..Default::default()
        }
    }

    pub fn with_inbound_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inbound_tag = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain = Some(domains.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_ips<I, S>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ip = Some(ips.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_network_port(mut self, network: &str, port: &str) -> Self {
        self.network = Some(network.to_string());
        self.port = Some(port.to_string());
        self
    }
}
