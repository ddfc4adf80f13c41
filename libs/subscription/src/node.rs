//! Node descriptors: the loose vmess payload and its normalized form.

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default user security when `scy` is absent.
pub const DEFAULT_SECURITY: &str = "auto";

/// Default transport when `net` is absent.
pub const DEFAULT_NETWORK: &str = "tcp";

/// Default TLS mode when `tls` is absent.
pub const DEFAULT_TLS_MODE: &str = "none";

/// Default mux concurrency (runtime decides).
pub const DEFAULT_MUX_CONCURRENCY: i64 = -1;

/// Node validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required key is absent or empty.
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    /// A required key is present but unusable.
    #[error("invalid value '{value}' for '{field}': {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// A vmess payload as found in the subscription.
///
/// Every scalar accepts either a JSON string or a JSON number, since
/// providers disagree on how `port` and `aid` are encoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNode {
    #[serde(default, deserialize_with = "loose_string")]
    pub add: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub port: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub aid: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub scy: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub net: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub tls: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub sni: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub ps: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub alpn: Option<String>,
    #[serde(default)]
    pub mux: Option<RawMux>,
}

/// Mux block of a vmess payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMux {
    #[serde(default, deserialize_with = "loose_bool")]
    pub enabled: Option<bool>,
    #[serde(default, deserialize_with = "loose_int")]
    pub concurrency: Option<i64>,
}

/// A normalized proxy node.
///
/// `display_name` doubles as the outbound tag and the routing key, so the
/// decoder guarantees it is non-empty and unique within one node list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
    pub display_name: String,
    pub address: String,
    pub port: u16,
    pub user_id: String,
    pub alter_id: u32,
    pub security: String,
    pub network: String,
    pub tls_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,
    pub mux_enabled: bool,
    pub mux_concurrency: i64,
}

impl NodeRecord {
    /// Whether the node uses the websocket transport.
    pub fn is_websocket(&self) -> bool {
        self.network == "ws"
    }

    /// Whether the node wraps its transport in TLS.
    pub fn is_tls(&self) -> bool {
        self.tls_mode == "tls"
    }
}

/// Normalize a raw payload, applying defaults to optional fields.
///
/// The display name is copied as-is (possibly empty); uniqueness is the
/// decoder's job since it needs the whole list.
pub fn normalize(raw: RawNode) -> Result<NodeRecord, ValidationError> {
    let address = required(raw.add, "add")?;
    let port_raw = required(raw.port, "port")?;
    let user_id = required(raw.id, "id")?;
    let alter_raw = required(raw.aid, "aid")?;

    let port = port_raw
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| ValidationError::InvalidField {
            field: "port",
            value: port_raw.clone(),
            reason: "expected a port between 1 and 65535",
        })?;

    let alter_id = alter_raw
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidField {
            field: "aid",
            value: alter_raw.clone(),
            reason: "expected a non-negative integer",
        })?;

    let alpn = present(raw.alpn)
        .map(|joined| {
            joined
                .split(',')
                .map(str::trim)
                .filter(|proto| !proto.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mux = raw.mux.unwrap_or_default();

    Ok(NodeRecord {
        display_name: raw.ps.unwrap_or_default(),
        address,
        port,
        user_id,
        alter_id,
        security: present(raw.scy).unwrap_or_else(|| DEFAULT_SECURITY.to_string()),
        network: present(raw.net).unwrap_or_else(|| DEFAULT_NETWORK.to_string()),
        tls_mode: present(raw.tls).unwrap_or_else(|| DEFAULT_TLS_MODE.to_string()),
        sni: present(raw.sni),
        host: present(raw.host),
        path: present(raw.path),
        alpn,
        mux_enabled: mux.enabled.unwrap_or(false),
        mux_concurrency: mux.concurrency.unwrap_or(DEFAULT_MUX_CONCURRENCY),
    })
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    present(value).ok_or(ValidationError::MissingField { field })
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        // Some providers ship alpn as a list.
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| D::Error::custom("expected a list of strings"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|parts| Some(parts.join(","))),
        Some(Value::Object(_)) => Err(D::Error::custom("expected a string or number")),
    }
}

fn loose_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(Value::Number(n)) => Ok(Some(n.as_i64().unwrap_or(0) != 0)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" | "" => Ok(Some(false)),
            other => Err(D::Error::custom(format!("invalid boolean '{other}'"))),
        },
        Some(_) => Err(D::Error::custom("expected a boolean")),
    }
}

fn loose_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid integer '{n}'"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid integer '{s}'"))),
        Some(_) => Err(D::Error::custom("expected an integer")),
    }
}
