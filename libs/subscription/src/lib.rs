//! Subscription decoding library.
//!
//! Turns a vmess subscription into an ordered list of normalized nodes.
//!
//! # Format
//!
//! ```text
//! base64(
//!   vmess://base64({"add": "...", "port": "443", "id": "...", "aid": "0", "ps": "..."})
//!   vmess://...
//! )
//! ```
//!
//! Lines may be percent-encoded. Lines with any other scheme are ignored.
//! A line whose vmess payload cannot be decoded or validated is recorded as a
//! [`SkippedEntry`] and never aborts the batch; only an unreadable outer
//! payload is fatal.

mod names;
mod node;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use names::{UniqueNames, RESERVED_TAGS};
pub use node::{
    normalize, NodeRecord, RawMux, RawNode, ValidationError, DEFAULT_MUX_CONCURRENCY,
    DEFAULT_NETWORK, DEFAULT_SECURITY, DEFAULT_TLS_MODE,
};

/// URI scheme of the recognized node descriptors.
pub const VMESS_SCHEME: &str = "vmess://";

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// Standard alphabet, padding optional.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// URL-safe alphabet, padding optional.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Subscription errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The outer payload is not base64-wrapped UTF-8 text.
    #[error("malformed subscription: {reason}")]
    Malformed { reason: String },
}

/// A vmess line that was dropped from the node list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    /// Line number in the decoded subscription text (1-based).
    pub line: usize,

    /// Why the entry was dropped.
    pub reason: String,

    /// The percent-decoded URI.
    pub raw: String,
}

/// Result of decoding one subscription.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    /// Every non-empty, percent-decoded line, in order.
    pub uris: Vec<String>,

    /// The JSON payload of every vmess line that parsed, in order.
    pub payloads: Vec<serde_json::Value>,

    /// Normalized nodes with unique display names, in URI order.
    pub nodes: Vec<NodeRecord>,

    /// Entries dropped along the way.
    pub skipped: Vec<SkippedEntry>,
}

/// Decode a raw subscription.
pub fn decode(raw: &[u8]) -> Result<Decoded, SubscriptionError> {
    let text = decode_base64_text(raw).map_err(|reason| SubscriptionError::Malformed { reason })?;

    let mut decoded = Decoded::default();
    let mut names = UniqueNames::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let line_num = idx + 1;
        let uri = percent_decode(line);
        decoded.uris.push(uri.clone());

        let Some(encoded) = uri.strip_prefix(VMESS_SCHEME) else {
            debug!(line = line_num, "ignoring non-vmess entry");
            continue;
        };

        let payload = match parse_payload(encoded) {
            Ok(payload) => payload,
            Err(reason) => {
                skip(&mut decoded, line_num, reason, uri);
                continue;
            }
        };

        let raw_node = serde_json::from_value::<RawNode>(payload.clone());
        decoded.payloads.push(payload);

        let node = raw_node
            .map_err(|e| format!("invalid vmess payload: {e}"))
            .and_then(|raw_node| normalize(raw_node).map_err(|e| e.to_string()));

        match node {
            Ok(mut node) => {
                node.display_name = names.claim(&node.display_name, decoded.nodes.len() + 1);
                decoded.nodes.push(node);
            }
            Err(reason) => skip(&mut decoded, line_num, reason, uri),
        }
    }

    info!(
        uris = decoded.uris.len(),
        nodes = decoded.nodes.len(),
        skipped = decoded.skipped.len(),
        "subscription decoded"
    );

    Ok(decoded)
}

fn skip(decoded: &mut Decoded, line: usize, reason: String, raw: String) {
    warn!(line, reason = %reason, "skipping vmess entry");
    decoded.skipped.push(SkippedEntry { line, reason, raw });
}

/// Decode the outer base64 envelope to text.
fn decode_base64_text(input: &[u8]) -> Result<String, String> {
    let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
    let bytes = decode_base64(input).map_err(|e| format!("invalid base64: {e}"))?;
    String::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {e}"))
}

/// Decode a vmess payload to a JSON value.
fn parse_payload(encoded: &str) -> Result<serde_json::Value, String> {
    if encoded.trim().is_empty() {
        return Err("vmess URI has no payload".to_string());
    }

    let bytes =
        decode_base64(encoded.as_bytes()).map_err(|e| format!("invalid vmess base64: {e}"))?;
    let json = String::from_utf8(bytes).map_err(|e| format!("invalid vmess UTF-8: {e}"))?;
    let value: serde_json::Value =
        serde_json::from_str(&json).map_err(|e| format!("invalid vmess JSON: {e}"))?;

    if !value.is_object() {
        return Err("vmess payload is not a JSON object".to_string());
    }

    Ok(value)
}

/// Lenient base64: whitespace ignored, padding optional, URL-safe fallback.
fn decode_base64(input: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = input
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    STANDARD_LENIENT
        .decode(&compact)
        .or_else(|err| URL_SAFE_LENIENT.decode(&compact).map_err(|_| err))
}

/// Percent-decode one line; invalid UTF-8 is replaced, never fatal.
fn percent_decode(line: &str) -> String {
    let bytes = urlencoding::decode_binary(line.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

    fn vmess(json: serde_json::Value) -> String {
        format!("{}{}", VMESS_SCHEME, STANDARD.encode(json.to_string()))
    }

    fn node_json(name: &str, port: u16) -> serde_json::Value {
        serde_json::json!({
            "v": "2",
            "ps": name,
            "add": format!("{}.example.com", name),
            "port": port.to_string(),
            "id": "b831381d-6324-4d53-ad4f-8cda48b30811",
            "aid": "0",
            "net": "ws",
            "tls": "tls",
            "path": "/ray",
            "host": "cdn.example.com"
        })
    }

    fn subscription(lines: &[String]) -> Vec<u8> {
        STANDARD.encode(lines.join("\n")).into_bytes()
    }

    #[test]
    fn test_decode_preserves_order() {
        let raw = subscription(&[
            vmess(node_json("hk-01", 443)),
            vmess(node_json("jp-01", 8443)),
        ]);

        let decoded = decode(&raw).unwrap();
        let names: Vec<_> = decoded.nodes.iter().map(|n| n.display_name.as_str()).collect();
        assert_eq!(names, vec!["hk-01", "jp-01"]);
        assert_eq!(decoded.nodes[1].port, 8443);
        assert_eq!(decoded.uris.len(), 2);
        assert_eq!(decoded.payloads.len(), 2);
        assert!(decoded.skipped.is_empty());
    }

    #[test]
    fn test_corrupted_entry_is_skipped() {
        let raw = subscription(&[
            vmess(node_json("a", 1)),
            format!("{}@@not-base64@@", VMESS_SCHEME),
            vmess(node_json("c", 3)),
        ]);

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.nodes.len(), 2);
        assert_eq!(decoded.skipped.len(), 1);
        assert_eq!(decoded.skipped[0].line, 2);
        assert!(decoded.skipped[0].reason.contains("base64"));
    }

    #[test]
    fn test_invalid_json_is_skipped() {
        let raw = subscription(&[
            format!("{}{}", VMESS_SCHEME, STANDARD.encode("{not json")),
            format!("{}{}", VMESS_SCHEME, STANDARD.encode("[1, 2]")),
            vmess(node_json("ok", 1)),
        ]);

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.nodes.len(), 1);
        assert_eq!(decoded.skipped.len(), 2);
    }

    #[test]
    fn test_validation_failure_is_skipped() {
        let raw = subscription(&[
            vmess(serde_json::json!({ "add": "h", "port": "1", "id": "u", "ps": "no-aid" })),
            vmess(node_json("ok", 1)),
        ]);

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.nodes.len(), 1);
        assert_eq!(decoded.skipped.len(), 1);
        assert!(decoded.skipped[0].reason.contains("aid"));
        // The payload parsed, so it still shows up in the diagnostics.
        assert_eq!(decoded.payloads.len(), 2);
    }

    #[test]
    fn test_other_schemes_ignored() {
        let raw = subscription(&[
            "trojan://secret@example.com:443#t".to_string(),
            "ss://YWVzLTI1Ni1nY206cGFzcw@example.com:8388".to_string(),
            vmess(node_json("ok", 1)),
        ]);

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.nodes.len(), 1);
        assert!(decoded.skipped.is_empty());
        assert_eq!(decoded.uris.len(), 3);
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let body = format!(
            "\r\n{}\r\n\r\n   \r\n{}\r\n",
            vmess(node_json("a", 1)),
            vmess(node_json("b", 2))
        );
        let raw = STANDARD.encode(body).into_bytes();

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.nodes.len(), 2);
        assert_eq!(decoded.uris.len(), 2);
    }

    #[test]
    fn test_percent_encoded_line() {
        let line = vmess(node_json("a", 1)).replace("vmess://", "vmess%3A%2F%2F");
        let raw = subscription(&[line]);

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.nodes.len(), 1);
        assert!(decoded.uris[0].starts_with(VMESS_SCHEME));
    }

    #[test]
    fn test_wrapped_unpadded_url_safe_payload() {
        let body = [vmess(node_json("a", 1)), vmess(node_json("b", 2))].join("\n");
        let encoded = URL_SAFE_NO_PAD.encode(body);
        let wrapped: Vec<String> = encoded
            .as_bytes()
            .chunks(76)
            .map(|chunk| String::from_utf8(chunk.to_vec()).unwrap())
            .collect();
        let raw = format!("{}\n", wrapped.join("\n")).into_bytes();

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.nodes.len(), 2);
    }

    #[test]
    fn test_invalid_outer_base64_is_fatal() {
        let result = decode(b"this is *not* base64!");
        assert!(matches!(result, Err(SubscriptionError::Malformed { .. })));
    }

    #[test]
    fn test_invalid_outer_utf8_is_fatal() {
        let raw = STANDARD.encode([0xff, 0xfe, 0xfd]).into_bytes();
        let result = decode(&raw);
        assert!(matches!(result, Err(SubscriptionError::Malformed { .. })));
    }

    #[test]
    fn test_empty_payload_yields_no_nodes() {
        let decoded = decode(b"").unwrap();
        assert!(decoded.nodes.is_empty());
        assert!(decoded.uris.is_empty());
    }

    #[test]
    fn test_duplicate_and_empty_names() {
        let raw = subscription(&[
            vmess(node_json("hk", 1)),
            vmess(node_json("hk", 2)),
            vmess(node_json("", 3)),
            vmess(node_json("direct", 4)),
        ]);

        let decoded = decode(&raw).unwrap();
        let names: Vec<_> = decoded.nodes.iter().map(|n| n.display_name.as_str()).collect();
        assert_eq!(names, vec!["hk", "hk-2", "node-3", "direct-2"]);
    }

    #[test]
    fn test_fallback_name_uses_position_in_node_list() {
        let raw = subscription(&[
            format!("{}!!!", VMESS_SCHEME),
            vmess(node_json("", 1)),
        ]);

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.nodes[0].display_name, "node-1");
    }

    #[test]
    fn test_decode_is_deterministic() {
        let raw = subscription(&[
            vmess(node_json("x", 1)),
            vmess(node_json("x", 2)),
            vmess(node_json("y", 3)),
        ]);

        let first = decode(&raw).unwrap();
        let second = decode(&raw).unwrap();
        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.skipped, second.skipped);
    }
}
