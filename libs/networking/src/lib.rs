//! Local listener allocation.
//!
//! Every node gets a SOCKS5 and an HTTP listener. Ports are handed out
//! sequentially from two base ports:
//!
//! ```text
//! node i  ->  socks5-<socks_base + i>  /  http-<http_base + i>
//! ```
//!
//! Both ranges are validated up front: they must fit below 65536 and must not
//! overlap, otherwise two listeners would bind the same port.

use std::fmt;

use thiserror::Error;

/// Default first SOCKS5 port.
pub const DEFAULT_SOCKS_BASE: u16 = 50001;

/// Default first HTTP port.
pub const DEFAULT_HTTP_BASE: u16 = 51001;

/// Tag prefix of SOCKS5 inbounds.
pub const SOCKS_TAG_PREFIX: &str = "socks5-";

/// Tag prefix of HTTP inbounds.
pub const HTTP_TAG_PREFIX: &str = "http-";

/// Port allocation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    /// Base port outside 1..=65535.
    #[error("invalid {kind} base port: {port} (must be between 1 and 65535)")]
    InvalidBase { kind: ListenerKind, port: u16 },

    /// Range runs past the last port.
    #[error("{kind} ports starting at {base} cannot fit {count} listeners")]
    Overflow {
        kind: ListenerKind,
        base: u16,
        count: usize,
    },

    /// The SOCKS5 and HTTP ranges share ports.
    #[error("port range collision: socks {socks} overlaps http {http}")]
    RangeCollision { socks: PortRange, http: PortRange },
}

/// Listener protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Socks,
    Http,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socks => write!(f, "socks"),
            Self::Http => write!(f, "http"),
        }
    }
}

// ============================================================================
// Port ranges
// ============================================================================

/// A contiguous run of ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    /// First port.
    pub start: u16,

    /// Number of ports.
    pub len: u16,
}

impl PortRange {
    /// Create a range of `count` ports starting at `start`.
    pub fn new(kind: ListenerKind, start: u16, count: usize) -> Result<Self, PortError> {
        if start == 0 {
            return Err(PortError::InvalidBase { kind, port: start });
        }

        let end = start as usize + count;
        if end > u16::MAX as usize + 1 {
            return Err(PortError::Overflow {
                kind,
                base: start,
                count,
            });
        }

        Ok(Self {
            start,
            len: count as u16,
        })
    }

    /// One past the last port.
    pub fn end(&self) -> u32 {
        self.start as u32 + self.len as u32
    }

    /// Check if a port is within this range.
    pub fn contains(&self, port: u16) -> bool {
        (self.start as u32..self.end()).contains(&(port as u32))
    }

    /// Check if two ranges share at least one port.
    pub fn overlaps(&self, other: &PortRange) -> bool {
        self.len > 0
            && other.len > 0
            && (self.start as u32) < other.end()
            && (other.start as u32) < self.end()
    }

    /// Port at `offset`, if inside the range.
    pub fn port_at(&self, offset: usize) -> Option<u16> {
        if offset < self.len as usize {
            Some(self.start + offset as u16)
        } else {
            None
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len == 0 {
            write!(f, "[{}, empty]", self.start)
        } else {
            write!(f, "[{}-{}]", self.start, self.end() - 1)
        }
    }
}

// ============================================================================
// Listener pairs
// ============================================================================

/// The SOCKS5/HTTP listener pair of one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerPair {
    /// Node index.
    pub index: usize,

    /// SOCKS5 listen port.
    pub socks_port: u16,

    /// HTTP listen port.
    pub http_port: u16,

    /// SOCKS5 inbound tag.
    pub socks_tag: String,

    /// HTTP inbound tag.
    pub http_tag: String,
}

impl ListenerPair {
    /// Build the pair for a node from its two ports.
    pub fn new(index: usize, socks_port: u16, http_port: u16) -> Self {
        Self {
            index,
            socks_port,
            http_port,
            socks_tag: format!("{}{}", SOCKS_TAG_PREFIX, socks_port),
            http_tag: format!("{}{}", HTTP_TAG_PREFIX, http_port),
        }
    }

    /// Key used in the inbound/outbound mapping (`"socks5-N / http-M"`).
    pub fn mapping_key(&self) -> String {
        format!("{} / {}", self.socks_tag, self.http_tag)
    }
}

/// Sequential listener allocator over two validated ranges.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    socks: PortRange,
    http: PortRange,
}

impl PortAllocator {
    /// Validate both ranges for `count` nodes.
    pub fn new(count: usize, socks_base: u16, http_base: u16) -> Result<Self, PortError> {
        let socks = PortRange::new(ListenerKind::Socks, socks_base, count)?;
        let http = PortRange::new(ListenerKind::Http, http_base, count)?;

        if socks.overlaps(&http) {
            return Err(PortError::RangeCollision { socks, http });
        }

        Ok(Self { socks, http })
    }

    /// Pair for the node at `index`.
    pub fn pair(&self, index: usize) -> Option<ListenerPair> {
        let socks_port = self.socks.port_at(index)?;
        let http_port = self.http.port_at(index)?;
        Some(ListenerPair::new(index, socks_port, http_port))
    }

    /// All pairs in node order.
    pub fn pairs(&self) -> Vec<ListenerPair> {
        (0..self.len()).filter_map(|i| self.pair(i)).collect()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.socks.len as usize
    }

    /// Check if there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SOCKS5 range.
    pub fn socks_range(&self) -> &PortRange {
        &self.socks
    }

    /// HTTP range.
    pub fn http_range(&self) -> &PortRange {
        &self.http
    }
}

/// Allocate listener pairs for `count` nodes.
pub fn allocate(
    count: usize,
    socks_base: u16,
    http_base: u16,
) -> Result<Vec<ListenerPair>, PortError> {
    Ok(PortAllocator::new(count, socks_base, http_base)?.pairs())
}
