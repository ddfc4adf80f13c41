//! Display-name uniqueness.
//!
//! Display names become outbound tags, so they must be unique and must not
//! shadow the tags the generated document reserves for itself.
//!
//! Policy, applied in node order:
//! - an empty name becomes `node-<position>` (1-based position in the node list);
//! - a taken name gets the first free `-2`, `-3`, ... suffix.

use std::collections::HashSet;

/// Tags reserved by the generated document.
pub const RESERVED_TAGS: [&str; 3] = ["api", "direct", "block"];

/// Hands out unique display names.
#[derive(Debug)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl Default for UniqueNames {
    fn default() -> Self {
        Self::new()
    }
}

impl UniqueNames {
    /// Create a registry with the reserved tags already taken.
    pub fn new() -> Self {
        Self {
            taken: RESERVED_TAGS.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    /// Claim a name for the node at `position` (1-based).
    pub fn claim(&mut self, wanted: &str, position: usize) -> String {
        let base = if wanted.trim().is_empty() {
            format!("node-{}", position)
        } else {
            wanted.to_string()
        };

        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}-{}", base, suffix);
            suffix += 1;
        }

        self.taken.insert(candidate.clone());
        candidate
    }
}
