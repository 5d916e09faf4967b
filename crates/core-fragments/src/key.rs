//! Block identity shared by fragments, outputs, and history records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, totally ordered identity of one block instance. The numeric id
/// is unique per runtime; the tag is a short human label (`"squats:1"`)
/// carried into logs and serialized records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockKey {
    pub id: u64,
    pub tag: String,
}

impl BlockKey {
    pub fn new(id: u64, tag: impl Into<String>) -> Self {
        Self {
            id,
            tag: tag.into(),
        }
    }
}

impl PartialOrd for BlockKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlockKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tag, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_allocation_id() {
        let a = BlockKey::new(1, "zz");
        let b = BlockKey::new(2, "aa");
        assert!(a < b);
    }

    #[test]
    fn display_includes_tag_and_id() {
        assert_eq!(BlockKey::new(3, "squats:1").to_string(), "squats:1#3");
    }
}
