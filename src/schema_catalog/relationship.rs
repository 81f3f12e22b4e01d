use serde::{Deserialize, Serialize};
use std::fmt;

/// Traversal direction of a relationship chain relative to its declared domain list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Declared on the first domain, reaching the last one
    Forward,
    /// Declared on the last domain, looking back to the first one
    Reverse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// A resolved, acyclic relationship between the declaring entity and a target entity.
///
/// `domains` is always the declared (un-reversed) chain. Physical names are
/// synthesized from it, so `Forward` and `Reverse` edges over the same chain
/// produce the same join tables and keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    /// Consuming field on the declaring entity
    pub field: String,
    pub source_domain: String,
    pub target_domain: String,
    /// Declared domain chain, `len() - 1` hops
    pub domains: Vec<String>,
    /// Entity describing the related rows
    pub target_entity: String,
    /// Key on the declaring side
    pub local_key: String,
    /// Key on the related side
    pub foreign_key: String,
    pub direction: Direction,
    /// Collection-valued (to-many) or single-valued (many-to-one)
    pub many: bool,
}

impl RelationshipEdge {
    pub fn hop_count(&self) -> usize {
        self.domains.len().saturating_sub(1)
    }

    /// Single-domain chain: a plain foreign key, no associative table
    pub fn is_direct(&self) -> bool {
        self.domains.len() == 1
    }

    pub fn is_reverse(&self) -> bool {
        self.direction == Direction::Reverse
    }

    /// Domains strictly between the two ends of the chain
    pub fn via_join_domains(&self) -> &[String] {
        if self.domains.len() <= 2 {
            &[]
        } else {
            &self.domains[1..self.domains.len() - 1]
        }
    }
}
