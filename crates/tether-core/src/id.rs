//! Stable handle for registered entities.
//!
//! An [`EntityId`] is a newtype over `u32` that maps one-to-one onto the
//! petgraph `NodeIndex<u32>` of the entity's node in the constraint graph.
//! Handles are never reused while the entity is registered.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Identity of an entity registered with a [`ConstraintGraph`](crate::graph::ConstraintGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// Bridge between EntityId and petgraph's NodeIndex<u32>.

impl From<NodeIndex<u32>> for EntityId {
    fn from(idx: NodeIndex<u32>) -> Self {
        EntityId(idx.index() as u32)
    }
}

impl From<EntityId> for NodeIndex<u32> {
    fn from(id: EntityId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}
