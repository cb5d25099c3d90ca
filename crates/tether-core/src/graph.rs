//! ConstraintGraph: the acyclic order graph over registered entities.
//!
//! Entities live as node weights of a petgraph `StableGraph`, so an
//! [`EntityId`] stays valid while other entities come and go. An edge
//! `a -> b` always means `a < b`:
//!
//! - the **children** of a node are its outgoing neighbors (entities that
//!   must stay strictly greater);
//! - the **parents** of a node are its incoming neighbors (entities that
//!   must stay strictly smaller).
//!
//! Every public mutator either succeeds and keeps the graph acyclic with all
//! constraints satisfied by the current values, or fails and leaves the
//! graph untouched.

use std::collections::HashSet;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::constraint::{ConstraintKind, OrderEdge};
use crate::entity::ValueEntity;
use crate::error::ConstraintError;
use crate::id::EntityId;

/// Neighbor list returned by adjacency queries. Most sliders have a handful
/// of neighbors at most.
pub type Neighbors = SmallVec<[EntityId; 4]>;

/// Directed acyclic graph of strict order constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintGraph {
    graph: StableGraph<ValueEntity, OrderEdge, Directed, u32>,
}

impl ConstraintGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        ConstraintGraph {
            graph: StableGraph::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Adds an isolated node holding `entity`.
    pub fn add_entity(&mut self, entity: ValueEntity) -> EntityId {
        EntityId::from(self.graph.add_node(entity))
    }

    /// Removes an entity and every constraint that touches it.
    ///
    /// With `restructure`, each former parent is first linked directly to
    /// each former child, so orderings that held through the removed entity
    /// keep holding afterwards. Those links cannot close a cycle (a path
    /// already ran through the removed node) and their values are already
    /// ordered transitively.
    pub fn remove_entity(
        &mut self,
        id: EntityId,
        restructure: bool,
    ) -> Result<ValueEntity, ConstraintError> {
        let idx = self.index_of(id)?;

        if restructure {
            let parents = self.neighbors(id, Direction::Incoming);
            let children = self.neighbors(id, Direction::Outgoing);
            for &parent in &parents {
                for &child in &children {
                    let (p, c): (NodeIndex<u32>, NodeIndex<u32>) = (parent.into(), child.into());
                    if self.graph.find_edge(p, c).is_none() {
                        self.graph.add_edge(
                            p,
                            c,
                            OrderEdge {
                                declared: ConstraintKind::LessThan,
                            },
                        );
                    }
                }
            }
            tracing::debug!(
                "restructured {}: linked {} parent(s) to {} child(ren)",
                id,
                parents.len(),
                children.len()
            );
        }

        let removed = self
            .graph
            .remove_node(idx)
            .ok_or_else(|| unknown(id))?;
        tracing::info!("removed entity {}", id);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(removed)
    }

    /// Returns `true` if `id` refers to a registered entity.
    pub fn contains(&self, id: EntityId) -> bool {
        self.graph.contains_node(id.into())
    }

    /// Looks up an entity.
    pub fn entity(&self, id: EntityId) -> Option<&ValueEntity> {
        self.graph.node_weight(id.into())
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut ValueEntity> {
        self.graph.node_weight_mut(id.into())
    }

    /// Current committed value of an entity.
    pub fn value(&self, id: EntityId) -> Option<i32> {
        self.entity(id).map(ValueEntity::value)
    }

    /// Number of registered entities.
    pub fn entity_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of stored constraints (one edge per constraint).
    pub fn constraint_count(&self) -> usize {
        self.graph.edge_count()
    }

    // -----------------------------------------------------------------------
    // Adjacency
    // -----------------------------------------------------------------------

    /// Entities that must stay strictly greater than `id`, in insertion order.
    pub fn children(&self, id: EntityId) -> Neighbors {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Entities that must stay strictly smaller than `id`, in insertion order.
    pub fn parents(&self, id: EntityId) -> Neighbors {
        self.neighbors(id, Direction::Incoming)
    }

    /// Neighbors in one direction, oldest edge first. Unknown ids have none.
    pub(crate) fn neighbors(&self, id: EntityId, dir: Direction) -> Neighbors {
        let idx: NodeIndex<u32> = id.into();
        if !self.graph.contains_node(idx) {
            return Neighbors::new();
        }
        // petgraph walks each adjacency list newest edge first.
        let mut out: Neighbors = self
            .graph
            .neighbors_directed(idx, dir)
            .map(EntityId::from)
            .collect();
        out.reverse();
        out
    }

    /// Returns `true` if the graph stores `smaller < larger` directly.
    pub fn has_constraint(&self, smaller: EntityId, larger: EntityId) -> bool {
        self.graph
            .find_edge(smaller.into(), larger.into())
            .is_some()
    }

    /// All stored constraints as `(smaller, larger, declared)` triples.
    pub fn constraints(&self) -> Vec<(EntityId, EntityId, ConstraintKind)> {
        self.graph
            .edge_references()
            .map(|e| {
                (
                    EntityId::from(e.source()),
                    EntityId::from(e.target()),
                    e.weight().declared,
                )
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Constraint mutation
    // -----------------------------------------------------------------------

    /// Requires `dependent < limiter` for every limiter. All-or-nothing.
    ///
    /// Returns the number of edges newly inserted (duplicates are no-ops).
    pub fn add_less_than(
        &mut self,
        dependent: EntityId,
        limiters: &[EntityId],
    ) -> Result<usize, ConstraintError> {
        self.add_constraints(ConstraintKind::LessThan, dependent, limiters)
    }

    /// Requires `dependent > limiter` for every limiter. All-or-nothing.
    pub fn add_greater_than(
        &mut self,
        dependent: EntityId,
        limiters: &[EntityId],
    ) -> Result<usize, ConstraintError> {
        self.add_constraints(ConstraintKind::GreaterThan, dependent, limiters)
    }

    /// Adds one constraint per limiter. On the first failure every edge
    /// inserted earlier in this call is removed before the error is
    /// returned.
    pub fn add_constraints(
        &mut self,
        kind: ConstraintKind,
        dependent: EntityId,
        limiters: &[EntityId],
    ) -> Result<usize, ConstraintError> {
        let mut added: Vec<EdgeIndex<u32>> = Vec::with_capacity(limiters.len());

        for &limiter in limiters {
            match self.add_constraint(kind, dependent, limiter) {
                Ok(Some(edge)) => added.push(edge),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        "rejected {} {} {}: {}; rolling back {} edge(s)",
                        dependent,
                        kind,
                        limiter,
                        err,
                        added.len()
                    );
                    for edge in added.into_iter().rev() {
                        self.graph.remove_edge(edge);
                    }
                    return Err(err);
                }
            }
        }

        if !added.is_empty() {
            tracing::info!(
                "added {} constraint(s) {} {} {:?}",
                added.len(),
                dependent,
                kind,
                limiters
            );
        }

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(added.len())
    }

    /// Validates and inserts a single edge. `Ok(None)` means it already
    /// existed.
    fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        dependent: EntityId,
        limiter: EntityId,
    ) -> Result<Option<EdgeIndex<u32>>, ConstraintError> {
        let dependent_value = self.value(dependent).ok_or_else(|| unknown(dependent))?;
        let limiter_value = self.value(limiter).ok_or_else(|| unknown(limiter))?;

        let (smaller, larger) = kind.orient(dependent, limiter);

        if self.has_constraint(smaller, larger) {
            return Ok(None);
        }
        if self.has_constraint(larger, smaller) {
            return Err(ConstraintError::ConflictingEdge {
                dependent,
                limiter,
                kind,
            });
        }
        if dependent == limiter {
            return Err(order_violation(kind, dependent, dependent_value, limiter, limiter_value));
        }

        // The new edge extends the graph from the limiter: towards its
        // children for less-than, towards its parents for greater-than.
        // Structure is checked before values so a closing edge reports the
        // cycle rather than the value clash it necessarily implies.
        let extension = match kind {
            ConstraintKind::LessThan => Direction::Outgoing,
            ConstraintKind::GreaterThan => Direction::Incoming,
        };
        if self.reaches(limiter, dependent, extension) {
            return Err(ConstraintError::CycleDetected {
                dependent,
                limiter,
                kind,
            });
        }

        if !kind.holds(dependent_value, limiter_value) {
            return Err(order_violation(kind, dependent, dependent_value, limiter, limiter_value));
        }

        let edge = self
            .graph
            .add_edge(smaller.into(), larger.into(), OrderEdge { declared: kind });
        Ok(Some(edge))
    }

    /// Depth-first search from `start` along `dir`; `true` if `target` is
    /// reachable. The visited set belongs to this call alone.
    pub fn reaches(&self, start: EntityId, target: EntityId, dir: Direction) -> bool {
        let mut visited: HashSet<EntityId> = HashSet::new();
        let mut stack: Vec<EntityId> = vec![start];

        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(
                self.graph
                    .neighbors_directed(current.into(), dir)
                    .map(EntityId::from)
                    .filter(|n| !visited.contains(n)),
            );
        }
        false
    }

    fn index_of(&self, id: EntityId) -> Result<NodeIndex<u32>, ConstraintError> {
        let idx: NodeIndex<u32> = id.into();
        if self.graph.contains_node(idx) {
            Ok(idx)
        } else {
            Err(unknown(id))
        }
    }

    /// Verifies graph invariants. Panics if violated.
    ///
    /// 1. No pair of entities is each other's parent and child.
    /// 2. Every edge `a -> b` has `a.value < b.value`.
    /// 3. No cycles.
    #[cfg(debug_assertions)]
    pub(crate) fn assert_consistency(&self) {
        for edge in self.graph.edge_references() {
            let (a, b) = (edge.source(), edge.target());
            assert!(
                self.graph.find_edge(b, a).is_none(),
                "entities {} and {} are each other's parent and child",
                EntityId::from(a),
                EntityId::from(b)
            );
            let (va, vb) = (self.graph[a].value(), self.graph[b].value());
            assert!(
                va < vb,
                "constraint {} < {} violated by values {} and {}",
                EntityId::from(a),
                EntityId::from(b),
                va,
                vb
            );
        }
        assert!(
            !petgraph::algo::is_cyclic_directed(&self.graph),
            "constraint graph contains a cycle"
        );
    }
}

fn order_violation(
    kind: ConstraintKind,
    dependent: EntityId,
    dependent_value: i32,
    limiter: EntityId,
    limiter_value: i32,
) -> ConstraintError {
    ConstraintError::ValueOrderViolation {
        dependent,
        dependent_value,
        limiter,
        limiter_value,
        kind,
    }
}

fn unknown(id: EntityId) -> ConstraintError {
    ConstraintError::UnknownEntity {
        reference: id.to_string(),
    }
}
