//! Movement negotiation: how far can an entity move, and who has to make
//! room for it.
//!
//! Negotiation runs in two phases:
//!
//! 1. [`Planner::displace`] explores a requested displacement against the
//!    graph without touching it. Every entity the move would push is given
//!    a proposed value inside the planner, and later reads during the same
//!    exploration see those proposed values. The result is a [`Plan`].
//! 2. [`commit`] applies a plan to the graph in one pass.
//!
//! Dropping a plan discards it; nothing observable changed.
//!
//! # Algorithm
//!
//! Moving entity `E` by `d` targets `desired = E + d`, clamped to `E`'s own
//! `0..=max` range. Only neighbors on the side of travel matter: children
//! when moving up, parents when moving down. A neighbor *conflicts* when it
//! would no longer be strictly on its side of `desired`. For each
//! conflicting neighbor `N`, `E` may advance up to one unit short of `N`;
//! when shifting is allowed, `N` is first asked to move by
//! `|N - desired| + 1` and whatever `N` achieves is added to that allowance.
//! `E` moves by the most restrictive allowance. A neighbor that an earlier
//! recursive step has already pushed clear of `desired` is skipped.

use indexmap::IndexMap;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::entity::ValueEntity;
use crate::error::ConstraintError;
use crate::event::ValueChange;
use crate::graph::{ConstraintGraph, Neighbors};
use crate::id::EntityId;

/// Parameters threaded through one negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationMode {
    /// Whether blocking neighbors may be displaced recursively.
    pub allow_shifting: bool,
}

impl NegotiationMode {
    /// Blocking neighbors are pushed out of the way where possible.
    pub const SHIFTING: NegotiationMode = NegotiationMode {
        allow_shifting: true,
    };

    /// Movement stops one unit short of the nearest blocking neighbor.
    pub const CLAMPED: NegotiationMode = NegotiationMode {
        allow_shifting: false,
    };
}

/// The outcome of planning one displacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Entity the displacement was requested for.
    pub origin: EntityId,
    /// Signed displacement that was requested.
    pub requested: i32,
    /// Signed displacement the origin can actually make.
    pub achieved: i32,
    /// Proposed value for every entity that would move, in visit order.
    proposed: IndexMap<EntityId, i32>,
}

impl Plan {
    /// Returns `true` if the full requested displacement is achievable.
    pub fn is_complete(&self) -> bool {
        self.achieved == self.requested
    }

    /// Returns `true` if nothing would move.
    pub fn is_empty(&self) -> bool {
        self.proposed.is_empty()
    }

    /// Proposed value for `id`, if the plan moves it.
    pub fn proposed_value(&self, id: EntityId) -> Option<i32> {
        self.proposed.get(&id).copied()
    }
}

/// Explores displacements against a borrowed graph.
///
/// A planner can answer several [`displace`](Self::displace) calls in a row;
/// each sees the proposed values left by the previous ones.
#[derive(Debug)]
pub struct Planner<'g> {
    graph: &'g ConstraintGraph,
    mode: NegotiationMode,
    proposed: IndexMap<EntityId, i32>,
    depth: usize,
}

impl<'g> Planner<'g> {
    /// Creates a planner with no proposed values.
    pub fn new(graph: &'g ConstraintGraph, mode: NegotiationMode) -> Self {
        Planner {
            graph,
            mode,
            proposed: IndexMap::new(),
            depth: 0,
        }
    }

    /// Value of `id` as this planner currently sees it.
    pub fn value(&self, id: EntityId) -> Option<i32> {
        self.proposed
            .get(&id)
            .copied()
            .or_else(|| self.graph.value(id))
    }

    /// Plans moving `id` by `displacement` and returns the signed
    /// displacement achieved: same sign as requested, never larger in
    /// magnitude, `0` when fully blocked or when `id` is unknown.
    pub fn displace(&mut self, id: EntityId, displacement: i32) -> i32 {
        if displacement == 0 {
            return 0;
        }
        let (Some(entity), Some(current)) = (self.graph.entity(id), self.value(id)) else {
            return 0;
        };

        let step = displacement.signum();
        let room = if step > 0 {
            entity.max() - current
        } else {
            current - ValueEntity::MIN
        };
        let mut allowed = displacement.saturating_abs().min(room.max(0));
        // Never aim past our own bounds; neighbors beyond them are not in the way.
        let desired = current + step * allowed;

        let side = if step > 0 {
            Direction::Outgoing
        } else {
            Direction::Incoming
        };
        let conflicting: Neighbors = self
            .graph
            .neighbors(id, side)
            .into_iter()
            .filter(|&n| self.blocks(n, desired, step))
            .collect();

        tracing::debug!(
            depth = self.depth,
            "{} at {} asked to move {} (room {}, {} conflicting)",
            id,
            current,
            displacement,
            room,
            conflicting.len()
        );

        self.depth += 1;
        for neighbor in conflicting {
            if !self.blocks(neighbor, desired, step) {
                continue;
            }
            let Some(neighbor_value) = self.value(neighbor) else {
                continue;
            };
            // Stop one unit short of the neighbor, plus whatever it yields.
            let mut reach = (neighbor_value - current).abs() - 1;
            if self.mode.allow_shifting {
                let push = (neighbor_value - desired).abs().saturating_add(1);
                reach = reach.saturating_add(self.displace(neighbor, step * push).abs());
            }
            allowed = allowed.min(reach.max(0));
        }
        self.depth -= 1;

        if allowed != 0 {
            self.proposed.insert(id, current + step * allowed);
        }
        tracing::debug!(depth = self.depth, "{} moves {}", id, step * allowed);
        step * allowed
    }

    /// Returns `true` if `neighbor` sits in the way of reaching `desired`.
    fn blocks(&self, neighbor: EntityId, desired: i32, step: i32) -> bool {
        match self.value(neighbor) {
            Some(v) if step > 0 => v <= desired,
            Some(v) => v >= desired,
            None => false,
        }
    }

    /// Finishes planning and packages the proposed values.
    pub fn into_plan(self, origin: EntityId, requested: i32, achieved: i32) -> Plan {
        Plan {
            origin,
            requested,
            achieved,
            proposed: self.proposed,
        }
    }
}

/// Plans moving `id` by `displacement` under `mode`.
pub fn plan(
    graph: &ConstraintGraph,
    id: EntityId,
    displacement: i32,
    mode: NegotiationMode,
) -> Result<Plan, ConstraintError> {
    if !graph.contains(id) {
        return Err(ConstraintError::UnknownEntity {
            reference: id.to_string(),
        });
    }
    let mut planner = Planner::new(graph, mode);
    let achieved = planner.displace(id, displacement);
    Ok(planner.into_plan(id, displacement, achieved))
}

/// Applies every proposed value of `plan` and reports what changed.
pub fn commit(graph: &mut ConstraintGraph, plan: Plan) -> Vec<ValueChange> {
    let mut changes = Vec::with_capacity(plan.proposed.len());
    for (id, new) in plan.proposed {
        let Some(entity) = graph.entity_mut(id) else {
            continue;
        };
        let old = entity.value();
        if old != new {
            entity.apply(new);
            changes.push(ValueChange { id, old, new });
        }
    }

    if !changes.is_empty() {
        tracing::info!(
            "committed move of {} by {}: {} entit(ies) changed",
            plan.origin,
            plan.achieved,
            changes.len()
        );
    }

    #[cfg(debug_assertions)]
    graph.assert_consistency();

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(values: &[i32], max: i32) -> (ConstraintGraph, Vec<EntityId>) {
        let mut graph = ConstraintGraph::new();
        let ids = values
            .iter()
            .map(|&v| graph.add_entity(ValueEntity::new(v, max).unwrap()))
            .collect();
        (graph, ids)
    }

    #[test]
    fn zero_displacement_is_a_no_op() {
        let (graph, ids) = graph_with(&[5], 100);
        let plan = plan(&graph, ids[0], 0, NegotiationMode::SHIFTING).unwrap();
        assert_eq!(plan.achieved, 0);
        assert!(plan.is_complete());
        assert!(plan.is_empty());
    }

    #[test]
    fn unconstrained_move_is_clamped_to_bounds() {
        let (graph, ids) = graph_with(&[5], 10);
        let up = plan(&graph, ids[0], 20, NegotiationMode::SHIFTING).unwrap();
        assert_eq!(up.achieved, 5);
        assert_eq!(up.proposed_value(ids[0]), Some(10));

        let down = plan(&graph, ids[0], -8, NegotiationMode::SHIFTING).unwrap();
        assert_eq!(down.achieved, -5);
        assert_eq!(down.proposed_value(ids[0]), Some(0));
    }

    #[test]
    fn clamped_mode_stops_below_child() {
        let (mut graph, ids) = graph_with(&[0, 10], 100);
        graph.add_less_than(ids[0], &[ids[1]]).unwrap();

        let plan = plan(&graph, ids[0], 30, NegotiationMode::CLAMPED).unwrap();
        assert_eq!(plan.achieved, 9);
        assert_eq!(plan.proposed_value(ids[0]), Some(9));
        assert_eq!(plan.proposed_value(ids[1]), None);
    }

    #[test]
    fn clamped_mode_stops_above_parent() {
        let (mut graph, ids) = graph_with(&[10, 40], 100);
        graph.add_less_than(ids[0], &[ids[1]]).unwrap();

        let plan = plan(&graph, ids[1], -35, NegotiationMode::CLAMPED).unwrap();
        assert_eq!(plan.achieved, -29);
        assert_eq!(plan.proposed_value(ids[1]), Some(11));
    }

    #[test]
    fn shifting_pushes_child_ahead() {
        let (mut graph, ids) = graph_with(&[0, 10], 100);
        graph.add_less_than(ids[0], &[ids[1]]).unwrap();

        let plan = plan(&graph, ids[0], 30, NegotiationMode::SHIFTING).unwrap();
        assert!(plan.is_complete());
        assert_eq!(plan.proposed_value(ids[0]), Some(30));
        assert_eq!(plan.proposed_value(ids[1]), Some(31));
    }

    #[test]
    fn extreme_displacements_clamp_without_overflow() {
        let (mut graph, ids) = graph_with(&[0, 10], i32::MAX);
        graph.add_less_than(ids[0], &[ids[1]]).unwrap();

        let up = plan(&graph, ids[0], i32::MAX, NegotiationMode::SHIFTING).unwrap();
        assert_eq!(up.achieved, i32::MAX - 1);
        assert_eq!(up.proposed_value(ids[1]), Some(i32::MAX));

        let down = plan(&graph, ids[1], i32::MIN, NegotiationMode::SHIFTING).unwrap();
        assert_eq!(down.achieved, -9);
        assert_eq!(down.proposed_value(ids[1]), Some(1));
    }

    #[test]
    fn neighbors_beyond_own_bounds_are_not_pushed() {
        let mut graph = ConstraintGraph::new();
        let parent = graph.add_entity(ValueEntity::new(0, 10).unwrap());
        let child = graph.add_entity(ValueEntity::new(50, 100).unwrap());
        graph.add_less_than(parent, &[child]).unwrap();

        let plan = plan(&graph, parent, 1000, NegotiationMode::SHIFTING).unwrap();
        assert_eq!(plan.achieved, 10);
        assert_eq!(plan.proposed_value(child), None);
    }

    #[test]
    fn pushed_child_at_its_max_limits_the_parent() {
        let (mut graph, ids) = graph_with(&[0, 10], 20);
        graph.add_less_than(ids[0], &[ids[1]]).unwrap();

        let plan = plan(&graph, ids[0], 30, NegotiationMode::SHIFTING).unwrap();
        assert_eq!(plan.achieved, 19);
        assert_eq!(plan.proposed_value(ids[1]), Some(20));
    }

    #[test]
    fn shifting_down_pushes_parents() {
        let (mut graph, ids) = graph_with(&[20, 30, 40], 100);
        graph.add_less_than(ids[0], &[ids[1]]).unwrap();
        graph.add_less_than(ids[1], &[ids[2]]).unwrap();

        let plan = plan(&graph, ids[2], -35, NegotiationMode::SHIFTING).unwrap();
        assert!(plan.is_complete());
        assert_eq!(plan.proposed_value(ids[2]), Some(5));
        assert_eq!(plan.proposed_value(ids[1]), Some(4));
        assert_eq!(plan.proposed_value(ids[0]), Some(3));
    }

    #[test]
    fn chain_bottoming_out_limits_the_mover() {
        let (mut graph, ids) = graph_with(&[20, 30, 40], 100);
        graph.add_less_than(ids[0], &[ids[1]]).unwrap();
        graph.add_less_than(ids[1], &[ids[2]]).unwrap();

        let plan = plan(&graph, ids[2], -39, NegotiationMode::SHIFTING).unwrap();
        assert_eq!(plan.achieved, -38);
        assert_eq!(plan.proposed_value(ids[0]), Some(0));
        assert_eq!(plan.proposed_value(ids[1]), Some(1));
        assert_eq!(plan.proposed_value(ids[2]), Some(2));
    }

    #[test]
    fn fully_blocked_move_returns_zero() {
        let (mut graph, ids) = graph_with(&[4, 5], 5);
        graph.add_less_than(ids[0], &[ids[1]]).unwrap();

        let plan = plan(&graph, ids[0], 1, NegotiationMode::SHIFTING).unwrap();
        assert_eq!(plan.achieved, 0);
        assert!(plan.is_empty());
    }

    #[test]
    fn diamond_reads_proposed_values() {
        // Values 0,1,2,3 with 0<1, 0<2, 0<3, 1<3, 2<3.
        let (mut graph, ids) = graph_with(&[0, 1, 2, 3], 100);
        graph.add_less_than(ids[0], &[ids[1], ids[2], ids[3]]).unwrap();
        graph.add_less_than(ids[1], &[ids[3]]).unwrap();
        graph.add_greater_than(ids[3], &[ids[2]]).unwrap();

        let plan = plan(&graph, ids[0], 20, NegotiationMode::SHIFTING).unwrap();
        assert!(plan.is_complete());
        let values: Vec<_> = ids.iter().map(|&id| plan.proposed_value(id)).collect();
        assert_eq!(values, vec![Some(20), Some(21), Some(21), Some(22)]);
    }

    #[test]
    fn planning_does_not_touch_the_graph() {
        let (mut graph, ids) = graph_with(&[0, 1], 100);
        graph.add_less_than(ids[0], &[ids[1]]).unwrap();
        let _ = plan(&graph, ids[0], 50, NegotiationMode::SHIFTING).unwrap();
        assert_eq!(graph.value(ids[0]), Some(0));
        assert_eq!(graph.value(ids[1]), Some(1));
    }

    #[test]
    fn commit_applies_and_reports_changes() {
        let (mut graph, ids) = graph_with(&[0, 1], 100);
        graph.add_less_than(ids[0], &[ids[1]]).unwrap();
        let plan = plan(&graph, ids[0], 5, NegotiationMode::SHIFTING).unwrap();

        let changes = commit(&mut graph, plan);
        assert_eq!(graph.value(ids[0]), Some(5));
        assert_eq!(graph.value(ids[1]), Some(6));
        assert_eq!(changes.len(), 2);
        assert!(changes.contains(&ValueChange {
            id: ids[1],
            old: 1,
            new: 6
        }));
    }

    #[test]
    fn plan_for_unknown_entity_errors() {
        let (graph, _) = graph_with(&[0], 100);
        let err = plan(&graph, EntityId(7), 1, NegotiationMode::SHIFTING).unwrap_err();
        assert!(matches!(err, ConstraintError::UnknownEntity { .. }));
    }
}
