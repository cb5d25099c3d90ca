//! Pulling displaced entities back toward where they were.
//!
//! While a drag gesture is in progress, every entity that the dragged entity
//! pushes out of place remembers its value from before the first push (its
//! *preferred* value). [`resettle`] moves each displaced entity back toward
//! its preferred value with shifting disabled, so the pass never starts a
//! new cascade.
//!
//! Entities are tried nearest-to-destination first: ascending by current
//! value for entities moving down, descending for entities moving up. That
//! way parents clear the path before their children come down, and children
//! before their parents go up. Passes repeat while any entity still makes
//! progress, so an entity blocked by several displaced neighbors gets
//! another chance once all of them have moved.

use indexmap::IndexMap;

use crate::event::ValueChange;
use crate::graph::ConstraintGraph;
use crate::id::EntityId;
use crate::negotiate::{commit, NegotiationMode, Planner};

/// Preferred values recorded during a gesture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferredValues {
    values: IndexMap<EntityId, i32>,
}

impl PreferredValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` for `id` unless one is already pending. Returns
    /// `true` if it was recorded.
    pub fn record(&mut self, id: EntityId, value: i32) -> bool {
        if self.values.contains_key(&id) {
            return false;
        }
        self.values.insert(id, value);
        true
    }

    pub fn get(&self, id: EntityId) -> Option<i32> {
        self.values.get(&id).copied()
    }

    /// Drops the pending value for `id`.
    pub fn settle(&mut self, id: EntityId) -> Option<i32> {
        self.values.shift_remove(&id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Moves displaced entities back toward their preferred values until no
/// further progress is possible. `origin` itself is never moved. Entities
/// that reach their preferred value are settled.
pub fn resettle(
    graph: &mut ConstraintGraph,
    preferred: &mut PreferredValues,
    origin: EntityId,
) -> Vec<ValueChange> {
    let mut changes = Vec::new();
    let mut passes = 0usize;

    loop {
        passes += 1;
        let mut pending: Vec<(EntityId, i32, i32)> = preferred
            .values
            .iter()
            .filter(|&(&id, _)| id != origin)
            .filter_map(|(&id, &target)| Some((id, graph.value(id)?, target)))
            .collect();

        // Down-movers lowest first, then up-movers highest first.
        pending.sort_by_key(|&(_, current, target)| {
            if target < current {
                (0, current)
            } else {
                (1, -current)
            }
        });

        let mut progressed = false;
        for (id, _, _) in pending {
            progressed |= settle_one(graph, preferred, id, &mut changes);
        }
        if !progressed {
            break;
        }
    }

    if !changes.is_empty() {
        tracing::debug!(
            "resettled around {} in {} pass(es): {} change(s), {} still displaced",
            origin,
            passes,
            changes.len(),
            preferred.len()
        );
    }
    changes
}

/// Moves `id` toward its preferred value. Returns `true` if it moved.
fn settle_one(
    graph: &mut ConstraintGraph,
    preferred: &mut PreferredValues,
    id: EntityId,
    changes: &mut Vec<ValueChange>,
) -> bool {
    let (Some(current), Some(target)) = (graph.value(id), preferred.get(id)) else {
        return false;
    };
    let mut moved = false;
    if target != current {
        let mut planner = Planner::new(graph, NegotiationMode::CLAMPED);
        let achieved = planner.displace(id, target - current);
        let plan = planner.into_plan(id, target - current, achieved);
        moved = achieved != 0;
        changes.extend(commit(graph, plan));
    }
    if graph.value(id) == Some(target) {
        preferred.settle(id);
    }
    moved
}
