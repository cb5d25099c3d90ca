//! ConstraintManager: the facade host controls talk to.
//!
//! The manager owns the [`ConstraintGraph`], the registration order of its
//! entities (so they can be addressed by position), the shifting policy, the
//! state of the current drag gesture, and the listeners that mirror
//! committed values back into host controls.

use std::fmt;

use crate::config::ManagerConfig;
use crate::constraint::ConstraintKind;
use crate::entity::ValueEntity;
use crate::error::ConstraintError;
use crate::event::{SliderEvent, ValueChange, ValueListener};
use crate::graph::ConstraintGraph;
use crate::id::EntityId;
use crate::negotiate::{commit, plan, NegotiationMode, Plan};
use crate::resettle::{resettle, PreferredValues};

/// Addresses an entity either by handle or by registration position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Id(EntityId),
    Index(usize),
}

impl From<EntityId> for EntityRef {
    fn from(id: EntityId) -> Self {
        EntityRef::Id(id)
    }
}

impl From<usize> for EntityRef {
    fn from(index: usize) -> Self {
        EntityRef::Index(index)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Id(id) => write!(f, "{}", id),
            EntityRef::Index(index) => write!(f, "index {}", index),
        }
    }
}

/// A drag in progress: who is being dragged and where displaced entities
/// would like to return.
#[derive(Debug)]
struct Gesture {
    origin: EntityId,
    start_value: i32,
    preferred: PreferredValues,
}

/// Registry of entities, their constraints, and the shifting policy.
pub struct ConstraintManager {
    graph: ConstraintGraph,
    order: Vec<EntityId>,
    config: ManagerConfig,
    shifting_allowed: bool,
    gesture: Option<Gesture>,
    listeners: Vec<Box<dyn ValueListener>>,
}

impl fmt::Debug for ConstraintManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintManager")
            .field("graph", &self.graph)
            .field("order", &self.order)
            .field("shifting_allowed", &self.shifting_allowed)
            .field("gesture", &self.gesture)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for ConstraintManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintManager {
    /// Creates an empty manager with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    /// Creates an empty manager.
    pub fn with_config(config: ManagerConfig) -> Self {
        ConstraintManager {
            graph: ConstraintGraph::new(),
            order: Vec::new(),
            config,
            shifting_allowed: config.shifting_allowed,
            gesture: None,
            listeners: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The underlying constraint graph.
    pub fn graph(&self) -> &ConstraintGraph {
        &self.graph
    }

    /// Registered entities in registration order.
    pub fn ids(&self) -> &[EntityId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Handle of the entity at `index`, if any.
    pub fn id_at(&self, index: usize) -> Option<EntityId> {
        self.order.get(index).copied()
    }

    /// Entity at `index`, if any.
    pub fn entity_at(&self, index: usize) -> Option<&ValueEntity> {
        self.id_at(index).and_then(|id| self.graph.entity(id))
    }

    /// Looks up an entity by handle or position.
    pub fn entity(&self, entity: impl Into<EntityRef>) -> Result<&ValueEntity, ConstraintError> {
        let id = self.resolve(entity)?;
        self.graph.entity(id).ok_or_else(|| unknown(EntityRef::Id(id)))
    }

    /// Current committed value.
    pub fn value(&self, entity: impl Into<EntityRef>) -> Result<i32, ConstraintError> {
        self.entity(entity).map(ValueEntity::value)
    }

    /// Committed values of all entities in registration order.
    pub fn values(&self) -> Vec<i32> {
        self.order
            .iter()
            .filter_map(|&id| self.graph.value(id))
            .collect()
    }

    /// Resolves a handle or position to a registered entity.
    pub fn resolve(&self, entity: impl Into<EntityRef>) -> Result<EntityId, ConstraintError> {
        let reference = entity.into();
        let id = match reference {
            EntityRef::Id(id) => Some(id).filter(|id| self.graph.contains(*id)),
            EntityRef::Index(index) => self.id_at(index),
        };
        id.ok_or_else(|| unknown(reference))
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Creates and registers an entity.
    pub fn create_entity(&mut self, initial: i32, max: i32) -> Result<EntityId, ConstraintError> {
        let entity = ValueEntity::new(initial, max)?;
        Ok(self.add_entity(entity))
    }

    /// Creates and registers an entity with the configured default maximum.
    pub fn create_entity_default(&mut self, initial: i32) -> Result<EntityId, ConstraintError> {
        self.create_entity(initial, self.config.default_max)
    }

    /// Registers an existing entity at the end of the registration order.
    pub fn add_entity(&mut self, entity: ValueEntity) -> EntityId {
        let id = self.graph.add_entity(entity);
        self.order.push(id);
        tracing::debug!("registered {} at index {}", id, self.order.len() - 1);
        id
    }

    /// Unregisters an entity and hands it back. Later positions shift down
    /// by one. See [`ConstraintGraph::remove_entity`] for `restructure`.
    pub fn remove_entity(
        &mut self,
        entity: impl Into<EntityRef>,
        restructure: bool,
    ) -> Result<ValueEntity, ConstraintError> {
        let id = self.resolve(entity)?;
        let removed = self.graph.remove_entity(id, restructure)?;
        self.order.retain(|&other| other != id);

        if self.dragging() == Some(id) {
            self.gesture = None;
        } else if let Some(gesture) = &mut self.gesture {
            gesture.preferred.settle(id);
        }
        Ok(removed)
    }

    /// Changes the maximum of an entity.
    pub fn set_max(&mut self, entity: impl Into<EntityRef>, max: i32) -> Result<(), ConstraintError> {
        let id = self.resolve(entity)?;
        self.graph
            .entity_mut(id)
            .ok_or_else(|| unknown(EntityRef::Id(id)))?
            .set_max(max)
    }

    /// Registers a listener for committed value changes.
    pub fn subscribe(&mut self, listener: impl ValueListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // -----------------------------------------------------------------------
    // Constraints
    // -----------------------------------------------------------------------

    /// Constrains `dependent` against every limiter. All-or-nothing: on any
    /// failure, including an unresolvable limiter, no edge from this call
    /// remains.
    pub fn add_constraint<R, I>(
        &mut self,
        kind: ConstraintKind,
        dependent: impl Into<EntityRef>,
        limiters: I,
    ) -> Result<usize, ConstraintError>
    where
        R: Into<EntityRef>,
        I: IntoIterator<Item = R>,
    {
        let dependent = self.resolve(dependent)?;
        let limiters = limiters
            .into_iter()
            .map(|l| self.resolve(l))
            .collect::<Result<Vec<_>, _>>()?;
        self.graph.add_constraints(kind, dependent, &limiters)
    }

    /// Shorthand for [`add_constraint`](Self::add_constraint) with
    /// [`ConstraintKind::LessThan`].
    pub fn add_less_than<R, I>(
        &mut self,
        dependent: impl Into<EntityRef>,
        limiters: I,
    ) -> Result<usize, ConstraintError>
    where
        R: Into<EntityRef>,
        I: IntoIterator<Item = R>,
    {
        self.add_constraint(ConstraintKind::LessThan, dependent, limiters)
    }

    /// Shorthand for [`add_constraint`](Self::add_constraint) with
    /// [`ConstraintKind::GreaterThan`].
    pub fn add_greater_than<R, I>(
        &mut self,
        dependent: impl Into<EntityRef>,
        limiters: I,
    ) -> Result<usize, ConstraintError>
    where
        R: Into<EntityRef>,
        I: IntoIterator<Item = R>,
    {
        self.add_constraint(ConstraintKind::GreaterThan, dependent, limiters)
    }

    // -----------------------------------------------------------------------
    // Shifting policy
    // -----------------------------------------------------------------------

    pub fn is_shifting_allowed(&self) -> bool {
        self.shifting_allowed
    }

    pub fn set_shifting_allowed(&mut self, allowed: bool) {
        self.shifting_allowed = allowed;
    }

    /// Mode for a negotiation starting now.
    pub fn mode(&self) -> NegotiationMode {
        NegotiationMode {
            allow_shifting: self.shifting_allowed,
        }
    }

    // -----------------------------------------------------------------------
    // Negotiated moves
    // -----------------------------------------------------------------------

    /// Plans moving an entity by `displacement` without committing.
    pub fn plan(
        &self,
        entity: impl Into<EntityRef>,
        displacement: i32,
    ) -> Result<Plan, ConstraintError> {
        let id = self.resolve(entity)?;
        plan(&self.graph, id, displacement, self.mode())
    }

    /// Moves an entity to exactly `value`, together with everything it has
    /// to push, or moves nothing. Returns whether the move happened. A value
    /// outside the entity's range is never reached.
    pub fn move_to(&mut self, entity: impl Into<EntityRef>, value: i32) -> Result<bool, ConstraintError> {
        let id = self.resolve(entity)?;
        let entity = self.entity(id)?;
        if !entity.accepts(value) {
            tracing::debug!("move of {} to {} refused: outside 0..={}", id, value, entity.max());
            return Ok(false);
        }
        let displacement = value - entity.value();
        if displacement == 0 {
            return Ok(true);
        }

        let plan = plan(&self.graph, id, displacement, self.mode())?;
        if !plan.is_complete() {
            tracing::debug!(
                "move of {} to {} refused: only {} of {} achievable",
                id,
                value,
                plan.achieved,
                displacement
            );
            return Ok(false);
        }
        let changes = commit(&mut self.graph, plan);
        self.notify(&changes);
        Ok(true)
    }

    /// Highest value the entity could reach right now.
    pub fn restricted_max(&self, entity: impl Into<EntityRef>) -> Result<i32, ConstraintError> {
        let id = self.resolve(entity)?;
        let e = self.entity(id)?;
        let overshoot = (e.max() - e.value()).saturating_add(1);
        let plan = plan(&self.graph, id, overshoot, self.mode())?;
        Ok(e.value() + plan.achieved)
    }

    /// Lowest value the entity could reach right now.
    pub fn restricted_min(&self, entity: impl Into<EntityRef>) -> Result<i32, ConstraintError> {
        let id = self.resolve(entity)?;
        let value = self.value(id)?;
        let plan = plan(&self.graph, id, -value - 1, self.mode())?;
        Ok(value + plan.achieved)
    }

    /// Handles a user request to set `value`: moves as far as the
    /// constraints allow, commits that, and returns the value reached.
    ///
    /// During a drag gesture, entities pushed for the first time remember
    /// where they were, and displaced entities are then pulled back toward
    /// those values as far as the new positions allow.
    pub fn request_value(
        &mut self,
        entity: impl Into<EntityRef>,
        value: i32,
    ) -> Result<i32, ConstraintError> {
        let id = self.resolve(entity)?;
        let entity = self.entity(id)?;
        let target = value.clamp(ValueEntity::MIN, entity.max());

        let plan = plan(&self.graph, id, target - entity.value(), self.mode())?;
        let mut changes = commit(&mut self.graph, plan);

        if let Some(gesture) = self.gesture.as_mut().filter(|g| g.origin == id) {
            for change in changes.iter().filter(|c| c.id != id) {
                gesture.preferred.record(change.id, change.old);
            }
            changes.extend(resettle(&mut self.graph, &mut gesture.preferred, id));
        }

        self.notify(&changes);
        self.value(id)
    }

    // -----------------------------------------------------------------------
    // Gestures
    // -----------------------------------------------------------------------

    /// Starts a drag gesture on an entity, ending any gesture in progress.
    pub fn begin_drag(&mut self, entity: impl Into<EntityRef>) -> Result<(), ConstraintError> {
        let id = self.resolve(entity)?;
        if let Some(previous) = self.gesture.as_ref().map(|g| g.origin) {
            self.end_drag(previous)?;
        }
        let start_value = self.value(id)?;
        self.gesture = Some(Gesture {
            origin: id,
            start_value,
            preferred: PreferredValues::new(),
        });
        tracing::debug!("drag started on {} at {}", id, start_value);
        Ok(())
    }

    /// Ends the drag gesture on an entity: runs a final resettling pass and
    /// forgets all preferred values. Ending a drag that is not in progress
    /// does nothing.
    pub fn end_drag(&mut self, entity: impl Into<EntityRef>) -> Result<(), ConstraintError> {
        let id = self.resolve(entity)?;
        if self.dragging() != Some(id) {
            return Ok(());
        }
        let Some(mut gesture) = self.gesture.take() else {
            return Ok(());
        };
        let changes = resettle(&mut self.graph, &mut gesture.preferred, id);
        tracing::debug!(
            "drag ended on {} ({} -> {}), {} entit(ies) left displaced",
            id,
            gesture.start_value,
            self.graph.value(id).unwrap_or(gesture.start_value),
            gesture.preferred.len()
        );
        self.notify(&changes);
        Ok(())
    }

    /// Entity currently being dragged, if any.
    pub fn dragging(&self) -> Option<EntityId> {
        self.gesture.as_ref().map(|g| g.origin)
    }

    /// Where a displaced entity would like to return during the current
    /// gesture. The dragged entity reports the value it started from.
    pub fn preferred_value(&self, entity: impl Into<EntityRef>) -> Option<i32> {
        let id = self.resolve(entity).ok()?;
        let gesture = self.gesture.as_ref()?;
        if gesture.origin == id {
            Some(gesture.start_value)
        } else {
            gesture.preferred.get(id)
        }
    }

    /// Dispatches a host event. Returns the entity's value afterwards.
    pub fn handle_event(&mut self, event: SliderEvent) -> Result<i32, ConstraintError> {
        match event {
            SliderEvent::DragStarted { id } => self.begin_drag(id)?,
            SliderEvent::ValueRequested { id, value } => return self.request_value(id, value),
            SliderEvent::DragEnded { id } => self.end_drag(id)?,
        }
        self.value(event.entity())
    }

    fn notify(&mut self, changes: &[ValueChange]) {
        for change in changes {
            for listener in &mut self.listeners {
                listener.value_committed(change);
            }
        }
    }
}

fn unknown(reference: EntityRef) -> ConstraintError {
    ConstraintError::UnknownEntity {
        reference: reference.to_string(),
    }
}
