//! Error types for tether-core.
//!
//! Uses `thiserror` for structured, matchable variants. Every variant is a
//! synchronous, local failure: graph mutations that fail leave the graph as
//! it was before the call. An entity that cannot move is not an error; the
//! negotiation reports that through its return value.

use thiserror::Error;

use crate::constraint::ConstraintKind;
use crate::id::EntityId;

/// Errors produced by the constraint graph and the manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    /// Adding the edge would close a cycle through `dependent`.
    #[error("adding {dependent} {kind} {limiter} would create a cycle")]
    CycleDetected {
        dependent: EntityId,
        limiter: EntityId,
        kind: ConstraintKind,
    },

    /// The pair already carries an edge in the opposite direction.
    #[error("{dependent} {kind} {limiter} conflicts with an existing opposite constraint")]
    ConflictingEdge {
        dependent: EntityId,
        limiter: EntityId,
        kind: ConstraintKind,
    },

    /// The current values already violate the requested order, or the
    /// constraint relates an entity to itself.
    #[error("{dependent}={dependent_value} {kind} {limiter}={limiter_value} does not hold")]
    ValueOrderViolation {
        dependent: EntityId,
        dependent_value: i32,
        limiter: EntityId,
        limiter_value: i32,
        kind: ConstraintKind,
    },

    /// A handle or position does not resolve to a registered entity.
    #[error("unknown entity: {reference}")]
    UnknownEntity { reference: String },

    /// A value or bound falls outside `0..=max`.
    #[error("value {value} outside 0..={max}")]
    ValueOutOfRange { value: i32, max: i32 },
}

impl ConstraintError {
    /// Returns `true` for the failures that would leave the graph
    /// inconsistent had the edge been inserted.
    pub fn is_inconsistent_graph(&self) -> bool {
        matches!(
            self,
            ConstraintError::CycleDetected { .. }
                | ConstraintError::ConflictingEdge { .. }
                | ConstraintError::ValueOrderViolation { .. }
        )
    }
}
