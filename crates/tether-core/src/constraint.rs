//! Constraint kinds and the edge weight stored in the graph.
//!
//! Every constraint is stored as a single directed edge from the entity that
//! must stay smaller to the entity that must stay larger, regardless of how
//! the caller phrased it. [`OrderEdge`] keeps the original phrasing so the
//! graph can report constraints back the way they were declared.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two supported order relations between a dependent and a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// `dependent < limiter`.
    LessThan,
    /// `dependent > limiter`.
    GreaterThan,
}

impl ConstraintKind {
    /// Returns `true` if the pair of values satisfies this relation.
    pub fn holds(self, dependent: i32, limiter: i32) -> bool {
        match self {
            ConstraintKind::LessThan => dependent < limiter,
            ConstraintKind::GreaterThan => dependent > limiter,
        }
    }

    /// Orients a `(dependent, limiter)` pair as `(smaller, larger)`.
    pub fn orient<T>(self, dependent: T, limiter: T) -> (T, T) {
        match self {
            ConstraintKind::LessThan => (dependent, limiter),
            ConstraintKind::GreaterThan => (limiter, dependent),
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::LessThan => f.write_str("<"),
            ConstraintKind::GreaterThan => f.write_str(">"),
        }
    }
}

/// Edge weight: `source < target`, remembered with its declared phrasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEdge {
    /// How the constraint was declared when the edge was inserted.
    pub declared: ConstraintKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orient_puts_smaller_first() {
        assert_eq!(ConstraintKind::LessThan.orient('a', 'b'), ('a', 'b'));
        assert_eq!(ConstraintKind::GreaterThan.orient('a', 'b'), ('b', 'a'));
    }

    #[test]
    fn holds_is_strict() {
        assert!(ConstraintKind::LessThan.holds(1, 2));
        assert!(!ConstraintKind::LessThan.holds(2, 2));
        assert!(ConstraintKind::GreaterThan.holds(3, 2));
        assert!(!ConstraintKind::GreaterThan.holds(2, 2));
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ConstraintKind::GreaterThan).unwrap();
        assert_eq!(json, "\"greater_than\"");
    }
}
