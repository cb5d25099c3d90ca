//! The bounded scalar carried by every graph node.

use serde::{Deserialize, Serialize};

use crate::error::ConstraintError;

/// A bounded integer value in `0..=max`.
///
/// The value only changes through committed negotiation results (or through
/// [`ConstraintManager`](crate::manager::ConstraintManager) operations built
/// on them), so the order constraints around it always hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueEntity {
    value: i32,
    max: i32,
}

impl ValueEntity {
    /// Lower bound shared by every entity.
    pub const MIN: i32 = 0;

    /// Creates an entity, rejecting `value` outside `0..=max`.
    pub fn new(value: i32, max: i32) -> Result<Self, ConstraintError> {
        if max < Self::MIN || !(Self::MIN..=max).contains(&value) {
            return Err(ConstraintError::ValueOutOfRange { value, max });
        }
        Ok(ValueEntity { value, max })
    }

    /// Current committed value.
    pub fn value(&self) -> i32 {
        self.value
    }

    /// Configured maximum.
    pub fn max(&self) -> i32 {
        self.max
    }

    /// Returns `true` if `value` lies within this entity's bounds.
    pub fn accepts(&self, value: i32) -> bool {
        (Self::MIN..=self.max).contains(&value)
    }

    /// Changes the maximum. A maximum below the current value is rejected.
    pub fn set_max(&mut self, max: i32) -> Result<(), ConstraintError> {
        if max < self.value {
            return Err(ConstraintError::ValueOutOfRange {
                value: self.value,
                max,
            });
        }
        self.max = max;
        Ok(())
    }

    /// Writes a committed value. Callers guarantee it is in range.
    pub(crate) fn apply(&mut self, value: i32) {
        debug_assert!(self.accepts(value), "committed {value} outside 0..={}", self.max);
        self.value = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_out_of_range() {
        assert!(ValueEntity::new(0, 0).is_ok());
        assert!(ValueEntity::new(100, 100).is_ok());
        assert_eq!(
            ValueEntity::new(101, 100),
            Err(ConstraintError::ValueOutOfRange { value: 101, max: 100 })
        );
        assert!(ValueEntity::new(-1, 100).is_err());
        assert!(ValueEntity::new(0, -5).is_err());
    }

    #[test]
    fn set_max_keeps_value_in_range() {
        let mut e = ValueEntity::new(40, 100).unwrap();
        e.set_max(40).unwrap();
        assert_eq!(e.max(), 40);
        assert!(e.set_max(39).is_err());
        assert_eq!(e.max(), 40);
    }

    #[test]
    fn accepts_is_inclusive() {
        let e = ValueEntity::new(5, 12).unwrap();
        assert!(e.accepts(0));
        assert!(e.accepts(12));
        assert!(!e.accepts(13));
        assert!(!e.accepts(-1));
    }
}
