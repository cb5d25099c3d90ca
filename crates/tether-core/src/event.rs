//! Host contract: events coming in from slider controls and committed values
//! going back out to them.
//!
//! A host control forwards user interaction as [`SliderEvent`]s. Committed
//! results flow back through [`ValueListener::value_committed`], which is
//! the silent apply path: it only mirrors a value that negotiation already
//! settled and never triggers another negotiation. Listeners hold no handle
//! to the manager, so a notification cannot re-enter it.

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// One committed value change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueChange {
    pub id: EntityId,
    pub old: i32,
    pub new: i32,
}

/// User interaction reported by a host control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SliderEvent {
    /// The user grabbed the control.
    DragStarted { id: EntityId },
    /// The user asked for a new value (drag motion or programmatic set).
    ValueRequested { id: EntityId, value: i32 },
    /// The user released the control.
    DragEnded { id: EntityId },
}

impl SliderEvent {
    /// The entity the event is about.
    pub fn entity(&self) -> EntityId {
        match *self {
            SliderEvent::DragStarted { id }
            | SliderEvent::ValueRequested { id, .. }
            | SliderEvent::DragEnded { id } => id,
        }
    }
}

/// Receives committed values, typically to redraw a control.
pub trait ValueListener {
    /// Called once per changed entity after a plan is committed.
    fn value_committed(&mut self, change: &ValueChange);
}

impl<F> ValueListener for F
where
    F: FnMut(&ValueChange),
{
    fn value_committed(&mut self, change: &ValueChange) {
        self(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_listeners() {
        let mut seen = Vec::new();
        {
            let mut listener = |c: &ValueChange| seen.push(c.new);
            listener.value_committed(&ValueChange {
                id: EntityId(0),
                old: 1,
                new: 2,
            });
        }
        assert_eq!(seen, vec![2]);
    }

    #[test]
    fn events_deserialize_from_tagged_json() {
        let event: SliderEvent =
            serde_json::from_str(r#"{"event":"value_requested","id":2,"value":40}"#).unwrap();
        assert_eq!(
            event,
            SliderEvent::ValueRequested {
                id: EntityId(2),
                value: 40
            }
        );
        assert_eq!(event.entity(), EntityId(2));
    }
}
