//! End-to-end scenarios through the public `ConstraintManager` API.
//!
//! Tests cover:
//! - The four-slider diamond pushed by its root
//! - Cycle rejection on a chain
//! - Batch rollback across separate calls
//! - Restricted maximum with and without shifting
//! - Host event round trip with listeners mirroring values

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tether_core::{
    ConstraintError, ConstraintManager, EntityId, ManagerConfig, SliderEvent, ValueChange,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Manager holding entities with the given values (maximum 100).
fn sliders(values: &[i32]) -> (ConstraintManager, Vec<EntityId>) {
    let mut manager = ConstraintManager::new();
    let ids = values
        .iter()
        .map(|&v| manager.create_entity_default(v).unwrap())
        .collect();
    (manager, ids)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn diamond_is_pushed_by_its_root() {
    let (mut manager, ids) = sliders(&[0, 1, 2, 3]);
    manager.add_less_than(ids[0], [ids[1], ids[2], ids[3]]).unwrap();
    manager.add_less_than(ids[1], [ids[3]]).unwrap();
    manager.add_greater_than(ids[3], [ids[2]]).unwrap();
    assert_eq!(manager.graph().constraint_count(), 5);

    assert_eq!(manager.request_value(ids[0], 20).unwrap(), 20);
    assert_eq!(manager.values(), vec![20, 21, 21, 22]);
}

#[test]
fn closing_a_chain_is_a_cycle() {
    let (mut manager, ids) = sliders(&[0, 1, 2, 3]);
    for pair in ids.windows(2) {
        manager.add_less_than(pair[0], [pair[1]]).unwrap();
    }

    let err = manager.add_less_than(ids[3], [ids[0]]).unwrap_err();
    assert!(matches!(err, ConstraintError::CycleDetected { .. }));
    assert_eq!(manager.graph().constraint_count(), 3);
}

#[test]
fn failed_batch_keeps_only_earlier_edges() {
    let (mut manager, ids) = sliders(&[0, 1, 2, 3]);
    manager.add_less_than(ids[0], [ids[1], ids[3]]).unwrap();

    // 2 < 0 contradicts the values; nothing from this batch survives.
    assert!(manager.add_less_than(ids[2], [ids[3], ids[0]]).is_err());
    assert_eq!(manager.graph().constraint_count(), 2);
    assert!(manager.graph().has_constraint(ids[0], ids[1]));
    assert!(manager.graph().has_constraint(ids[0], ids[3]));
    assert!(!manager.graph().has_constraint(ids[2], ids[3]));
}

#[test]
fn duplicate_and_opposite_constraints() {
    let (mut manager, ids) = sliders(&[0, 1]);
    assert_eq!(manager.add_less_than(ids[0], [ids[1]]).unwrap(), 1);
    assert_eq!(manager.add_greater_than(ids[1], [ids[0]]).unwrap(), 0);
    assert!(matches!(
        manager.add_greater_than(ids[0], [ids[1]]),
        Err(ConstraintError::ConflictingEdge { .. })
    ));
    assert_eq!(manager.graph().constraint_count(), 1);
}

#[test]
fn restricted_max_with_a_single_child() {
    let (mut manager, ids) = sliders(&[10, 40]);
    manager.add_less_than(ids[0], [ids[1]]).unwrap();

    manager.set_shifting_allowed(false);
    assert_eq!(manager.restricted_max(ids[0]).unwrap(), 39);

    manager.set_shifting_allowed(true);
    assert_eq!(manager.restricted_max(ids[0]).unwrap(), 99);
    manager.set_max(ids[1], 60).unwrap();
    assert_eq!(manager.restricted_max(ids[0]).unwrap(), 59);
}

#[test]
fn host_events_round_trip_through_listeners() {
    let (mut manager, ids) = sliders(&[10, 20, 30]);
    manager.add_less_than(ids[0], [ids[1]]).unwrap();
    manager.add_less_than(ids[1], [ids[2]]).unwrap();

    // A host mirror of every control's displayed value.
    let display: Rc<RefCell<HashMap<EntityId, i32>>> = Rc::default();
    let mirror = Rc::clone(&display);
    manager.subscribe(move |c: &ValueChange| {
        mirror.borrow_mut().insert(c.id, c.new);
    });

    let events = [
        SliderEvent::DragStarted { id: ids[0] },
        SliderEvent::ValueRequested { id: ids[0], value: 50 },
        SliderEvent::ValueRequested { id: ids[0], value: 15 },
        SliderEvent::DragEnded { id: ids[0] },
    ];
    for event in events {
        manager.handle_event(event).unwrap();
    }

    // The pushed sliders went back to where they started.
    assert_eq!(manager.values(), vec![15, 20, 30]);
    let display = display.borrow();
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(display.get(id).copied(), Some(manager.values()[i]));
    }
}

#[test]
fn config_controls_defaults() {
    let config: ManagerConfig =
        serde_json::from_str(r#"{ "default_max": 20, "shifting_allowed": false }"#).unwrap();
    let mut manager = ConstraintManager::with_config(config);
    let a = manager.create_entity_default(5).unwrap();
    let b = manager.create_entity_default(10).unwrap();
    manager.add_less_than(a, [b]).unwrap();

    assert!(!manager.move_to(a, 15).unwrap());
    assert_eq!(manager.restricted_max(b).unwrap(), 20);
    assert!(matches!(
        manager.create_entity_default(21),
        Err(ConstraintError::ValueOutOfRange { value: 21, max: 20 })
    ));
}
