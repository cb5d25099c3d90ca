pub mod id;
pub mod error;
pub mod constraint;
pub mod entity;
pub mod event;
pub mod config;
pub mod graph;
pub mod negotiate;
pub mod resettle;
pub mod manager;
pub mod scenario;

// Re-export commonly used types
pub use id::EntityId;
pub use error::ConstraintError;
pub use constraint::ConstraintKind;
pub use entity::ValueEntity;
pub use event::{SliderEvent, ValueChange, ValueListener};
pub use config::ManagerConfig;
pub use graph::ConstraintGraph;
pub use negotiate::{NegotiationMode, Plan};
pub use manager::{ConstraintManager, EntityRef};
pub use scenario::{Report, Scenario, ScenarioError};
