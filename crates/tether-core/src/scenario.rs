//! Scripted scenarios: a JSON description of sliders, their constraints and
//! a sequence of interactions, replayed against a [`ConstraintManager`].
//!
//! Entities are addressed by registration position throughout. Setup
//! failures (bad config, invalid entity, rejected initial constraint) abort
//! the run; a failing step is recorded in the report and the run continues.
//!
//! ```json
//! {
//!   "config": { "shifting_allowed": true },
//!   "entities": [{ "value": 0 }, { "value": 1, "max": 50 }],
//!   "constraints": [{ "kind": "less_than", "dependent": 0, "limiters": [1] }],
//!   "steps": [{ "op": "request", "entity": 0, "value": 20 }]
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ManagerConfig;
use crate::constraint::ConstraintKind;
use crate::error::ConstraintError;
use crate::event::SliderEvent;
use crate::manager::ConstraintManager;

/// Errors that stop a scenario before its steps run.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("scenario setup failed: {0}")]
    Setup(#[from] ConstraintError),
}

/// One slider to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub value: i32,
    /// Falls back to the configured default maximum.
    #[serde(default)]
    pub max: Option<i32>,
}

/// One batch of constraints, by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub kind: ConstraintKind,
    pub dependent: usize,
    pub limiters: Vec<usize>,
}

/// One interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// All-or-nothing move.
    MoveTo { entity: usize, value: i32 },
    /// Single user request, committed as far as possible.
    Request { entity: usize, value: i32 },
    /// A full gesture: drag start, one request per value, drag end.
    Drag { entity: usize, values: Vec<i32> },
    RestrictedMax { entity: usize },
    RestrictedMin { entity: usize },
    SetShifting { allowed: bool },
    AddConstraint(ConstraintSpec),
    Remove {
        entity: usize,
        #[serde(default)]
        restructure: bool,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::MoveTo { entity, value } => write!(f, "move_to {} -> {}", entity, value),
            Step::Request { entity, value } => write!(f, "request {} -> {}", entity, value),
            Step::Drag { entity, values } => write!(f, "drag {} via {:?}", entity, values),
            Step::RestrictedMax { entity } => write!(f, "restricted_max {}", entity),
            Step::RestrictedMin { entity } => write!(f, "restricted_min {}", entity),
            Step::SetShifting { allowed } => write!(f, "set_shifting {}", allowed),
            Step::AddConstraint(spec) => {
                write!(f, "constrain {} {} {:?}", spec.dependent, spec.kind, spec.limiters)
            }
            Step::Remove {
                entity,
                restructure,
            } => {
                write!(f, "remove {}", entity)?;
                if *restructure {
                    write!(f, " (restructure)")?;
                }
                Ok(())
            }
        }
    }
}

/// A complete scenario document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: ManagerConfig,
    pub entities: Vec<EntitySpec>,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Moved { moved: bool },
    Reached { value: i32 },
    Bound { value: i32 },
    Added { edges: usize },
    Removed { value: i32 },
    Done,
    Failed { error: String },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Moved { moved: true } => write!(f, "moved"),
            Outcome::Moved { moved: false } => write!(f, "refused"),
            Outcome::Reached { value } => write!(f, "reached {}", value),
            Outcome::Bound { value } => write!(f, "bound {}", value),
            Outcome::Added { edges } => write!(f, "added {} edge(s)", edges),
            Outcome::Removed { value } => write!(f, "removed (was {})", value),
            Outcome::Done => write!(f, "ok"),
            Outcome::Failed { error } => write!(f, "error: {}", error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: String,
    pub outcome: Outcome,
}

/// What a scenario run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub steps: Vec<StepReport>,
    /// Final values in registration order.
    pub values: Vec<i32>,
    /// Final constraints as `[smaller, larger]` positions, sorted.
    pub constraints: Vec<[usize; 2]>,
}

impl Report {
    /// Returns `true` if any step failed.
    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.outcome, Outcome::Failed { .. }))
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "{}. {}: {}", i + 1, step.step, step.outcome)?;
        }
        let values: Vec<String> = self.values.iter().map(i32::to_string).collect();
        writeln!(f, "values: {}", values.join(" "))?;
        let constraints: Vec<String> = self
            .constraints
            .iter()
            .map(|[a, b]| format!("{}<{}", a, b))
            .collect();
        write!(f, "constraints: {}", constraints.join(" "))
    }
}

impl Scenario {
    /// Parses a scenario document.
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds the manager described by the setup section.
    pub fn build(&self) -> Result<ConstraintManager, ScenarioError> {
        self.config.validate()?;
        let mut manager = ConstraintManager::with_config(self.config);
        for spec in &self.entities {
            match spec.max {
                Some(max) => manager.create_entity(spec.value, max)?,
                None => manager.create_entity_default(spec.value)?,
            };
        }
        for spec in &self.constraints {
            manager.add_constraint(spec.kind, spec.dependent, spec.limiters.iter().copied())?;
        }
        tracing::info!(
            "scenario set up: {} entit(ies), {} constraint(s)",
            manager.len(),
            manager.graph().constraint_count()
        );
        Ok(manager)
    }

    /// Builds the manager and replays every step.
    pub fn run(&self) -> Result<Report, ScenarioError> {
        let mut manager = self.build()?;
        let steps = self
            .steps
            .iter()
            .map(|step| {
                let outcome = apply(&mut manager, step).unwrap_or_else(|err| {
                    tracing::warn!("step `{}` failed: {}", step, err);
                    Outcome::Failed {
                        error: err.to_string(),
                    }
                });
                StepReport {
                    step: step.to_string(),
                    outcome,
                }
            })
            .collect();

        Ok(Report {
            steps,
            values: manager.values(),
            constraints: positional_constraints(&manager),
        })
    }
}

fn apply(manager: &mut ConstraintManager, step: &Step) -> Result<Outcome, ConstraintError> {
    let outcome = match step {
        Step::MoveTo { entity, value } => Outcome::Moved {
            moved: manager.move_to(*entity, *value)?,
        },
        Step::Request { entity, value } => Outcome::Reached {
            value: manager.request_value(*entity, *value)?,
        },
        Step::Drag { entity, values } => {
            let id = manager.resolve(*entity)?;
            manager.handle_event(SliderEvent::DragStarted { id })?;
            for &value in values {
                manager.handle_event(SliderEvent::ValueRequested { id, value })?;
            }
            Outcome::Reached {
                value: manager.handle_event(SliderEvent::DragEnded { id })?,
            }
        }
        Step::RestrictedMax { entity } => Outcome::Bound {
            value: manager.restricted_max(*entity)?,
        },
        Step::RestrictedMin { entity } => Outcome::Bound {
            value: manager.restricted_min(*entity)?,
        },
        Step::SetShifting { allowed } => {
            manager.set_shifting_allowed(*allowed);
            Outcome::Done
        }
        Step::AddConstraint(spec) => Outcome::Added {
            edges: manager.add_constraint(spec.kind, spec.dependent, spec.limiters.iter().copied())?,
        },
        Step::Remove {
            entity,
            restructure,
        } => Outcome::Removed {
            value: manager.remove_entity(*entity, *restructure)?.value(),
        },
    };
    Ok(outcome)
}

fn positional_constraints(manager: &ConstraintManager) -> Vec<[usize; 2]> {
    let position = |id| manager.ids().iter().position(|&other| other == id);
    let mut pairs: Vec<[usize; 2]> = manager
        .graph()
        .constraints()
        .into_iter()
        .filter_map(|(smaller, larger, _)| Some([position(smaller)?, position(larger)?]))
        .collect();
    pairs.sort_unstable();
    pairs
}
