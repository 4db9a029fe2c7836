//! Abstract syntax tree for the NovaIR DSL.
//!
//! The five section node families below are flat aggregates rather than a
//! class hierarchy; [`ObjectiveKind`] carries its own optional payload
//! instead of being split into subtypes. The tree is built once by the
//! parser and is immutable thereafter.

use novair_core::{CompareOp, CostLevel, ObjectiveKind, Severity, SourcePath, TickMode, ValueWithUnit};
use serde::{Deserialize, Serialize};

/// Root node: one parsed system description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub name: String,
    pub version: Option<String>,
    pub states: Vec<State>,
    pub constraints: Vec<Constraint>,
    pub objectives: Vec<Objective>,
    pub actions: Vec<Action>,
    pub tick: Option<TickBlock>,
}

impl System {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            states: Vec::new(),
            constraints: Vec::new(),
            objectives: Vec::new(),
            actions: Vec::new(),
            tick: None,
        }
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }
}

/// A named scalar observation, bound to the external source it reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub name: String,
    pub source: SourcePath,
}

/// A hard or soft predicate over a declared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub metric: String,
    pub op: CompareOp,
    pub threshold: ValueWithUnit,
    pub severity: Severity,
}

/// A direction of desired improvement over a declared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    pub metric: String,
    pub kind: ObjectiveKind,
    /// Present iff `kind == ObjectiveKind::Target`.
    pub target: Option<ValueWithUnit>,
    pub priority: i64,
}

/// A predicted additive delta to a metric, produced by taking an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub metric: String,
    pub low: ValueWithUnit,
    pub high: Option<ValueWithUnit>,
}

/// An integer-valued action parameter with an inclusive range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub min: i64,
    pub max: i64,
}

/// A named, side-effecting operation the engine may select on a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub effects: Vec<Effect>,
    pub cost: CostLevel,
}

/// Tick scheduling configuration declared in the `tick:` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickBlock {
    pub interval_ms: u64,
    pub action_threshold: f64,
    pub mode: TickMode,
}

impl Default for TickBlock {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            action_threshold: 0.5,
            mode: TickMode::Continuous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_looks_up_declared_state_and_action_by_name() {
        let mut sys = System::new("Thermostat");
        sys.states.push(State {
            name: "temperature".into(),
            source: SourcePath::new(vec!["sensors".into(), "temp".into()]),
        });
        sys.actions.push(Action {
            name: "increase_fan".into(),
            parameters: vec![],
            effects: vec![],
            cost: CostLevel::Low,
        });

        assert!(sys.state("temperature").is_some());
        assert!(sys.state("missing").is_none());
        assert!(sys.action("increase_fan").is_some());
    }

    #[test]
    fn tick_block_default_matches_spec_defaults() {
        let tick = TickBlock::default();
        assert_eq!(tick.interval_ms, 100);
        assert_eq!(tick.action_threshold, 0.5);
        assert_eq!(tick.mode, TickMode::Continuous);
    }
}
