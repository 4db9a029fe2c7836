//! Semantic validation of a parsed [`System`].
//!
//! Validation never aborts early: every rule is checked and all violations
//! are collected, matching the "parser itself does not throw on semantic
//! errors" contract. The parser calls [`validate`] after construction; the
//! AST returned to the caller is produced regardless of validation outcome
//! so callers can inspect both.

use super::ast::System;
use novair_core::ValidationError;
use std::collections::HashSet;

pub fn validate(system: &System) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if system.name.trim().is_empty() {
        errors.push(ValidationError::EmptySystemName);
    }

    if system.states.is_empty() {
        errors.push(ValidationError::NoStatesDeclared);
    }

    if system.constraints.is_empty() && system.objectives.is_empty() {
        errors.push(ValidationError::NoConstraintsOrObjectives);
    }

    check_duplicates(&mut errors, "state", system.states.iter().map(|s| &s.name));
    check_duplicates(
        &mut errors,
        "constraint",
        system.constraints.iter().map(|c| &c.name),
    );
    check_duplicates(
        &mut errors,
        "objective",
        system.objectives.iter().map(|o| &o.name),
    );
    check_duplicates(&mut errors, "action", system.actions.iter().map(|a| &a.name));

    let known_states: HashSet<&str> = system.states.iter().map(|s| s.name.as_str()).collect();

    for constraint in &system.constraints {
        if !known_states.contains(constraint.metric.as_str()) {
            errors.push(ValidationError::UnknownMetric {
                category: "constraint",
                name: constraint.name.clone(),
                metric: constraint.metric.clone(),
            });
        }
    }

    for objective in &system.objectives {
        if !known_states.contains(objective.metric.as_str()) {
            errors.push(ValidationError::UnknownMetric {
                category: "objective",
                name: objective.name.clone(),
                metric: objective.metric.clone(),
            });
        }
        if !(1..=10).contains(&objective.priority) {
            errors.push(ValidationError::PriorityOutOfRange {
                name: objective.name.clone(),
                priority: objective.priority,
            });
        }
    }

    for action in &system.actions {
        for param in &action.parameters {
            if param.min > param.max {
                errors.push(ValidationError::InvalidParameterRange {
                    action: action.name.clone(),
                    name: param.name.clone(),
                    min: param.min,
                    max: param.max,
                });
            }
        }
    }

    errors
}

fn check_duplicates<'a>(
    errors: &mut Vec<ValidationError>,
    category: &'static str,
    names: impl Iterator<Item = &'a String>,
) {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            errors.push(ValidationError::DuplicateName {
                category,
                name: name.clone(),
            });
        }
    }
}
