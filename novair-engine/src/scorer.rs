//! Constraint evaluation, candidate enumeration, effect prediction, and
//! candidate scoring/selection — the algorithmic core of the decision engine.

use novair_core::{CompareOp, ObjectiveKind, Severity};
use novair_dsl::{Action, Constraint, Effect, Objective, System};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of evaluating one declared constraint against the current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintStatus {
    pub name: String,
    pub metric: String,
    pub op: CompareOp,
    pub threshold: f64,
    pub margin: f64,
    pub severity: Severity,
    pub violated: bool,
}

/// Computes a [`ConstraintStatus`] per declared constraint, in declaration order.
pub fn evaluate_constraints(
    constraints: &[Constraint],
    current: &HashMap<String, f64>,
) -> Vec<ConstraintStatus> {
    constraints
        .iter()
        .map(|c| {
            let x = current.get(&c.metric).copied().unwrap_or(0.0);
            let margin = c.op.margin(x, c.threshold.value);
            ConstraintStatus {
                name: c.name.clone(),
                metric: c.metric.clone(),
                op: c.op,
                threshold: c.threshold.value,
                margin,
                severity: c.severity,
                violated: margin < 0.0,
            }
        })
        .collect()
}

/// An action paired with a concrete integer parameter assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub action: String,
    pub parameters: HashMap<String, i64>,
}

/// Enumerates candidates for one action: the empty assignment for a
/// zero-parameter action, three representative points (min, floor midpoint,
/// max) for a single-parameter action, or one midpoint assignment across all
/// parameters for a multi-parameter action.
pub fn enumerate_candidates(action: &Action) -> Vec<Candidate> {
    match action.parameters.as_slice() {
        [] => vec![Candidate {
            action: action.name.clone(),
            parameters: HashMap::new(),
        }],
        [p] => {
            let mid = (p.min + p.max).div_euclid(2);
            [p.min, mid, p.max]
                .into_iter()
                .map(|v| Candidate {
                    action: action.name.clone(),
                    parameters: HashMap::from([(p.name.clone(), v)]),
                })
                .collect()
        }
        params => {
            let parameters = params
                .iter()
                .map(|p| (p.name.clone(), (p.min + p.max).div_euclid(2)))
                .collect();
            vec![Candidate {
                action: action.name.clone(),
                parameters,
            }]
        }
    }
}

/// Predicts the additive delta one effect contributes under `candidate`.
///
/// A scalar effect (`high` absent) always applies as-is. A ranged effect
/// interpolates along the action's first parameter's span; with no
/// parameters to interpolate against it falls back to the midpoint.
pub fn predict_effect(effect: &Effect, action: &Action, candidate: &Candidate) -> f64 {
    let Some(high) = effect.high.as_ref() else {
        return effect.low.value;
    };
    let Some(first) = action.parameters.first() else {
        return (effect.low.value + high.value) / 2.0;
    };
    let v = *candidate.parameters.get(&first.name).unwrap_or(&first.min) as f64;
    let (pmin, pmax) = (first.min as f64, first.max as f64);
    if (pmax - pmin).abs() < f64::EPSILON {
        return (effect.low.value + high.value) / 2.0;
    }
    effect.low.value + (high.value - effect.low.value) * (v - pmin) / (pmax - pmin)
}

fn predicted_effects(action: &Action, candidate: &Candidate) -> HashMap<String, f64> {
    action
        .effects
        .iter()
        .map(|e| (e.metric.clone(), predict_effect(e, action, candidate)))
        .collect()
}

/// The four scoring components and the final weighted score for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub c_res: f64,
    pub objective: f64,
    pub penalty: f64,
    pub score: f64,
}

fn minimize_contribution(effect: f64, weight: f64) -> f64 {
    if effect <= 0.0 {
        -effect * weight
    } else {
        -effect * weight * 0.5
    }
}

fn maximize_contribution(effect: f64, weight: f64) -> f64 {
    if effect >= 0.0 {
        effect * weight
    } else {
        effect * weight * 0.5
    }
}

fn target_contribution(current: f64, target: f64, effect: f64, weight: f64) -> f64 {
    let d0 = (current - target).abs();
    let d1 = (current + effect - target).abs();
    let delta = d0 - d1;
    if delta >= 0.0 {
        delta * weight
    } else {
        delta * weight * 0.5
    }
}

fn objective_score(
    objectives: &[Objective],
    effects: &HashMap<String, f64>,
    current: &HashMap<String, f64>,
) -> f64 {
    let total_priority: i64 = objectives.iter().map(|o| o.priority).sum();
    if total_priority == 0 {
        return 0.0;
    }
    objectives
        .iter()
        .map(|o| {
            let weight = o.priority as f64 / 10.0;
            let effect = effects.get(&o.metric).copied().unwrap_or(0.0);
            let x = current.get(&o.metric).copied().unwrap_or(0.0);
            match o.kind {
                ObjectiveKind::Minimize => minimize_contribution(effect, weight),
                ObjectiveKind::Maximize => maximize_contribution(effect, weight),
                ObjectiveKind::Target => {
                    let target = o.target.as_ref().map(|t| t.value).unwrap_or(x);
                    target_contribution(x, target, effect, weight)
                }
            }
        })
        .sum()
}

/// Scores one candidate against the current constraint statuses and
/// declared objectives.
pub fn score_candidate(
    candidate: &Candidate,
    action: &Action,
    statuses: &[ConstraintStatus],
    objectives: &[Objective],
    current: &HashMap<String, f64>,
) -> ScoreBreakdown {
    let effects = predicted_effects(action, candidate);

    let c_res: f64 = statuses
        .iter()
        .filter(|s| s.violated)
        .filter_map(|s| {
            let effect = *effects.get(&s.metric)?;
            let x = current.get(&s.metric).copied().unwrap_or(0.0);
            let contribution = match s.op {
                CompareOp::Le | CompareOp::Lt if effect < 0.0 => {
                    effect.abs().min(x - s.threshold) * 2.0
                }
                CompareOp::Ge | CompareOp::Gt if effect > 0.0 => {
                    effect.min(s.threshold - x) * 2.0
                }
                _ => 0.0,
            };
            Some(contribution.max(0.0))
        })
        .sum();

    let objective = objective_score(objectives, &effects, current);
    let penalty = action.cost.penalty();
    let violated_any = statuses.iter().any(|s| s.violated);
    let score = if violated_any {
        10.0 * c_res + objective - penalty
    } else {
        objective - penalty
    };

    ScoreBreakdown {
        c_res,
        objective,
        penalty,
        score,
    }
}

/// A fully scored candidate, carrying the action it came from for explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub effects: HashMap<String, f64>,
    pub breakdown: ScoreBreakdown,
}

/// Result of scoring every candidate for one tick and applying the
/// selection rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub candidates: Vec<ScoredCandidate>,
    pub selected: Option<ScoredCandidate>,
}

/// Enumerates and scores every candidate across all declared actions, then
/// applies the selection rule of the scoring specification: restrict to
/// candidates with `c_res > 0` when any violation exists (falling back to
/// the full set if none qualify), pick the highest-scoring candidate by
/// stable declaration order, and gate on `action_threshold`.
pub fn select_best_action(
    system: &System,
    statuses: &[ConstraintStatus],
    current: &HashMap<String, f64>,
    action_threshold: f64,
) -> SelectionResult {
    let mut candidates = Vec::new();
    for action in &system.actions {
        for candidate in enumerate_candidates(action) {
            let effects = predicted_effects(action, &candidate);
            let breakdown = score_candidate(&candidate, action, statuses, &system.objectives, current);
            candidates.push(ScoredCandidate {
                candidate,
                effects,
                breakdown,
            });
        }
    }

    let any_violation = statuses.iter().any(|s| s.violated);
    let pool: Vec<&ScoredCandidate> = if any_violation {
        let positive: Vec<&ScoredCandidate> =
            candidates.iter().filter(|c| c.breakdown.c_res > 0.0).collect();
        if positive.is_empty() {
            candidates.iter().collect()
        } else {
            positive
        }
    } else {
        candidates.iter().collect()
    };

    let mut best: Option<&ScoredCandidate> = None;
    for c in pool {
        match best {
            None => best = Some(c),
            Some(b) if c.breakdown.score > b.breakdown.score => best = Some(c),
            _ => {}
        }
    }

    let selected = best
        .filter(|c| c.breakdown.score > action_threshold)
        .cloned();

    SelectionResult {
        candidates,
        selected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novair_dsl::parse;

    const THERMOSTAT: &str = r#"
system Thermostat
    state:
        temperature <- sensors.cpu.temp
        fan_speed <- actuators.fan.speed
        target <- config.target_temp

    constraints:
        max_temp: temperature <= 85 @critical
        min_temp: temperature >= 30 @warning

    objectives:
        comfort: temperature -> target(65) @priority(8)
        silence: fan_speed -> min @priority(4)

    actions:
        increase_fan:
            parameters: [amount: 0..100]
            effects:
                temperature: -5 to -15
                fan_speed: 10 to 40
            cost: medium

        decrease_fan:
            parameters: [amount: 0..100]
            effects:
                temperature: 5 to 15
                fan_speed: -10 to -40
            cost: medium

        noop:
            cost: low

    tick:
        interval: 100ms
        action_threshold: 0.3
        mode: continuous
"#;

    fn current(temperature: f64, fan_speed: f64) -> HashMap<String, f64> {
        HashMap::from([
            ("temperature".to_string(), temperature),
            ("fan_speed".to_string(), fan_speed),
        ])
    }

    #[test]
    fn zero_parameter_action_enumerates_one_candidate() {
        let system = parse(THERMOSTAT).unwrap();
        let noop = system.action("noop").unwrap();
        assert_eq!(enumerate_candidates(noop).len(), 1);
    }

    #[test]
    fn single_parameter_action_enumerates_three_candidates() {
        let system = parse(THERMOSTAT).unwrap();
        let action = system.action("increase_fan").unwrap();
        let candidates = enumerate_candidates(action);
        assert_eq!(candidates.len(), 3);
        let values: Vec<i64> = candidates.iter().map(|c| c.parameters["amount"]).collect();
        assert_eq!(values, vec![0, 50, 100]);
    }

    #[test]
    fn multi_parameter_action_enumerates_one_midpoint_candidate() {
        let system = parse(
            "system S\n    state:\n        x <- a.b\n    objectives:\n        o: x -> min @priority(1)\n    actions:\n        act:\n            parameters: [p: 0..10, q: -10..10]\n            cost: low\n",
        )
        .unwrap();
        let action = system.action("act").unwrap();
        let candidates = enumerate_candidates(action);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].parameters["p"], 5);
        assert_eq!(candidates[0].parameters["q"], 0);
    }

    #[test]
    fn ranged_effect_hits_endpoints_at_parameter_bounds() {
        let system = parse(THERMOSTAT).unwrap();
        let action = system.action("increase_fan").unwrap();
        let effect = &action.effects[0]; // temperature: -5 to -15
        let lo = Candidate {
            action: action.name.clone(),
            parameters: HashMap::from([("amount".to_string(), 0)]),
        };
        let hi = Candidate {
            action: action.name.clone(),
            parameters: HashMap::from([("amount".to_string(), 100)]),
        };
        assert_eq!(predict_effect(effect, action, &lo), -5.0);
        assert_eq!(predict_effect(effect, action, &hi), -15.0);
    }

    #[test]
    fn ranged_effect_with_no_parameters_uses_midpoint() {
        let action = Action {
            name: "a".into(),
            parameters: vec![],
            effects: vec![Effect {
                metric: "x".into(),
                low: novair_core::ValueWithUnit::new(0.0),
                high: Some(novair_core::ValueWithUnit::new(10.0)),
            }],
            cost: novair_core::CostLevel::Low,
        };
        let candidate = Candidate {
            action: "a".into(),
            parameters: HashMap::new(),
        };
        assert_eq!(predict_effect(&action.effects[0], &action, &candidate), 5.0);
    }

    #[test]
    fn s1_steady_state_selects_no_action() {
        let system = parse(THERMOSTAT).unwrap();
        let current = current(65.0, 30.0);
        let statuses = evaluate_constraints(&system.constraints, &current);
        assert!(statuses.iter().all(|s| !s.violated));
        let result = select_best_action(&system, &statuses, &current, 0.3);
        assert!(result.selected.is_none());
    }

    #[test]
    fn s2_over_temperature_selects_increase_fan_at_max() {
        let system = parse(THERMOSTAT).unwrap();
        let current = current(90.0, 30.0);
        let statuses = evaluate_constraints(&system.constraints, &current);
        assert!(statuses.iter().any(|s| s.name == "max_temp" && s.violated));
        let result = select_best_action(&system, &statuses, &current, 0.3);
        let selected = result.selected.expect("an action should be selected");
        assert_eq!(selected.candidate.action, "increase_fan");
        assert_eq!(selected.candidate.parameters["amount"], 100);
    }

    #[test]
    fn s4_below_warning_threshold_selects_decrease_fan() {
        let system = parse(THERMOSTAT).unwrap();
        let current = current(25.0, 30.0);
        let statuses = evaluate_constraints(&system.constraints, &current);
        assert!(statuses.iter().any(|s| s.name == "min_temp" && s.violated));
        let result = select_best_action(&system, &statuses, &current, 0.3);
        let selected = result.selected.expect("an action should be selected");
        assert_eq!(selected.candidate.action, "decrease_fan");
    }

    #[test]
    fn s3_tied_effects_low_cost_wins_over_high_cost() {
        let src = "system S\n    state:\n        x <- a.b\n    objectives:\n        o: x -> min @priority(5)\n    actions:\n        cheap:\n            effects:\n                x: -5\n            cost: low\n        pricey:\n            effects:\n                x: -5\n            cost: high\n";
        let system = parse(src).unwrap();
        let current = HashMap::from([("x".to_string(), 10.0)]);
        let statuses = evaluate_constraints(&system.constraints, &current);
        let result = select_best_action(&system, &statuses, &current, 0.0);
        let selected = result.selected.expect("an action should be selected");
        assert_eq!(selected.candidate.action, "cheap");
    }

    #[test]
    fn cost_penalty_strictly_orders_otherwise_identical_candidates() {
        let src = "system S\n    state:\n        x <- a.b\n    objectives:\n        o: x -> min @priority(5)\n    actions:\n        a_low:\n            effects:\n                x: -5\n            cost: low\n        a_med:\n            effects:\n                x: -5\n            cost: medium\n        a_high:\n            effects:\n                x: -5\n            cost: high\n";
        let system = parse(src).unwrap();
        let current = HashMap::from([("x".to_string(), 10.0)]);
        let statuses = evaluate_constraints(&system.constraints, &current);
        let result = select_best_action(&system, &statuses, &current, -100.0);
        let by_action: HashMap<&str, f64> = result
            .candidates
            .iter()
            .map(|c| (c.candidate.action.as_str(), c.breakdown.score))
            .collect();
        assert!(by_action["a_low"] > by_action["a_med"]);
        assert!(by_action["a_med"] > by_action["a_high"]);
    }

    #[test]
    fn selection_never_returns_below_threshold() {
        let system = parse(THERMOSTAT).unwrap();
        let current = current(65.0, 30.0);
        let statuses = evaluate_constraints(&system.constraints, &current);
        let result = select_best_action(&system, &statuses, &current, 1_000.0);
        assert!(result.selected.is_none());
    }

    #[test]
    fn violation_subset_guarantee_when_a_positive_c_res_candidate_exists() {
        let system = parse(THERMOSTAT).unwrap();
        let current = current(90.0, 30.0);
        let statuses = evaluate_constraints(&system.constraints, &current);
        let result = select_best_action(&system, &statuses, &current, 0.3);
        let selected = result.selected.unwrap();
        assert!(selected.breakdown.c_res > 0.0);
    }
}
