//! Canonical pretty-printer for [`System`], used by round-trip tests to
//! verify invariant 1: re-emitting and re-parsing an AST yields an AST equal
//! to the first.

use crate::parser::{parse, System};
use novair_core::{NovairError, ObjectiveKind};
use std::fmt::Write as _;

/// Re-serializes `system` into canonical DSL source (4-space indentation,
/// fixed field order matching declaration order).
pub fn pretty_print(system: &System) -> String {
    let mut out = String::new();

    write!(out, "system {}", system.name).unwrap();
    if let Some(version) = &system.version {
        write!(out, " @version(\"{version}\")").unwrap();
    }
    out.push('\n');

    if !system.states.is_empty() {
        out.push_str("state:\n");
        for state in &system.states {
            writeln!(out, "    {} <- {}", state.name, state.source).unwrap();
        }
    }

    if !system.constraints.is_empty() {
        out.push_str("constraints:\n");
        for c in &system.constraints {
            writeln!(
                out,
                "    {}: {} {} {} @{}",
                c.name, c.metric, c.op, c.threshold, c.severity
            )
            .unwrap();
        }
    }

    if !system.objectives.is_empty() {
        out.push_str("objectives:\n");
        for o in &system.objectives {
            let direction = match o.kind {
                ObjectiveKind::Target => {
                    format!("target({})", o.target.as_ref().expect("target kind carries a value"))
                }
                ObjectiveKind::Minimize => "min".to_string(),
                ObjectiveKind::Maximize => "max".to_string(),
            };
            writeln!(
                out,
                "    {}: {} -> {} @priority({})",
                o.name, o.metric, direction, o.priority
            )
            .unwrap();
        }
    }

    if !system.actions.is_empty() {
        out.push_str("actions:\n");
        for action in &system.actions {
            writeln!(out, "    {}:", action.name).unwrap();
            if !action.parameters.is_empty() {
                let params = action
                    .parameters
                    .iter()
                    .map(|p| format!("{}: {}..{}", p.name, p.min, p.max))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(out, "        parameters: [{params}]").unwrap();
            }
            if !action.effects.is_empty() {
                out.push_str("        effects:\n");
                for effect in &action.effects {
                    match &effect.high {
                        Some(high) => {
                            writeln!(out, "            {}: {} to {}", effect.metric, effect.low, high).unwrap()
                        }
                        None => writeln!(out, "            {}: {}", effect.metric, effect.low).unwrap(),
                    }
                }
            }
            writeln!(out, "        cost: {}", action.cost).unwrap();
        }
    }

    if let Some(tick) = &system.tick {
        out.push_str("tick:\n");
        writeln!(out, "    interval: {}ms", tick.interval_ms).unwrap();
        writeln!(out, "    action_threshold: {}", tick.action_threshold).unwrap();
        writeln!(out, "    mode: {}", tick.mode).unwrap();
    }

    out
}

/// Parses, pretty-prints, and re-parses `source` in one call.
pub fn round_trip(source: &str) -> Result<System, NovairError> {
    let system = parse(source)?;
    let printed = pretty_print(&system);
    parse(&printed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const THERMOSTAT: &str = r#"
system Thermostat @version("1.0")
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

        noop:
            cost: low

    tick:
        interval: 100ms
        action_threshold: 0.3
        mode: continuous
"#;

    #[test]
    fn round_trip_preserves_ast_equality() {
        let original = parse(THERMOSTAT).unwrap();
        let reparsed = round_trip(THERMOSTAT).unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn pretty_printed_output_contains_every_section() {
        let system = parse(THERMOSTAT).unwrap();
        let printed = pretty_print(&system);
        for fragment in [
            "system Thermostat",
            "state:",
            "constraints:",
            "objectives:",
            "actions:",
            "tick:",
            "target(65)",
            "@critical",
            "@priority(8)",
        ] {
            assert!(printed.contains(fragment), "missing {fragment:?} in:\n{printed}");
        }
    }

    #[test]
    fn omits_absent_sections() {
        let src = "system Minimal\n    state:\n        x <- a.b\n    objectives:\n        o: x -> min @priority(1)\n";
        let system = parse(src).unwrap();
        let printed = pretty_print(&system);
        assert!(!printed.contains("actions:"));
        assert!(!printed.contains("tick:"));
        assert!(!printed.contains("constraints:"));
    }
}
