use criterion::{criterion_group, criterion_main, Criterion};
use novair_dsl::lexer::Lexer;
use novair_dsl::parser::parse_and_validate;
use std::hint::black_box;

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

fn bench_lex(c: &mut Criterion) {
    c.bench_function("dsl/lex_thermostat", |b| {
        b.iter(|| {
            let tokens = Lexer::new(black_box(THERMOSTAT)).tokenize().expect("lex source");
            black_box(tokens.len());
        });
    });
}

fn bench_parse_and_validate(c: &mut Criterion) {
    c.bench_function("dsl/parse_and_validate_thermostat", |b| {
        b.iter(|| {
            let (system, errors) = parse_and_validate(black_box(THERMOSTAT)).expect("parse source");
            black_box(errors.len());
            black_box(system.actions.len());
        });
    });
}

criterion_group!(benches, bench_lex, bench_parse_and_validate);
criterion_main!(benches);
