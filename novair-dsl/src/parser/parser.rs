//! Recursive-descent parser from token stream to [`System`].
//!
//! One-token lookahead, no backtracking. Syntax errors abort parsing
//! immediately; semantic validation runs separately afterwards and collects
//! every violation rather than failing fast (see [`super::validate`]).

use super::ast::*;
use super::validate::validate;
use crate::lexer::{Lexer, Token, TokenKind};
use novair_core::{
    CompareOp, CostLevel, NovairError, ObjectiveKind, Severity, SourcePath, SyntaxError, TickMode,
    Unit, ValidationError, ValueWithUnit,
};

/// Parses `source` into a [`System`]. Lexical and syntax errors are fatal
/// and returned immediately; semantic validation is not run here.
pub fn parse(source: &str) -> Result<System, NovairError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let system = parser.parse_system()?;
    Ok(system)
}

/// Parses `source` and runs semantic validation, returning both the AST and
/// the (possibly empty) list of collected validation errors.
pub fn parse_and_validate(source: &str) -> Result<(System, Vec<ValidationError>), NovairError> {
    let system = parse(source)?;
    let errors = validate(&system);
    Ok((system, errors))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn line(&self) -> usize {
        self.current().span.line
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.current_kind() {
            TokenKind::Eof => SyntaxError::UnexpectedEof {
                expected: expected.to_string(),
            },
            other => SyntaxError::UnexpectedToken {
                found: other.describe(),
                expected: expected.to_string(),
                line: self.line(),
            },
        }
    }

    fn expect_simple(&mut self, want: TokenKind, expected: &str) -> Result<(), SyntaxError> {
        if self.current_kind() == &want {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, SyntaxError> {
        if let TokenKind::Identifier(s) = self.current_kind() {
            let s = s.clone();
            self.advance();
            Ok(s)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn expect_string(&mut self) -> Result<String, SyntaxError> {
        if let TokenKind::String(s) = self.current_kind() {
            let s = s.clone();
            self.advance();
            Ok(s)
        } else {
            Err(self.unexpected("string literal"))
        }
    }

    fn expect_number(&mut self) -> Result<f64, SyntaxError> {
        if let TokenKind::Number(n) = self.current_kind() {
            let n = *n;
            self.advance();
            Ok(n)
        } else {
            Err(self.unexpected("number"))
        }
    }

    /// A handful of contextual keywords may stand in for a state name in a
    /// `state:` binding, though they remain reserved elsewhere (action
    /// names, section headers).
    fn expect_idlike(&mut self) -> Result<String, SyntaxError> {
        let name = match self.current_kind() {
            TokenKind::Identifier(s) => s.clone(),
            TokenKind::Target => "target".to_string(),
            TokenKind::Min => "min".to_string(),
            TokenKind::Max => "max".to_string(),
            TokenKind::Mode => "mode".to_string(),
            TokenKind::Interval => "interval".to_string(),
            TokenKind::Cost => "cost".to_string(),
            _ => return Err(self.unexpected("identifier")),
        };
        self.advance();
        Ok(name)
    }

    fn try_unit_text(&mut self) -> Option<String> {
        if let TokenKind::Unit(u) = self.current_kind() {
            let u = u.clone();
            self.advance();
            Some(u)
        } else {
            None
        }
    }

    fn parse_value(&mut self) -> Result<ValueWithUnit, SyntaxError> {
        let n = self.expect_number()?;
        match self.try_unit_text() {
            Some(text) => match Unit::from_token(&text) {
                Some(unit) => Ok(ValueWithUnit::with_unit(n, unit)),
                None => Ok(ValueWithUnit::new(n)),
            },
            None => Ok(ValueWithUnit::new(n)),
        }
    }

    fn parse_compare_op(&mut self) -> Result<CompareOp, SyntaxError> {
        let op = match self.current_kind() {
            TokenKind::Le => CompareOp::Le,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Ge => CompareOp::Ge,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::EqEq => CompareOp::Eq,
            TokenKind::Ne => CompareOp::Ne,
            _ => return Err(self.unexpected("comparison operator")),
        };
        self.advance();
        Ok(op)
    }

    fn parse_severity(&mut self) -> Result<Severity, SyntaxError> {
        let severity = match self.current_kind() {
            TokenKind::Critical => Severity::Critical,
            TokenKind::Warning => Severity::Warning,
            _ => return Err(self.unexpected("'@critical' or '@warning'")),
        };
        self.advance();
        Ok(severity)
    }

    fn parse_cost(&mut self) -> Result<CostLevel, SyntaxError> {
        let cost = match self.current_kind() {
            TokenKind::Low => CostLevel::Low,
            TokenKind::Medium => CostLevel::Medium,
            TokenKind::High => CostLevel::High,
            _ => return Err(self.unexpected("'low', 'medium', or 'high'")),
        };
        self.advance();
        Ok(cost)
    }

    fn section_enter(&mut self, header: TokenKind, desc: &str) -> Result<(), SyntaxError> {
        self.expect_simple(header, desc)?;
        self.expect_simple(TokenKind::Colon, "':'")?;
        self.expect_simple(TokenKind::Newline, "newline")?;
        self.expect_simple(TokenKind::Indent, "indented block")?;
        Ok(())
    }

    fn section_exit(&mut self) -> Result<(), SyntaxError> {
        self.expect_simple(TokenKind::Dedent, "dedent")
    }

    fn parse_system(&mut self) -> Result<System, SyntaxError> {
        self.expect_simple(TokenKind::System, "'system'")?;
        let name = self.expect_identifier()?;

        let mut version = None;
        if matches!(self.current_kind(), TokenKind::Version) {
            self.advance();
            self.expect_simple(TokenKind::LParen, "'('")?;
            version = Some(self.expect_string()?);
            self.expect_simple(TokenKind::RParen, "')'")?;
        }
        self.expect_simple(TokenKind::Newline, "newline")?;

        let mut system = System::new(name);
        system.version = version;

        loop {
            match self.current_kind() {
                TokenKind::State => self.parse_state_section(&mut system)?,
                TokenKind::Constraints => self.parse_constraints_section(&mut system)?,
                TokenKind::Objectives => self.parse_objectives_section(&mut system)?,
                TokenKind::Actions => self.parse_actions_section(&mut system)?,
                TokenKind::Tick => self.parse_tick_section(&mut system)?,
                TokenKind::Eof => break,
                _ => {
                    self.advance();
                }
            }
        }

        Ok(system)
    }

    fn parse_path(&mut self) -> Result<SourcePath, SyntaxError> {
        let mut segments = vec![self.expect_identifier()?];
        while matches!(self.current_kind(), TokenKind::Dot) {
            self.advance();
            segments.push(self.expect_identifier()?);
        }
        Ok(SourcePath::new(segments))
    }

    fn parse_state_section(&mut self, system: &mut System) -> Result<(), SyntaxError> {
        self.section_enter(TokenKind::State, "'state'")?;
        while !matches!(self.current_kind(), TokenKind::Dedent) {
            let name = self.expect_idlike()?;
            self.expect_simple(TokenKind::ArrowLeft, "'<-'")?;
            let source = self.parse_path()?;
            self.expect_simple(TokenKind::Newline, "newline")?;
            system.states.push(State { name, source });
        }
        self.section_exit()
    }

    fn parse_constraints_section(&mut self, system: &mut System) -> Result<(), SyntaxError> {
        self.section_enter(TokenKind::Constraints, "'constraints'")?;
        while !matches!(self.current_kind(), TokenKind::Dedent) {
            let name = self.expect_identifier()?;
            self.expect_simple(TokenKind::Colon, "':'")?;
            let metric = self.expect_identifier()?;
            let op = self.parse_compare_op()?;
            let threshold = self.parse_value()?;
            let severity = self.parse_severity()?;
            self.expect_simple(TokenKind::Newline, "newline")?;
            system.constraints.push(Constraint {
                name,
                metric,
                op,
                threshold,
                severity,
            });
        }
        self.section_exit()
    }

    fn parse_objectives_section(&mut self, system: &mut System) -> Result<(), SyntaxError> {
        self.section_enter(TokenKind::Objectives, "'objectives'")?;
        while !matches!(self.current_kind(), TokenKind::Dedent) {
            let name = self.expect_identifier()?;
            self.expect_simple(TokenKind::Colon, "':'")?;
            let metric = self.expect_identifier()?;
            self.expect_simple(TokenKind::ArrowRight, "'->'")?;

            let (kind, target) = match self.current_kind() {
                TokenKind::Target => {
                    self.advance();
                    self.expect_simple(TokenKind::LParen, "'('")?;
                    let value = self.parse_value()?;
                    self.expect_simple(TokenKind::RParen, "')'")?;
                    (ObjectiveKind::Target, Some(value))
                }
                TokenKind::Min => {
                    self.advance();
                    (ObjectiveKind::Minimize, None)
                }
                TokenKind::Max => {
                    self.advance();
                    (ObjectiveKind::Maximize, None)
                }
                _ => return Err(self.unexpected("'target(...)', 'min', or 'max'")),
            };

            self.expect_simple(TokenKind::Priority, "'@priority'")?;
            self.expect_simple(TokenKind::LParen, "'('")?;
            let priority = self.expect_number()? as i64;
            self.expect_simple(TokenKind::RParen, "')'")?;
            self.expect_simple(TokenKind::Newline, "newline")?;

            system.objectives.push(Objective {
                name,
                metric,
                kind,
                target,
                priority,
            });
        }
        self.section_exit()
    }

    fn parse_actions_section(&mut self, system: &mut System) -> Result<(), SyntaxError> {
        self.section_enter(TokenKind::Actions, "'actions'")?;
        while !matches!(self.current_kind(), TokenKind::Dedent) {
            let action = self.parse_action()?;
            system.actions.push(action);
        }
        self.section_exit()
    }

    fn parse_action(&mut self) -> Result<Action, SyntaxError> {
        let name = self.expect_identifier()?;
        self.expect_simple(TokenKind::Colon, "':'")?;
        self.expect_simple(TokenKind::Newline, "newline")?;
        self.expect_simple(TokenKind::Indent, "indented action body")?;

        let mut parameters = Vec::new();
        let mut effects = Vec::new();
        let mut cost = CostLevel::Low;

        while !matches!(self.current_kind(), TokenKind::Dedent) {
            match self.current_kind() {
                TokenKind::Parameters => {
                    self.advance();
                    self.expect_simple(TokenKind::Colon, "':'")?;
                    parameters = self.parse_parameter_list()?;
                    self.expect_simple(TokenKind::Newline, "newline")?;
                }
                TokenKind::Effects => {
                    self.advance();
                    self.expect_simple(TokenKind::Colon, "':'")?;
                    self.expect_simple(TokenKind::Newline, "newline")?;
                    effects = self.parse_effects_block()?;
                }
                TokenKind::Cost => {
                    self.advance();
                    self.expect_simple(TokenKind::Colon, "':'")?;
                    cost = self.parse_cost()?;
                    self.expect_simple(TokenKind::Newline, "newline")?;
                }
                _ => return Err(self.unexpected("'parameters', 'effects', or 'cost'")),
            }
        }
        self.section_exit()?;

        Ok(Action {
            name,
            parameters,
            effects,
            cost,
        })
    }

    fn parse_parameter_list(&mut self) -> Result<Vec<Parameter>, SyntaxError> {
        self.expect_simple(TokenKind::LBracket, "'['")?;
        let mut params = Vec::new();
        if !matches!(self.current_kind(), TokenKind::RBracket) {
            params.push(self.parse_parameter()?);
            while matches!(self.current_kind(), TokenKind::Comma) {
                self.advance();
                params.push(self.parse_parameter()?);
            }
        }
        self.expect_simple(TokenKind::RBracket, "']'")?;
        Ok(params)
    }

    fn parse_parameter(&mut self) -> Result<Parameter, SyntaxError> {
        let name = self.expect_identifier()?;
        self.expect_simple(TokenKind::Colon, "':'")?;
        let min = self.expect_number()? as i64;
        self.expect_simple(TokenKind::Range, "'..'")?;
        let max = self.expect_number()? as i64;
        Ok(Parameter { name, min, max })
    }

    fn parse_effects_block(&mut self) -> Result<Vec<Effect>, SyntaxError> {
        self.expect_simple(TokenKind::Indent, "indented effects block")?;
        let mut effects = Vec::new();
        while !matches!(self.current_kind(), TokenKind::Dedent) {
            let metric = self.expect_identifier()?;
            self.expect_simple(TokenKind::Colon, "':'")?;
            let low = self.parse_value()?;
            let high = if matches!(self.current_kind(), TokenKind::To) {
                self.advance();
                Some(self.parse_value()?)
            } else {
                None
            };
            self.expect_simple(TokenKind::Newline, "newline")?;
            effects.push(Effect { metric, low, high });
        }
        self.expect_simple(TokenKind::Dedent, "dedent")?;
        Ok(effects)
    }

    fn parse_tick_section(&mut self, system: &mut System) -> Result<(), SyntaxError> {
        self.section_enter(TokenKind::Tick, "'tick'")?;
        let mut tick = TickBlock::default();

        while !matches!(self.current_kind(), TokenKind::Dedent) {
            match self.current_kind() {
                TokenKind::Interval => {
                    self.advance();
                    self.expect_simple(TokenKind::Colon, "':'")?;
                    let amount = self.expect_number()?;
                    let factor = self.parse_time_unit_factor()?;
                    tick.interval_ms = (amount * factor) as u64;
                    self.expect_simple(TokenKind::Newline, "newline")?;
                }
                TokenKind::ActionThreshold => {
                    self.advance();
                    self.expect_simple(TokenKind::Colon, "':'")?;
                    tick.action_threshold = self.expect_number()?;
                    self.expect_simple(TokenKind::Newline, "newline")?;
                }
                TokenKind::Mode => {
                    self.advance();
                    self.expect_simple(TokenKind::Colon, "':'")?;
                    tick.mode = match self.current_kind() {
                        TokenKind::Continuous => {
                            self.advance();
                            TickMode::Continuous
                        }
                        TokenKind::Reactive => {
                            self.advance();
                            TickMode::Reactive
                        }
                        _ => return Err(self.unexpected("'continuous' or 'reactive'")),
                    };
                    self.expect_simple(TokenKind::Newline, "newline")?;
                }
                _ => return Err(self.unexpected("'interval', 'action_threshold', or 'mode'")),
            }
        }

        self.section_exit()?;
        system.tick = Some(tick);
        Ok(())
    }

    /// Accepts either a tight unit token (`100ms`) or a bare identifier in
    /// `{ms, s, m, h}` separated by whitespace (`100 s`); defaults to
    /// milliseconds when neither is present.
    fn parse_time_unit_factor(&mut self) -> Result<f64, SyntaxError> {
        match self.current_kind() {
            TokenKind::Unit(text) => {
                let text = text.clone();
                self.advance();
                Ok(Unit::from_token(&text)
                    .map(Unit::to_milliseconds_factor)
                    .unwrap_or(1.0))
            }
            TokenKind::Identifier(text) if matches!(text.as_str(), "ms" | "s" | "m" | "h") => {
                let factor = match text.as_str() {
                    "ms" => 1.0,
                    "s" => 1_000.0,
                    "m" => 60_000.0,
                    "h" => 3_600_000.0,
                    _ => unreachable!(),
                };
                self.advance();
                Ok(factor)
            }
            _ => Ok(1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

        noop:
            cost: low

    tick:
        interval: 100ms
        action_threshold: 0.3
        mode: continuous
"#;

    #[test]
    fn parses_full_thermostat_system() {
        let system = parse(THERMOSTAT).expect("parses");
        assert_eq!(system.name, "Thermostat");
        assert_eq!(system.states.len(), 3);
        assert_eq!(system.constraints.len(), 2);
        assert_eq!(system.objectives.len(), 2);
        assert_eq!(system.actions.len(), 2);
        let tick = system.tick.expect("tick block present");
        assert_eq!(tick.interval_ms, 100);
        assert_eq!(tick.action_threshold, 0.3);
        assert_eq!(tick.mode, TickMode::Continuous);

        let increase_fan = system.action("increase_fan").unwrap();
        assert_eq!(increase_fan.parameters.len(), 1);
        assert_eq!(increase_fan.effects.len(), 2);
        assert_eq!(increase_fan.cost, CostLevel::Medium);
    }

    #[test]
    fn validates_clean_for_well_formed_system() {
        let (_system, errors) = parse_and_validate(THERMOSTAT).unwrap();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn version_annotation_round_trips_into_ast() {
        let src = "system S @version(\"1.2\")\n    state:\n        x <- a.b\n    objectives:\n        o: x -> min @priority(1)\n";
        let system = parse(src).unwrap();
        assert_eq!(system.version.as_deref(), Some("1.2"));
    }

    #[test]
    fn underindented_effect_line_is_a_syntax_error() {
        let src = "system S\n    actions:\n        a:\n            effects:\n        x: 1\n";
        let err = parse(src).unwrap_err();
        assert!(matches!(err, NovairError::Syntax(_)) || matches!(err, NovairError::Lex(_)));
    }

    #[test]
    fn state_binding_accepts_contextual_keyword_as_name() {
        let src = "system S\n    state:\n        target <- config.target\n    objectives:\n        o: target -> min @priority(1)\n";
        let system = parse(src).unwrap();
        assert!(system.state("target").is_some());
    }

    #[test]
    fn tied_tick_interval_accepts_spaced_unit_identifier() {
        let src = "system S\n    state:\n        x <- a.b\n    objectives:\n        o: x -> min @priority(1)\n    tick:\n        interval: 5 s\n";
        let system = parse(src).unwrap();
        assert_eq!(system.tick.unwrap().interval_ms, 5_000);
    }

    #[test]
    fn unknown_top_level_tokens_are_skipped_without_error() {
        let src = "system S\nbogus_line_of_garbage\n    state:\n        x <- a.b\n    objectives:\n        o: x -> min @priority(1)\n";
        assert!(parse(src).is_ok());
    }
}
