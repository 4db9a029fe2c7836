//! Error taxonomy for NovaIR parsing and runtime operations.

use thiserror::Error;

/// Lexical errors, raised by the scanner. Fatal to lexing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedChar { ch: char, line: usize, column: usize },

    #[error("unterminated string starting at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },

    #[error("unknown annotation '@{name}' at line {line}, column {column}")]
    UnknownAnnotation {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("inconsistent indentation at line {line}: width {found} matches no enclosing level")]
    IndentMismatch { line: usize, found: usize },

    #[error("tabs and spaces mixed in indentation at line {line}")]
    MixedIndentation { line: usize },
}

/// Parse errors, raised by the recursive-descent parser. Fatal to parsing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyntaxError {
    #[error("unexpected token {found} at line {line}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        line: usize,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },
}

/// Semantic validation errors. Non-fatal: all such errors on a system are
/// collected and returned together rather than aborting on the first.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("system name must not be empty")]
    EmptySystemName,

    #[error("system must declare at least one state")]
    NoStatesDeclared,

    #[error("system must declare at least one constraint or objective")]
    NoConstraintsOrObjectives,

    #[error("{category} '{name}' references undeclared state '{metric}'")]
    UnknownMetric {
        category: &'static str,
        name: String,
        metric: String,
    },

    #[error("objective '{name}' priority {priority} is out of range [1,10]")]
    PriorityOutOfRange { name: String, priority: i64 },

    #[error("parameter '{name}' on action '{action}' has min {min} > max {max}")]
    InvalidParameterRange {
        action: String,
        name: String,
        min: i64,
        max: i64,
    },

    #[error("duplicate {category} name '{name}'")]
    DuplicateName { category: &'static str, name: String },
}

/// Engine configuration errors. Fatal to `EngineConfig` construction.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("tick_interval_ms must be positive, got {value}")]
    NonPositiveInterval { value: i64 },

    #[error("action_threshold {value} is outside the expected range [{min}, {max}]")]
    ThresholdOutOfRange { value: f64, min: f64, max: f64 },
}

/// Master error type for NovaIR operations.
#[derive(Debug, Clone, Error)]
pub enum NovairError {
    #[error("lexical error: {0}")]
    Lex(#[from] LexError),

    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for NovaIR operations.
pub type NovairResult<T> = Result<T, NovairError>;
