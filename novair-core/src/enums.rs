//! Enum types shared by the DSL and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CORE ENUMS
// ============================================================================

/// Severity of a constraint violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Warning,
}

/// Declared operating cost of taking an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CostLevel {
    Low,
    Medium,
    High,
}

/// The direction an objective optimizes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectiveKind {
    /// Approach a fixed target value as closely as possible.
    Target,
    Minimize,
    Maximize,
}

/// How the engine schedules ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickMode {
    /// Tick on a fixed cadence regardless of state change.
    Continuous,
    /// Skip a tick when no registered reader's value changed since the last sample.
    Reactive,
}

/// Comparison operator used by a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
    Ne,
}

impl Default for TickMode {
    fn default() -> Self {
        TickMode::Continuous
    }
}

impl Default for CostLevel {
    fn default() -> Self {
        CostLevel::Low
    }
}

// ============================================================================
// STRING CONVERSIONS
// ============================================================================

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Warning),
            _ => Err(format!("Invalid Severity: {}", s)),
        }
    }
}

impl fmt::Display for CostLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            CostLevel::Low => "low",
            CostLevel::Medium => "medium",
            CostLevel::High => "high",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for CostLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "low" => Ok(CostLevel::Low),
            "medium" => Ok(CostLevel::Medium),
            "high" => Ok(CostLevel::High),
            _ => Err(format!("Invalid CostLevel: {}", s)),
        }
    }
}

impl CostLevel {
    /// Score penalty subtracted for taking an action of this cost.
    pub fn penalty(self) -> f64 {
        match self {
            CostLevel::Low => 0.0,
            CostLevel::Medium => 0.2,
            CostLevel::High => 0.5,
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ObjectiveKind::Target => "target",
            ObjectiveKind::Minimize => "min",
            ObjectiveKind::Maximize => "max",
        };
        write!(f, "{}", value)
    }
}

impl fmt::Display for TickMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            TickMode::Continuous => "continuous",
            TickMode::Reactive => "reactive",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for TickMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "continuous" => Ok(TickMode::Continuous),
            "reactive" => Ok(TickMode::Reactive),
            _ => Err(format!("Invalid TickMode: {}", s)),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            CompareOp::Le => "<=",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        };
        write!(f, "{}", value)
    }
}

impl CompareOp {
    /// Signed margin: non-negative means satisfied.
    pub fn margin(self, current: f64, threshold: f64) -> f64 {
        const EPSILON: f64 = 1e-3;
        match self {
            CompareOp::Le => threshold - current,
            CompareOp::Ge => current - threshold,
            CompareOp::Lt => threshold - current - EPSILON,
            CompareOp::Gt => current - threshold - EPSILON,
            CompareOp::Eq => -(current - threshold).abs(),
            CompareOp::Ne => (current - threshold).abs() - EPSILON,
        }
    }
}
