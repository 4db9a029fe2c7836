//! Numeric value, unit and source-path primitives shared across the AST.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A finite real number with an optional, purely informational unit tag.
///
/// Units are never type-checked against the state they annotate; they exist
/// for display and round-tripping through the pretty-printer only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueWithUnit {
    pub value: f64,
    pub unit: Option<Unit>,
}

impl ValueWithUnit {
    pub fn new(value: f64) -> Self {
        Self { value, unit: None }
    }

    pub fn with_unit(value: f64, unit: Unit) -> Self {
        Self {
            value,
            unit: Some(unit),
        }
    }
}

impl fmt::Display for ValueWithUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{}{}", self.value, unit),
            None => write!(f, "{}", self.value),
        }
    }
}

/// A recognized unit token. Display renders the token exactly as it should
/// appear when pretty-printed back into source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Celsius,
    Fahrenheit,
    Kelvin,
    Percent,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Hertz,
    Kilohertz,
    Megahertz,
    Gigahertz,
    Terabytes,
    Kilowatts,
    Milliwatts,
    Watts,
    Decibels,
    DecibelsA,
}

impl Unit {
    /// Parse a unit token as it appears immediately after a number, with no
    /// intervening whitespace (e.g. `85°C`, `100%`, `250ms`).
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "°C" => Unit::Celsius,
            "°F" => Unit::Fahrenheit,
            "K" => Unit::Kelvin,
            "%" => Unit::Percent,
            "ms" => Unit::Milliseconds,
            "s" => Unit::Seconds,
            "m" => Unit::Minutes,
            "h" => Unit::Hours,
            "B" => Unit::Bytes,
            "KB" => Unit::Kilobytes,
            "MB" => Unit::Megabytes,
            "GB" => Unit::Gigabytes,
            "TB" => Unit::Terabytes,
            "Hz" => Unit::Hertz,
            "kHz" => Unit::Kilohertz,
            "MHz" => Unit::Megahertz,
            "GHz" => Unit::Gigahertz,
            "kW" => Unit::Kilowatts,
            "mW" => Unit::Milliwatts,
            "W" => Unit::Watts,
            "dB" => Unit::Decibels,
            "dBA" => Unit::DecibelsA,
            _ => return None,
        })
    }

    /// Whether this unit denotes a duration, and is therefore eligible for
    /// normalization to milliseconds in the `tick` section.
    pub fn is_time_unit(self) -> bool {
        matches!(
            self,
            Unit::Milliseconds | Unit::Seconds | Unit::Minutes | Unit::Hours
        )
    }

    /// Multiplier to convert a value in this unit to milliseconds. Only
    /// meaningful for time units.
    pub fn to_milliseconds_factor(self) -> f64 {
        match self {
            Unit::Milliseconds => 1.0,
            Unit::Seconds => 1_000.0,
            Unit::Minutes => 60_000.0,
            Unit::Hours => 3_600_000.0,
            _ => 1.0,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Unit::Celsius => "°C",
            Unit::Fahrenheit => "°F",
            Unit::Kelvin => "K",
            Unit::Percent => "%",
            Unit::Milliseconds => "ms",
            Unit::Seconds => "s",
            Unit::Minutes => "m",
            Unit::Hours => "h",
            Unit::Bytes => "B",
            Unit::Kilobytes => "KB",
            Unit::Megabytes => "MB",
            Unit::Gigabytes => "GB",
            Unit::Hertz => "Hz",
            Unit::Kilohertz => "kHz",
            Unit::Megahertz => "MHz",
            Unit::Gigahertz => "GHz",
            Unit::Terabytes => "TB",
            Unit::Kilowatts => "kW",
            Unit::Milliwatts => "mW",
            Unit::Watts => "W",
            Unit::Decibels => "dB",
            Unit::DecibelsA => "dBA",
        };
        write!(f, "{}", token)
    }
}

/// An ordered, non-empty sequence of identifier segments, e.g. `sensors.cpu.temp`.
///
/// Purely a record of where a state binds; the runtime never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePath {
    segments: Vec<String>,
}

impl SourcePath {
    /// Builds a path from its dot-separated segments. Panics if empty —
    /// the grammar never produces an empty path, so this is a parser bug
    /// if it happens.
    pub fn new(segments: Vec<String>) -> Self {
        assert!(!segments.is_empty(), "SourcePath must have at least one segment");
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}
