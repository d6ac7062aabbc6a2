use serde::{Deserialize, Serialize};
use std::fmt;

/// How a normalized position coordinate is mapped onto a physical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterKind {
    /// Any real value in `[start, end]`.
    Continuous,
    /// An integer in `{start, ..., end}`.
    Discrete,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continuous => write!(f, "continuous"),
            Self::Discrete => write!(f, "discrete"),
        }
    }
}

/// A single force-field parameter under optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParameterKind,
    pub start: f64,
    pub end: f64,
    /// Placeholder text replaced by the parameter value in templated inputs.
    pub pattern: String,
    /// Value substituted for `pattern` while equilibrating the reference systems.
    pub reference: String,
}

impl ParameterSpec {
    pub fn new(
        name: impl Into<String>,
        kind: ParameterKind,
        start: f64,
        end: f64,
        pattern: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            start,
            end,
            pattern: pattern.into(),
            reference: reference.into(),
        }
    }

    pub fn has_valid_bounds(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start <= self.end
    }
}

impl fmt::Display for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, [{}, {}], pattern '{}', reference {})",
            self.name, self.kind, self.start, self.end, self.pattern, self.reference
        )
    }
}
