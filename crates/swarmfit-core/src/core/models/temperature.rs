use std::fmt;

/// A value written into templated simulation inputs in place of `pattern`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub value: String,
    pub pattern: String,
}

impl Substitution {
    pub fn new(value: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            pattern: pattern.into(),
        }
    }
}

/// One state point the force field is fitted against.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSpec {
    /// Temperature in Kelvin.
    pub temperature: f64,
    pub temperature_pattern: String,
    /// Experimental liquid density the simulation should reproduce.
    pub target_density: f64,
    pub pressure: Substitution,
    pub molecule_count: Substitution,
    pub box_size: Substitution,
    pub equilibration_steps: Substitution,
    pub production_steps: Substitution,
}

impl TemperatureSpec {
    /// Text form of the temperature, used for directory names and substitution.
    pub fn label(&self) -> String {
        self.temperature.to_string()
    }

    /// Directory name of this state point below a group's working area.
    pub fn directory_name(&self) -> String {
        format!("T_{}", self.label())
    }

    pub fn temperature_substitution(&self) -> Substitution {
        Substitution::new(self.label(), self.temperature_pattern.clone())
    }
}

impl fmt::Display for TemperatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T = {} K (target density {})",
            self.label(),
            self.target_density
        )
    }
}
