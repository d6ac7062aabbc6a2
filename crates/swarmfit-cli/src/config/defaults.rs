/// Values used when neither the configuration file nor the command line sets them.
pub struct DefaultsConfig {
    pub max_iterations: usize,
    pub population: usize,
    pub equilibrate: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            population: 24,
            equilibrate: true,
        }
    }
}
