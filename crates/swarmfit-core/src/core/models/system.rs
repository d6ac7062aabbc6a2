use super::temperature::Substitution;

/// Identity of the molecule being parameterized, substituted into the
/// packing and structure-building inputs during equilibration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSpec {
    pub molecule_name: Substitution,
    pub residue_name: Substitution,
}
