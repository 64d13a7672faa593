//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: error.rs | CORE/SYMCIRC_ENGINE/src/error.rs
//! PURPOSE: Error taxonomy: input rejection vs. per-result analysis failure
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Two families:
//! - `CircuitError` rejects the whole input (bad netlist, bad request shape).
//! - `AnalysisError` invalidates one requested result; sibling results keep
//!   going.
//!
//! Programming-level invariant violations are `debug_assert!`s at their call
//! sites, not variants here.

use std::fmt;

/// Input-side rejection: the netlist or a result request is malformed.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitError {
    /// A device, node, voltage, or request name is used twice.
    DuplicateName(String),
    /// An identifier does not match `[A-Za-z_][A-Za-z0-9_]*`.
    BadIdentifier(String),
    /// The frequency variable `s` (case-insensitive) was used as a name.
    ReservedName(String),
    /// A current-controlled source references something that is not a probe.
    NotAProbe(String),
    /// A value relation points at a device without a symbolic constant.
    RelationTarget(String),
    /// A value relation carries a zero factor.
    ZeroRelationFactor(String),
    /// A result request references a name that resolves to nothing.
    UnknownSymbol(String),
    /// A full result lists a known (source value) as a dependent.
    DependentIsKnown(String),
    /// A transfer function request with an unusable dependent/independent
    /// combination.
    TransferShape(String),
    /// More symbolic device constants than product-word bits.
    ConstantCapacity { count: usize, max: usize },
    /// Netlist text that does not parse.
    Parse { line: usize, message: String },
}

impl fmt::Display for CircuitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitError::DuplicateName(n) => write!(f, "duplicate name '{}'", n),
            CircuitError::BadIdentifier(n) => write!(f, "invalid identifier '{}'", n),
            CircuitError::ReservedName(n) => {
                write!(f, "'{}' is reserved for the frequency variable", n)
            }
            CircuitError::NotAProbe(n) => {
                write!(f, "'{}' must reference a current probe", n)
            }
            CircuitError::RelationTarget(n) => {
                write!(f, "value relation target '{}' has no symbolic constant", n)
            }
            CircuitError::ZeroRelationFactor(n) => {
                write!(f, "value relation on '{}' has a zero factor", n)
            }
            CircuitError::UnknownSymbol(n) => write!(f, "unknown symbol '{}'", n),
            CircuitError::DependentIsKnown(n) => {
                write!(f, "'{}' is an input value and cannot be a dependent", n)
            }
            CircuitError::TransferShape(msg) => write!(f, "bad transfer function: {}", msg),
            CircuitError::ConstantCapacity { count, max } => write!(
                f,
                "{} symbolic constants exceed the {}-bit product word",
                count, max
            ),
            CircuitError::Parse { line, message } => {
                write!(f, "netlist line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for CircuitError {}

/// Failure scoped to a single requested result. Other results continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Exact arithmetic left the representable range (rational or addend
    /// factor).
    Overflow,
    /// A chain of `B = k * A` device relations loops back on itself.
    CyclicRelation(String),
    /// The equation system is singular for the named unknown.
    Singular(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Overflow => write!(f, "arithmetic overflow, result discarded"),
            AnalysisError::CyclicRelation(n) => {
                write!(f, "cyclic value relation through device '{}'", n)
            }
            AnalysisError::Singular(n) => {
                write!(f, "system is singular for unknown '{}'", n)
            }
        }
    }
}

impl std::error::Error for AnalysisError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_names() {
        let err = CircuitError::DuplicateName("R1".to_string());
        assert!(err.to_string().contains("R1"));

        let err = AnalysisError::CyclicRelation("R2".to_string());
        assert!(err.to_string().contains("R2"));
    }
}
