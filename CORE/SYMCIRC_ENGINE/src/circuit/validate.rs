//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: validate.rs | CORE/SYMCIRC_ENGINE/src/circuit/validate.rs
//! PURPOSE: Structural diagnostics for a parsed circuit
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! None of these stop the analysis; they flag netlists that usually mean a
//! typo: dangling nodes, self-looped devices, parallel ideal voltage
//! branches (a guaranteed singular system), probes nothing looks at, and
//! circuits with no input or no request at all.

use super::{Circuit, DeviceKind, ResultRequest};
use serde::Serialize;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Warning {
    /// A node touched by exactly one device terminal.
    FloatingNode(String),
    /// Both conduction terminals of a device sit on one node.
    SelfLoop(String),
    /// Two voltage-defining branches span the same node pair.
    ParallelVoltageBranches(String, String),
    /// A probe no controlled source and no result request refers to.
    UnreadProbe(String),
    /// No independent source: every transfer is zero.
    NoInput,
    /// Nothing asked for.
    NoRequests,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::FloatingNode(n) => write!(f, "node '{}' is only connected once", n),
            Warning::SelfLoop(d) => write!(f, "device '{}' loops onto a single node", d),
            Warning::ParallelVoltageBranches(a, b) => {
                write!(f, "'{}' and '{}' force the same node pair (singular)", a, b)
            }
            Warning::UnreadProbe(p) => write!(f, "probe '{}' is never read", p),
            Warning::NoInput => write!(f, "circuit has no independent source"),
            Warning::NoRequests => write!(f, "netlist requests no results"),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Diagnostics {
    pub warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

fn defines_voltage(kind: DeviceKind) -> bool {
    matches!(
        kind,
        DeviceKind::VoltageSource | DeviceKind::Vcvs | DeviceKind::Ccvs | DeviceKind::Probe
    )
}

/// Structural lint pass over a finished circuit.
pub fn validate(circuit: &Circuit) -> Diagnostics {
    let mut warnings = Vec::new();

    let mut degree = vec![0usize; circuit.nodes().len()];
    for device in circuit.devices() {
        degree[device.pos] += 1;
        degree[device.neg] += 1;
        if let Some(out) = device.out {
            degree[out] += 1;
        }
        if device.pos == device.neg {
            warnings.push(Warning::SelfLoop(device.name.clone()));
        }
    }
    for (node, &d) in degree.iter().enumerate() {
        if d == 1 {
            warnings.push(Warning::FloatingNode(circuit.node_name(node).to_string()));
        }
    }

    // Voltage-defining branches across one node pair pin the same
    // difference twice; the solver will report the singularity, but the
    // netlist author wants to hear it now.
    let voltage_branches: Vec<(usize, (usize, usize))> = circuit
        .devices()
        .iter()
        .enumerate()
        .filter(|(_, d)| defines_voltage(d.kind))
        .map(|(i, d)| (i, (d.pos.min(d.neg), d.pos.max(d.neg))))
        .collect();
    for (i, &(a, pair_a)) in voltage_branches.iter().enumerate() {
        for &(b, pair_b) in &voltage_branches[i + 1..] {
            if pair_a == pair_b {
                warnings.push(Warning::ParallelVoltageBranches(
                    circuit.device(a).name.clone(),
                    circuit.device(b).name.clone(),
                ));
            }
        }
    }

    for (id, device) in circuit.devices().iter().enumerate() {
        if device.kind != DeviceKind::Probe {
            continue;
        }
        let sensed = circuit
            .devices()
            .iter()
            .any(|d| d.ctrl_probe == Some(id));
        let requested = circuit.requests().iter().any(|r| match r {
            ResultRequest::Full { dependents, .. } => dependents.contains(&device.name),
            ResultRequest::Transfer {
                dependent,
                independent,
                ..
            } => *dependent == device.name || *independent == device.name,
        });
        if !sensed && !requested {
            warnings.push(Warning::UnreadProbe(device.name.clone()));
        }
    }

    if !circuit.devices().iter().any(|d| d.kind.is_source()) {
        warnings.push(Warning::NoInput);
    }
    if circuit.requests().is_empty() {
        warnings.push(Warning::NoRequests);
    }

    Diagnostics { warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::parse::parse_netlist;

    #[test]
    fn test_clean_circuit() {
        let circuit = parse_netlist(
            "U Uin in gnd / R R1 in out / C C1 out gnd\nPLOT G U_out U_in\n",
        )
        .unwrap();
        assert!(validate(&circuit).is_clean());
    }

    #[test]
    fn test_floating_node_and_self_loop() {
        let circuit =
            parse_netlist("U Uin in gnd / R R1 in dangling / R R2 in in\nPLOT G U_in Uin\n")
                .unwrap();
        let diag = validate(&circuit);
        assert!(diag
            .warnings
            .contains(&Warning::FloatingNode("dangling".to_string())));
        assert!(diag.warnings.contains(&Warning::SelfLoop("R2".to_string())));
    }

    #[test]
    fn test_parallel_voltage_branches() {
        let circuit =
            parse_netlist("U U1 a gnd / U U2 gnd a / R R1 a gnd\nRESULT F U_a\n").unwrap();
        let diag = validate(&circuit);
        assert!(diag.warnings.iter().any(|w| matches!(
            w,
            Warning::ParallelVoltageBranches(a, b) if a == "U1" && b == "U2"
        )));
    }

    #[test]
    fn test_unread_probe() {
        let circuit =
            parse_netlist("U Uin in gnd / R R1 in a / PROBE P1 a gnd\nPLOT G U_in Uin\n")
                .unwrap();
        let diag = validate(&circuit);
        assert!(diag
            .warnings
            .contains(&Warning::UnreadProbe("P1".to_string())));

        // A probe read by a controlled source is fine.
        let circuit = parse_netlist(
            "U Uin in gnd / R R1 in a / PROBE P1 a gnd / CCCS F1 b gnd P1 / R R2 b gnd\nPLOT G U_b Uin\n",
        )
        .unwrap();
        assert!(!validate(&circuit)
            .warnings
            .contains(&Warning::UnreadProbe("P1".to_string())));
    }

    #[test]
    fn test_empty_surface_warnings() {
        let circuit = parse_netlist("R R1 a b / R R2 b a\n").unwrap();
        let diag = validate(&circuit);
        assert!(diag.warnings.contains(&Warning::NoInput));
        assert!(diag.warnings.contains(&Warning::NoRequests));
    }
}
