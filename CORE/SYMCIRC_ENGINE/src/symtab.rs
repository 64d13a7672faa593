//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: symtab.rs | CORE/SYMCIRC_ENGINE/src/symtab.rs
//! PURPOSE: Symbol table: knowns, unknowns, constant bits, relations, sub-nets
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ DATA DEFINED                                                                │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ Known        input value (independent source), one LES column              │
//! │ Unknown      node voltage or branch current, one LES row + column          │
//! │ SymbolTable  bijections device ↔ bit, device ↔ unknown/known              │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ INVARIANTS                                                                  │
//! │ - every node, device, and bit index appears in at most one entry per kind   │
//! │ - bit ↔ device is a bijection over constant-bearing devices                 │
//! │ - each sub-net contributes exactly one ground node                          │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! Constant bit indices are handed out so that a product word prints its
//! set bits (highest first) as controlled-source gains, then R, G, L, C;
//! within one kind, declaration order wins.

// ─────────────────────────────────────────────────────────────────────────────────
// CODE BELOW
// ─────────────────────────────────────────────────────────────────────────────────

use crate::circuit::{Circuit, DeviceId, DeviceKind, NodeId};
use crate::error::{AnalysisError, CircuitError};
use crate::rational::Rat;
use std::collections::HashMap;

/// Width of the product-of-constants word.
pub const MAX_CONSTANTS: usize = 64;

#[derive(Clone, Debug)]
pub struct Known {
    pub name: String,
    /// Column index among the known columns (0-based).
    pub col: usize,
    pub device: DeviceId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnknownOrigin {
    /// Node voltage.
    Node(NodeId),
    /// Branch current of a current-carrying device.
    Device(DeviceId),
}

#[derive(Clone, Debug)]
pub struct Unknown {
    pub name: String,
    pub row: usize,
    pub col: usize,
    pub origin: UnknownOrigin,
    /// Connected-component id, node-voltage unknowns only.
    pub subnet: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolId {
    Unknown(usize),
    Known(usize),
}

#[derive(Debug)]
pub struct SymbolTable {
    knowns: Vec<Known>,
    unknowns: Vec<Unknown>,
    /// bit index → device.
    constants: Vec<DeviceId>,
    /// device → bit index.
    bit_of_device: Vec<Option<usize>>,
    unknown_of_node: Vec<Option<usize>>,
    unknown_of_device: Vec<Option<usize>>,
    known_of_device: Vec<Option<usize>>,
    names: HashMap<String, SymbolId>,
    subnet_of_node: Vec<usize>,
    grounds: Vec<NodeId>,
}

fn is_ground_name(name: &str) -> bool {
    name == "0" || name.eq_ignore_ascii_case("gnd")
}

impl SymbolTable {
    pub fn build(circuit: &Circuit) -> Result<SymbolTable, CircuitError> {
        let n_nodes = circuit.nodes().len();
        let n_devices = circuit.devices().len();

        // Sub-nets: connected components over conduction edges. Control
        // sense pairs do not connect; an op-amp ties its inputs and output
        // into one component so the output side shares the input's ground.
        let mut adjacency: Vec<Vec<NodeId>> = vec![Vec::new(); n_nodes];
        let link = |adjacency: &mut Vec<Vec<NodeId>>, a: NodeId, b: NodeId| {
            adjacency[a].push(b);
            adjacency[b].push(a);
        };
        for device in circuit.devices() {
            link(&mut adjacency, device.pos, device.neg);
            if let Some(out) = device.out {
                link(&mut adjacency, device.pos, out);
            }
        }
        let mut subnet_of_node = vec![usize::MAX; n_nodes];
        let mut grounds = Vec::new();
        for start in 0..n_nodes {
            if subnet_of_node[start] != usize::MAX {
                continue;
            }
            let subnet = grounds.len();
            let mut members = Vec::new();
            let mut queue = vec![start];
            subnet_of_node[start] = subnet;
            while let Some(node) = queue.pop() {
                members.push(node);
                for &next in &adjacency[node] {
                    if subnet_of_node[next] == usize::MAX {
                        subnet_of_node[next] = subnet;
                        queue.push(next);
                    }
                }
            }
            let ground = members
                .iter()
                .copied()
                .find(|&n| is_ground_name(circuit.node_name(n)))
                .unwrap_or_else(|| *members.iter().min().expect("component is non-empty"));
            grounds.push(ground);
        }

        let mut table = SymbolTable {
            knowns: Vec::new(),
            unknowns: Vec::new(),
            constants: Vec::new(),
            bit_of_device: vec![None; n_devices],
            unknown_of_node: vec![None; n_nodes],
            unknown_of_device: vec![None; n_devices],
            known_of_device: vec![None; n_devices],
            names: HashMap::new(),
            subnet_of_node,
            grounds,
        };

        // Node-voltage unknowns, grounds excluded.
        for node in 0..n_nodes {
            if table.grounds.contains(&node) {
                continue;
            }
            let index = table.unknowns.len();
            let name = format!("U_{}", circuit.node_name(node));
            table.insert_name(name.clone(), SymbolId::Unknown(index))?;
            table.unknowns.push(Unknown {
                name,
                row: index,
                col: index,
                origin: UnknownOrigin::Node(node),
                subnet: Some(table.subnet_of_node[node]),
            });
            table.unknown_of_node[node] = Some(index);
        }

        // Branch-current unknowns. A probe's current shares the probe name.
        for (id, device) in circuit.devices().iter().enumerate() {
            if !device.kind.carries_current() {
                continue;
            }
            let index = table.unknowns.len();
            let name = if device.kind == DeviceKind::Probe {
                device.name.clone()
            } else {
                format!("I_{}", device.name)
            };
            table.insert_name(name.clone(), SymbolId::Unknown(index))?;
            table.unknowns.push(Unknown {
                name,
                row: index,
                col: index,
                origin: UnknownOrigin::Device(id),
                subnet: None,
            });
            table.unknown_of_device[id] = Some(index);
        }

        // Knowns: one per independent source, sharing the source's name.
        for (id, device) in circuit.devices().iter().enumerate() {
            if !device.kind.is_source() {
                continue;
            }
            let index = table.knowns.len();
            table.insert_name(device.name.clone(), SymbolId::Known(index))?;
            table.knowns.push(Known {
                name: device.name.clone(),
                col: index,
                device: id,
            });
            table.known_of_device[id] = Some(index);
        }

        // Constant bits, highest bit to the first-declared device of the
        // lowest print rank.
        let mut ranked: Vec<(u8, usize, DeviceId)> = circuit
            .devices()
            .iter()
            .enumerate()
            .filter(|(_, d)| d.kind.has_constant())
            .map(|(id, d)| (d.kind.print_rank(), id, id))
            .collect();
        ranked.sort_by_key(|&(rank, order, _)| (rank, order));
        let count = ranked.len();
        if count > MAX_CONSTANTS {
            return Err(CircuitError::ConstantCapacity {
                count,
                max: MAX_CONSTANTS,
            });
        }
        table.constants = vec![0; count];
        for (i, &(_, _, device)) in ranked.iter().enumerate() {
            let bit = count - 1 - i;
            table.constants[bit] = device;
            table.bit_of_device[device] = Some(bit);
        }

        Ok(table)
    }

    fn insert_name(&mut self, name: String, id: SymbolId) -> Result<(), CircuitError> {
        if self.names.insert(name.clone(), id).is_some() {
            return Err(CircuitError::DuplicateName(name));
        }
        Ok(())
    }

    pub fn n_unknowns(&self) -> usize {
        self.unknowns.len()
    }

    pub fn n_knowns(&self) -> usize {
        self.knowns.len()
    }

    pub fn n_constants(&self) -> usize {
        self.constants.len()
    }

    pub fn unknown(&self, index: usize) -> &Unknown {
        &self.unknowns[index]
    }

    pub fn known(&self, index: usize) -> &Known {
        &self.knowns[index]
    }

    pub fn knowns(&self) -> &[Known] {
        &self.knowns
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }

    pub fn unknown_of_node(&self, node: NodeId) -> Option<usize> {
        self.unknown_of_node[node]
    }

    pub fn unknown_of_device(&self, device: DeviceId) -> Option<usize> {
        self.unknown_of_device[device]
    }

    pub fn known_of_device(&self, device: DeviceId) -> Option<usize> {
        self.known_of_device[device]
    }

    /// Product-word bit of a constant-bearing device.
    pub fn bit_of_device(&self, device: DeviceId) -> Option<usize> {
        self.bit_of_device[device]
    }

    pub fn device_of_bit(&self, bit: usize) -> DeviceId {
        self.constants[bit]
    }

    pub fn mask_of_device(&self, device: DeviceId) -> Option<u64> {
        self.bit_of_device[device].map(|bit| 1u64 << bit)
    }

    pub fn grounds(&self) -> &[NodeId] {
        &self.grounds
    }

    pub fn subnet_of_node(&self, node: NodeId) -> usize {
        self.subnet_of_node[node]
    }

    /// Follow a device's `value = k · other` chain to its root, accumulating
    /// the rational factor. A chain longer than the constant count is
    /// cyclic.
    pub fn relation_root(
        &self,
        circuit: &Circuit,
        device: DeviceId,
    ) -> Result<(DeviceId, Rat), AnalysisError> {
        let mut cursor = device;
        let mut factor = Rat::ONE;
        let mut steps = 0usize;
        while let Some(rel) = circuit.device(cursor).relation {
            steps += 1;
            if steps > self.constants.len() {
                return Err(AnalysisError::CyclicRelation(
                    circuit.device(device).name.clone(),
                ));
            }
            factor = factor.mul(rel.factor).strict()?;
            cursor = rel.target;
        }
        Ok((cursor, factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::parse::parse_netlist;

    fn rlc() -> Circuit {
        parse_netlist("U Uin in gnd / L L in K1 / C C K1 out / R R out gnd").unwrap()
    }

    #[test]
    fn test_unknowns_and_knowns() {
        let circuit = rlc();
        let table = SymbolTable::build(&circuit).unwrap();

        // Three node voltages plus the source current.
        assert_eq!(table.n_unknowns(), 4);
        assert_eq!(table.n_knowns(), 1);
        assert_eq!(table.known(0).name, "Uin");

        assert!(matches!(table.lookup("U_out"), Some(SymbolId::Unknown(_))));
        assert!(matches!(table.lookup("I_Uin"), Some(SymbolId::Unknown(_))));
        assert!(matches!(table.lookup("Uin"), Some(SymbolId::Known(0))));
        assert!(table.lookup("U_gnd").is_none(), "ground has no unknown");
    }

    #[test]
    fn test_constant_bits_print_r_before_l_before_c() {
        let circuit = rlc();
        let table = SymbolTable::build(&circuit).unwrap();
        assert_eq!(table.n_constants(), 3);

        let r = circuit.device_id("R").unwrap();
        let l = circuit.device_id("L").unwrap();
        let c = circuit.device_id("C").unwrap();
        let (rb, lb, cb) = (
            table.bit_of_device(r).unwrap(),
            table.bit_of_device(l).unwrap(),
            table.bit_of_device(c).unwrap(),
        );
        assert!(rb > lb && lb > cb, "R bit above L bit above C bit");

        // Bijection both ways.
        for bit in 0..table.n_constants() {
            assert_eq!(table.bit_of_device(table.device_of_bit(bit)), Some(bit));
        }
    }

    #[test]
    fn test_ground_per_subnet() {
        let circuit = parse_netlist(
            "U Uin in gnd / R R1 in gnd / VCCS G1 a b in gnd / R R2 a b",
        )
        .unwrap();
        let table = SymbolTable::build(&circuit).unwrap();
        // Two components: {in, gnd} and {a, b}; each has one ground.
        assert_eq!(table.grounds().len(), 2);
        let gnd = circuit.node_id("gnd").unwrap();
        assert!(table.grounds().contains(&gnd), "named ground wins");
    }

    #[test]
    fn test_relation_chain_and_cycle() {
        let circuit = parse_netlist(
            "U Uin in gnd / R R1 in out / R R2 out gnd = 2 * R1 / R R3 out gnd = 3/2 * R2",
        )
        .unwrap();
        let table = SymbolTable::build(&circuit).unwrap();
        let r3 = circuit.device_id("R3").unwrap();
        let (root, factor) = table.relation_root(&circuit, r3).unwrap();
        assert_eq!(circuit.device(root).name, "R1");
        assert_eq!(factor, Rat::integer(3), "3/2 of 2 of R1");

        let cyclic = parse_netlist(
            "U Uin in gnd / R R1 in out = 2 * R2 / R R2 out gnd = 3 * R1",
        )
        .unwrap();
        let ctable = SymbolTable::build(&cyclic).unwrap();
        let r1 = cyclic.device_id("R1").unwrap();
        assert_eq!(
            ctable.relation_root(&cyclic, r1),
            Err(AnalysisError::CyclicRelation("R1".to_string()))
        );
    }
}
