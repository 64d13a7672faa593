//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: les.rs | CORE/SYMCIRC_ENGINE/src/les.rs
//! PURPOSE: Assemble the symbolic linear equation system from a circuit
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ FORMULATION: node voltages + branch currents                                │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ Row per non-ground node:        KCL, sum of leaving currents = 0            │
//! │ Row per current-carrying device: its defining relation                      │
//! │   voltage source   U+ − U− = u          op-amp   U+ − U− = 0 (virtual short)│
//! │   VCVS             U+ − U− = e·(Uc+−Uc−)  probe  U+ − U− = 0, current free  │
//! │   CCVS             U+ − U− = h·I_probe                                      │
//! │ Column per unknown; one extra column per independent source.                │
//! │                                                                             │
//! │ Passive entries are ±1·device-bit; the admittance substitution             │
//! │ (1/R, G, sC, 1/sL, gains) happens in the frequency transform.               │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! Everything is written in left-hand-side form, `A·x + B·u = 0`; the solver
//! negates the known columns when it records numerators.

// ─────────────────────────────────────────────────────────────────────────────────
// CODE BELOW
// ─────────────────────────────────────────────────────────────────────────────────

use crate::circuit::{Circuit, DeviceKind, NodeId};
use crate::coeff::{AddendArena, Coeff};
use crate::error::AnalysisError;
use crate::grid::Grid;
use crate::symtab::SymbolTable;

/// The assembled m × (m + n) coefficient matrix plus its addend pool.
pub struct LinearSystem {
    pub m: usize,
    pub n_knowns: usize,
    pub arena: AddendArena,
    pub matrix: Grid<Coeff>,
}

impl LinearSystem {
    pub fn width(&self) -> usize {
        self.m + self.n_knowns
    }

    /// Deep copy into a fresh arena; elimination consumes the copy and the
    /// shared original stays untouched.
    pub fn clone_working(&self) -> LinearSystem {
        let mut arena = AddendArena::new();
        let mut matrix = Grid::new(self.m, self.width());
        for row in 0..self.m {
            for col in 0..self.width() {
                let copy = self.matrix.get(row, col).copy_into(&self.arena, &mut arena);
                matrix.set(row, col, copy);
            }
        }
        LinearSystem {
            m: self.m,
            n_knowns: self.n_knowns,
            arena,
            matrix,
        }
    }
}

struct Assembler<'a> {
    circuit: &'a Circuit,
    table: &'a SymbolTable,
    system: LinearSystem,
}

impl Assembler<'_> {
    fn kcl_row(&self, node: NodeId) -> Option<usize> {
        self.table
            .unknown_of_node(node)
            .map(|u| self.table.unknown(u).row)
    }

    fn node_col(&self, node: NodeId) -> Option<usize> {
        self.table
            .unknown_of_node(node)
            .map(|u| self.table.unknown(u).col)
    }

    fn current_col(&self, device: usize) -> usize {
        let u = self
            .table
            .unknown_of_device(device)
            .expect("device carries a current unknown");
        self.table.unknown(u).col
    }

    fn branch_row(&self, device: usize) -> usize {
        let u = self
            .table
            .unknown_of_device(device)
            .expect("device carries a current unknown");
        self.table.unknown(u).row
    }

    fn known_col(&self, device: usize) -> usize {
        let k = self
            .table
            .known_of_device(device)
            .expect("source spawns a known");
        self.system.m + self.table.known(k).col
    }

    fn add(
        &mut self,
        row: Option<usize>,
        col: Option<usize>,
        factor: i64,
        product: u64,
    ) -> Result<(), AnalysisError> {
        if let (Some(row), Some(col)) = (row, col) {
            self.system
                .matrix
                .get_mut(row, col)
                .add_term(&mut self.system.arena, factor, product)?;
        }
        Ok(())
    }

    /// ±product admittance stamp between two terminals.
    fn stamp_admittance(
        &mut self,
        pos: NodeId,
        neg: NodeId,
        product: u64,
    ) -> Result<(), AnalysisError> {
        let (rp, rn) = (self.kcl_row(pos), self.kcl_row(neg));
        let (cp, cn) = (self.node_col(pos), self.node_col(neg));
        self.add(rp, cp, 1, product)?;
        self.add(rp, cn, -1, product)?;
        self.add(rn, cp, -1, product)?;
        self.add(rn, cn, 1, product)?;
        Ok(())
    }

    /// Branch current entering at `pos`, leaving at `neg`.
    fn stamp_current(
        &mut self,
        pos: NodeId,
        neg: NodeId,
        col: usize,
        product: u64,
    ) -> Result<(), AnalysisError> {
        self.add(self.kcl_row(pos), Some(col), 1, product)?;
        self.add(self.kcl_row(neg), Some(col), -1, product)?;
        Ok(())
    }

    /// `U+ − U−` into a defining row.
    fn stamp_voltage_difference(
        &mut self,
        row: usize,
        pos: NodeId,
        neg: NodeId,
        factor: i64,
        product: u64,
    ) -> Result<(), AnalysisError> {
        self.add(Some(row), self.node_col(pos), factor, product)?;
        self.add(Some(row), self.node_col(neg), -factor, product)?;
        Ok(())
    }

    fn assemble(&mut self) -> Result<(), AnalysisError> {
        for (id, device) in self.circuit.devices().iter().enumerate() {
            match device.kind {
                DeviceKind::Resistor
                | DeviceKind::Conductance
                | DeviceKind::Inductor
                | DeviceKind::Capacitor => {
                    let product = self
                        .table
                        .mask_of_device(id)
                        .expect("passive device owns a constant bit");
                    self.stamp_admittance(device.pos, device.neg, product)?;
                }
                DeviceKind::VoltageSource => {
                    let col = self.current_col(id);
                    self.stamp_current(device.pos, device.neg, col, 0)?;
                    let row = self.branch_row(id);
                    self.stamp_voltage_difference(row, device.pos, device.neg, 1, 0)?;
                    let kcol = self.known_col(id);
                    self.add(Some(row), Some(kcol), -1, 0)?;
                }
                DeviceKind::CurrentSource => {
                    let kcol = self.known_col(id);
                    self.add(self.kcl_row(device.pos), Some(kcol), 1, 0)?;
                    self.add(self.kcl_row(device.neg), Some(kcol), -1, 0)?;
                }
                DeviceKind::Vcvs => {
                    let col = self.current_col(id);
                    self.stamp_current(device.pos, device.neg, col, 0)?;
                    let row = self.branch_row(id);
                    let gain = self.table.mask_of_device(id).expect("gain owns a bit");
                    let (cp, cn) = device.ctrl.expect("VCVS has a sense pair");
                    self.stamp_voltage_difference(row, device.pos, device.neg, 1, 0)?;
                    self.stamp_voltage_difference(row, cp, cn, -1, gain)?;
                }
                DeviceKind::Vccs => {
                    let gain = self.table.mask_of_device(id).expect("gain owns a bit");
                    let (cp, cn) = device.ctrl.expect("VCCS has a sense pair");
                    let (rp, rn) = (self.kcl_row(device.pos), self.kcl_row(device.neg));
                    let (ccp, ccn) = (self.node_col(cp), self.node_col(cn));
                    self.add(rp, ccp, 1, gain)?;
                    self.add(rp, ccn, -1, gain)?;
                    self.add(rn, ccp, -1, gain)?;
                    self.add(rn, ccn, 1, gain)?;
                }
                DeviceKind::Ccvs => {
                    let col = self.current_col(id);
                    self.stamp_current(device.pos, device.neg, col, 0)?;
                    let row = self.branch_row(id);
                    let gain = self.table.mask_of_device(id).expect("gain owns a bit");
                    let probe = device.ctrl_probe.expect("CCVS has a sense probe");
                    self.stamp_voltage_difference(row, device.pos, device.neg, 1, 0)?;
                    self.add(Some(row), Some(self.current_col(probe)), -1, gain)?;
                }
                DeviceKind::Cccs => {
                    let gain = self.table.mask_of_device(id).expect("gain owns a bit");
                    let probe = device.ctrl_probe.expect("CCCS has a sense probe");
                    let pcol = self.current_col(probe);
                    self.add(self.kcl_row(device.pos), Some(pcol), 1, gain)?;
                    self.add(self.kcl_row(device.neg), Some(pcol), -1, gain)?;
                }
                DeviceKind::OpAmp => {
                    let out = device.out.expect("op-amp has an output node");
                    let col = self.current_col(id);
                    self.add(self.kcl_row(out), Some(col), 1, 0)?;
                    let row = self.branch_row(id);
                    self.stamp_voltage_difference(row, device.pos, device.neg, 1, 0)?;
                }
                DeviceKind::Probe => {
                    let col = self.current_col(id);
                    self.stamp_current(device.pos, device.neg, col, 0)?;
                    let row = self.branch_row(id);
                    self.stamp_voltage_difference(row, device.pos, device.neg, 1, 0)?;
                }
            }
        }
        Ok(())
    }
}

/// Build the m × (m + n) system for a circuit.
pub fn build(circuit: &Circuit, table: &SymbolTable) -> Result<LinearSystem, AnalysisError> {
    let m = table.n_unknowns();
    let n_knowns = table.n_knowns();
    let system = LinearSystem {
        m,
        n_knowns,
        arena: AddendArena::new(),
        matrix: Grid::new(m, m + n_knowns),
    };
    let mut assembler = Assembler {
        circuit,
        table,
        system,
    };
    assembler.assemble()?;
    Ok(assembler.system)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::parse::parse_netlist;
    use crate::symtab::SymbolTable;

    fn terms(system: &LinearSystem, row: usize, col: usize) -> Vec<(i64, u64)> {
        system.matrix.get(row, col).iter(&system.arena).collect()
    }

    #[test]
    fn test_rlc_lowpass_rows() {
        let circuit =
            parse_netlist("U Uin in gnd / L L in K1 / C C K1 out / R R out gnd").unwrap();
        let table = SymbolTable::build(&circuit).unwrap();
        let system = build(&circuit, &table).unwrap();

        assert_eq!(system.m, 4);
        assert_eq!(system.n_knowns, 1);

        let l = table.mask_of_device(circuit.device_id("L").unwrap()).unwrap();
        let c = table.mask_of_device(circuit.device_id("C").unwrap()).unwrap();
        let r = table.mask_of_device(circuit.device_id("R").unwrap()).unwrap();

        // KCL at `in`: +l·U_in − l·U_K1 + I_Uin.
        assert_eq!(terms(&system, 0, 0), vec![(1, l)]);
        assert_eq!(terms(&system, 0, 1), vec![(-1, l)]);
        assert_eq!(terms(&system, 0, 3), vec![(1, 0)]);

        // KCL at `K1`: −l·U_in + (l+c)·U_K1 − c·U_out.
        assert_eq!(terms(&system, 1, 1), vec![(1, l), (1, c)]);

        // KCL at `out`: −c·U_K1 + (c+r)·U_out.
        assert_eq!(terms(&system, 2, 2), vec![(1, r), (1, c)]);

        // Source row: U_in − Uin = 0 (ground side drops out).
        assert_eq!(terms(&system, 3, 0), vec![(1, 0)]);
        assert_eq!(terms(&system, 3, 4), vec![(-1, 0)]);
    }

    #[test]
    fn test_working_copy_is_independent() {
        let circuit = parse_netlist("U Uin in gnd / R R1 in gnd").unwrap();
        let table = SymbolTable::build(&circuit).unwrap();
        let system = build(&circuit, &table).unwrap();

        let mut copy = system.clone_working();
        copy.matrix
            .get_mut(0, 0)
            .add_term(&mut copy.arena, 5, 99)
            .unwrap();
        assert_ne!(
            terms(&system, 0, 0),
            copy.matrix.get(0, 0).iter(&copy.arena).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_opamp_virtual_short() {
        // Non-inverting voltage follower: output fed back to the inverting
        // input.
        let circuit =
            parse_netlist("U Uin in gnd / OP A1 in out out / R RL out gnd").unwrap();
        let table = SymbolTable::build(&circuit).unwrap();
        let system = build(&circuit, &table).unwrap();

        let a1 = circuit.device_id("A1").unwrap();
        let row = table.unknown(table.unknown_of_device(a1).unwrap()).row;
        let in_col = table
            .unknown(table.unknown_of_node(circuit.node_id("in").unwrap()).unwrap())
            .col;
        let out_col = table
            .unknown(table.unknown_of_node(circuit.node_id("out").unwrap()).unwrap())
            .col;
        assert_eq!(terms(&system, row, in_col), vec![(1, 0)]);
        assert_eq!(terms(&system, row, out_col), vec![(-1, 0)]);
    }
}
