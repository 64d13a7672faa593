//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: analysis.rs | CORE/SYMCIRC_ENGINE/src/analysis.rs
//! PURPOSE: Per-result pipeline orchestration with result-local recovery
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ CONTROL FLOW (one synchronous pass, stages strictly sequential)             │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ circuit ──► symbol table ──► linear system                                  │
//! │                     per request:                                            │
//! │                       solve per dependent ──► transform ──► normalize       │
//! │                       ──► cancel/dedup/order ──► text + script              │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ Failure of one result never touches its siblings. Shared immutable          │
//! │ inputs (circuit, symbol table) are Rc handles; per-solve working copies     │
//! │ own their arenas.                                                           │
//! └─────────────────────────────────────────────────────────────────────────────┘

// ─────────────────────────────────────────────────────────────────────────────────
// CODE BELOW
// ─────────────────────────────────────────────────────────────────────────────────

use crate::circuit::{Circuit, ResultRequest};
use crate::error::{AnalysisError, CircuitError};
use crate::freq::{self, FreqExpr, NormExpr};
use crate::les::{self, LinearSystem};
use crate::render::{self, PairIn, RenderedResult, ResultInput};
use crate::solver::{self, AlgebraicSolution};
use crate::symtab::{SymbolId, SymbolTable};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Failure of one requested result.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultError {
    /// The request itself is malformed (bad reference, wrong shape).
    Input(CircuitError),
    /// The analysis broke down for this result.
    Analysis(AnalysisError),
}

impl fmt::Display for ResultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultError::Input(e) => write!(f, "{}", e),
            ResultError::Analysis(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ResultError {}

impl From<CircuitError> for ResultError {
    fn from(e: CircuitError) -> Self {
        ResultError::Input(e)
    }
}

impl From<AnalysisError> for ResultError {
    fn from(e: AnalysisError) -> Self {
        ResultError::Analysis(e)
    }
}

pub struct ResultOutcome {
    pub name: String,
    pub outcome: Result<RenderedResult, ResultError>,
}

pub struct AnalysisReport {
    pub results: Vec<ResultOutcome>,
}

impl AnalysisReport {
    /// Every requested result rendered.
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_ok())
    }

    /// At least one result rendered (partial success).
    pub fn any_ok(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_ok())
    }
}

/// A dependent or independent that is not a plain known: either an LES
/// unknown or a user-defined voltage (difference of two node unknowns,
/// ground sides dropping out).
enum Target {
    Unknown(usize),
    Voltage {
        plus: Option<usize>,
        minus: Option<usize>,
    },
}

struct Session {
    circuit: Rc<Circuit>,
    table: Rc<SymbolTable>,
    system: LinearSystem,
    /// Solve cache, keyed by target column. `None` caches singularity.
    solves: HashMap<usize, Option<Rc<AlgebraicSolution>>>,
}

impl Session {
    fn solve_col(&mut self, col: usize) -> Result<Option<Rc<AlgebraicSolution>>, AnalysisError> {
        if let Some(cached) = self.solves.get(&col) {
            return Ok(cached.clone());
        }
        let solved = solver::solve(&self.system, col)?.map(Rc::new);
        self.solves.insert(col, solved.clone());
        Ok(solved)
    }

    /// Any successful solve carries the shared determinant.
    fn baseline(&mut self) -> Result<Option<Rc<AlgebraicSolution>>, AnalysisError> {
        if self.system.m == 0 {
            return Ok(None);
        }
        self.solve_col(self.system.m - 1)
    }

    fn det_norm(&mut self) -> Result<Option<NormExpr>, AnalysisError> {
        let baseline = match self.baseline()? {
            Some(sol) => sol,
            None => return Ok(None),
        };
        let expr = freq::transform(
            baseline.det.iter(&baseline.arena),
            &self.circuit,
            &self.table,
        )?;
        freq::normalize(&expr)
    }

    fn resolve_output(&self, name: &str) -> Result<Target, CircuitError> {
        match self.table.lookup(name) {
            Some(SymbolId::Unknown(u)) => Ok(Target::Unknown(u)),
            Some(SymbolId::Known(_)) => Err(CircuitError::DependentIsKnown(name.to_string())),
            None => match self.circuit.voltage_by_name(name) {
                Some(v) => Ok(Target::Voltage {
                    plus: self.table.unknown_of_node(v.plus),
                    minus: self.table.unknown_of_node(v.minus),
                }),
                None => Err(CircuitError::UnknownSymbol(name.to_string())),
            },
        }
    }

    /// Numerator expressions of a target, one per known. `None` when the
    /// system is singular for it.
    fn numerators(&mut self, target: &Target) -> Result<Option<Vec<FreqExpr>>, AnalysisError> {
        let n = self.table.n_knowns();
        match target {
            Target::Unknown(u) => {
                let col = self.table.unknown(*u).col;
                let solved = match self.solve_col(col)? {
                    Some(s) => s,
                    None => return Ok(None),
                };
                let mut out = Vec::with_capacity(n);
                for k in 0..n {
                    out.push(freq::transform(
                        solved.numerators[k].iter(&solved.arena),
                        &self.circuit,
                        &self.table,
                    )?);
                }
                Ok(Some(out))
            }
            Target::Voltage { plus, minus } => {
                if plus.is_none() && minus.is_none() {
                    // Both terminals grounded: identically zero, still
                    // defined as long as the system itself is.
                    return Ok(self
                        .baseline()?
                        .map(|_| (0..n).map(|_| FreqExpr::zero()).collect()));
                }
                let mut out: Vec<FreqExpr> = match plus {
                    Some(u) => match self.numerators(&Target::Unknown(*u))? {
                        Some(v) => v,
                        None => return Ok(None),
                    },
                    None => (0..n).map(|_| FreqExpr::zero()).collect(),
                };
                if let Some(u) = minus {
                    let subtrahend = match self.numerators(&Target::Unknown(*u))? {
                        Some(v) => v,
                        None => return Ok(None),
                    };
                    for (acc, sub) in out.iter_mut().zip(&subtrahend) {
                        for t in sub.terms() {
                            let mut neg = t.clone();
                            neg.factor = neg.factor.neg();
                            acc.add_addend(neg)?;
                        }
                    }
                }
                Ok(Some(out))
            }
        }
    }

    fn process(&mut self, request: &ResultRequest) -> Result<RenderedResult, ResultError> {
        match request {
            ResultRequest::Full {
                name,
                dependents,
                plot,
            } => {
                let mut targets = Vec::with_capacity(dependents.len());
                for dep in dependents {
                    targets.push((dep.clone(), self.resolve_output(dep)?));
                }
                let indep_names: Vec<String> = self
                    .table
                    .knowns()
                    .iter()
                    .map(|k| k.name.clone())
                    .collect();
                let n = indep_names.len();
                let det = self.det_norm()?;

                let mut available = Vec::with_capacity(targets.len());
                let mut pairs = Vec::with_capacity(targets.len());
                for (_, target) in &targets {
                    match self.numerators(target)? {
                        None => {
                            available.push(false);
                            pairs.push((0..n).map(|_| PairIn { num: None, den: None }).collect());
                        }
                        Some(nums) => {
                            available.push(true);
                            let mut row = Vec::with_capacity(n);
                            for num in &nums {
                                row.push(PairIn {
                                    num: freq::normalize(num)?,
                                    den: det.clone(),
                                });
                            }
                            pairs.push(row);
                        }
                    }
                }

                Ok(render::render(ResultInput {
                    name: name.as_str(),
                    dep_names: targets.into_iter().map(|(n, _)| n).collect(),
                    indep_names,
                    available,
                    pairs,
                    plot: *plot,
                    circuit: self.circuit.as_ref(),
                    table: self.table.as_ref(),
                })?)
            }
            ResultRequest::Transfer {
                name,
                dependent,
                independent,
                plot,
            } => {
                let dep_target = self.resolve_output(dependent)?;

                let pair = match self.table.lookup(independent) {
                    Some(SymbolId::Known(k)) => {
                        let det = self.det_norm()?;
                        match self.numerators(&dep_target)? {
                            None => None,
                            Some(nums) => Some(PairIn {
                                num: freq::normalize(&nums[k])?,
                                den: det,
                            }),
                        }
                    }
                    _ => {
                        if self.table.n_knowns() != 1 {
                            return Err(ResultError::Input(CircuitError::TransferShape(
                                format!(
                                    "'{}' over '{}' needs exactly one independent source",
                                    dependent, independent
                                ),
                            )));
                        }
                        let indep_target = match self.resolve_output(independent) {
                            Ok(t) => t,
                            Err(CircuitError::DependentIsKnown(_)) => unreachable!(),
                            Err(e) => return Err(e.into()),
                        };
                        match (
                            self.numerators(&dep_target)?,
                            self.numerators(&indep_target)?,
                        ) {
                            (Some(nums), Some(denoms)) => Some(PairIn {
                                num: freq::normalize(&nums[0])?,
                                den: freq::normalize(&denoms[0])?,
                            }),
                            _ => None,
                        }
                    }
                };

                let (available, pairs) = match pair {
                    Some(p) => (vec![true], vec![vec![p]]),
                    None => (vec![false], vec![vec![PairIn { num: None, den: None }]]),
                };
                Ok(render::render(ResultInput {
                    name: name.as_str(),
                    dep_names: vec![dependent.clone()],
                    indep_names: vec![independent.clone()],
                    available,
                    pairs,
                    plot: *plot,
                    circuit: self.circuit.as_ref(),
                    table: self.table.as_ref(),
                })?)
            }
        }
    }
}

/// Run the full pipeline over every result request in the circuit.
/// Input-level problems with the circuit itself abort the run; anything
/// scoped to one result lands in that result's outcome.
pub fn analyze(circuit: Circuit) -> Result<AnalysisReport, CircuitError> {
    let circuit = Rc::new(circuit);
    let table = Rc::new(SymbolTable::build(&circuit)?);

    let system = match les::build(&circuit, &table) {
        Ok(system) => system,
        Err(e) => {
            // Assembly failure poisons every request equally.
            let results = circuit
                .requests()
                .iter()
                .map(|r| ResultOutcome {
                    name: r.name().to_string(),
                    outcome: Err(ResultError::Analysis(e.clone())),
                })
                .collect();
            return Ok(AnalysisReport { results });
        }
    };

    let mut session = Session {
        circuit: circuit.clone(),
        table,
        system,
        solves: HashMap::new(),
    };

    let results = circuit
        .requests()
        .iter()
        .map(|request| ResultOutcome {
            name: request.name().to_string(),
            outcome: session.process(request),
        })
        .collect();
    Ok(AnalysisReport { results })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::parse::parse_netlist;

    #[test]
    fn test_unknown_dependent_fails_only_its_result() {
        let circuit = parse_netlist(
            "U Uin in gnd / R R1 in gnd\nPLOT A U_nowhere Uin\nPLOT B U_in Uin\n",
        )
        .unwrap();
        let report = analyze(circuit).unwrap();
        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].outcome.is_err());
        assert!(report.results[1].outcome.is_ok());
        assert!(!report.all_ok());
        assert!(report.any_ok());
    }

    #[test]
    fn test_dependent_must_not_be_known() {
        let circuit =
            parse_netlist("U Uin in gnd / R R1 in gnd\nRESULT F Uin\n").unwrap();
        let report = analyze(circuit).unwrap();
        match &report.results[0].outcome {
            Err(ResultError::Input(CircuitError::DependentIsKnown(n))) => assert_eq!(n, "Uin"),
            other => panic!("expected DependentIsKnown, got {:?}", other.as_ref().map(|_| ())),
        }
    }

    #[test]
    fn test_two_unknown_transfer_needs_single_source() {
        let circuit = parse_netlist(
            "U U1 a gnd / U U2 b gnd / R R1 a b / R R2 b gnd\nPLOT G U_a U_b\n",
        )
        .unwrap();
        let report = analyze(circuit).unwrap();
        match &report.results[0].outcome {
            Err(ResultError::Input(CircuitError::TransferShape(_))) => {}
            other => panic!("expected TransferShape, got {:?}", other.as_ref().map(|_| ())),
        }
    }

    #[test]
    fn test_user_voltage_as_dependent() {
        let circuit = parse_netlist(
            "U Uin in gnd / R R1 in mid / R R2 mid gnd\nVOLTAGE Udrop in mid\nPLOT G Udrop Uin\n",
        )
        .unwrap();
        let report = analyze(circuit).unwrap();
        let rendered = report.results[0].outcome.as_ref().unwrap();
        // Udrop = Uin·R1/(R1+R2): numerator carries R2 after cancellation
        // in conductance form.
        assert!(rendered.text.contains("Udrop(s)"));
        assert!(rendered.text.contains("N_Udrop_Uin"));
    }

    #[test]
    fn test_cyclic_relation_scoped_to_result() {
        // The source current is -(r1+r2)·Uin, so its numerator walks both
        // cyclic relations.
        let circuit = parse_netlist(
            "U Uin in gnd / R R1 in gnd = 2 * R2 / R R2 in gnd = 3 * R1\nPLOT G I_Uin Uin\n",
        )
        .unwrap();
        let report = analyze(circuit).unwrap();
        match &report.results[0].outcome {
            Err(ResultError::Analysis(AnalysisError::CyclicRelation(_))) => {}
            other => panic!("expected cyclic relation, got {:?}", other.as_ref().map(|_| ())),
        }
    }
}
