//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: mod.rs | CORE/SYMCIRC_ENGINE/src/render/mod.rs
//! PURPOSE: Cancel, deduplicate, order, and print frequency-domain solutions
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ PIPELINE                                                                    │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ cancel      one cancel-addend per (dep, indep) pair; equal tails → 1;       │
//! │             null denominator → unsigned infinity, printed 1/0               │
//! │ map         linear expression list; absolute equality (global sign flip)   │
//! │             folds into a negation bit on the stored reference              │
//! │ order       fixpoint over dependents so nothing is referenced by name       │
//! │             before its naming assignment (script output constraint)         │
//! │ name        D_<dep>_<indep> before N_<dep>_<indep>; denominators claim      │
//! │             precedence                                                      │
//! │ print       human text (text.rs) and post-processor script (script.rs)      │
//! └─────────────────────────────────────────────────────────────────────────────┘

// ─────────────────────────────────────────────────────────────────────────────────
// CODE BELOW
// ─────────────────────────────────────────────────────────────────────────────────

mod script;
mod text;

use crate::circuit::{Circuit, PlotInfo};
use crate::error::AnalysisError;
use crate::freq::{FreqAddend, FreqExpr, NormExpr};
use crate::grid::Grid;
use crate::rational::{self, Rat};
use crate::symtab::SymbolTable;
use serde::Serialize;

/// Negation tag on an expression-map reference.
pub(crate) const NEG_BIT: u32 = 1 << 31;

/// Raw (numerator, denominator) pair for one (dep, indep) slot, still
/// normalized. `None` stands for the null expression.
pub struct PairIn {
    pub num: Option<NormExpr>,
    pub den: Option<NormExpr>,
}

/// Everything the printers need for one requested result.
pub struct ResultInput<'a> {
    pub name: &'a str,
    pub dep_names: Vec<String>,
    pub indep_names: Vec<String>,
    pub available: Vec<bool>,
    /// Row per dependent, column per independent; rows of unavailable
    /// dependents are skipped.
    pub pairs: Vec<Vec<PairIn>>,
    pub plot: Option<PlotInfo>,
    pub circuit: &'a Circuit,
    pub table: &'a SymbolTable,
}

/// Final per-result output in both syntaxes.
#[derive(Clone, Debug, Serialize)]
pub struct RenderedResult {
    pub name: String,
    pub text: String,
    pub script: String,
}

pub(crate) struct MapEntry {
    pub expr: FreqExpr,
    pub name: Option<String>,
}

/// Linear expression list; equality is term-by-term on the canonical
/// ordered form.
pub(crate) struct ExprMap {
    pub entries: Vec<MapEntry>,
    pub used_as_den: Vec<bool>,
}

impl ExprMap {
    fn new() -> Self {
        ExprMap {
            entries: Vec::new(),
            used_as_den: Vec::new(),
        }
    }

    fn insert(&mut self, expr: FreqExpr, as_den: bool) -> u32 {
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.expr == expr {
                self.used_as_den[i] = self.used_as_den[i] || as_den;
                return i as u32;
            }
            if entry.expr.abs_eq(&expr) {
                self.used_as_den[i] = self.used_as_den[i] || as_den;
                return i as u32 | NEG_BIT;
            }
        }
        self.entries.push(MapEntry { expr, name: None });
        self.used_as_den.push(as_den);
        (self.entries.len() - 1) as u32
    }

    pub(crate) fn index(reference: u32) -> usize {
        (reference & !NEG_BIT) as usize
    }

    pub(crate) fn negated(reference: u32) -> bool {
        reference & NEG_BIT != 0
    }
}

pub(crate) struct CancelledPair {
    pub num: FreqExpr,
    pub den: FreqExpr,
    /// Null denominator: the ratio is an unsigned infinity.
    pub infinite: bool,
}

/// Build the single cancel-addend from the two normalization factors and
/// push both expressions back to denormalized integer-factor form.
pub(crate) fn cancel(
    pair: &PairIn,
    n_constants: usize,
) -> Result<CancelledPair, AnalysisError> {
    let den = match &pair.den {
        Some(d) => d,
        None => {
            return Ok(CancelledPair {
                num: FreqExpr::one(n_constants),
                den: FreqExpr::zero(),
                infinite: true,
            })
        }
    };
    let num = match &pair.num {
        Some(n) => n,
        None => {
            return Ok(CancelledPair {
                num: FreqExpr::zero(),
                den: FreqExpr::one(n_constants),
                infinite: false,
            })
        }
    };

    let l = rational::lcm(den.factor.factor.den(), num.factor.factor.den())
        .ok_or(AnalysisError::Overflow)?;
    let g = rational::gcd(num.factor.factor.num(), den.factor.factor.num());
    debug_assert!(l > 0 && g > 0, "normalized factors are non-null");
    // Sign chosen so the cancelled denominator leads positive.
    let magnitude = Rat::new(l, g).expect("gcd of non-null factors is non-zero");
    let factor = if den.factor.factor.sign() < 0 {
        magnitude.neg()
    } else {
        magnitude
    };

    let powers = num
        .factor
        .powers
        .iter()
        .zip(&den.factor.powers)
        .map(|(a, b)| -(*a).min(*b))
        .collect();
    let cancel_addend = FreqAddend {
        factor,
        s_pow: -num.factor.s_pow.min(den.factor.s_pow),
        powers,
    };

    // Equal tails collapse to the literal 1 before the multiply.
    let (num_tail, den_tail) = if num.terms == den.terms {
        (FreqExpr::one(n_constants), FreqExpr::one(n_constants))
    } else {
        (
            FreqExpr::from_sorted(num.terms.clone()),
            FreqExpr::from_sorted(den.terms.clone()),
        )
    };

    let num_scale = num.factor.mul(&cancel_addend)?;
    let den_scale = den.factor.mul(&cancel_addend)?;
    Ok(CancelledPair {
        num: num_tail.scaled_by(&num_scale)?,
        den: den_tail.scaled_by(&den_scale)?,
        infinite: false,
    })
}

/// The fully planned result: references, order, names.
pub(crate) struct Plan<'a> {
    pub input: &'a ResultInput<'a>,
    pub map: ExprMap,
    /// m×n reference matrices into the map, negation-tagged.
    pub num_refs: Grid<u32>,
    pub den_refs: Grid<u32>,
    pub infinite: Grid<bool>,
    pub order: Vec<usize>,
    /// bit index → printable device name.
    pub const_names: Vec<String>,
    /// bit index → numeric export value.
    pub const_values: Vec<f64>,
}

impl Plan<'_> {
    pub(crate) fn slot_num_name(&self, dep: usize, indep: usize) -> String {
        format!(
            "N_{}_{}",
            self.input.dep_names[dep], self.input.indep_names[indep]
        )
    }

    pub(crate) fn slot_den_name(&self, dep: usize, indep: usize) -> String {
        format!(
            "D_{}_{}",
            self.input.dep_names[dep], self.input.indep_names[indep]
        )
    }

    pub(crate) fn entry_name(&self, reference: u32) -> &str {
        self.map.entries[ExprMap::index(reference)]
            .name
            .as_deref()
            .expect("every referenced entry is named during planning")
    }
}

/// Dependent traversal order: release a dependent once each of its
/// numerator expressions is already named or not referenced by any
/// denominator; leftovers keep their natural order.
fn release_order(
    available: &[bool],
    num_refs: &Grid<u32>,
    den_refs: &Grid<u32>,
    map: &ExprMap,
) -> Vec<usize> {
    let (m, n) = (num_refs.rows(), num_refs.cols());
    let mut named = vec![false; map.entries.len()];
    let mut released = vec![false; m];
    let mut order = Vec::with_capacity(m);

    loop {
        let mut progressed = false;
        for dep in 0..m {
            if released[dep] {
                continue;
            }
            let free = !available[dep]
                || (0..n).all(|indep| {
                    let i = ExprMap::index(*num_refs.get(dep, indep));
                    named[i] || !map.used_as_den[i]
                });
            if free {
                released[dep] = true;
                order.push(dep);
                progressed = true;
                if available[dep] {
                    for indep in 0..n {
                        named[ExprMap::index(*den_refs.get(dep, indep))] = true;
                        named[ExprMap::index(*num_refs.get(dep, indep))] = true;
                    }
                }
            }
        }
        if !progressed {
            break;
        }
    }
    for dep in 0..m {
        if !released[dep] {
            order.push(dep);
        }
    }
    order
}

/// Build the full plan and run both printers.
pub fn render(input: ResultInput<'_>) -> Result<RenderedResult, AnalysisError> {
    let m = input.dep_names.len();
    let n = input.indep_names.len();
    let n_constants = input.table.n_constants();

    let mut cancelled: Vec<Vec<Option<CancelledPair>>> = Vec::with_capacity(m);
    for dep in 0..m {
        let mut row = Vec::with_capacity(n);
        for indep in 0..n {
            if input.available[dep] {
                row.push(Some(cancel(&input.pairs[dep][indep], n_constants)?));
            } else {
                row.push(None);
            }
        }
        cancelled.push(row);
    }

    // Denominators enter the map first: they claim naming precedence.
    let mut map = ExprMap::new();
    let mut num_refs: Grid<u32> = Grid::new(m, n);
    let mut den_refs: Grid<u32> = Grid::new(m, n);
    let mut infinite: Grid<bool> = Grid::new(m, n);
    for dep in 0..m {
        for indep in 0..n {
            if let Some(pair) = &cancelled[dep][indep] {
                den_refs.set(dep, indep, map.insert(pair.den.clone(), true));
                infinite.set(dep, indep, pair.infinite);
            }
        }
    }
    for dep in 0..m {
        for indep in 0..n {
            if let Some(pair) = &cancelled[dep][indep] {
                num_refs.set(dep, indep, map.insert(pair.num.clone(), false));
            }
        }
    }

    let order = release_order(&input.available, &num_refs, &den_refs, &map);

    // Canonical names follow the script traversal: dependents in release
    // order, denominators of a dependent before its numerators. When the
    // first namer holds a negated reference, flip the stored expression so
    // every definition matches the slot it is emitted under.
    fn flip_refs(grid: &mut Grid<u32>, entry: usize) {
        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                if ExprMap::index(*grid.get(row, col)) == entry {
                    *grid.get_mut(row, col) ^= NEG_BIT;
                }
            }
        }
    }
    let claim = |map: &mut ExprMap,
                 num_refs: &mut Grid<u32>,
                 den_refs: &mut Grid<u32>,
                 reference: u32,
                 name: String| {
        let i = ExprMap::index(reference);
        if map.entries[i].name.is_some() {
            return;
        }
        map.entries[i].name = Some(name);
        if ExprMap::negated(reference) {
            map.entries[i].expr.negate();
            flip_refs(num_refs, i);
            flip_refs(den_refs, i);
        }
    };
    for position in 0..order.len() {
        let dep = order[position];
        if !input.available[dep] {
            continue;
        }
        for indep in 0..n {
            let name = format!("D_{}_{}", input.dep_names[dep], input.indep_names[indep]);
            let reference = *den_refs.get(dep, indep);
            claim(&mut map, &mut num_refs, &mut den_refs, reference, name);
        }
        for indep in 0..n {
            let name = format!("N_{}_{}", input.dep_names[dep], input.indep_names[indep]);
            let reference = *num_refs.get(dep, indep);
            claim(&mut map, &mut num_refs, &mut den_refs, reference, name);
        }
    }

    let plan = Plan {
        input: &input,
        map,
        num_refs,
        den_refs,
        infinite,
        order,
        const_names: (0..n_constants)
            .map(|bit| {
                input
                    .circuit
                    .device(input.table.device_of_bit(bit))
                    .name
                    .clone()
            })
            .collect(),
        const_values: (0..n_constants)
            .map(|bit| input.circuit.device(input.table.device_of_bit(bit)).value)
            .collect(),
    };

    Ok(RenderedResult {
        name: input.name.to_string(),
        text: text::print(&plan),
        script: script::print(&plan),
    })
}
