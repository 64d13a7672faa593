//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: solver.rs | CORE/SYMCIRC_ENGINE/src/solver.rs
//! PURPOSE: Fraction-free elimination of the symbolic equation system
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ ALGORITHM: single-step fraction-free (Montante/Bareiss) elimination         │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ For each column c:                                                          │
//! │   pick a pivot row r ≥ c with a non-null entry; tie-break by fewest        │
//! │   addends, then smallest leading product word, then lowest row              │
//! │   for every later row:  a' = (p·a − e·p_row) / p_prev   (exact)            │
//! │                                                                             │
//! │ Every stored entry stays a minor of the original matrix, so the final      │
//! │ pivot IS the system determinant and the known-column entries of the         │
//! │ target row are the numerators (negated: rows are written A·x + B·u = 0).   │
//! │                                                                             │
//! │ The update's intermediate products square device constants, which the       │
//! │ one-bit product word cannot hold, so the update runs in a scratch ring      │
//! │ with two bits per constant exponent and only the (multilinear) quotient     │
//! │ is stored back.                                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! Row and column swaps flip the determinant's sign; the solver folds that
//! parity back into the determinant and the numerators so every target of
//! the same circuit reports one and the same determinant.

// ─────────────────────────────────────────────────────────────────────────────────
// CODE BELOW
// ─────────────────────────────────────────────────────────────────────────────────

use crate::coeff::{AddendArena, Coeff};
use crate::error::AnalysisError;
use crate::les::LinearSystem;
use std::collections::BTreeMap;

/// One solve, pinned on a target unknown: the shared determinant plus one
/// numerator per known column.
pub struct AlgebraicSolution {
    pub arena: AddendArena,
    pub det: Coeff,
    pub numerators: Vec<Coeff>,
}

/// Plain term list, the working currency of the update step.
type TermVec = Vec<(i64, u64)>;

/// Scratch-ring polynomial: monomial key with two bits per constant.
type Scratch = BTreeMap<u128, i64>;

/// Spread a one-bit-per-constant word into two-bit exponent lanes.
fn spread(mask: u64) -> u128 {
    let mut key = 0u128;
    let mut m = mask;
    while m != 0 {
        let bit = m.trailing_zeros();
        key |= 1u128 << (2 * bit);
        m &= m - 1;
    }
    key
}

/// Inverse of `spread` for multilinear keys.
fn compress(key: u128) -> u64 {
    let mut mask = 0u64;
    for bit in 0..64 {
        let lane = (key >> (2 * bit)) & 0b11;
        debug_assert!(lane <= 1, "stored coefficient must be multilinear");
        if lane != 0 {
            mask |= 1 << bit;
        }
    }
    mask
}

fn merge(acc: &mut Scratch, key: u128, factor: i64) -> Result<(), AnalysisError> {
    match acc.entry(key) {
        std::collections::btree_map::Entry::Vacant(slot) => {
            if factor != 0 {
                slot.insert(factor);
            }
        }
        std::collections::btree_map::Entry::Occupied(mut slot) => {
            let sum = slot
                .get()
                .checked_add(factor)
                .ok_or(AnalysisError::Overflow)?;
            if sum == 0 {
                slot.remove();
            } else {
                *slot.get_mut() = sum;
            }
        }
    }
    Ok(())
}

/// acc ± a·b. Exponent lanes add without carry: factors are multilinear,
/// so no lane exceeds two.
fn mul_into(acc: &mut Scratch, a: &TermVec, b: &TermVec, negate: bool) -> Result<(), AnalysisError> {
    for &(fa, pa) in a {
        let ka = spread(pa);
        for &(fb, pb) in b {
            let mut f = fa.checked_mul(fb).ok_or(AnalysisError::Overflow)?;
            if negate {
                f = f.checked_neg().ok_or(AnalysisError::Overflow)?;
            }
            merge(acc, ka + spread(pb), f)?;
        }
    }
    Ok(())
}

/// Exact long division by a multilinear divisor. Divisibility is
/// guaranteed by the fraction-free identity; a miss is a programming
/// error, reported as overflow in release builds rather than corrupting
/// the result.
fn div_exact(mut dividend: Scratch, divisor: &TermVec) -> Result<Scratch, AnalysisError> {
    debug_assert!(!divisor.is_empty(), "division by the null coefficient");
    let (dlead_f, dlead_p) = (divisor[0].0, divisor[0].1);
    let dlead_key = spread(dlead_p);

    let mut quotient: Scratch = BTreeMap::new();
    while let Some((&lead_key, &lead_f)) = dividend.last_key_value() {
        // Lane-wise divisibility: every lane the divisor lead uses must be
        // non-zero in the dividend lead.
        let nonzero_lanes = (lead_key | (lead_key >> 1)) & spread(u64::MAX);
        debug_assert!(
            nonzero_lanes & dlead_key == dlead_key,
            "fraction-free update must divide exactly"
        );
        let divisible = nonzero_lanes & dlead_key == dlead_key
            && lead_f.checked_rem(dlead_f) == Some(0);
        if !divisible {
            return Err(AnalysisError::Overflow);
        }

        let q_key = lead_key - dlead_key;
        let q_f = lead_f.checked_div(dlead_f).ok_or(AnalysisError::Overflow)?;
        merge(&mut quotient, q_key, q_f)?;
        for &(df, dp) in divisor {
            let f = q_f
                .checked_mul(df)
                .and_then(i64::checked_neg)
                .ok_or(AnalysisError::Overflow)?;
            merge(&mut dividend, q_key + spread(dp), f)?;
        }
    }
    Ok(quotient)
}

fn to_coeff(scratch: &Scratch, arena: &mut AddendArena) -> Coeff {
    let terms: TermVec = scratch
        .iter()
        .rev()
        .map(|(&key, &factor)| (factor, compress(key)))
        .collect();
    Coeff::from_sorted_desc(arena, &terms)
}

fn collect(coeff: &Coeff, arena: &AddendArena) -> TermVec {
    coeff.iter(arena).collect()
}

/// Pivot choice for a column: non-null entry at row ≥ c with the fewest
/// addends, then the smallest leading product word, then the lowest row.
fn choose_pivot(sys: &LinearSystem, col: usize) -> Option<usize> {
    let mut best: Option<(usize, u64, usize)> = None;
    for row in col..sys.m {
        let entry = sys.matrix.get(row, col);
        if entry.is_empty() {
            continue;
        }
        let leading = entry
            .leading(&sys.arena)
            .map(|(_, product)| product)
            .unwrap_or(0);
        let candidate = (entry.terms(), leading, row);
        if best.map_or(true, |b| candidate < b) {
            best = Some(candidate);
        }
    }
    best.map(|(_, _, row)| row)
}

/// Eliminate with the chosen unknown pinned in the last column. `None`
/// means the system is singular for that unknown.
pub fn solve(
    base: &LinearSystem,
    target_col: usize,
) -> Result<Option<AlgebraicSolution>, AnalysisError> {
    let mut sys = base.clone_working();
    let m = sys.m;
    let width = sys.width();
    if m == 0 {
        return Ok(None);
    }

    let mut sign = 1i64;
    if target_col != m - 1 {
        sys.matrix.swap_cols(target_col, m - 1);
        sign = -sign;
    }

    let mut p_prev: Option<TermVec> = None;
    for c in 0..m {
        let pivot_row = match choose_pivot(&sys, c) {
            Some(row) => row,
            None => return Ok(None),
        };
        if pivot_row != c {
            sys.matrix.swap_rows(pivot_row, c);
            sign = -sign;
        }
        if c == m - 1 {
            break;
        }

        let pivot = collect(sys.matrix.get(c, c), &sys.arena);
        let pivot_row_terms: Vec<TermVec> = (c + 1..width)
            .map(|j| collect(sys.matrix.get(c, j), &sys.arena))
            .collect();

        for row in c + 1..m {
            let multiplier = collect(sys.matrix.get(row, c), &sys.arena);
            for j in c + 1..width {
                let mut acc: Scratch = BTreeMap::new();
                let current = collect(sys.matrix.get(row, j), &sys.arena);
                mul_into(&mut acc, &pivot, &current, false)?;
                if !multiplier.is_empty() {
                    mul_into(&mut acc, &multiplier, &pivot_row_terms[j - c - 1], true)?;
                }
                let reduced = match &p_prev {
                    Some(prev) => div_exact(acc, prev)?,
                    None => acc,
                };
                let fresh = to_coeff(&reduced, &mut sys.arena);
                let mut old = sys.matrix.set(row, j, fresh);
                old.clear(&mut sys.arena);
            }
            // Column c is eliminated by construction.
            let mut old = sys.matrix.set(row, c, Coeff::empty());
            old.clear(&mut sys.arena);
        }

        p_prev = Some(pivot);
    }

    let det_terms = collect(sys.matrix.get(m - 1, m - 1), &sys.arena);
    if det_terms.is_empty() {
        return Ok(None);
    }

    // Fold swap parity back in: the reported determinant is det(A), the
    // numerators are −sign·B-entries of the target row.
    let mut arena = AddendArena::new();
    let apply = |terms: &TermVec, flip: bool, arena: &mut AddendArena| -> Result<Coeff, AnalysisError> {
        let mut out = Vec::with_capacity(terms.len());
        for &(factor, product) in terms {
            let f = if flip {
                factor.checked_neg().ok_or(AnalysisError::Overflow)?
            } else {
                factor
            };
            out.push((f, product));
        }
        Ok(Coeff::from_sorted_desc(arena, &out))
    };

    let det = apply(&det_terms, sign < 0, &mut arena)?;
    let mut numerators = Vec::with_capacity(sys.n_knowns);
    for k in 0..sys.n_knowns {
        let terms = collect(sys.matrix.get(m - 1, m + k), &sys.arena);
        numerators.push(apply(&terms, sign > 0, &mut arena)?);
    }

    Ok(Some(AlgebraicSolution {
        arena,
        det,
        numerators,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::parse::parse_netlist;
    use crate::les;
    use crate::symtab::{SymbolId, SymbolTable};

    fn solve_node(netlist: &str, node_unknown: &str) -> (Vec<(i64, u64)>, Vec<Vec<(i64, u64)>>) {
        let circuit = parse_netlist(netlist).unwrap();
        let table = SymbolTable::build(&circuit).unwrap();
        let system = les::build(&circuit, &table).unwrap();
        let target = match table.lookup(node_unknown) {
            Some(SymbolId::Unknown(u)) => table.unknown(u).col,
            other => panic!("expected unknown, got {:?}", other),
        };
        let solution = solve(&system, target).unwrap().expect("solvable");
        let det = solution.det.iter(&solution.arena).collect();
        let nums = solution
            .numerators
            .iter()
            .map(|n| n.iter(&solution.arena).collect())
            .collect();
        (det, nums)
    }

    #[test]
    fn test_resistive_divider() {
        // Uin across R1 + R2; U_mid = R2/(R1+R2)·Uin in conductance form:
        // det carries g1+g2, numerator carries g1.
        let (det, nums) = solve_node("U Uin in gnd / R R1 in mid / R R2 mid gnd", "U_mid");
        // Masks: R1 = bit1, R2 = bit0.
        assert_eq!(det, vec![(-1, 0b10), (-1, 0b01)]);
        assert_eq!(nums, vec![vec![(-1, 0b10)]]);
    }

    #[test]
    fn test_rlc_lowpass_algebraic() {
        let (det, nums) = solve_node(
            "U Uin in gnd / L L in K1 / C C K1 out / R R out gnd",
            "U_out",
        );
        // Masks: r = 0b100, l = 0b010, c = 0b001. Collapsing c² during
        // elimination leaves lc + lr + cr.
        let lc = 0b011;
        let lr = 0b110;
        let cr = 0b101;
        let mut det_sorted = det.clone();
        det_sorted.sort_by(|a, b| b.1.cmp(&a.1));
        assert_eq!(det, det_sorted, "determinant stays ordered");
        assert_eq!(
            det.iter().map(|&(f, p)| (f, p)).collect::<Vec<_>>(),
            vec![(-1, lr), (-1, cr), (-1, lc)]
        );
        assert_eq!(nums, vec![vec![(-1, lc)]]);
    }

    #[test]
    fn test_determinant_shared_across_targets() {
        let netlist = "U Uin in gnd / L L in K1 / C C K1 out / R R out gnd";
        let circuit = parse_netlist(netlist).unwrap();
        let table = SymbolTable::build(&circuit).unwrap();
        let system = les::build(&circuit, &table).unwrap();

        let mut dets = Vec::new();
        for name in ["U_in", "U_K1", "U_out"] {
            let col = match table.lookup(name) {
                Some(SymbolId::Unknown(u)) => table.unknown(u).col,
                _ => unreachable!(),
            };
            let solution = solve(&system, col).unwrap().expect("solvable");
            dets.push(
                solution
                    .det
                    .iter(&solution.arena)
                    .collect::<Vec<(i64, u64)>>(),
            );
        }
        assert_eq!(dets[0], dets[1], "determinant independent of target");
        assert_eq!(dets[1], dets[2], "determinant independent of target");
    }

    #[test]
    fn test_singular_system_unavailable() {
        // Two ideal voltage sources in parallel: structurally singular.
        let circuit = parse_netlist("U U1 a gnd / U U2 a gnd / R R1 a gnd").unwrap();
        let table = SymbolTable::build(&circuit).unwrap();
        let system = les::build(&circuit, &table).unwrap();
        let col = match table.lookup("U_a") {
            Some(SymbolId::Unknown(u)) => table.unknown(u).col,
            _ => unreachable!(),
        };
        assert!(solve(&system, col).unwrap().is_none());
    }

    #[test]
    fn test_scratch_division_roundtrip() {
        // (x + y)·(xz + w) / (x + y) = xz + w, with the x²z collapse
        // exercised on the way.
        let x = (1i64, 0b1000u64);
        let y = (1i64, 0b0100u64);
        let xz = (1i64, 0b1010u64);
        let w = (1i64, 0b0001u64);
        let a = vec![x, y];
        let b = vec![xz, w];
        let mut acc: Scratch = BTreeMap::new();
        mul_into(&mut acc, &a, &b, false).unwrap();
        let q = div_exact(acc, &a).unwrap();
        let mut arena = AddendArena::new();
        let c = to_coeff(&q, &mut arena);
        let terms: Vec<(i64, u64)> = c.iter(&arena).collect();
        assert_eq!(terms, vec![(1, 0b1010), (1, 0b0001)]);
    }
}
