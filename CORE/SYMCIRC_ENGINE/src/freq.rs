//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: freq.rs | CORE/SYMCIRC_ENGINE/src/freq.rs
//! PURPOSE: Laplace-domain transform and normalization of algebraic solutions
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ ADMITTANCE SUBSTITUTION (per set bit, after relation chains resolve)        │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ resistor    Y = 1/(k·R)    factor /= k, power(R) -= 1                       │
//! │ conductance Y = k·G        factor *= k, power(G) += 1                       │
//! │ capacitor   Y = s·k·C      factor *= k, power(C) += 1, s += 1               │
//! │ inductor    Y = 1/(s·k·L)  factor /= k, power(L) -= 1, s -= 1               │
//! │ gains       k·K            factor *= k, power(K) += 1                       │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! Addends are kept in descending (power of s, constant powers
//! highest-index-first) order with the same ordered-merge discipline as the
//! coefficient algebra. Normalization factors out the minimum exponents and
//! the gcd/lcm of the numeric factors, leaving integer factors with a
//! positive leading term.

// ─────────────────────────────────────────────────────────────────────────────────
// CODE BELOW
// ─────────────────────────────────────────────────────────────────────────────────

use crate::circuit::{Circuit, DeviceKind};
use crate::error::AnalysisError;
use crate::rational::{self, Rat};
use crate::symtab::SymbolTable;
use std::cmp::Ordering;

/// One frequency-domain summand: rational factor, power of s, and a signed
/// power per device constant.
#[derive(Clone, Debug, PartialEq)]
pub struct FreqAddend {
    pub factor: Rat,
    pub s_pow: i32,
    pub powers: Vec<i16>,
}

impl FreqAddend {
    pub fn unit(n_constants: usize) -> FreqAddend {
        FreqAddend {
            factor: Rat::ONE,
            s_pow: 0,
            powers: vec![0; n_constants],
        }
    }

    pub fn same_key(&self, other: &FreqAddend) -> bool {
        key_cmp(self, other) == Ordering::Equal
    }

    /// Product of two addends: factors multiply, exponents add.
    pub fn mul(&self, other: &FreqAddend) -> Result<FreqAddend, AnalysisError> {
        debug_assert_eq!(self.powers.len(), other.powers.len());
        let factor = self.factor.mul(other.factor).strict()?;
        let powers = self
            .powers
            .iter()
            .zip(&other.powers)
            .map(|(a, b)| a + b)
            .collect();
        Ok(FreqAddend {
            factor,
            s_pow: self.s_pow + other.s_pow,
            powers,
        })
    }
}

/// Descending order key: power of s first, then constant powers from the
/// highest bit index down.
pub fn key_cmp(a: &FreqAddend, b: &FreqAddend) -> Ordering {
    a.s_pow.cmp(&b.s_pow).then_with(|| {
        for i in (0..a.powers.len()).rev() {
            match a.powers[i].cmp(&b.powers[i]) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    })
}

/// Ordered, merged sum of frequency-domain addends.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FreqExpr {
    terms: Vec<FreqAddend>,
}

impl FreqExpr {
    pub fn zero() -> FreqExpr {
        FreqExpr { terms: Vec::new() }
    }

    /// The literal `1`.
    pub fn one(n_constants: usize) -> FreqExpr {
        FreqExpr {
            terms: vec![FreqAddend::unit(n_constants)],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Wrap a term list that is already ordered and merged.
    pub(crate) fn from_sorted(terms: Vec<FreqAddend>) -> FreqExpr {
        debug_assert!(
            terms
                .windows(2)
                .all(|w| key_cmp(&w[0], &w[1]) == Ordering::Greater),
            "terms must strictly descend"
        );
        FreqExpr { terms }
    }

    pub fn terms(&self) -> &[FreqAddend] {
        &self.terms
    }

    /// Ordered merge; a zero-sum merge drops the addend.
    pub fn add_addend(&mut self, addend: FreqAddend) -> Result<(), AnalysisError> {
        if addend.factor.is_zero() {
            return Ok(());
        }
        match self
            .terms
            .binary_search_by(|t| key_cmp(t, &addend).reverse())
        {
            Ok(i) => {
                let sum = self.terms[i].factor.add(addend.factor).strict()?;
                if sum.is_zero() {
                    self.terms.remove(i);
                } else {
                    self.terms[i].factor = sum;
                }
            }
            Err(i) => self.terms.insert(i, addend),
        }
        Ok(())
    }

    pub fn negate(&mut self) {
        for t in &mut self.terms {
            t.factor = t.factor.neg();
        }
    }

    /// Multiply every addend by one addend. Keys shift uniformly, so the
    /// order is preserved.
    pub fn scaled_by(&self, by: &FreqAddend) -> Result<FreqExpr, AnalysisError> {
        let mut terms = Vec::with_capacity(self.terms.len());
        for t in &self.terms {
            terms.push(t.mul(by)?);
        }
        Ok(FreqExpr { terms })
    }

    /// Equal up to one global sign flip.
    pub fn abs_eq(&self, other: &FreqExpr) -> bool {
        self.terms.len() == other.terms.len()
            && self
                .terms
                .iter()
                .zip(&other.terms)
                .all(|(a, b)| a.same_key(b) && a.factor == b.factor.neg())
    }
}

/// Normalized expression: a single-addend factor times a list whose
/// exponents are all ≥ 0 (with a zero exponent somewhere per symbol) and
/// whose numeric factors are integers with a positive leading term.
#[derive(Clone, Debug, PartialEq)]
pub struct NormExpr {
    pub factor: FreqAddend,
    pub terms: Vec<FreqAddend>,
}

/// Convert one algebraic coefficient into a frequency-domain expression.
pub fn transform(
    terms: impl Iterator<Item = (i64, u64)>,
    circuit: &Circuit,
    table: &SymbolTable,
) -> Result<FreqExpr, AnalysisError> {
    let n = table.n_constants();
    let mut expr = FreqExpr::zero();
    for (factor, product) in terms {
        let mut addend = FreqAddend {
            factor: Rat::integer(factor),
            s_pow: 0,
            powers: vec![0; n],
        };
        let mut mask = product;
        while mask != 0 {
            let bit = mask.trailing_zeros() as usize;
            mask &= mask - 1;
            let device = table.device_of_bit(bit);
            let (root, k) = table.relation_root(circuit, device)?;
            let root_bit = table
                .bit_of_device(root)
                .expect("relation roots carry a constant bit");
            match circuit.device(root).kind {
                DeviceKind::Resistor => {
                    addend.factor = divide(addend.factor, k)?;
                    addend.powers[root_bit] -= 1;
                }
                DeviceKind::Conductance
                | DeviceKind::Vcvs
                | DeviceKind::Vccs
                | DeviceKind::Ccvs
                | DeviceKind::Cccs => {
                    addend.factor = addend.factor.mul(k).strict()?;
                    addend.powers[root_bit] += 1;
                }
                DeviceKind::Capacitor => {
                    addend.factor = addend.factor.mul(k).strict()?;
                    addend.powers[root_bit] += 1;
                    addend.s_pow += 1;
                }
                DeviceKind::Inductor => {
                    addend.factor = divide(addend.factor, k)?;
                    addend.powers[root_bit] -= 1;
                    addend.s_pow -= 1;
                }
                kind => unreachable!("{:?} cannot appear in a product of constants", kind),
            }
        }
        expr.add_addend(addend)?;
    }
    Ok(expr)
}

fn divide(value: Rat, by: Rat) -> Result<Rat, AnalysisError> {
    debug_assert!(!by.is_zero(), "relation factors are validated non-zero");
    value.div(by).ok_or(AnalysisError::Overflow)?.strict()
}

/// Factor out minimum exponents and the gcd/lcm of the numeric factors.
/// `None` for the null expression.
pub fn normalize(expr: &FreqExpr) -> Result<Option<NormExpr>, AnalysisError> {
    let terms = expr.terms();
    let first = match terms.first() {
        Some(t) => t,
        None => return Ok(None),
    };
    let n = first.powers.len();

    let mut min_s = first.s_pow;
    let mut min_p = first.powers.clone();
    let mut num_gcd: i64 = 0;
    let mut den_lcm: i64 = 1;
    for t in terms {
        min_s = min_s.min(t.s_pow);
        for (m, p) in min_p.iter_mut().zip(&t.powers) {
            *m = (*m).min(*p);
        }
        num_gcd = rational::gcd(num_gcd, t.factor.num());
        den_lcm = rational::lcm(den_lcm, t.factor.den()).ok_or(AnalysisError::Overflow)?;
    }

    // The leading term keeps its sign through the division; fold it into
    // the factor so the divided list leads positive.
    let signed = if first.factor.sign() < 0 {
        -num_gcd
    } else {
        num_gcd
    };
    let factor_rat = Rat::new(signed, den_lcm).expect("lcm of denominators is positive");

    let mut divided = Vec::with_capacity(terms.len());
    for t in terms {
        let factor = t
            .factor
            .div(factor_rat)
            .expect("normalization factor is non-zero")
            .strict()?;
        debug_assert!(factor.is_integer(), "normalized factors are integers");
        let powers = t.powers.iter().zip(&min_p).map(|(p, m)| p - m).collect();
        divided.push(FreqAddend {
            factor,
            s_pow: t.s_pow - min_s,
            powers,
        });
    }
    debug_assert!(divided[0].factor.sign() > 0, "leading term is positive");

    Ok(Some(NormExpr {
        factor: FreqAddend {
            factor: factor_rat,
            s_pow: min_s,
            powers: min_p,
        },
        terms: divided,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::parse::parse_netlist;
    use crate::symtab::SymbolTable;

    fn rlc() -> (Circuit, SymbolTable) {
        let circuit =
            parse_netlist("U Uin in gnd / L L in K1 / C C K1 out / R R out gnd").unwrap();
        let table = SymbolTable::build(&circuit).unwrap();
        (circuit, table)
    }

    #[test]
    fn test_substitution_rules() {
        let (circuit, table) = rlc();
        // −l·c: 1/(Ls) · Cs = C/L, s cancels.
        let lc = table.mask_of_device(circuit.device_id("L").unwrap()).unwrap()
            | table.mask_of_device(circuit.device_id("C").unwrap()).unwrap();
        let expr = transform([(-1i64, lc)].into_iter(), &circuit, &table).unwrap();
        let t = &expr.terms()[0];
        assert_eq!(t.factor, Rat::integer(-1));
        assert_eq!(t.s_pow, 0);
        let lbit = table
            .bit_of_device(circuit.device_id("L").unwrap())
            .unwrap();
        let cbit = table
            .bit_of_device(circuit.device_id("C").unwrap())
            .unwrap();
        assert_eq!(t.powers[lbit], -1);
        assert_eq!(t.powers[cbit], 1);
    }

    #[test]
    fn test_merge_discipline() {
        let (circuit, table) = rlc();
        let c = table.mask_of_device(circuit.device_id("C").unwrap()).unwrap();
        // c + c merges, c − c vanishes.
        let expr = transform([(1i64, c), (2, c)].into_iter(), &circuit, &table).unwrap();
        assert_eq!(expr.terms().len(), 1);
        assert_eq!(expr.terms()[0].factor, Rat::integer(3));

        let expr = transform([(1i64, c), (-1, c)].into_iter(), &circuit, &table).unwrap();
        assert!(expr.is_zero());
    }

    #[test]
    fn test_relation_chain_substitutes_root() {
        let circuit = parse_netlist(
            "U Uin in gnd / R R1 in out / R R2 out gnd = 2 * R1 / R R3 out gnd = 3/2 * R2",
        )
        .unwrap();
        let table = SymbolTable::build(&circuit).unwrap();
        let r3 = circuit.device_id("R3").unwrap();
        let r1 = circuit.device_id("R1").unwrap();
        let expr = transform(
            [(1i64, table.mask_of_device(r3).unwrap())].into_iter(),
            &circuit,
            &table,
        )
        .unwrap();
        let t = &expr.terms()[0];
        // 1/(3·R1): the R3 bit resolves through the chain.
        assert_eq!(t.factor, Rat::new(1, 3).unwrap());
        assert_eq!(t.powers[table.bit_of_device(r1).unwrap()], -1);
        assert_eq!(t.powers[table.bit_of_device(r3).unwrap()], 0);
    }

    #[test]
    fn test_normalize_invariants() {
        let (circuit, table) = rlc();
        let r = table.mask_of_device(circuit.device_id("R").unwrap()).unwrap();
        let l = table.mask_of_device(circuit.device_id("L").unwrap()).unwrap();
        let c = table.mask_of_device(circuit.device_id("C").unwrap()).unwrap();
        // −(lc + lr + cr): the RLC determinant.
        let expr = transform(
            [(-1i64, l | c), (-1, l | r), (-1, c | r)].into_iter(),
            &circuit,
            &table,
        )
        .unwrap();
        let norm = normalize(&expr).unwrap().unwrap();

        assert!(norm.terms[0].factor.sign() > 0, "leading term positive");
        for t in &norm.terms {
            assert!(t.factor.is_integer());
            assert!(t.s_pow >= 0);
            assert!(t.powers.iter().all(|&p| p >= 0));
        }
        assert!(norm.terms.iter().any(|t| t.s_pow == 0));
        for bit in 0..table.n_constants() {
            assert!(
                norm.terms.iter().any(|t| t.powers[bit] == 0),
                "some addend has exponent zero for bit {}",
                bit
            );
        }
        // L·C·s² + R·C·s + 1 after normalization.
        assert_eq!(norm.terms.len(), 3);
        assert_eq!(norm.terms[0].s_pow, 2);
        assert_eq!(norm.terms[1].s_pow, 1);
        assert_eq!(norm.terms[2].s_pow, 0);
    }

    #[test]
    fn test_abs_eq_detects_sign_flip() {
        let (circuit, table) = rlc();
        let c = table.mask_of_device(circuit.device_id("C").unwrap()).unwrap();
        let a = transform([(2i64, c)].into_iter(), &circuit, &table).unwrap();
        let mut b = a.clone();
        b.negate();
        assert!(a.abs_eq(&b));
        assert!(!a.abs_eq(&a.clone()));
    }
}
