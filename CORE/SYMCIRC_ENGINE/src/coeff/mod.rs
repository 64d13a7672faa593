//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: mod.rs | CORE/SYMCIRC_ENGINE/src/coeff/mod.rs
//! PURPOSE: Coefficient algebra over product-of-constants addends
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ DATA DEFINED                                                                │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ Addend        ±integer factor × product-of-constants bit word               │
//! │ AddendArena   shared slot pool, one per linear system                       │
//! │ Coeff         arena-linked addend sequence, strictly descending products    │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ INVARIANTS                                                                  │
//! │ - products strictly descending along the sequence                           │
//! │ - no two addends share a product word                                       │
//! │ - no zero factors (zero-sum merges are spliced out)                         │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! Insertion is an ordered merge, so building a coefficient term by term is
//! itself the insertion sort the representation relies on. Factors start at
//! ±1 when the matrix is assembled and widen to machine integers during
//! elimination; factor overflow invalidates the current result.

// ─────────────────────────────────────────────────────────────────────────────────
// CODE BELOW
// ─────────────────────────────────────────────────────────────────────────────────

mod arena;

pub use arena::{Addend, AddendArena};

use crate::error::AnalysisError;

/// A symbolic polynomial in device indicators: an ordered sum of addends
/// living in an [`AddendArena`].
#[derive(Debug, Default)]
pub struct Coeff {
    head: Option<u32>,
    terms: u32,
}

impl Coeff {
    pub fn empty() -> Coeff {
        Coeff {
            head: None,
            terms: 0,
        }
    }

    /// Single-addend coefficient.
    pub fn unit(arena: &mut AddendArena, factor: i64, product: u64) -> Coeff {
        debug_assert!(factor != 0, "unit coefficient needs a non-zero factor");
        let head = arena.alloc(factor, product, None);
        Coeff {
            head: Some(head),
            terms: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn terms(&self) -> usize {
        self.terms as usize
    }

    /// Highest-product addend, if any.
    pub fn leading(&self, arena: &AddendArena) -> Option<(i64, u64)> {
        self.head.map(|i| {
            let a = arena.get(i);
            (a.factor, a.product)
        })
    }

    /// Ordered merge of one addend: walk to the insertion point, add factors
    /// on an equal product, splice out a zero sum.
    pub fn add_term(
        &mut self,
        arena: &mut AddendArena,
        factor: i64,
        product: u64,
    ) -> Result<(), AnalysisError> {
        if factor == 0 {
            return Ok(());
        }
        let mut prev: Option<u32> = None;
        let mut cur = self.head;
        while let Some(i) = cur {
            let a = arena.get(i);
            if a.product > product {
                prev = Some(i);
                cur = a.next;
            } else {
                break;
            }
        }

        if let Some(i) = cur {
            let found = arena.get(i);
            if found.product == product {
                let next = found.next;
                let sum = found
                    .factor
                    .checked_add(factor)
                    .ok_or(AnalysisError::Overflow)?;
                if sum == 0 {
                    match prev {
                        Some(p) => arena.get_mut(p).next = next,
                        None => self.head = next,
                    }
                    arena.release(i);
                    self.terms -= 1;
                } else {
                    arena.get_mut(i).factor = sum;
                }
                return Ok(());
            }
        }

        let idx = arena.alloc(factor, product, cur);
        match prev {
            Some(p) => arena.get_mut(p).next = Some(idx),
            None => self.head = Some(idx),
        }
        self.terms += 1;
        Ok(())
    }

    /// In-place difference `self -= other`, addend by addend.
    pub fn sub_assign(
        &mut self,
        arena: &mut AddendArena,
        other: &Coeff,
    ) -> Result<(), AnalysisError> {
        let terms: Vec<(i64, u64)> = other.iter(arena).collect();
        for (factor, product) in terms {
            let neg = factor.checked_neg().ok_or(AnalysisError::Overflow)?;
            self.add_term(arena, neg, product)?;
        }
        Ok(())
    }

    /// In-place integer scaling. Scaling by zero empties the coefficient.
    pub fn scale(&mut self, arena: &mut AddendArena, k: i64) -> Result<(), AnalysisError> {
        if k == 1 {
            return Ok(());
        }
        if k == 0 {
            self.clear(arena);
            return Ok(());
        }
        let mut cur = self.head;
        while let Some(i) = cur {
            let a = arena.get_mut(i);
            a.factor = a.factor.checked_mul(k).ok_or(AnalysisError::Overflow)?;
            cur = a.next;
        }
        Ok(())
    }

    pub fn negate(&mut self, arena: &mut AddendArena) -> Result<(), AnalysisError> {
        self.scale(arena, -1)
    }

    /// Structural copy into the same arena (fresh slots, same order).
    pub fn deep_copy(&self, arena: &mut AddendArena) -> Coeff {
        let terms: Vec<(i64, u64)> = self.iter(arena).collect();
        Coeff::from_sorted_desc(arena, &terms)
    }

    /// Copy into a different arena (working copies of a whole matrix).
    pub fn copy_into(&self, src: &AddendArena, dst: &mut AddendArena) -> Coeff {
        let terms: Vec<(i64, u64)> = self.iter(src).collect();
        Coeff::from_sorted_desc(dst, &terms)
    }

    /// Build from addends already in strictly descending product order.
    pub(crate) fn from_sorted_desc(arena: &mut AddendArena, terms: &[(i64, u64)]) -> Coeff {
        debug_assert!(
            terms.windows(2).all(|w| w[0].1 > w[1].1),
            "terms must strictly descend"
        );
        let mut head = None;
        for &(factor, product) in terms.iter().rev() {
            debug_assert!(factor != 0);
            head = Some(arena.alloc(factor, product, head));
        }
        Coeff {
            head,
            terms: terms.len() as u32,
        }
    }

    /// Release every addend back to the arena.
    pub fn clear(&mut self, arena: &mut AddendArena) {
        let mut cur = self.head;
        while let Some(i) = cur {
            cur = arena.get(i).next;
            arena.release(i);
        }
        self.head = None;
        self.terms = 0;
    }

    pub fn iter<'a>(&self, arena: &'a AddendArena) -> Terms<'a> {
        Terms {
            arena,
            cur: self.head,
        }
    }

    #[cfg(test)]
    fn assert_invariants(&self, arena: &AddendArena) {
        let mut count = 0;
        let mut last: Option<u64> = None;
        for (factor, product) in self.iter(arena) {
            assert!(factor != 0, "zero factor survived a merge");
            if let Some(prev) = last {
                assert!(prev > product, "products must strictly descend");
            }
            last = Some(product);
            count += 1;
        }
        assert_eq!(count, self.terms(), "term count out of sync");
    }
}

/// Iterator over `(factor, product)` pairs in descending product order.
pub struct Terms<'a> {
    arena: &'a AddendArena,
    cur: Option<u32>,
}

impl Iterator for Terms<'_> {
    type Item = (i64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.cur?;
        let a = self.arena.get(i);
        self.cur = a.next;
        Some((a.factor, a.product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(c: &Coeff, arena: &AddendArena) -> Vec<(i64, u64)> {
        c.iter(arena).collect()
    }

    #[test]
    fn test_ordered_insertion() {
        let mut arena = AddendArena::new();
        let mut c = Coeff::empty();
        c.add_term(&mut arena, 1, 0b001).unwrap();
        c.add_term(&mut arena, -1, 0b100).unwrap();
        c.add_term(&mut arena, 1, 0b010).unwrap();
        assert_eq!(
            collect(&c, &arena),
            vec![(-1, 0b100), (1, 0b010), (1, 0b001)]
        );
        c.assert_invariants(&arena);
    }

    #[test]
    fn test_merge_and_zero_elision() {
        let mut arena = AddendArena::new();
        let mut c = Coeff::empty();
        c.add_term(&mut arena, 1, 0b10).unwrap();
        c.add_term(&mut arena, 2, 0b10).unwrap();
        assert_eq!(collect(&c, &arena), vec![(3, 0b10)]);

        c.add_term(&mut arena, -3, 0b10).unwrap();
        assert!(c.is_empty(), "zero-sum addend must be spliced out");
        assert_eq!(arena.live(), 0);
    }

    #[test]
    fn test_difference() {
        let mut arena = AddendArena::new();
        let mut a = Coeff::empty();
        a.add_term(&mut arena, 1, 0b100).unwrap();
        a.add_term(&mut arena, 1, 0b001).unwrap();
        let mut b = Coeff::empty();
        b.add_term(&mut arena, 1, 0b100).unwrap();
        b.add_term(&mut arena, -2, 0b010).unwrap();

        a.sub_assign(&mut arena, &b).unwrap();
        assert_eq!(collect(&a, &arena), vec![(2, 0b010), (1, 0b001)]);
        a.assert_invariants(&arena);
    }

    #[test]
    fn test_scale_and_overflow() {
        let mut arena = AddendArena::new();
        let mut c = Coeff::unit(&mut arena, 3, 0b1);
        c.scale(&mut arena, -2).unwrap();
        assert_eq!(collect(&c, &arena), vec![(-6, 0b1)]);

        let mut big = Coeff::unit(&mut arena, i64::MAX, 0b1);
        assert_eq!(
            big.scale(&mut arena, 2),
            Err(AnalysisError::Overflow),
            "factor growth past i64 must be reported"
        );
    }

    #[test]
    fn test_deep_copy_is_disjoint() {
        let mut arena = AddendArena::new();
        let mut a = Coeff::empty();
        a.add_term(&mut arena, 1, 0b10).unwrap();
        a.add_term(&mut arena, -1, 0b01).unwrap();

        let mut b = a.deep_copy(&mut arena);
        b.scale(&mut arena, 5).unwrap();
        assert_eq!(collect(&a, &arena), vec![(1, 0b10), (-1, 0b01)]);
        assert_eq!(collect(&b, &arena), vec![(5, 0b10), (-5, 0b01)]);

        b.clear(&mut arena);
        assert_eq!(arena.live(), 2);
    }
}
