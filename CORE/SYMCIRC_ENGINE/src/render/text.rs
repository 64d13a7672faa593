//! Human-readable printer: one summary line per dependent, then the
//! numerator/denominator definitions, wrapped at a soft 72-column margin
//! with hanging indentation under the right-hand side.

use super::{ExprMap, Plan};
use crate::freq::{FreqAddend, FreqExpr};

const MARGIN: usize = 72;

/// One wrappable chunk: a separator and the addend text. Line breaks only
/// ever happen between pieces, i.e. after a completed addend.
pub(crate) struct Piece {
    sep: &'static str,
    text: String,
}

impl Piece {
    pub(crate) fn new(sep: &'static str, text: String) -> Piece {
        Piece { sep, text }
    }
}

/// Unsigned factor-and-constants part of one addend.
pub(crate) fn magnitude(addend: &FreqAddend, names: &[String]) -> String {
    debug_assert!(
        addend.factor.is_integer(),
        "printed factors are integers after cancellation"
    );
    let f = addend.factor.num().abs();
    let mut parts = Vec::new();
    let has_symbols = addend.powers.iter().any(|&p| p != 0);
    if f != 1 || !has_symbols {
        parts.push(f.to_string());
    }
    for bit in (0..addend.powers.len()).rev() {
        let p = addend.powers[bit];
        debug_assert!(p >= 0, "printed exponents are non-negative");
        if p == 1 {
            parts.push(names[bit].clone());
        } else if p > 1 {
            parts.push(format!("{}^{}", names[bit], p));
        }
    }
    parts.join("*")
}

fn power_suffix(s_pow: i32) -> String {
    match s_pow {
        0 => String::new(),
        1 => " * s".to_string(),
        n => format!(" * s^{}", n),
    }
}

/// Addend-level pieces: groups share a power of s, multi-addend groups are
/// parenthesized sums with the `* s^n` suffix on the closing addend.
pub(crate) fn expr_pieces(expr: &FreqExpr, names: &[String]) -> Vec<Piece> {
    if expr.is_zero() {
        return vec![Piece::new("", "0".to_string())];
    }
    let terms = expr.terms();
    let mut pieces = Vec::new();
    let mut first_group = true;
    let mut i = 0;
    while i < terms.len() {
        let s_pow = terms[i].s_pow;
        let mut j = i;
        while j < terms.len() && terms[j].s_pow == s_pow {
            j += 1;
        }
        let group = &terms[i..j];
        let suffix = power_suffix(s_pow);

        if group.len() == 1 {
            let t = &group[0];
            let neg = t.factor.sign() < 0;
            let sep = if first_group {
                ""
            } else if neg {
                " - "
            } else {
                " + "
            };
            let mut text = String::new();
            if first_group && neg {
                text.push('-');
            }
            text.push_str(&magnitude(t, names));
            text.push_str(&suffix);
            pieces.push(Piece::new(sep, text));
        } else {
            for (k, t) in group.iter().enumerate() {
                let neg = t.factor.sign() < 0;
                let (sep, prefix) = if k == 0 {
                    (
                        if first_group { "" } else { " + " },
                        if neg { "(-" } else { "(" },
                    )
                } else {
                    (if neg { " - " } else { " + " }, "")
                };
                let mut text = String::from(prefix);
                text.push_str(&magnitude(t, names));
                if k == group.len() - 1 {
                    text.push(')');
                    text.push_str(&suffix);
                }
                pieces.push(Piece::new(sep, text));
            }
        }
        first_group = false;
        i = j;
    }
    pieces
}

/// Emit `lead` + pieces with the soft margin and hanging indentation.
pub(crate) fn write_wrapped(out: &mut String, lead: &str, pieces: &[Piece]) {
    let indent = " ".repeat(lead.len());
    out.push_str(lead);
    let mut col = lead.len();
    for (i, piece) in pieces.iter().enumerate() {
        let chunk = piece.sep.len() + piece.text.len();
        if i > 0 && col + chunk > MARGIN {
            out.push('\n');
            out.push_str(&indent);
            let sep = piece.sep.trim_start();
            out.push_str(sep);
            out.push_str(&piece.text);
            col = indent.len() + sep.len() + piece.text.len();
        } else {
            out.push_str(piece.sep);
            out.push_str(&piece.text);
            col += chunk;
        }
    }
    out.push('\n');
}


pub(crate) fn print(plan: &Plan<'_>) -> String {
    let input = plan.input;
    let n = input.indep_names.len();
    let mut out = String::new();
    out.push_str(&format!("Result {}:\n\n", input.name));

    let mut emitted = vec![false; plan.map.entries.len()];
    for &dep in &plan.order {
        let dep_name = &input.dep_names[dep];
        if !input.available[dep] {
            out.push_str(&format!(
                "  {}(s): not available (singular system)\n\n",
                dep_name
            ));
            continue;
        }

        // Summary: dep(s) = N/D * indep + ...
        let lead = format!("  {}(s) = ", dep_name);
        if n == 0 {
            out.push_str(&lead);
            out.push_str("0\n");
        } else {
            let mut pieces = Vec::new();
            for indep in 0..n {
                let nref = *plan.num_refs.get(dep, indep);
                let dref = *plan.den_refs.get(dep, indep);
                let neg = ExprMap::negated(nref) ^ ExprMap::negated(dref);
                let sep = if indep == 0 {
                    ""
                } else if neg {
                    " - "
                } else {
                    " + "
                };
                let mut text = String::new();
                if indep == 0 && neg {
                    text.push('-');
                }
                text.push_str(&format!(
                    "{}(s)/{}(s) * {}(s)",
                    plan.entry_name(nref),
                    plan.entry_name(dref),
                    input.indep_names[indep]
                ));
                pieces.push(Piece::new(sep, text));
            }
            write_wrapped(&mut out, &lead, &pieces);
        }
        out.push('\n');

        // Definitions: numerator then denominator of each pair; an already
        // emitted expression becomes a back-reference to its name.
        for indep in 0..n {
            let slots = [
                (plan.slot_num_name(dep, indep), *plan.num_refs.get(dep, indep)),
                (plan.slot_den_name(dep, indep), *plan.den_refs.get(dep, indep)),
            ];
            for (label, reference) in slots {
                let index = ExprMap::index(reference);
                let canonical = plan.entry_name(reference);
                let lead = format!("  {}(s) = ", label);
                if canonical == label && !emitted[index] {
                    emitted[index] = true;
                    let pieces =
                        expr_pieces(&plan.map.entries[index].expr, &plan.const_names);
                    write_wrapped(&mut out, &lead, &pieces);
                } else {
                    let sign = if ExprMap::negated(reference) { "-" } else { "" };
                    out.push_str(&format!("{}{}{}(s)\n", lead, sign, canonical));
                }
            }
        }
        out.push('\n');
    }
    out
}
