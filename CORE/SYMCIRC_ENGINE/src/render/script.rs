//! Script printer for the numeric post-processor: device values, row
//! vectors of polynomial coefficients in s (descending, missing powers as
//! literal 0), LTI objects, and helper frequency/time vectors. Within one
//! dependent every denominator is assigned before any numerator, so no
//! name is referenced before its assignment.

use super::{ExprMap, Plan};
use crate::circuit::Axis;
use crate::freq::FreqExpr;

fn fmt_value(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{:e}", v)
    }
}

/// Coefficient of one power of s: `0`, a monomial, or a parenthesized sum.
fn coefficient(terms: &[&crate::freq::FreqAddend], names: &[String]) -> String {
    match terms.len() {
        0 => "0".to_string(),
        1 => {
            let t = terms[0];
            let mag = super::text::magnitude(t, names);
            if t.factor.sign() < 0 {
                format!("-{}", mag)
            } else {
                mag
            }
        }
        _ => {
            let mut s = String::from("(");
            for (i, t) in terms.iter().enumerate() {
                let mag = super::text::magnitude(t, names);
                if i == 0 {
                    if t.factor.sign() < 0 {
                        s.push('-');
                    }
                } else if t.factor.sign() < 0 {
                    s.push('-');
                } else {
                    s.push('+');
                }
                s.push_str(&mag);
            }
            s.push(')');
            s
        }
    }
}

/// Row vector of polynomial coefficients, descending powers of s, plus the
/// power annotation for the trailing comment.
fn poly_vector(expr: &FreqExpr, names: &[String]) -> (String, String) {
    if expr.is_zero() {
        return ("[0]".to_string(), "s^0".to_string());
    }
    let terms = expr.terms();
    let s_max = terms[0].s_pow;
    debug_assert!(
        terms.last().map(|t| t.s_pow >= 0).unwrap_or(true),
        "cancelled expressions have non-negative powers of s"
    );

    let mut coeffs = Vec::new();
    let mut annotation = Vec::new();
    for p in (0..=s_max).rev() {
        let group: Vec<&crate::freq::FreqAddend> =
            terms.iter().filter(|t| t.s_pow == p).collect();
        coeffs.push(coefficient(&group, names));
        annotation.push(if p == 0 {
            "s^0".to_string()
        } else {
            format!("s^{}", p)
        });
    }
    (
        format!("[{}]", coeffs.join(" ")),
        annotation.join(" "),
    )
}

fn emit_definition(
    plan: &Plan<'_>,
    out: &mut String,
    emitted: &mut [bool],
    label: &str,
    reference: u32,
) {
    let index = ExprMap::index(reference);
    let canonical = plan.entry_name(reference);
    if canonical == label && !emitted[index] {
        emitted[index] = true;
        let (vector, powers) = poly_vector(&plan.map.entries[index].expr, &plan.const_names);
        out.push_str(&format!("{} = {}; % {}\n", label, vector, powers));
    } else {
        let sign = if ExprMap::negated(reference) { "-" } else { "" };
        out.push_str(&format!("{} = {}{};\n", label, sign, canonical));
    }
}

pub(crate) fn print(plan: &Plan<'_>) -> String {
    let input = plan.input;
    let n = input.indep_names.len();
    let mut out = String::new();
    out.push_str(&format!("%% Result {}\n", input.name));

    // Device values for every constant that survives into an expression.
    let mut used = vec![false; plan.const_names.len()];
    for entry in &plan.map.entries {
        for t in entry.expr.terms() {
            for (bit, &p) in t.powers.iter().enumerate() {
                if p != 0 {
                    used[bit] = true;
                }
            }
        }
    }
    if used.iter().any(|&u| u) {
        out.push_str("% device values\n");
        for bit in (0..used.len()).rev() {
            if used[bit] {
                out.push_str(&format!(
                    "{} = {};\n",
                    plan.const_names[bit],
                    fmt_value(plan.const_values[bit])
                ));
            }
        }
    }
    out.push('\n');

    let mut emitted = vec![false; plan.map.entries.len()];
    for &dep in &plan.order {
        let dep_name = &input.dep_names[dep];
        if !input.available[dep] {
            out.push_str(&format!(
                "% {} not available (singular system)\n\n",
                dep_name
            ));
            continue;
        }
        for indep in 0..n {
            let label = plan.slot_den_name(dep, indep);
            emit_definition(plan, &mut out, &mut emitted, &label, *plan.den_refs.get(dep, indep));
        }
        for indep in 0..n {
            let label = plan.slot_num_name(dep, indep);
            emit_definition(plan, &mut out, &mut emitted, &label, *plan.num_refs.get(dep, indep));
        }
        for indep in 0..n {
            if *plan.infinite.get(dep, indep) {
                out.push_str(&format!(
                    "% {} / {} is singular (denominator is null)\n",
                    dep_name, input.indep_names[indep]
                ));
            } else {
                out.push_str(&format!(
                    "{}_{}_{} = tf({}, {});\n",
                    input.name,
                    dep_name,
                    input.indep_names[indep],
                    plan.slot_num_name(dep, indep),
                    plan.slot_den_name(dep, indep)
                ));
            }
        }
        out.push('\n');
    }

    if let Some(plot) = &input.plot {
        out.push_str("% frequency and time axes\n");
        match plot.axis {
            Axis::Log => out.push_str(&format!(
                "f = logspace(log10({}), log10({}), {});\n",
                fmt_value(plot.freq_min),
                fmt_value(plot.freq_max),
                plot.points
            )),
            Axis::Linear => out.push_str(&format!(
                "f = linspace({}, {}, {});\n",
                fmt_value(plot.freq_min),
                fmt_value(plot.freq_max),
                plot.points
            )),
        }
        out.push_str("w = 2*pi*f;\n");
        let f_ref = if plot.freq_min > 0.0 {
            plot.freq_min
        } else {
            plot.freq_max
        };
        if f_ref > 0.0 {
            out.push_str(&format!(
                "t = linspace(0, {}, {});\n",
                fmt_value(10.0 / f_ref),
                plot.points
            ));
        }
    }
    out
}
