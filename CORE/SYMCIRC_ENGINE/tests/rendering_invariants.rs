//! Output-shape invariants: the script syntax must never reference a name
//! before assigning it, and sibling results of one netlist must agree with
//! each other.

use std::collections::HashSet;
use symcirc_engine::{analyze, parse_netlist};

fn scripts(netlist: &str) -> Vec<String> {
    let report = analyze(parse_netlist(netlist).expect("netlist parses"))
        .expect("circuit accepted");
    report
        .results
        .into_iter()
        .map(|r| r.outcome.expect("result renders").script)
        .collect()
}

fn texts(netlist: &str) -> Vec<String> {
    let report = analyze(parse_netlist(netlist).expect("netlist parses"))
        .expect("circuit accepted");
    report
        .results
        .into_iter()
        .map(|r| r.outcome.expect("result renders").text)
        .collect()
}

/// Every `N_*`/`D_*` identifier on a right-hand side must have been the
/// left-hand side of an earlier assignment.
fn assert_forward_reference_free(script: &str) {
    let mut defined: HashSet<String> = HashSet::new();
    for line in script.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        let Some((lhs, rhs)) = line.split_once('=') else {
            continue;
        };
        for token in rhs.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
            if token.starts_with("N_") || token.starts_with("D_") {
                assert!(
                    defined.contains(token),
                    "'{}' referenced before assignment:\n{}",
                    token,
                    script
                );
            }
        }
        defined.insert(lhs.trim().to_string());
    }
}

#[test]
fn script_is_forward_reference_free_for_shared_denominators() {
    let all = scripts(
        "U Uin in gnd\nI Iin K1 gnd\nL L in K1\nC C K1 out\nR R out gnd\nRESULT F U_out U_K1\n",
    );
    for script in &all {
        assert_forward_reference_free(script);
    }
    // The back-references themselves are present.
    assert!(all[0].contains("D_U_out_Iin = D_U_out_Uin;"));
}

#[test]
fn script_is_forward_reference_free_for_feedback_pair() {
    let all = scripts(
        "U Uin in gnd\nVCVS k1 n2 gnd n3 gnd\nVCVS k2 n3 gnd in n2\nRESULT F U_n2 U_n3\n",
    );
    for script in &all {
        assert_forward_reference_free(script);
    }
}

#[test]
fn inverse_results_exchange_numerator_and_denominator() {
    let all = texts(
        "U Uin in gnd / L L in K1 / C C K1 out / R R out gnd\nPLOT G U_out U_in\nPLOT Ginv U_in U_out\n",
    );
    assert_eq!(all.len(), 2);
    assert!(all[0].contains("N_U_out_U_in(s) = R*C * s"));
    assert!(all[0].contains("D_U_out_U_in(s) = L*C * s^2 + R*C * s + 1"));
    assert!(all[1].contains("N_U_in_U_out(s) = L*C * s^2 + R*C * s + 1"));
    assert!(all[1].contains("D_U_in_U_out(s) = R*C * s"));
}

#[test]
fn script_pads_missing_powers_with_zero() {
    // Band-pass shape: numerator has an s term and nothing at s^0.
    let all = scripts("U Uin in gnd / L L in K1 / C C K1 out / R R out gnd\nPLOT G U_out U_in\n");
    assert!(all[0].contains("N_U_out_U_in = [R*C 0]; % s^1 s^0"));
}

#[test]
fn unused_device_bit_is_absent_from_expressions() {
    // R9's stamps cancel against themselves (both terminals on one node),
    // so its bit must not survive into any addend of the result.
    let text = &texts(
        "U Uin in gnd / R R1 in out / C C1 out gnd / R R9 z z\nPLOT G U_out U_in\n",
    )[0];
    assert!(!text.contains("R9"), "unused device leaked into output:\n{}", text);
    assert!(text.contains("N_U_out_U_in"));
}
