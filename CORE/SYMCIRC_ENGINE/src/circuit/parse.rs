//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: parse.rs | CORE/SYMCIRC_ENGINE/src/circuit/parse.rs
//! PURPOSE: Line-oriented netlist reader
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Statement grammar (whitespace tokens, `/` separates statements on one
//! line, `#` starts a comment, `*` comments out a whole line):
//!
//! ```text
//! U|I|R|G|L|C <name> <node+> <node-> [value | = rel]
//! VCVS|VCCS   <name> <out+> <out-> <ctrl+> <ctrl-> [value | = rel]
//! CCVS|CCCS   <name> <out+> <out-> <probe>         [value | = rel]
//! OP          <name> <in+> <in-> <out>
//! PROBE       <name> <node+> <node->
//! VOLTAGE     <name> <node+> <node->
//! PLOT        <name> <dep> <indep> [LIN|LOG <points> <fmin> <fmax>]
//! RESULT      <name> <dep>...      [LIN|LOG <points> <fmin> <fmax>]
//!
//! rel := [<int> | <int>/<int> | <decimal>] [* ] <device>
//! ```
//!
//! Node voltages are addressable as `U_<node>`, source currents as
//! `I_<name>`; a probe's current shares the probe's name.

use super::{Axis, CircuitBuilder, DeviceKind, DeviceSpec, PlotInfo, ResultRequest};
use crate::error::CircuitError;
use crate::rational::Rat;
use regex::Regex;

struct LineParser {
    rational: Regex,
    decimal: Regex,
}

fn err(line: usize, message: impl Into<String>) -> CircuitError {
    CircuitError::Parse {
        line,
        message: message.into(),
    }
}

impl LineParser {
    fn new() -> Self {
        Self {
            rational: Regex::new(r"^([+-]?\d+)(?:/(\d+))?$").expect("rational pattern compiles"),
            decimal: Regex::new(r"^[+-]?\d+\.\d{1,9}$").expect("decimal pattern compiles"),
        }
    }

    /// Integer, `a/b`, or short decimal, as an exact rational.
    fn parse_rational(&self, token: &str, line: usize) -> Result<Rat, CircuitError> {
        if let Some(caps) = self.rational.captures(token) {
            let num: i64 = caps[1]
                .parse()
                .map_err(|_| err(line, format!("integer out of range: '{}'", token)))?;
            let den: i64 = match caps.get(2) {
                Some(d) => d
                    .as_str()
                    .parse()
                    .map_err(|_| err(line, format!("integer out of range: '{}'", token)))?,
                None => 1,
            };
            return Rat::new(num, den)
                .ok_or_else(|| err(line, format!("zero denominator in '{}'", token)));
        }
        if self.decimal.is_match(token) {
            let (whole, frac) = token.split_once('.').expect("decimal has a point");
            let digits = frac.len() as u32;
            let scale = 10i64.pow(digits);
            let whole: i64 = whole
                .parse()
                .map_err(|_| err(line, format!("number out of range: '{}'", token)))?;
            let frac: i64 = frac
                .parse()
                .map_err(|_| err(line, format!("number out of range: '{}'", token)))?;
            let num = whole
                .checked_mul(scale)
                .and_then(|w| {
                    if whole < 0 || token.starts_with('-') {
                        w.checked_sub(frac)
                    } else {
                        w.checked_add(frac)
                    }
                })
                .ok_or_else(|| err(line, format!("number out of range: '{}'", token)))?;
            return Rat::new(num, scale)
                .ok_or_else(|| err(line, format!("bad decimal '{}'", token)));
        }
        Err(err(line, format!("expected a rational, got '{}'", token)))
    }

    fn parse_value(token: &str) -> Option<f64> {
        token.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Trailing `[value | = relation]` clause of a device statement.
    fn parse_tail(
        &self,
        spec: &mut DeviceSpec,
        tail: &[&str],
        line: usize,
    ) -> Result<(), CircuitError> {
        match tail {
            [] => Ok(()),
            [v] if Self::parse_value(v).is_some() => {
                spec.value = Self::parse_value(v);
                Ok(())
            }
            ["=", v] if Self::parse_value(v).is_some() => {
                spec.value = Self::parse_value(v);
                Ok(())
            }
            ["=", target] => {
                spec.relation = Some(((*target).to_string(), Rat::ONE));
                Ok(())
            }
            ["=", k, "*", target] => {
                spec.relation = Some(((*target).to_string(), self.parse_rational(k, line)?));
                Ok(())
            }
            _ => Err(err(
                line,
                format!("unexpected trailing tokens: '{}'", tail.join(" ")),
            )),
        }
    }

    fn parse_plot(&self, tokens: &[&str], line: usize) -> Result<Option<PlotInfo>, CircuitError> {
        if tokens.is_empty() {
            return Ok(None);
        }
        let axis = match tokens[0].to_ascii_uppercase().as_str() {
            "LIN" => Axis::Linear,
            "LOG" => Axis::Log,
            other => return Err(err(line, format!("expected LIN or LOG, got '{}'", other))),
        };
        if tokens.len() != 4 {
            return Err(err(line, "plot info takes <points> <fmin> <fmax>"));
        }
        let points: u32 = tokens[1]
            .parse()
            .map_err(|_| err(line, format!("bad point count '{}'", tokens[1])))?;
        let freq_min = Self::parse_value(tokens[2])
            .ok_or_else(|| err(line, format!("bad frequency '{}'", tokens[2])))?;
        let freq_max = Self::parse_value(tokens[3])
            .ok_or_else(|| err(line, format!("bad frequency '{}'", tokens[3])))?;
        Ok(Some(PlotInfo {
            axis,
            points,
            freq_min,
            freq_max,
        }))
    }

    fn parse_statement(
        &self,
        builder: &mut CircuitBuilder,
        tokens: &[&str],
        line: usize,
    ) -> Result<(), CircuitError> {
        let keyword = tokens[0].to_ascii_uppercase();
        let kind = match keyword.as_str() {
            "U" | "V" => Some(DeviceKind::VoltageSource),
            "I" => Some(DeviceKind::CurrentSource),
            "R" => Some(DeviceKind::Resistor),
            "G" => Some(DeviceKind::Conductance),
            "L" => Some(DeviceKind::Inductor),
            "C" => Some(DeviceKind::Capacitor),
            "VCVS" => Some(DeviceKind::Vcvs),
            "VCCS" => Some(DeviceKind::Vccs),
            "CCVS" => Some(DeviceKind::Ccvs),
            "CCCS" => Some(DeviceKind::Cccs),
            "OP" => Some(DeviceKind::OpAmp),
            "PROBE" => Some(DeviceKind::Probe),
            _ => None,
        };

        if let Some(kind) = kind {
            let takes_probe = matches!(kind, DeviceKind::Ccvs | DeviceKind::Cccs);
            let positional = super::node_arity(kind) + usize::from(takes_probe);
            if tokens.len() < 2 + positional {
                return Err(err(
                    line,
                    format!("{} statement is missing arguments", keyword),
                ));
            }
            let name = tokens[1];
            let mut nodes: Vec<String> = tokens[2..2 + super::node_arity(kind)]
                .iter()
                .map(|t| (*t).to_string())
                .collect();
            let probe = takes_probe.then(|| tokens[2 + nodes.len()].to_string());
            if kind == DeviceKind::OpAmp || kind == DeviceKind::Probe {
                // No trailing clause on structural devices.
                if tokens.len() > 2 + positional {
                    return Err(err(
                        line,
                        format!("{} '{}' takes no value clause", keyword, name),
                    ));
                }
            }
            let mut spec = DeviceSpec {
                kind,
                name: name.to_string(),
                nodes: std::mem::take(&mut nodes),
                probe,
                relation: None,
                value: None,
            };
            self.parse_tail(&mut spec, &tokens[2 + positional..], line)?;
            return match builder.add_device(spec) {
                Err(CircuitError::Parse { message, .. }) => Err(err(line, message)),
                other => other,
            };
        }

        match keyword.as_str() {
            "VOLTAGE" => {
                if tokens.len() != 4 {
                    return Err(err(line, "VOLTAGE takes <name> <node+> <node->"));
                }
                builder.add_voltage(tokens[1], tokens[2], tokens[3])
            }
            "PLOT" => {
                if tokens.len() < 4 {
                    return Err(err(line, "PLOT takes <name> <dep> <indep>"));
                }
                let plot = self.parse_plot(&tokens[4..], line)?;
                builder.add_request(ResultRequest::Transfer {
                    name: tokens[1].to_string(),
                    dependent: tokens[2].to_string(),
                    independent: tokens[3].to_string(),
                    plot,
                })
            }
            "RESULT" => {
                if tokens.len() < 3 {
                    return Err(err(line, "RESULT takes <name> <dep>..."));
                }
                let clause = tokens[2..]
                    .iter()
                    .position(|t| {
                        t.eq_ignore_ascii_case("LIN") || t.eq_ignore_ascii_case("LOG")
                    })
                    .map(|p| 2 + p)
                    .unwrap_or(tokens.len());
                if clause == 2 {
                    return Err(err(line, "RESULT needs at least one dependent"));
                }
                let plot = self.parse_plot(&tokens[clause..], line)?;
                builder.add_request(ResultRequest::Full {
                    name: tokens[1].to_string(),
                    dependents: tokens[2..clause].iter().map(|t| (*t).to_string()).collect(),
                    plot,
                })
            }
            other => Err(err(line, format!("unknown statement '{}'", other))),
        }
    }
}

/// Parse a whole netlist into a validated [`Circuit`](super::Circuit).
pub fn parse_netlist(input: &str) -> Result<super::Circuit, CircuitError> {
    let parser = LineParser::new();
    let mut builder = CircuitBuilder::new();

    for (index, raw) in input.lines().enumerate() {
        let line = index + 1;
        let text = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('*') {
            continue;
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        for statement in tokens.split(|t| *t == "/") {
            if statement.is_empty() {
                continue;
            }
            parser.parse_statement(&mut builder, statement, line)?;
        }
    }

    builder.finish()
}
