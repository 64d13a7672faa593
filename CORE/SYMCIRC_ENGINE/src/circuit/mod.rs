//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: mod.rs | CORE/SYMCIRC_ENGINE/src/circuit/mod.rs
//! PURPOSE: Parsed-netlist data model consumed by the analysis pipeline
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ DATA DEFINED                                                                │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ DeviceKind      resistor … op-amp … current probe                           │
//! │ Device          name, kind, terminals, controls, relation, export value    │
//! │ UserVoltage     named difference of two node voltages                      │
//! │ ResultRequest   full result or transfer function, optional plot info       │
//! │ Circuit         read-only input to the pipeline                            │
//! │ CircuitBuilder  validating construction (duplicates, arity, references)    │
//! └─────────────────────────────────────────────────────────────────────────────┘

// ─────────────────────────────────────────────────────────────────────────────────
// CODE BELOW
// ─────────────────────────────────────────────────────────────────────────────────

pub mod parse;
pub mod validate;

use crate::error::CircuitError;
use crate::rational::Rat;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

pub type NodeId = usize;
pub type DeviceId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DeviceKind {
    VoltageSource,
    CurrentSource,
    Vcvs,
    Vccs,
    Ccvs,
    Cccs,
    Resistor,
    Conductance,
    Inductor,
    Capacitor,
    OpAmp,
    Probe,
}

impl DeviceKind {
    /// Independent sources spawn a known (input) value.
    pub fn is_source(self) -> bool {
        matches!(self, DeviceKind::VoltageSource | DeviceKind::CurrentSource)
    }

    /// Devices whose symbolic value occupies a bit in the product word.
    pub fn has_constant(self) -> bool {
        matches!(
            self,
            DeviceKind::Resistor
                | DeviceKind::Conductance
                | DeviceKind::Inductor
                | DeviceKind::Capacitor
                | DeviceKind::Vcvs
                | DeviceKind::Vccs
                | DeviceKind::Ccvs
                | DeviceKind::Cccs
        )
    }

    /// Devices whose branch current becomes an unknown of its own.
    pub fn carries_current(self) -> bool {
        matches!(
            self,
            DeviceKind::VoltageSource
                | DeviceKind::Vcvs
                | DeviceKind::Ccvs
                | DeviceKind::OpAmp
                | DeviceKind::Probe
        )
    }

    pub fn is_controlled(self) -> bool {
        matches!(
            self,
            DeviceKind::Vcvs | DeviceKind::Vccs | DeviceKind::Ccvs | DeviceKind::Cccs
        )
    }

    /// Constant-bit assignment rank. Lower ranks get higher bits and so
    /// print first, which is what makes products come out as gains, then
    /// R, G, L, C.
    pub(crate) fn print_rank(self) -> u8 {
        match self {
            DeviceKind::Vcvs | DeviceKind::Vccs | DeviceKind::Ccvs | DeviceKind::Cccs => 0,
            DeviceKind::Resistor => 1,
            DeviceKind::Conductance => 2,
            DeviceKind::Inductor => 3,
            DeviceKind::Capacitor => 4,
            _ => 5,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            DeviceKind::VoltageSource => "U",
            DeviceKind::CurrentSource => "I",
            DeviceKind::Vcvs => "VCVS",
            DeviceKind::Vccs => "VCCS",
            DeviceKind::Ccvs => "CCVS",
            DeviceKind::Cccs => "CCCS",
            DeviceKind::Resistor => "R",
            DeviceKind::Conductance => "G",
            DeviceKind::Inductor => "L",
            DeviceKind::Capacitor => "C",
            DeviceKind::OpAmp => "OP",
            DeviceKind::Probe => "PROBE",
        }
    }
}

/// `this device's value = factor × target device's value`
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Relation {
    pub target: DeviceId,
    pub factor: Rat,
}

#[derive(Clone, Debug, Serialize)]
pub struct Device {
    pub name: String,
    pub kind: DeviceKind,
    /// Conduction terminals. For an op-amp these are the two inputs.
    pub pos: NodeId,
    pub neg: NodeId,
    /// Op-amp output node.
    pub out: Option<NodeId>,
    /// Voltage-controlled sense pair (plus, minus).
    pub ctrl: Option<(NodeId, NodeId)>,
    /// Current-controlled sense probe.
    pub ctrl_probe: Option<DeviceId>,
    pub relation: Option<Relation>,
    /// Numeric default used by the script export.
    pub value: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserVoltage {
    pub name: String,
    pub plus: NodeId,
    pub minus: NodeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Axis {
    Linear,
    Log,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct PlotInfo {
    pub axis: Axis,
    pub points: u32,
    pub freq_min: f64,
    pub freq_max: f64,
}

#[derive(Clone, Debug, Serialize)]
pub enum ResultRequest {
    Full {
        name: String,
        dependents: Vec<String>,
        plot: Option<PlotInfo>,
    },
    Transfer {
        name: String,
        dependent: String,
        independent: String,
        plot: Option<PlotInfo>,
    },
}

impl ResultRequest {
    pub fn name(&self) -> &str {
        match self {
            ResultRequest::Full { name, .. } => name,
            ResultRequest::Transfer { name, .. } => name,
        }
    }
}

/// Read-only pipeline input: interned nodes, resolved devices, user
/// voltages, and the result requests.
#[derive(Clone, Debug, Serialize)]
pub struct Circuit {
    nodes: Vec<String>,
    devices: Vec<Device>,
    voltages: Vec<UserVoltage>,
    requests: Vec<ResultRequest>,
    #[serde(skip)]
    node_lookup: HashMap<String, NodeId>,
    #[serde(skip)]
    device_lookup: HashMap<String, DeviceId>,
}

impl Circuit {
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        &self.nodes[id]
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_lookup.get(name).copied()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, id: DeviceId) -> &Device {
        &self.devices[id]
    }

    pub fn device_id(&self, name: &str) -> Option<DeviceId> {
        self.device_lookup.get(name).copied()
    }

    pub fn voltages(&self) -> &[UserVoltage] {
        &self.voltages
    }

    pub fn voltage_by_name(&self, name: &str) -> Option<&UserVoltage> {
        self.voltages.iter().find(|v| v.name == name)
    }

    pub fn requests(&self) -> &[ResultRequest] {
        &self.requests
    }
}

/// Raw device record as it comes off the parser, with names still
/// unresolved.
#[derive(Clone, Debug)]
pub struct DeviceSpec {
    pub kind: DeviceKind,
    pub name: String,
    pub nodes: Vec<String>,
    pub probe: Option<String>,
    pub relation: Option<(String, Rat)>,
    pub value: Option<f64>,
}

impl DeviceSpec {
    pub fn two_terminal(kind: DeviceKind, name: &str, pos: &str, neg: &str) -> DeviceSpec {
        DeviceSpec {
            kind,
            name: name.to_string(),
            nodes: vec![pos.to_string(), neg.to_string()],
            probe: None,
            relation: None,
            value: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> DeviceSpec {
        self.value = Some(value);
        self
    }

    pub fn with_relation(mut self, target: &str, factor: Rat) -> DeviceSpec {
        self.relation = Some((target.to_string(), factor));
        self
    }
}

fn node_arity(kind: DeviceKind) -> usize {
    match kind {
        DeviceKind::Vcvs | DeviceKind::Vccs => 4,
        DeviceKind::OpAmp => 3,
        _ => 2,
    }
}

/// Validating builder. A finished [`Circuit`] contains no dangling
/// reference; later stages rely on that.
pub struct CircuitBuilder {
    ident: Regex,
    nodes: Vec<String>,
    node_lookup: HashMap<String, NodeId>,
    specs: Vec<DeviceSpec>,
    voltages: Vec<(String, String, String)>,
    requests: Vec<ResultRequest>,
}

impl CircuitBuilder {
    pub fn new() -> Self {
        Self {
            ident: Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"),
            nodes: Vec::new(),
            node_lookup: HashMap::new(),
            specs: Vec::new(),
            voltages: Vec::new(),
            requests: Vec::new(),
        }
    }

    fn check_name(&self, name: &str) -> Result<(), CircuitError> {
        if !self.ident.is_match(name) {
            return Err(CircuitError::BadIdentifier(name.to_string()));
        }
        if name.eq_ignore_ascii_case("s") {
            return Err(CircuitError::ReservedName(name.to_string()));
        }
        Ok(())
    }

    fn intern_node(&mut self, name: &str) -> Result<NodeId, CircuitError> {
        self.check_name(name)?;
        if let Some(&id) = self.node_lookup.get(name) {
            return Ok(id);
        }
        let id = self.nodes.len();
        self.nodes.push(name.to_string());
        self.node_lookup.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn add_device(&mut self, spec: DeviceSpec) -> Result<(), CircuitError> {
        self.check_name(&spec.name)?;
        if spec.nodes.len() != node_arity(spec.kind) {
            return Err(CircuitError::Parse {
                line: 0,
                message: format!(
                    "{} '{}' takes {} nodes, got {}",
                    spec.kind.keyword(),
                    spec.name,
                    node_arity(spec.kind),
                    spec.nodes.len()
                ),
            });
        }
        let needs_probe = matches!(spec.kind, DeviceKind::Ccvs | DeviceKind::Cccs);
        if needs_probe != spec.probe.is_some() {
            return Err(CircuitError::Parse {
                line: 0,
                message: format!(
                    "{} '{}' {} a controlling probe",
                    spec.kind.keyword(),
                    spec.name,
                    if needs_probe { "requires" } else { "does not take" }
                ),
            });
        }
        if spec.relation.is_some() && !spec.kind.has_constant() {
            return Err(CircuitError::RelationTarget(spec.name));
        }
        for node in &spec.nodes {
            self.intern_node(node)?;
        }
        self.specs.push(spec);
        Ok(())
    }

    pub fn add_voltage(&mut self, name: &str, plus: &str, minus: &str) -> Result<(), CircuitError> {
        self.check_name(name)?;
        self.intern_node(plus)?;
        self.intern_node(minus)?;
        self.voltages
            .push((name.to_string(), plus.to_string(), minus.to_string()));
        Ok(())
    }

    pub fn add_request(&mut self, request: ResultRequest) -> Result<(), CircuitError> {
        self.check_name(request.name())?;
        self.requests.push(request);
        Ok(())
    }

    pub fn finish(self) -> Result<Circuit, CircuitError> {
        let mut device_lookup: HashMap<String, DeviceId> = HashMap::new();
        for (id, spec) in self.specs.iter().enumerate() {
            if device_lookup.insert(spec.name.clone(), id).is_some() {
                return Err(CircuitError::DuplicateName(spec.name.clone()));
            }
        }
        let mut seen_voltages: HashMap<&str, ()> = HashMap::new();
        for (name, _, _) in &self.voltages {
            if device_lookup.contains_key(name.as_str())
                || seen_voltages.insert(name.as_str(), ()).is_some()
            {
                return Err(CircuitError::DuplicateName(name.clone()));
            }
        }

        let mut devices = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let probe = match &spec.probe {
                Some(pname) => {
                    let id = *device_lookup
                        .get(pname.as_str())
                        .ok_or_else(|| CircuitError::UnknownSymbol(pname.clone()))?;
                    if self.specs[id].kind != DeviceKind::Probe {
                        return Err(CircuitError::NotAProbe(pname.clone()));
                    }
                    Some(id)
                }
                None => None,
            };
            let relation = match &spec.relation {
                Some((tname, factor)) => {
                    let target = *device_lookup
                        .get(tname.as_str())
                        .ok_or_else(|| CircuitError::UnknownSymbol(tname.clone()))?;
                    if !self.specs[target].kind.has_constant() {
                        return Err(CircuitError::RelationTarget(tname.clone()));
                    }
                    if factor.is_zero() {
                        return Err(CircuitError::ZeroRelationFactor(spec.name.clone()));
                    }
                    Some(Relation {
                        target,
                        factor: *factor,
                    })
                }
                None => None,
            };

            let node_id = |name: &str| self.node_lookup[name];
            let (pos, neg, out, ctrl) = match spec.kind {
                DeviceKind::Vcvs | DeviceKind::Vccs => (
                    node_id(&spec.nodes[0]),
                    node_id(&spec.nodes[1]),
                    None,
                    Some((node_id(&spec.nodes[2]), node_id(&spec.nodes[3]))),
                ),
                DeviceKind::OpAmp => (
                    node_id(&spec.nodes[0]),
                    node_id(&spec.nodes[1]),
                    Some(node_id(&spec.nodes[2])),
                    None,
                ),
                _ => (node_id(&spec.nodes[0]), node_id(&spec.nodes[1]), None, None),
            };

            devices.push(Device {
                name: spec.name.clone(),
                kind: spec.kind,
                pos,
                neg,
                out,
                ctrl,
                ctrl_probe: probe,
                relation,
                value: spec.value.unwrap_or(1.0),
            });
        }

        // Export defaults follow relation chains so `R3 = 3/2 * R2` picks up
        // a numeric value from its root. A cycle just keeps the fallback;
        // the analysis stage reports it properly.
        for id in 0..devices.len() {
            if self.specs[id].value.is_some() {
                continue;
            }
            let mut factor = 1.0;
            let mut cursor = id;
            let mut resolved = false;
            for _ in 0..=devices.len() {
                match devices[cursor].relation {
                    Some(rel) => {
                        factor *= rel.factor.to_f64();
                        cursor = rel.target;
                    }
                    None => {
                        resolved = true;
                        break;
                    }
                }
            }
            if resolved {
                devices[id].value = factor * devices[cursor].value;
            }
        }

        let voltages = self
            .voltages
            .iter()
            .map(|(name, plus, minus)| UserVoltage {
                name: name.clone(),
                plus: self.node_lookup[plus],
                minus: self.node_lookup[minus],
            })
            .collect();

        Ok(Circuit {
            nodes: self.nodes,
            devices,
            voltages,
            requests: self.requests,
            node_lookup: self.node_lookup,
            device_lookup,
        })
    }
}

impl Default for CircuitBuilder {
    fn default() -> Self {
        Self::new()
    }
}
