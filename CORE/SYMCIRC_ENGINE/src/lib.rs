//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: lib.rs | CORE/SYMCIRC_ENGINE/src/lib.rs
//! PURPOSE: Symbolic Laplace-domain analysis of linear circuits
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! SYMCIRC_ENGINE turns a parsed netlist into closed-form transfer
//! functions in the complex variable s:
//! - exact rational and coefficient algebra (no floating point in the core)
//! - fraction-free symbolic elimination
//! - admittance substitution and expression normalization
//! - deduplicated, ordered output in two syntaxes (human text and a script
//!   for the numeric post-processor)
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ ARCHITECTURE                                                                │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                                                                             │
//! │   circuit ──► symtab ──► les ──► solver ──► freq ──► render                 │
//! │      │           │         │        │         │         │                   │
//! │      │           │         └─ coeff ┘         │         │                   │
//! │      │           │            (arena, grid)   │         │                   │
//! │      └───────────┴────────── rational ────────┴─────────┘                   │
//! │                                                                             │
//! │   analysis: per-request orchestration, result-local recovery                │
//! │                                                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! USED BY:
//!   • TOOLS/SYMCIRC_CLI → command-line driver
//!
//! ═══════════════════════════════════════════════════════════════════════════════

// ─────────────────────────────────────────────────────────────────────────────────
// CODE BELOW
// ─────────────────────────────────────────────────────────────────────────────────

pub mod analysis;
pub mod circuit;
pub mod coeff;
pub mod error;
pub mod freq;
pub mod grid;
pub mod les;
pub mod rational;
pub mod render;
pub mod solver;
pub mod symtab;

pub use analysis::{analyze, AnalysisReport, ResultError, ResultOutcome};
pub use circuit::parse::parse_netlist;
pub use circuit::validate::{validate, Diagnostics, Warning};
pub use circuit::{
    Axis, Circuit, CircuitBuilder, Device, DeviceKind, DeviceSpec, PlotInfo, ResultRequest,
    UserVoltage,
};
pub use error::{AnalysisError, CircuitError};
pub use rational::Rat;
pub use render::RenderedResult;
pub use symtab::SymbolTable;
