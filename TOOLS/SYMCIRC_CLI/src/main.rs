//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: main.rs | TOOLS/SYMCIRC_CLI/src/main.rs
//! PURPOSE: Command-line driver: netlist in, text/script/JSON out
//! MODIFIED: 2026-07-21
//! LAYER: TOOLS → SYMCIRC_CLI
//! ═══════════════════════════════════════════════════════════════════════════════

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use symcirc_engine::{analyze, parse_netlist, AnalysisReport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "symcirc", author, version, about = "Symbolic linear circuit analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a netlist and print the human-readable results
    Analyze {
        /// Input netlist file
        input: PathBuf,
        /// Write output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Emit a JSON report instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Emit the post-processor script for every result
    Script {
        /// Input netlist file
        input: PathBuf,
        /// Write output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse and validate a netlist without solving anything
    Check {
        /// Input netlist file
        input: PathBuf,
    },
}

fn load(input: &Path) -> Result<symcirc_engine::Circuit> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("cannot read netlist '{}'", input.display()))?;
    let circuit = parse_netlist(&text)
        .with_context(|| format!("cannot parse netlist '{}'", input.display()))?;
    Ok(circuit)
}

fn emit(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("cannot write '{}'", path.display())),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

/// 0 when every result rendered, 2 on partial success, 1 when nothing did.
fn report_exit(report: &AnalysisReport) -> ExitCode {
    if report.all_ok() {
        ExitCode::SUCCESS
    } else if report.any_ok() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

fn json_report(report: &AnalysisReport) -> serde_json::Value {
    serde_json::json!({
        "results": report
            .results
            .iter()
            .map(|r| match &r.outcome {
                Ok(rendered) => serde_json::json!({
                    "name": r.name,
                    "ok": true,
                    "text": rendered.text,
                    "script": rendered.script,
                }),
                Err(e) => serde_json::json!({
                    "name": r.name,
                    "ok": false,
                    "error": e.to_string(),
                }),
            })
            .collect::<Vec<_>>(),
    })
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            input,
            output,
            json,
        } => {
            let circuit = load(&input)?;
            let report = analyze(circuit).context("circuit rejected")?;
            for result in &report.results {
                match &result.outcome {
                    Ok(_) => info!(result = %result.name, "rendered"),
                    Err(e) => warn!(result = %result.name, error = %e, "failed"),
                }
            }
            let content = if json {
                format!("{:#}\n", json_report(&report))
            } else {
                let mut text = String::new();
                for result in &report.results {
                    match &result.outcome {
                        Ok(rendered) => text.push_str(&rendered.text),
                        Err(e) => {
                            text.push_str(&format!("Result {}: INVALID ({})\n\n", result.name, e))
                        }
                    }
                }
                text
            };
            emit(output.as_deref(), &content)?;
            Ok(report_exit(&report))
        }
        Commands::Script { input, output } => {
            let circuit = load(&input)?;
            let report = analyze(circuit).context("circuit rejected")?;
            let mut script = String::new();
            for result in &report.results {
                match &result.outcome {
                    Ok(rendered) => script.push_str(&rendered.script),
                    Err(e) => {
                        warn!(result = %result.name, error = %e, "failed");
                        script.push_str(&format!("%% Result {} INVALID: {}\n\n", result.name, e));
                    }
                }
            }
            emit(output.as_deref(), &script)?;
            Ok(report_exit(&report))
        }
        Commands::Check { input } => {
            let circuit = load(&input)?;
            info!(
                nodes = circuit.nodes().len(),
                devices = circuit.devices().len(),
                requests = circuit.requests().len(),
                "netlist is well-formed"
            );
            let diagnostics = symcirc_engine::validate(&circuit);
            for warning in &diagnostics.warnings {
                warn!(%warning, "structural warning");
                println!("warning: {}", warning);
            }
            println!(
                "ok: {} nodes, {} devices, {} requests, {} warnings",
                circuit.nodes().len(),
                circuit.devices().len(),
                circuit.requests().len(),
                diagnostics.warnings.len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
