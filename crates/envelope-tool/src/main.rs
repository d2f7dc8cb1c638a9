//! envelope-tool: orchestrator-side checks for validator job envelopes
//!
//! Reads envelope documents from disk, dispatches them to their family
//! schema and reports every violation found. Exits non-zero on rejection.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use job_envelopes::fmu::ProbeResult;
use job_envelopes::registry::{parse_input, parse_input_as, parse_output, parse_output_as};
use job_envelopes::{schema, ContractConfig, ContractError, Decode, Family, ValidationCallback};
use serde_json::{json, Value};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the maximum accepted document size in bytes
    #[arg(long, global = true)]
    max_bytes: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate an input envelope
    CheckInput {
        path: PathBuf,
        /// Require the document to belong to this family
        #[arg(long)]
        family: Option<Family>,
    },
    /// Validate an output envelope
    CheckOutput {
        path: PathBuf,
        #[arg(long)]
        family: Option<Family>,
    },
    /// Validate an FMU probe result
    CheckProbe { path: PathBuf },
    /// Build the completion callback for a finished job
    Callback {
        /// Output envelope of the finished job
        output: PathBuf,
        /// Input envelope the job was started with
        #[arg(long)]
        input: PathBuf,
        /// Where the output envelope was stored
        #[arg(long)]
        result_uri: String,
    },
    /// Print a JSON Schema document
    Schema {
        #[arg(value_enum)]
        document: SchemaDocument,
        #[arg(long)]
        family: Option<Family>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SchemaDocument {
    Input,
    Output,
    Callback,
    Probe,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = ContractConfig::from_env();
    if let Some(max) = args.max_bytes {
        config.max_document_bytes = max;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let report = run(&args.command, &config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_document(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "reading document");
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Read a document as JSON, applying the size limit. Failures print a rejection report.
fn read_envelope(path: &Path, config: &ContractConfig) -> Result<Value> {
    let text = read_document(path)?;
    config.check_size(&text).map_err(|err| rejected(path, err))?;
    serde_json::from_str(&text).map_err(|err| rejected(path, ContractError::MalformedJson(err)))
}

/// JSON report for a rejected document.
fn rejection_report(path: &Path, err: &ContractError) -> Value {
    json!({
        "path": path.display().to_string(),
        "accepted": false,
        "code": err.code(),
        "error": err.to_string(),
        "violations": err.violations(),
    })
}

/// Print the rejection and turn it into a failing result.
fn rejected(path: &Path, err: ContractError) -> anyhow::Error {
    println!(
        "{}",
        serde_json::to_string_pretty(&rejection_report(path, &err)).unwrap_or_default()
    );
    anyhow::Error::new(err).context(format!("{} rejected", path.display()))
}

fn run(command: &Command, config: &ContractConfig) -> Result<Value> {
    match command {
        Command::CheckInput { path, family } => {
            let raw = read_envelope(path, config)?;
            let envelope = match family {
                Some(expected) => parse_input_as(&raw, *expected),
                None => parse_input(&raw),
            }
            .map_err(|err| rejected(path, err))?;
            info!(run_id = %envelope.run_id(), family = %envelope.family(), "input envelope accepted");
            Ok(json!({
                "path": path.display().to_string(),
                "accepted": true,
                "family": envelope.family(),
                "run_id": envelope.run_id(),
            }))
        }
        Command::CheckOutput { path, family } => {
            let raw = read_envelope(path, config)?;
            let envelope = match family {
                Some(expected) => parse_output_as(&raw, *expected),
                None => parse_output(&raw),
            }
            .map_err(|err| rejected(path, err))?;
            info!(run_id = %envelope.run_id(), status = %envelope.status(), "output envelope accepted");
            Ok(json!({
                "path": path.display().to_string(),
                "accepted": true,
                "family": envelope.family(),
                "run_id": envelope.run_id(),
                "status": envelope.status(),
            }))
        }
        Command::CheckProbe { path } => {
            let raw = read_envelope(path, config)?;
            let probe = ProbeResult::decode(&raw).map_err(|report| rejected(path, report.into()))?;
            Ok(json!({
                "path": path.display().to_string(),
                "accepted": true,
                "status": probe.status(),
                "variables": probe.variables().len(),
            }))
        }
        Command::Callback {
            output,
            input,
            result_uri,
        } => {
            let job = parse_input(&read_envelope(input, config)?).map_err(|err| rejected(input, err))?;
            let finished = parse_output(&read_envelope(output, config)?).map_err(|err| rejected(output, err))?;
            if job.run_id() != finished.run_id() {
                bail!(
                    "run_id mismatch: input has '{}', output has '{}'",
                    job.run_id(),
                    finished.run_id()
                );
            }
            let base = finished.to_base()?;
            match ValidationCallback::for_output(&base, job.context(), result_uri.clone()) {
                Some(callback) => {
                    info!(run_id = %callback.run_id, "callback built");
                    Ok(serde_json::to_value(&callback)?)
                }
                None => {
                    info!(run_id = %job.run_id(), "job requested no callback");
                    Ok(Value::Null)
                }
            }
        }
        Command::Schema { document, family } => {
            let root = match document {
                SchemaDocument::Input => schema::input_schema(*family),
                SchemaDocument::Output => schema::output_schema(*family),
                SchemaDocument::Callback => schema::callback_schema(),
                SchemaDocument::Probe => schema::probe_schema(),
            };
            Ok(serde_json::to_value(&root)?)
        }
    }
}
