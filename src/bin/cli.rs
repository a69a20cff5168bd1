//! Binary entry point for the sombra-procs CLI.
#![forbid(unsafe_code)]

#[path = "cli/config.rs"]
mod config;
#[path = "cli/json.rs"]
mod json;

use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sombra_procs::{
    example,
    host::memory::{AccessMode, MemoryDb, MemoryModule, MessageRecord},
    host::{GraphRef, HostGraph},
    logging::init_logging,
    types::ElementRef,
    EdgeType, HostValue, ProcError,
};
use time::OffsetDateTime;

use config::ProcsConfig;

#[derive(Parser, Debug)]
#[command(
    name = "sombra-procs",
    version,
    about = "Run query-module procedures against an in-memory Sombra graph",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "SOMBRA_PROCS_CONFIG",
        value_name = "FILE",
        help = "Path to the TOML config file"
    )]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Log filter directive, overrides the config file")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered procedures and transformations
    List,
    /// Call a procedure and print each result record as a JSON line
    Call(CallCmd),
    /// Run a transformation over messages given on the command line
    Transform(TransformCmd),
}

#[derive(Args, Debug)]
struct CallCmd {
    #[arg(value_name = "PROCEDURE")]
    procedure: String,

    #[arg(
        value_name = "ARG_JSON",
        allow_hyphen_values = true,
        help = "Positional arguments as JSON; {\"vertex\": N} names a vertex"
    )]
    args: Vec<String>,

    #[arg(
        long,
        default_value_t = 0,
        help = "Seed a chain of N vertices joined by NEXT edges before the call"
    )]
    vertices: usize,
}

#[derive(Args, Debug)]
struct TransformCmd {
    #[arg(value_name = "NAME")]
    name: String,

    #[arg(long = "message", value_name = "TOPIC:PAYLOAD")]
    messages: Vec<String>,

    #[arg(long, help = "Payloads are hex-encoded bytes")]
    hex: bool,
}

fn main() {
    if let Err(err) = run() {
        match err.downcast_ref::<ProcError>() {
            Some(proc_err) => eprintln!("error: {}: {proc_err}", proc_err.code()),
            None => eprintln!("error: {err}"),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = ProcsConfig::load(cli.config.clone())?;
    init_logging(cli.log_level.as_deref().unwrap_or(config.log_level()))?;

    let db = MemoryDb::with_options(config.host_options());
    let mut module = MemoryModule::new("example", db.clone()).read_only(config.read_only());
    example::register(&mut module)?;

    match cli.command {
        Command::List => {
            for name in module.procedure_names() {
                if let Some(signature) = module.signature(name) {
                    println!("{signature}");
                }
            }
            for name in module.transformation_names() {
                println!("{}.{name} (transformation)", module.name());
            }
        }
        Command::Call(cmd) => run_call(&module, &db, cmd)?,
        Command::Transform(cmd) => run_transform(&module, cmd)?,
    }

    Ok(())
}

fn run_call(module: &MemoryModule, db: &MemoryDb, cmd: CallCmd) -> Result<(), Box<dyn Error>> {
    seed_chain(db, cmd.vertices)?;
    let args = cmd
        .args
        .iter()
        .map(|arg| serde_json::from_str(arg).map(json::to_host))
        .collect::<Result<Vec<HostValue>, _>>()?;

    let scope = db.begin_scope(module.access_mode(&cmd.procedure)?);
    let graph: GraphRef = scope.clone();
    let host: &dyn HostGraph = scope.as_ref();
    let outcome = module
        .invoke(&cmd.procedure, graph, args)
        .map_err(Box::<dyn Error>::from)
        .and_then(|records| {
            for record in &records {
                let line = json::record_to_json(Some(host), record)?;
                println!("{}", serde_json::to_string(&line)?);
            }
            Ok(())
        });
    scope.end();
    outcome
}

fn run_transform(module: &MemoryModule, cmd: TransformCmd) -> Result<(), Box<dyn Error>> {
    let now = OffsetDateTime::now_utc();
    let timestamp = i64::try_from(now.unix_timestamp_nanos() / 1_000_000)?;
    let mut messages = Vec::with_capacity(cmd.messages.len());
    for raw in &cmd.messages {
        let (topic, payload) = raw
            .split_once(':')
            .ok_or_else(|| format!("message '{raw}' is not in TOPIC:PAYLOAD form"))?;
        let payload = if cmd.hex {
            hex::decode(payload)?
        } else {
            payload.as_bytes().to_vec()
        };
        messages.push(MessageRecord::new(topic, payload, timestamp));
    }
    for record in module.transform(&cmd.name, messages)? {
        let line = json::record_to_json(None, &record)?;
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn seed_chain(db: &MemoryDb, count: usize) -> Result<(), Box<dyn Error>> {
    if count == 0 {
        return Ok(());
    }
    let scope = db.begin_scope(AccessMode::ReadWrite);
    let next = EdgeType::new("NEXT");
    let mut previous = None;
    for index in 0..count {
        let vertex = scope.create_vertex()?;
        scope.add_label(vertex, &sombra_procs::Label::new("Seed"))?;
        scope.set_property(
            ElementRef::Vertex(vertex),
            "index",
            HostValue::Int(i64::try_from(index)?),
        )?;
        if let Some(previous) = previous {
            scope.create_edge(previous, vertex, &next)?;
        }
        previous = Some(vertex);
    }
    scope.end();
    Ok(())
}
