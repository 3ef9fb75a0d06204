// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `snapsim`: run a token-passing simulation from a topology and an event
//! script, collect every snapshot, and print the results.

use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use tracing::{debug, error};

use snapsim::config::{SimConfig, DEFAULT_MAX_DELAY};
use snapsim::script::{load_script, run_script};
use snapsim::snapfile::format_snapshot;
use snapsim::snapshot::GlobalSnapshot;
use snapsim::topology::load_topology;

#[derive(Debug, Parser)]
#[command(name = "snapsim", version, about = "Deterministic Chandy-Lamport snapshot simulator.")]
struct Cli {
    /// Topology file (.top).
    #[arg(long, env = "SNAPSIM_TOPOLOGY")]
    topology: PathBuf,

    /// Event script (.events).
    #[arg(long, env = "SNAPSIM_EVENTS")]
    events: PathBuf,

    /// Seed for the delivery-delay PRNG.
    #[arg(long, default_value_t = 0, env = "SNAPSIM_SEED")]
    seed: u64,

    /// Upper bound on the random extra delivery delay, in ticks.
    #[arg(long, default_value_t = DEFAULT_MAX_DELAY, env = "SNAPSIM_MAX_DELAY")]
    max_delay: u64,

    /// Give up if a snapshot is still incomplete after this many extra ticks.
    #[arg(long, default_value_t = 10_000)]
    max_ticks: u64,

    /// Append the diagnostic trace as JSONL to this file.
    #[arg(long)]
    trace_file: Option<PathBuf>,

    /// Print snapshots as JSON instead of the `.snap` text format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = SimConfig { seed: cli.seed, max_delay: cli.max_delay };
    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    if let Err(e) = run(&cli, config) {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, config: SimConfig) -> anyhow::Result<()> {
    let topology = load_topology(&cli.topology)?;
    let steps = load_script(&cli.events)?;
    let initial_tokens = topology.total_tokens();

    let mut sim = topology.build(config)?;
    if let Some(ref path) = cli.trace_file {
        sim.set_trace_sink(path.clone());
    }

    let initiated = run_script(&mut sim, &steps)?;

    // Tick until every snapshot is collectable, then drain the wire so the
    // resting state is observable.
    let mut snapshots: Vec<GlobalSnapshot> = Vec::with_capacity(initiated.len());
    for id in initiated {
        let mut spent = 0u64;
        let snapshot = loop {
            if let Some(snapshot) = sim.collect_snapshot(id)? {
                break snapshot;
            }
            if spent >= cli.max_ticks {
                bail!("snapshot {id} still incomplete after {} extra tick(s)", cli.max_ticks);
            }
            sim.tick()?;
            spent += 1;
        };
        snapshots.push(snapshot);
    }
    let mut spent = 0u64;
    while !sim.idle() {
        if spent >= cli.max_ticks {
            bail!("deliveries still pending after {} drain tick(s)", cli.max_ticks);
        }
        sim.tick()?;
        spent += 1;
    }

    let resting = sim.total_tokens();
    if resting != initial_tokens {
        bail!("token conservation violated: started with {initial_tokens}, ended with {resting}");
    }
    for snapshot in &snapshots {
        let captured = snapshot.total_tokens();
        if captured != initial_tokens {
            bail!("snapshot {} captured {captured} token(s), expected {initial_tokens}", snapshot.id);
        }
    }

    for snapshot in &snapshots {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(snapshot)?);
        } else {
            print!("{}", format_snapshot(snapshot));
            println!();
        }
    }
    debug!(time = sim.time(), snapshots = snapshots.len(), "run complete");
    Ok(())
}
