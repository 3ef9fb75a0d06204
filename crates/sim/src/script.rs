// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event scripts (`.events`): parsing and execution.
//!
//! One event per line: `send <src> <dest> <count>`, `snapshot <server>`, or
//! `tick [N]` (N defaults to 1).

use std::path::Path;

use anyhow::{bail, Context};

use crate::message::{Event, SnapshotId};
use crate::simulator::Simulator;
use crate::topology::significant_lines;

/// One step of an event script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Hand an event to the simulator at the current time.
    Inject(Event),
    /// Advance the clock by the given number of ticks.
    Tick(u64),
}

/// Parse the `.events` text format.
pub fn parse_script(text: &str) -> anyhow::Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (line_no, line) in significant_lines(text) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let step = match fields.as_slice() {
            ["send", src, dest, count] => {
                let count: u64 = count
                    .parse()
                    .with_context(|| format!("line {line_no}: bad token count {count:?}"))?;
                ScriptStep::Inject(Event::PassToken {
                    src: (*src).to_owned(),
                    dest: (*dest).to_owned(),
                    count,
                })
            }
            ["snapshot", server] => {
                ScriptStep::Inject(Event::InitiateSnapshot { server: (*server).to_owned() })
            }
            ["tick"] => ScriptStep::Tick(1),
            ["tick", ticks] => {
                let ticks: u64 = ticks
                    .parse()
                    .with_context(|| format!("line {line_no}: bad tick count {ticks:?}"))?;
                ScriptStep::Tick(ticks)
            }
            _ => bail!("line {line_no}: unrecognized event {line:?}"),
        };
        steps.push(step);
    }
    Ok(steps)
}

/// Read and parse a `.events` file.
pub fn load_script(path: &Path) -> anyhow::Result<Vec<ScriptStep>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_script(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Run a parsed script against the simulator. Returns the ids of every
/// snapshot the script initiated, in initiation order.
pub fn run_script(sim: &mut Simulator, steps: &[ScriptStep]) -> anyhow::Result<Vec<SnapshotId>> {
    let mut initiated = Vec::new();
    for step in steps {
        match step {
            ScriptStep::Inject(event) => {
                if let Some(id) = sim.inject_event(event.clone())? {
                    initiated.push(id);
                }
            }
            ScriptStep::Tick(ticks) => {
                for _ in 0..*ticks {
                    sim.tick()?;
                }
            }
        }
    }
    Ok(initiated)
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
