// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topology files (`.top`).
//!
//! The first significant line is the server count `N`; the next `N` are
//! `<id> <tokens>` declarations; every remaining line is a `<src> <dest>`
//! link. Blank lines and `#` comments are skipped anywhere. The same
//! conventions apply to the `.events` and `.snap` formats.

use std::path::Path;

use anyhow::{bail, Context};

use crate::config::SimConfig;
use crate::message::ServerId;
use crate::simulator::Simulator;

/// Significant lines of an input file: trimmed, non-empty, non-comment,
/// tagged with their 1-based line number for error reporting.
pub(crate) fn significant_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

/// Parsed topology: servers with their initial holdings, and directed links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub servers: Vec<(ServerId, u64)>,
    pub links: Vec<(ServerId, ServerId)>,
}

impl Topology {
    /// Build a simulator populated with these servers and links.
    pub fn build(&self, config: SimConfig) -> anyhow::Result<Simulator> {
        let mut sim = Simulator::new(config);
        for (id, tokens) in &self.servers {
            sim.add_server(id, *tokens).with_context(|| format!("adding server {id}"))?;
        }
        for (src, dest) in &self.links {
            sim.add_forward_link(src, dest)
                .with_context(|| format!("adding link {src} -> {dest}"))?;
        }
        Ok(sim)
    }

    /// Sum of all initial holdings.
    pub fn total_tokens(&self) -> u64 {
        self.servers.iter().map(|(_, tokens)| *tokens).sum()
    }
}

/// Parse the `.top` text format.
pub fn parse_topology(text: &str) -> anyhow::Result<Topology> {
    let mut lines = significant_lines(text);
    let (line_no, count_line) = lines.next().context("empty topology file")?;
    let count: usize = count_line
        .parse()
        .with_context(|| format!("line {line_no}: expected server count, got {count_line:?}"))?;

    let mut servers = Vec::with_capacity(count);
    for _ in 0..count {
        let (line_no, line) =
            lines.next().context("topology ended before all servers were declared")?;
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(id), Some(tokens), None) => {
                let tokens: u64 = tokens
                    .parse()
                    .with_context(|| format!("line {line_no}: bad token count {tokens:?}"))?;
                servers.push((id.to_owned(), tokens));
            }
            _ => bail!("line {line_no}: expected `<id> <tokens>`, got {line:?}"),
        }
    }

    let mut links = Vec::new();
    for (line_no, line) in lines {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(src), Some(dest), None) => links.push((src.to_owned(), dest.to_owned())),
            _ => bail!("line {line_no}: expected `<src> <dest>`, got {line:?}"),
        }
    }

    Ok(Topology { servers, links })
}

/// Read and parse a `.top` file.
pub fn load_topology(path: &Path) -> anyhow::Result<Topology> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_topology(&text).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
#[path = "topology_tests.rs"]
mod tests;
