/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Command line options and their validation.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use distmat::cluster::Rank;
use distmat::Error;
use distmat_utils::csv::Execution;

/// Computes pairwise distance matrices between large numerical vector sets.
#[derive(Debug, Parser)]
#[command(name = "distmat", version, about)]
pub struct Args {
    /// CSV file holding the query vectors; generated randomly when omitted.
    #[arg(long)]
    pub query: Option<PathBuf>,

    /// CSV file holding the dataset vectors; generated randomly when omitted.
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Output CSV path; the matrix goes to stdout when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Compute with the multi-threaded kernel.
    #[arg(long)]
    pub parallel: bool,

    /// Distance metric: L1, L2 or Hamming.
    #[arg(long, default_value = "L1")]
    pub metric: String,

    /// Report error origins (kind and file:line) on failure.
    #[arg(long)]
    pub debug: bool,

    /// Write per-phase timings to time.log.
    #[arg(long)]
    pub dump_time_log: bool,

    /// Listen address for coordinating a multi-process run.
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Total number of participating ranks.
    #[arg(long, default_value_t = 1)]
    pub world_size: usize,

    /// Coordinator address to join as a worker rank.
    #[arg(long, conflicts_with_all = ["listen", "query", "dataset", "out"])]
    pub connect: Option<SocketAddr>,

    /// This process's rank when joining with --connect.
    #[arg(long, requires = "connect")]
    pub rank: Option<Rank>,
}

impl Args {
    /// Check the flag combination rules. All violations are fatal
    /// configuration errors; an equal query/dataset pair is only a warning.
    pub fn validate(&self) -> Result<(), Error> {
        if self.query.is_some() != self.dataset.is_some() {
            return Err(Error::configuration(
                "a single input table cannot be generated automatically: \
                 supply --query and --dataset together, or neither",
            ));
        }

        for path in [&self.query, &self.dataset].into_iter().flatten() {
            if !path.exists() {
                return Err(Error::configuration(format!(
                    "input file does not exist: {}",
                    path.display()
                )));
            }
        }

        if let Some(out) = &self.out {
            if out.exists() {
                return Err(Error::configuration(format!(
                    "output file already exists: {}",
                    out.display()
                )));
            }
        }

        if let (Some(query), Some(dataset)) = (&self.query, &self.dataset) {
            if query == dataset {
                tracing::warn!("the query and dataset paths are equal");
            }
        }

        if self.world_size == 0 {
            return Err(Error::configuration("world size must be at least 1"));
        }
        if self.world_size > 1 && self.listen.is_none() {
            return Err(Error::configuration(
                "a multi-process run needs --listen on the coordinator",
            ));
        }
        if self.listen.is_some() && self.world_size < 2 {
            return Err(Error::configuration(
                "--listen requires --world-size of at least 2",
            ));
        }
        if self.connect.is_some() && self.rank.is_none() {
            return Err(Error::configuration("--connect requires --rank"));
        }
        if self.rank.is_some_and(|rank| rank == 0) {
            return Err(Error::configuration("worker ranks start at 1"));
        }

        Ok(())
    }

    /// CSV decoding strategy implied by `--parallel`.
    pub fn execution(&self) -> Execution {
        if self.parallel {
            Execution::Par
        } else {
            Execution::Seq
        }
    }

    /// Log the run configuration before compute begins.
    pub fn log_summary(&self) {
        if self.debug {
            tracing::warn!("running in debug mode");
        }

        let path_or = |path: &Option<PathBuf>, fallback: &str| {
            path.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| String::from(fallback))
        };

        tracing::info!(
            query = %path_or(&self.query, "<generated randomly>"),
            dataset = %path_or(&self.dataset, "<generated randomly>"),
            out = %path_or(&self.out, "<stdout>"),
            metric = %self.metric,
            parallel = self.parallel,
            world_size = self.world_size,
            "execution summary"
        );
    }
}

///////////
// Tests //
///////////
