/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The `distmat` binary: compute a pairwise distance matrix between a
//! query table and a dataset table, on one thread, on all cores, or across
//! a pool of worker processes.

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use distmat::cluster::{self, Rank, TcpTransport};
use distmat::DistanceCalculator;
use distmat_utils::csv::{read_csv_path, write_csv, write_csv_path, Execution};
use distmat_utils::random::random_table;
use distmat_utils::Matrix;

mod args;
mod timelog;

use args::Args;
use timelog::TimeLog;

/// The scalar element type of this build.
type Value = i32;

/// Default shape when an input table is generated instead of loaded.
const GENERATED_SHAPE: (usize, usize) = (1024, 1024);

fn main() -> ExitCode {
    let args = Args::parse();

    // Only the coordinator narrates; workers report problems only.
    let default_level = if args.connect.is_some() { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let timelog = TimeLog::new(args.dump_time_log);
    match run(&args, &timelog) {
        Ok(()) => {
            if let Err(err) = timelog.dump_to(Path::new("time.log")) {
                tracing::warn!("failed to write time.log: {err}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_failure(&err, args.debug);
            ExitCode::FAILURE
        }
    }
}

fn report_failure(err: &anyhow::Error, debug: bool) {
    eprintln!("error: {err:#}");
    if debug {
        if let Some(fault) = err.downcast_ref::<distmat::Error>() {
            eprintln!("  [kind]:     {}", fault.kind());
            eprintln!(
                "  [origin]:   {}:{}",
                fault.location().file(),
                fault.location().line()
            );
        }
    }
}

fn run(args: &Args, timelog: &TimeLog) -> anyhow::Result<()> {
    args.validate()?;
    args.log_summary();

    if let (Some(addr), Some(rank)) = (args.connect, args.rank) {
        return run_as_worker(args, addr, rank);
    }

    let (queries, dataset) = timelog.time("load input tables", || load_tables(args))?;
    tracing::info!(
        queries = queries.nrows(),
        dataset = dataset.nrows(),
        width = queries.ncols(),
        "tables ready"
    );

    let calculator = make_calculator(args);
    let matrix = timelog.time("compute distances", || {
        compute(args, &calculator, &queries, &dataset)
    })?;

    timelog.time("emit distance matrix", || emit(args, &matrix))?;
    tracing::info!("distance computation completed successfully");
    Ok(())
}

fn make_calculator(args: &Args) -> DistanceCalculator<Value> {
    if args.parallel {
        DistanceCalculator::parallel()
    } else {
        DistanceCalculator::sequential()
    }
}

fn run_as_worker(args: &Args, addr: SocketAddr, rank: Rank) -> anyhow::Result<()> {
    let mut transport = TcpTransport::<Value>::worker(addr, rank)?;
    let calculator = make_calculator(args);
    cluster::run_worker(&mut transport, &calculator, &args.metric)?;
    Ok(())
}

fn load_tables(args: &Args) -> anyhow::Result<(Matrix<Value>, Matrix<Value>)> {
    match (&args.query, &args.dataset) {
        (None, None) => {
            let (nrows, ncols) = GENERATED_SHAPE;
            tracing::info!(nrows, ncols, "generating random input tables");
            let mut rng = StdRng::from_os_rng();
            Ok((
                random_table(nrows, ncols, &mut rng),
                random_table(nrows, ncols, &mut rng),
            ))
        }
        (Some(query), Some(dataset)) => {
            if args.parallel {
                // Load both files concurrently; when both fail, neither
                // diagnostic may be lost.
                let (queries, datasets) = rayon::join(
                    || load_table(query, args.execution()),
                    || load_table(dataset, args.execution()),
                );
                match (queries, datasets) {
                    (Ok(q), Ok(s)) => Ok((q, s)),
                    (queries, datasets) => {
                        let failures: Vec<String> = [queries.err(), datasets.err()]
                            .into_iter()
                            .flatten()
                            .map(|err| err.to_string())
                            .collect();
                        Err(distmat::Error::input(failures.join(" | ")).into())
                    }
                }
            } else {
                Ok((
                    load_table(query, args.execution())?,
                    load_table(dataset, args.execution())?,
                ))
            }
        }
        _ => Err(distmat::Error::configuration(
            "supply --query and --dataset together, or neither",
        )
        .into()),
    }
}

fn load_table(path: &Path, exec: Execution) -> Result<Matrix<Value>, distmat::Error> {
    read_csv_path(path, exec).map_err(|err| {
        distmat::Error::with_source(
            distmat::ErrorKind::Input,
            format!("failed to load {}", path.display()),
            err,
        )
    })
}

fn compute(
    args: &Args,
    calculator: &DistanceCalculator<Value>,
    queries: &Matrix<Value>,
    dataset: &Matrix<Value>,
) -> anyhow::Result<Matrix<Value>> {
    if args.world_size > 1 {
        let listen = args
            .listen
            .ok_or_else(|| distmat::Error::configuration("a multi-process run needs --listen"))?;
        tracing::info!(world_size = args.world_size, %listen, "coordinating multi-process run");

        let mut transport = TcpTransport::<Value>::coordinator(listen, args.world_size)?;
        Ok(cluster::run_coordinator(
            &mut transport,
            calculator,
            &args.metric,
            queries.as_view(),
            dataset.as_view(),
        )?)
    } else {
        Ok(calculator.compute_distance(queries.as_view(), dataset.as_view(), &args.metric)?)
    }
}

fn emit(args: &Args, matrix: &Matrix<Value>) -> anyhow::Result<()> {
    match &args.out {
        Some(path) => {
            tracing::info!(out = %path.display(), "writing distance matrix");
            write_csv_path(matrix, path)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write_csv(matrix, &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}

///////////
// Tests //
///////////
