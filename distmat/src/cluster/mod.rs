/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The multi-process distribution layer.
//!
//! A run has `world_size` ranks. Rank 0, the coordinator, partitions the
//! query rows into one contiguous chunk per rank, sends every worker its
//! chunk followed by the full dataset, computes its own chunk, and
//! assembles the returning result blocks into the full matrix by each
//! block's originating rank. Workers receive, compute, send and exit.
//!
//! A world size of 1 is not expressed here at all: the single-process path
//! calls the calculator directly and never constructs a transport.

pub mod transport;
pub mod wire;

pub use transport::{channel_cluster, ChannelTransport, TcpTransport, Transport};
pub use wire::{Frame, Tag};

use distmat_utils::{Matrix, MatrixView};
use distmat_vector::Scalar;

use crate::calculator::DistanceCalculator;
use crate::error::{Error, Result};
use crate::partition::partition;

/// Identity of a process in the run.
pub type Rank = u64;

/// The rank that ingests input, assembles the matrix and emits it.
pub const COORDINATOR: Rank = 0;

/// Drive a full run as the coordinator and return the assembled matrix.
///
/// Every worker receives its query chunk and then the dataset, in that
/// order. Result blocks may arrive in any order; each is placed at its
/// originating rank's row offset.
pub fn run_coordinator<T, X>(
    transport: &mut X,
    calculator: &DistanceCalculator<T>,
    metric: &str,
    queries: MatrixView<'_, T>,
    dataset: MatrixView<'_, T>,
) -> Result<Matrix<T>>
where
    T: Scalar,
    X: Transport<T>,
{
    if transport.rank() != COORDINATOR {
        return Err(Error::internal(format!(
            "rank {} cannot coordinate",
            transport.rank()
        )));
    }

    let world_size = transport.world_size();
    let chunks = partition(queries.nrows(), world_size);

    for rank in 1..world_size {
        let chunk = chunks[rank];
        tracing::debug!(rank, rows = chunk.len, "distributing query chunk");
        transport.send(
            rank as Rank,
            Frame::new(
                Tag::Query,
                COORDINATOR,
                queries.rows(chunk.range()).to_owned(),
            ),
        )?;
        transport.send(
            rank as Rank,
            Frame::new(Tag::Dataset, COORDINATOR, dataset.to_owned()),
        )?;
    }

    let local = calculator.compute_distance(queries.rows(chunks[0].range()), dataset, metric)?;

    let mut matrix = Matrix::new(T::ZERO, queries.nrows(), dataset.nrows());
    matrix.copy_rows_from(chunks[0].offset, local.as_view());

    for _ in 1..world_size {
        let (rank, frame) = transport.recv_result()?;
        let chunk = chunks
            .get(rank as usize)
            .copied()
            .ok_or_else(|| Error::transport(format!("result block from unknown rank {rank}")))?;
        if frame.table.nrows() != chunk.len || frame.table.ncols() != dataset.nrows() {
            return Err(Error::transport(format!(
                "result block from rank {rank} has shape {}x{}, expected {}x{}",
                frame.table.nrows(),
                frame.table.ncols(),
                chunk.len,
                dataset.nrows()
            )));
        }
        tracing::debug!(rank, rows = chunk.len, "collected result block");
        matrix.copy_rows_from(chunk.offset, frame.table.as_view());
    }

    Ok(matrix)
}

/// Drive a full run as a worker rank.
///
/// The steps are strictly ordered: receive the query chunk, receive the
/// dataset, compute, send the result block back to the coordinator.
pub fn run_worker<T, X>(
    transport: &mut X,
    calculator: &DistanceCalculator<T>,
    metric: &str,
) -> Result<()>
where
    T: Scalar,
    X: Transport<T>,
{
    let rank = transport.rank();
    if rank == COORDINATOR {
        return Err(Error::internal("the coordinator cannot run as a worker"));
    }

    let queries = transport.recv(COORDINATOR, Tag::Query)?.table;
    let dataset = transport.recv(COORDINATOR, Tag::Dataset)?.table;
    tracing::debug!(rank, rows = queries.nrows(), "computing assigned block");

    let block = calculator.compute_distance(queries.as_view(), dataset.as_view(), metric)?;
    transport.send(COORDINATOR, Frame::new(Tag::Result, rank, block))
}

///////////
// Tests //
///////////
